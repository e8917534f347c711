//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Stages run strictly in the order
//! they were added, each consuming the output of the previous one; nothing is
//! reordered or merged.

use crate::computed::Expression;
use crate::error::{Result, TomeError};
use crate::query::{
    Filter, Queryable, SortSpec, clamp_to_usize, include_paths, validate_field_path,
};
use crate::types::{Document, ID_FIELD, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    #[serde(rename = "$sum")]
    Sum(Expression),
    #[serde(rename = "$avg")]
    Avg(Expression),
    #[serde(rename = "$count")]
    Count,
    #[serde(rename = "$min")]
    Min(Expression),
    #[serde(rename = "$max")]
    Max(Expression),
}

impl Accumulator {
    fn expression(&self) -> Option<&Expression> {
        match self {
            Accumulator::Sum(e) | Accumulator::Avg(e) | Accumulator::Min(e) | Accumulator::Max(e) => {
                Some(e)
            }
            Accumulator::Count => None,
        }
    }
}

/// Group-by key plus named accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub key: Expression,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    /// Groups by the value of `field`.
    pub fn by(field: impl Into<String>) -> Self {
        Self {
            key: Expression::Field(field.into()),
            accumulators: Vec::new(),
        }
    }

    /// A single group over every input document (`_id: null`).
    pub fn all() -> Self {
        Self {
            key: Expression::Literal(Value::Null),
            accumulators: Vec::new(),
        }
    }

    pub fn accumulate(mut self, name: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.into(), accumulator));
        self
    }

    pub fn count(self, name: impl Into<String>) -> Self {
        self.accumulate(name, Accumulator::Count)
    }

    pub fn sum(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.accumulate(name, Accumulator::Sum(Expression::Field(field.into())))
    }

    pub fn avg(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.accumulate(name, Accumulator::Avg(Expression::Field(field.into())))
    }

    pub fn min(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.accumulate(name, Accumulator::Min(Expression::Field(field.into())))
    }

    pub fn max(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.accumulate(name, Accumulator::Max(Expression::Field(field.into())))
    }

    fn validate(&self) -> Result<()> {
        self.key.validate()?;
        for (i, (name, accumulator)) in self.accumulators.iter().enumerate() {
            if name.is_empty() || name.contains('.') || name.starts_with('$') || name == ID_FIELD {
                return Err(TomeError::Validation(format!(
                    "invalid accumulator name '{}'",
                    name
                )));
            }
            if self.accumulators[..i].iter().any(|(n, _)| n == name) {
                return Err(TomeError::Validation(format!(
                    "duplicate accumulator '{}'",
                    name
                )));
            }
            if let Some(expr) = accumulator.expression() {
                expr.validate()?;
            }
        }
        Ok(())
    }

    fn execute(&self, docs: Vec<Document>) -> Vec<Document> {
        // first-seen order keeps group output deterministic
        let mut groups: IndexMap<Value, Vec<AccumulatorState>> = IndexMap::new();
        for doc in &docs {
            let key = self.key.evaluate(doc);
            let states = groups.entry(key).or_insert_with(|| {
                self.accumulators
                    .iter()
                    .map(|_| AccumulatorState::default())
                    .collect()
            });
            for ((_, accumulator), state) in self.accumulators.iter().zip(states.iter_mut()) {
                state.add(accumulator, doc);
            }
        }

        groups
            .into_iter()
            .map(|(key, states)| {
                let mut out = Document::new();
                out.insert(ID_FIELD, key);
                for ((name, accumulator), state) in self.accumulators.iter().zip(states) {
                    out.insert(name.clone(), state.finish(accumulator));
                }
                out
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct AccumulatorState {
    int_sum: i64,
    float_sum: f64,
    is_float: bool,
    numbers: u64,
    count: u64,
    extreme: Option<Value>,
}

impl AccumulatorState {
    fn add(&mut self, accumulator: &Accumulator, doc: &Document) {
        self.count += 1;
        let Some(expr) = accumulator.expression() else {
            return;
        };
        let value = expr.evaluate(doc);
        match accumulator {
            Accumulator::Sum(_) | Accumulator::Avg(_) => match value {
                Value::Int(i) => {
                    self.numbers += 1;
                    match self.int_sum.checked_add(i) {
                        Some(sum) => self.int_sum = sum,
                        None => {
                            self.is_float = true;
                            self.float_sum += i as f64;
                        }
                    }
                }
                Value::Float(f) => {
                    self.numbers += 1;
                    self.is_float = true;
                    self.float_sum += f;
                }
                _ => {}
            },
            Accumulator::Min(_) if !value.is_null() => {
                if self.extreme.as_ref().is_none_or(|current| value < *current) {
                    self.extreme = Some(value);
                }
            }
            Accumulator::Max(_) if !value.is_null() => {
                if self.extreme.as_ref().is_none_or(|current| value > *current) {
                    self.extreme = Some(value);
                }
            }
            _ => {}
        }
    }

    fn finish(&self, accumulator: &Accumulator) -> Value {
        match accumulator {
            Accumulator::Count => Value::Int(self.count as i64),
            Accumulator::Sum(_) if self.is_float => {
                Value::Float(self.float_sum + self.int_sum as f64)
            }
            Accumulator::Sum(_) => Value::Int(self.int_sum),
            Accumulator::Avg(_) if self.numbers == 0 => Value::Null,
            Accumulator::Avg(_) => {
                Value::Float((self.float_sum + self.int_sum as f64) / self.numbers as f64)
            }
            Accumulator::Min(_) | Accumulator::Max(_) => {
                self.extreme.clone().unwrap_or(Value::Null)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectField {
    #[serde(rename = "include")]
    Include,
    #[serde(rename = "exclude")]
    Exclude,
    #[serde(rename = "computed")]
    Computed(Expression),
}

/// Field selection and derived fields for a `$project` stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub fields: Vec<(String, ProjectField)>,
}

impl ProjectSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Include));
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Exclude));
        self
    }

    pub fn computed(mut self, field: impl Into<String>, expression: Expression) -> Self {
        self.fields.push((field.into(), ProjectField::Computed(expression)));
        self
    }

    fn is_inclusion(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, f)| !matches!(f, ProjectField::Exclude))
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(TomeError::Validation("$project needs at least one field".into()));
        }
        for (field, spec) in &self.fields {
            validate_field_path(field)?;
            if let ProjectField::Computed(expr) = spec {
                expr.validate()?;
            }
        }
        let excludes_other = self
            .fields
            .iter()
            .any(|(f, spec)| matches!(spec, ProjectField::Exclude) && f != ID_FIELD);
        if self.is_inclusion() && excludes_other {
            return Err(TomeError::Validation(
                "$project cannot mix inclusion and exclusion (except for _id)".into(),
            ));
        }
        Ok(())
    }

    fn apply(&self, doc: &Document) -> Result<Document> {
        if !self.is_inclusion() {
            let mut out = doc.clone();
            for (field, _) in &self.fields {
                out.remove_path(field);
            }
            return Ok(out);
        }

        let include_id = !self
            .fields
            .iter()
            .any(|(f, spec)| f == ID_FIELD && matches!(spec, ProjectField::Exclude));
        let mut out = include_paths(doc, include_id, std::iter::empty())?;
        for (field, spec) in &self.fields {
            match spec {
                ProjectField::Include if field != ID_FIELD => {
                    if let Some(value) = doc.get_path(field) {
                        out.set_path(field, value.clone())?;
                    }
                }
                ProjectField::Computed(expr) => out.set_path(field, expr.evaluate(doc))?,
                _ => {}
            }
        }
        Ok(out)
    }
}

/// One step of an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "$match")]
    Match(Filter),
    #[serde(rename = "$group")]
    Group(GroupSpec),
    #[serde(rename = "$sort")]
    Sort(SortSpec),
    #[serde(rename = "$skip")]
    Skip(u64),
    #[serde(rename = "$limit")]
    Limit(u64),
    #[serde(rename = "$project")]
    Project(ProjectSpec),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Group(_) => "$group",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Project(_) => "$project",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Stage::Match(filter) => filter.validate(),
            Stage::Group(group) => group.validate(),
            Stage::Sort(sort) => sort.validate(),
            Stage::Skip(_) => Ok(()),
            Stage::Limit(0) => Err(TomeError::Validation("$limit must be positive".into())),
            Stage::Limit(_) => Ok(()),
            Stage::Project(project) => project.validate(),
        }
    }

    fn execute(&self, mut docs: Vec<Document>) -> Result<Vec<Document>> {
        Ok(match self {
            Stage::Match(filter) => {
                let matcher = filter.matcher()?;
                docs.into_iter().filter(|d| matcher.matches(d)).collect()
            }
            Stage::Group(group) => group.execute(docs),
            Stage::Sort(sort) => {
                sort.sort(&mut docs);
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(clamp_to_usize(*n)).collect(),
            Stage::Limit(n) => {
                docs.truncate(clamp_to_usize(*n));
                docs
            }
            Stage::Project(project) => docs
                .iter()
                .map(|d| project.apply(d))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn match_filter(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    pub fn group(self, group: GroupSpec) -> Self {
        self.stage(Stage::Group(group))
    }

    pub fn sort(self, sort: SortSpec) -> Self {
        self.stage(Stage::Sort(sort))
    }

    pub fn skip(self, n: u64) -> Self {
        self.stage(Stage::Skip(n))
    }

    pub fn limit(self, n: u64) -> Self {
        self.stage(Stage::Limit(n))
    }

    pub fn project(self, project: ProjectSpec) -> Self {
        self.stage(Stage::Project(project))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (i, stage) in self.stages.iter().enumerate() {
            stage.validate().map_err(|e| match e {
                TomeError::Validation(msg) => {
                    TomeError::Validation(format!("stage {} ({}): {}", i, stage.name(), msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Runs every stage in order over `docs`.
    pub fn execute(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        self.stages
            .iter()
            .try_fold(docs, |docs, stage| stage.execute(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn books() -> Vec<Document> {
        [
            json!({"_id": 1, "author": "A", "genre": "Fiction", "price": 10.0}),
            json!({"_id": 2, "author": "B", "genre": "Non-Fiction", "price": 20.0}),
            json!({"_id": 3, "author": "A", "genre": "Fiction", "price": 15.5}),
            json!({"_id": 4, "author": "C", "genre": "Sci-Fi", "price": 7}),
            json!({"_id": 5, "author": "A", "genre": "Fiction"}),
        ]
        .into_iter()
        .map(|j| Document::from_json(j).unwrap())
        .collect()
    }

    #[test]
    fn test_group_count_sum_avg() {
        let pipeline = Pipeline::new().group(
            GroupSpec::by("genre")
                .count("count")
                .sum("total", "price")
                .avg("avgPrice", "price"),
        );
        let out = pipeline.execute(books()).unwrap();
        assert_eq!(out.len(), 3);
        let fiction = &out[0];
        assert_eq!(fiction.get("_id"), Some(&Value::from("Fiction")));
        assert_eq!(fiction.get("count"), Some(&Value::Int(3)));
        assert_eq!(fiction.get("total"), Some(&Value::Float(25.5)));
        assert_eq!(fiction.get("avgPrice"), Some(&Value::Float(12.75)));
        let scifi = &out[2];
        assert_eq!(scifi.get("total"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_sort_limit_after_group() {
        let pipeline = Pipeline::new()
            .group(GroupSpec::by("author").count("bookCount"))
            .sort(SortSpec::new().desc("bookCount"))
            .limit(1);
        let out = pipeline.execute(books()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("_id"), Some(&Value::from("A")));
        assert_eq!(out[0].get("bookCount"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_project_with_rounding() {
        let pipeline = Pipeline::new()
            .group(GroupSpec::by("genre").avg("avgPrice", "price"))
            .project(
                ProjectSpec::new()
                    .include("_id")
                    .computed("avgPrice", Expression::round(Expression::field("avgPrice"), 1)),
            );
        let out = pipeline.execute(books()).unwrap();
        assert_eq!(out[0].get("avgPrice"), Some(&Value::Float(12.8)));
    }

    #[test]
    fn test_group_all_min_max() {
        let out = Pipeline::new()
            .group(GroupSpec::all().min("cheapest", "price").max("dearest", "price"))
            .execute(books())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("_id"), Some(&Value::Null));
        assert_eq!(out[0].get("cheapest"), Some(&Value::Int(7)));
        assert_eq!(out[0].get("dearest"), Some(&Value::Float(20.0)));
    }

    #[test]
    fn test_stage_order_is_preserved() {
        let limit_then_match = Pipeline::new()
            .limit(2)
            .match_filter(Filter::eq("author", "A"));
        let match_then_limit = Pipeline::new()
            .match_filter(Filter::eq("author", "A"))
            .limit(2);
        assert_eq!(limit_then_match.execute(books()).unwrap().len(), 1);
        assert_eq!(match_then_limit.execute(books()).unwrap().len(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(Pipeline::new().limit(0).validate().is_err());
        assert!(Pipeline::new().group(GroupSpec::by("genre").count("a.b")).validate().is_err());
        assert!(Pipeline::new().group(GroupSpec::by("genre").count("n").count("n")).validate().is_err());
        assert!(
            Pipeline::new()
                .project(ProjectSpec::new().include("a").exclude("b"))
                .validate()
                .is_err()
        );
        assert!(Pipeline::new().project(ProjectSpec::new()).validate().is_err());
        assert!(Pipeline::new().validate().is_ok());
    }
}
