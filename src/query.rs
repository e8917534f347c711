//! Filters, sort specifications, projections and find options.
//!
//! Everything here is a plain value: nothing touches the store until a filter or
//! option set is handed to a [`Collection`](crate::collection::Collection) method.
//! Operator names like `$gt` only appear in the serde encoding used on the wire.

use crate::error::{Result, TomeError};
use crate::types::{Document, ID_FIELD, Value};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub trait Queryable {
    fn matches(&self, doc: &Document) -> bool;
}

impl<F> Queryable for F
where
    F: Fn(&Document) -> bool,
{
    fn matches(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// A structured predicate over document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every document.
    #[serde(rename = "$all")]
    All,
    #[serde(rename = "$eq")]
    Eq { field: String, value: Value },
    #[serde(rename = "$ne")]
    Ne { field: String, value: Value },
    #[serde(rename = "$gt")]
    Gt { field: String, value: Value },
    #[serde(rename = "$gte")]
    Gte { field: String, value: Value },
    #[serde(rename = "$lt")]
    Lt { field: String, value: Value },
    #[serde(rename = "$lte")]
    Lte { field: String, value: Value },
    #[serde(rename = "$in")]
    In { field: String, values: Vec<Value> },
    #[serde(rename = "$nin")]
    Nin { field: String, values: Vec<Value> },
    #[serde(rename = "$exists")]
    Exists { field: String, exists: bool },
    #[serde(rename = "$regex")]
    Regex {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    #[serde(rename = "$and")]
    And(Vec<Filter>),
    #[serde(rename = "$or")]
    Or(Vec<Filter>),
    #[serde(rename = "$not")]
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn all() -> Self {
        Filter::All
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::Nin {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Filter::Exists {
            field: field.into(),
            exists,
        }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        }
    }

    pub fn regex_ci(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Combines two filters with AND, flattening nested conjunctions.
    pub fn and_also(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }

    /// Rejects filters the store cannot evaluate.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::All => Ok(()),
            Filter::Eq { field, .. }
            | Filter::Ne { field, .. }
            | Filter::Gt { field, .. }
            | Filter::Gte { field, .. }
            | Filter::Lt { field, .. }
            | Filter::Lte { field, .. }
            | Filter::In { field, .. }
            | Filter::Nin { field, .. }
            | Filter::Exists { field, .. } => validate_field_path(field),
            Filter::Regex { field, pattern, .. } => {
                validate_field_path(field)?;
                RegexBuilder::new(pattern).build().map_err(|e| {
                    TomeError::Validation(format!("invalid regex '{}': {}", pattern, e))
                })?;
                Ok(())
            }
            Filter::And(filters) | Filter::Or(filters) => {
                if filters.is_empty() {
                    return Err(TomeError::Validation(
                        "logical filter needs at least one clause".into(),
                    ));
                }
                filters.iter().try_for_each(Filter::validate)
            }
            Filter::Not(inner) => inner.validate(),
        }
    }

    /// Top-level equality constraints, used by stores to pick an index.
    pub fn equality_fields(&self) -> Vec<(&str, &Value)> {
        match self {
            Filter::Eq { field, value } => vec![(field.as_str(), value)],
            Filter::And(filters) => filters.iter().flat_map(Filter::equality_fields).collect(),
            _ => Vec::new(),
        }
    }

    /// Compiles the filter for repeated evaluation. Regex patterns are built once here
    /// instead of once per document.
    pub fn matcher(&self) -> Result<FilterMatcher<'_>> {
        let node = match self {
            Filter::Regex {
                field,
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| {
                        TomeError::Validation(format!("invalid regex '{}': {}", pattern, e))
                    })?;
                Node::Regex {
                    field: field.as_str(),
                    regex,
                }
            }
            Filter::And(filters) => Node::And(compile_all(filters)?),
            Filter::Or(filters) => Node::Or(compile_all(filters)?),
            Filter::Not(inner) => Node::Not(Box::new(inner.matcher()?.root)),
            leaf => Node::Leaf(leaf),
        };
        Ok(FilterMatcher { root: node })
    }
}

fn compile_all(filters: &[Filter]) -> Result<Vec<Node<'_>>> {
    filters
        .iter()
        .map(|f| f.matcher().map(|m| m.root))
        .collect()
}

/// A [`Filter`] ready to be evaluated against many documents.
#[derive(Debug)]
pub struct FilterMatcher<'a> {
    root: Node<'a>,
}

#[derive(Debug)]
enum Node<'a> {
    Leaf(&'a Filter),
    Regex { field: &'a str, regex: Regex },
    And(Vec<Node<'a>>),
    Or(Vec<Node<'a>>),
    Not(Box<Node<'a>>),
}

impl Node<'_> {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Node::Leaf(filter) => leaf_matches(filter, doc),
            Node::Regex { field, regex } => candidates(doc.get_path(field))
                .iter()
                .any(|v| v.as_str().is_some_and(|s| regex.is_match(s))),
            Node::And(nodes) => nodes.iter().all(|n| n.matches(doc)),
            Node::Or(nodes) => nodes.iter().any(|n| n.matches(doc)),
            Node::Not(inner) => !inner.matches(doc),
        }
    }
}

impl Queryable for FilterMatcher<'_> {
    fn matches(&self, doc: &Document) -> bool {
        self.root.matches(doc)
    }
}

/// One-off evaluation. An invalid regex matches nothing; use [`Filter::matcher`]
/// when scanning many documents.
impl Queryable for Filter {
    fn matches(&self, doc: &Document) -> bool {
        self.matcher().is_ok_and(|m| m.matches(doc))
    }
}

fn leaf_matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq { field, value } => field_equals(doc, field, value),
        Filter::Ne { field, value } => !field_equals(doc, field, value),
        Filter::Gt { field, value } => field_compares(doc, field, value, |o| o.is_gt()),
        Filter::Gte { field, value } => field_compares(doc, field, value, |o| o.is_ge()),
        Filter::Lt { field, value } => field_compares(doc, field, value, |o| o.is_lt()),
        Filter::Lte { field, value } => field_compares(doc, field, value, |o| o.is_le()),
        Filter::In { field, values } => values.iter().any(|v| field_equals(doc, field, v)),
        Filter::Nin { field, values } => !values.iter().any(|v| field_equals(doc, field, v)),
        Filter::Exists { field, exists } => doc.get_path(field).is_some() == *exists,
        // compiled into matcher nodes
        Filter::Regex { .. } | Filter::And(_) | Filter::Or(_) | Filter::Not(_) => false,
    }
}

/// Skip and limit counts saturate on targets where `usize` is narrower than `u64`.
pub(crate) fn clamp_to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

pub(crate) fn validate_field_path(field: &str) -> Result<()> {
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(TomeError::Validation(format!("invalid field path '{}'", field)));
    }
    if field.starts_with('$') {
        return Err(TomeError::Validation(format!(
            "field path '{}' must not start with '$'",
            field
        )));
    }
    Ok(())
}

// A field holding an array is matched element-wise as well as as a whole.
fn candidates(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(v @ Value::Array(items)) => {
            let mut all: Vec<&Value> = items.iter().collect();
            all.push(v);
            all
        }
        Some(v) => vec![v],
        None => Vec::new(),
    }
}

fn field_equals(doc: &Document, field: &str, expected: &Value) -> bool {
    match doc.get_path(field) {
        None => expected.is_null(),
        found => candidates(found).into_iter().any(|v| v == expected),
    }
}

// Range comparisons only succeed between values of the same type class.
fn field_compares(doc: &Document, field: &str, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    candidates(doc.get_path(field)).into_iter().any(|v| {
        let same_class = (v.is_number() && bound.is_number())
            || std::mem::discriminant(v) == std::mem::discriminant(bound);
        same_class && accept(v.cmp(bound))
    })
}

/// A fluent builder producing an AND of its clauses.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    clauses: Vec<Filter>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.clauses.push(filter);
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(field, value))
    }

    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::ne(field, value))
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::gt(field, value))
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::gte(field, value))
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::lt(field, value))
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::lte(field, value))
    }

    pub fn build(self) -> Filter {
        match self.clauses.len() {
            0 => Filter::All,
            1 => self.clauses.into_iter().next().unwrap_or_default(),
            _ => Filter::And(self.clauses),
        }
    }
}

impl From<QueryBuilder> for Filter {
    fn from(builder: QueryBuilder) -> Self {
        builder.build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Ordered sort keys, applied left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortOrder::Ascending));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push((field.into(), SortOrder::Descending));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(TomeError::Validation("sort needs at least one key".into()));
        }
        for (i, (field, _)) in self.keys.iter().enumerate() {
            validate_field_path(field)?;
            if self.keys[..i].iter().any(|(f, _)| f == field) {
                return Err(TomeError::Validation(format!(
                    "duplicate sort key '{}'",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Compares two documents; missing fields sort as null.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.keys {
            let left = a.get_path(field).unwrap_or(&Value::Null);
            let right = b.get_path(field).unwrap_or(&Value::Null);
            let ord = match order {
                SortOrder::Ascending => left.cmp(right),
                SortOrder::Descending => right.cmp(left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| self.compare(a, b));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Include,
    Exclude,
}

/// Field selection for query results: either an inclusion or an exclusion list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<(String, bool)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| (f.into(), true)).collect(),
        }
    }

    pub fn exclude<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| (f.into(), false)).collect(),
        }
    }

    pub fn field(mut self, field: impl Into<String>, include: bool) -> Self {
        self.fields.push((field.into(), include));
        self
    }

    pub fn exclude_id(self) -> Self {
        self.field(ID_FIELD, false)
    }

    /// Works out the projection mode. `_id` may be excluded from an inclusion list;
    /// any other mix of inclusions and exclusions is rejected.
    pub fn mode(&self) -> Result<ProjectionMode> {
        for (field, _) in &self.fields {
            validate_field_path(field)?;
        }
        let includes = self.fields.iter().any(|(_, inc)| *inc);
        let excludes_other = self
            .fields
            .iter()
            .any(|(f, inc)| !*inc && f != ID_FIELD);
        match (includes, excludes_other) {
            (true, true) => Err(TomeError::Validation(
                "projection cannot mix inclusion and exclusion (except for _id)".into(),
            )),
            (true, false) => Ok(ProjectionMode::Include),
            (false, _) => Ok(ProjectionMode::Exclude),
        }
    }

    pub fn apply(&self, doc: &Document) -> Result<Document> {
        let include_id = !self.fields.iter().any(|(f, inc)| f == ID_FIELD && !*inc);
        match self.mode()? {
            ProjectionMode::Include => {
                let paths = self
                    .fields
                    .iter()
                    .filter(|(f, inc)| *inc && f != ID_FIELD)
                    .map(|(f, _)| f.as_str());
                include_paths(doc, include_id, paths)
            }
            ProjectionMode::Exclude => {
                let mut out = doc.clone();
                for (field, _) in &self.fields {
                    out.remove_path(field);
                }
                Ok(out)
            }
        }
    }
}

/// Copies `_id` (optionally) and the given dotted paths into a fresh document.
pub(crate) fn include_paths<'a>(
    doc: &Document,
    include_id: bool,
    paths: impl Iterator<Item = &'a str>,
) -> Result<Document> {
    let mut out = Document::new();
    if include_id && let Some(id) = doc.id() {
        out.insert(ID_FIELD, id.clone());
    }
    for path in paths {
        if let Some(value) = doc.get_path(path) {
            out.set_path(path, value.clone())?;
        }
    }
    Ok(out)
}

/// Options accepted by `find`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub projection: Option<Projection>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(sort) = &self.sort {
            sort.validate()?;
        }
        if let Some(projection) = &self.projection {
            projection.mode()?;
        }
        if self.limit == Some(0) {
            return Err(TomeError::Validation("limit must be positive".into()));
        }
        Ok(())
    }
}
