use crate::error::{Result, TomeError};
use crate::query::{SortOrder, validate_field_path};
use crate::types::{Document, ID_FIELD, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Name of the index every collection has on `_id`.
pub const ID_INDEX_NAME: &str = "_id_";

/// Ordered index keys with their direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortOrder)>,
}

impl IndexSpec {
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

    /// Conventional name, e.g. `title_1` or `author_1_year_-1`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| {
                let dir = match order {
                    SortOrder::Ascending => "1",
                    SortOrder::Descending => "-1",
                };
                format!("{}_{}", field, dir)
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(TomeError::Validation("index needs at least one key".into()));
        }
        for (i, (field, _)) in self.keys.iter().enumerate() {
            validate_field_path(field)?;
            if self.keys[..i].iter().any(|(f, _)| f == field) {
                return Err(TomeError::Validation(format!(
                    "duplicate index key '{}'",
                    field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub name: Option<String>,
    pub unique: bool,
}

impl IndexOptions {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub spec: IndexSpec,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(spec: IndexSpec, options: IndexOptions) -> Self {
        Self {
            name: options.name.unwrap_or_else(|| spec.default_name()),
            spec,
            unique: options.unique,
        }
    }

    pub(crate) fn id_index() -> Self {
        Self {
            name: ID_INDEX_NAME.to_string(),
            spec: IndexSpec::new().asc(ID_FIELD),
            unique: true,
        }
    }

    /// Checks whether `other` may coexist with this definition.
    /// Returns `Ok(true)` when it is the same index and creation is a no-op.
    pub fn check_compatible(&self, other: &IndexDefinition) -> Result<bool> {
        let same_keys = self.spec == other.spec;
        let same_name = self.name == other.name;
        match (same_keys, same_name) {
            (true, true) if self.unique == other.unique => Ok(true),
            (true, _) => Err(TomeError::Index(format!(
                "an index with the same keys already exists as '{}' with different options",
                self.name
            ))),
            (false, true) => Err(TomeError::Index(format!(
                "index '{}' already exists with different keys",
                self.name
            ))),
            (false, false) => Ok(false),
        }
    }
}

/// Key → `_id` entries for one index, maintained by the store on every write.
#[derive(Debug, Clone)]
pub struct Index {
    definition: IndexDefinition,
    data: HashMap<Value, Vec<Value>>, // key -> document ids
}

impl Index {
    pub fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            data: HashMap::new(),
        }
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn first_field(&self) -> Option<&str> {
        self.definition.spec.keys.first().map(|(f, _)| f.as_str())
    }

    /// Fails without modifying anything if a unique index already holds one of the keys.
    pub fn check_insert(&self, doc: &Document) -> Result<()> {
        if !self.definition.unique {
            return Ok(());
        }
        let id = doc.id().cloned().unwrap_or(Value::Null);
        for key in self.extract_keys(doc) {
            if let Some(ids) = self.data.get(&key)
                && ids.iter().any(|existing| *existing != id)
            {
                return Err(TomeError::write(
                    format!(
                        "duplicate key error on index '{}': {}",
                        self.definition.name, key
                    ),
                    0,
                ));
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, doc: &Document) -> Result<()> {
        self.check_insert(doc)?;
        let id = doc.id().cloned().unwrap_or(Value::Null);
        for key in self.extract_keys(doc) {
            self.data.entry(key).or_default().push(id.clone());
        }
        Ok(())
    }

    pub fn remove(&mut self, doc: &Document) {
        let id = doc.id().cloned().unwrap_or(Value::Null);
        for key in self.extract_keys(doc) {
            if let Some(ids) = self.data.get_mut(&key) {
                ids.retain(|existing| *existing != id);
                if ids.is_empty() {
                    self.data.remove(&key);
                }
            }
        }
    }

    /// Ids with a first key equal to `value`, plus the number of keys examined.
    pub fn seek_first(&self, value: &Value) -> (Vec<Value>, u64) {
        if self.definition.spec.keys.len() == 1 {
            let ids = self.data.get(value).cloned().unwrap_or_default();
            let examined = ids.len() as u64;
            return (ids, examined);
        }
        let mut examined = 0;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for (key, entry) in &self.data {
            if let Value::Array(parts) = key
                && parts.first() == Some(value)
            {
                examined += entry.len() as u64;
                ids.extend(entry.iter().filter(|id| seen.insert(*id)).cloned());
            }
        }
        (ids, examined)
    }

    // Multikey: an array contributes each element and the array itself, the same
    // values an equality filter compares against. Compound keys take every combination.
    fn extract_keys(&self, doc: &Document) -> Vec<Value> {
        let per_field: Vec<Vec<Value>> = self
            .definition
            .spec
            .keys
            .iter()
            .map(|(field, _)| field_keys(doc.get_path(field)))
            .collect();

        if let [single] = per_field.as_slice() {
            return single.clone();
        }
        per_field
            .iter()
            .fold(vec![Vec::new()], |prefixes, keys| {
                prefixes
                    .iter()
                    .flat_map(|prefix| {
                        keys.iter().map(move |key| {
                            let mut combined = prefix.clone();
                            combined.push(key.clone());
                            combined
                        })
                    })
                    .collect()
            })
            .into_iter()
            .map(Value::Array)
            .collect()
    }
}

fn field_keys(value: Option<&Value>) -> Vec<Value> {
    match value {
        None => vec![Value::Null],
        Some(whole @ Value::Array(items)) => {
            let mut keys: Vec<Value> = Vec::with_capacity(items.len() + 1);
            for item in items.iter().chain(std::iter::once(whole)) {
                if !keys.contains(item) {
                    keys.push(item.clone());
                }
            }
            keys
        }
        Some(other) => vec![other.clone()],
    }
}
