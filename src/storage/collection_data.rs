use crate::aggregate::Pipeline;
use crate::error::{Result, TomeError};
use crate::index::{ID_INDEX_NAME, Index, IndexDefinition};
use crate::network::protocol::{ExplainReport, PlanStage};
use crate::query::{Filter, FindOptions, Queryable, clamp_to_usize};
use crate::types::{Document, ID_FIELD, Value};
use crate::update::UpdateSpec;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// How a query selects its candidate documents.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AccessPath {
    CollectionScan,
    IndexScan { index: String, ids: HashSet<Value>, keys: u64 },
}

/// Documents of one collection in natural (insertion) order, plus secondary indexes.
#[derive(Debug, Default)]
pub struct CollectionData {
    docs: IndexMap<Value, Document>,
    indexes: Vec<Index>,
}

struct ScanOutcome {
    docs: Vec<Document>,
    examined: u64,
    access: AccessPath,
}

impl CollectionData {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn insert_many(&mut self, documents: Vec<Document>, ordered: bool) -> Result<Vec<Value>> {
        let mut inserted = Vec::with_capacity(documents.len());
        let mut failures = Vec::new();

        for mut doc in documents {
            if doc.id().is_none() {
                doc.set_id(Uuid::new_v4().to_string());
            }
            match self.insert_one(doc) {
                Ok(id) => inserted.push(id),
                Err(e) if ordered => {
                    // all-or-nothing: undo this call's inserts before reporting
                    for id in &inserted {
                        self.remove_by_id(id);
                    }
                    return Err(TomeError::write(error_message(e), 0));
                }
                Err(e) => failures.push(error_message(e)),
            }
        }

        if !failures.is_empty() {
            return Err(TomeError::write(
                format!(
                    "{} document(s) failed to insert; first error: {}",
                    failures.len(),
                    failures[0]
                ),
                inserted.len() as u64,
            ));
        }
        Ok(inserted)
    }

    fn insert_one(&mut self, doc: Document) -> Result<Value> {
        let id = doc.id().cloned().unwrap_or(Value::Null);
        if self.docs.contains_key(&id) {
            return Err(TomeError::write(
                format!("duplicate key error on index '{}': {}", ID_INDEX_NAME, id),
                0,
            ));
        }
        for index in &self.indexes {
            index.check_insert(&doc)?;
        }
        for index in &mut self.indexes {
            index.insert(&doc)?;
        }
        self.docs.insert(id.clone(), doc);
        Ok(id)
    }

    fn remove_by_id(&mut self, id: &Value) -> Option<Document> {
        let doc = self.docs.shift_remove(id)?;
        for index in &mut self.indexes {
            index.remove(&doc);
        }
        Some(doc)
    }

    fn plan(&self, filter: &Filter) -> AccessPath {
        for (field, value) in filter.equality_fields() {
            if field == ID_FIELD {
                let ids: HashSet<Value> = self
                    .docs
                    .get_key_value(value)
                    .map(|(id, _)| id.clone())
                    .into_iter()
                    .collect();
                let keys = ids.len() as u64;
                return AccessPath::IndexScan {
                    index: ID_INDEX_NAME.to_string(),
                    ids,
                    keys,
                };
            }
            if let Some(index) = self.indexes.iter().find(|i| i.first_field() == Some(field)) {
                let (ids, keys) = index.seek_first(value);
                return AccessPath::IndexScan {
                    index: index.definition().name.clone(),
                    ids: ids.into_iter().collect(),
                    keys,
                };
            }
        }
        AccessPath::CollectionScan
    }

    // Matching ids in natural order, with the number of documents examined.
    fn matching_ids(&self, filter: &Filter, access: &AccessPath) -> Result<(Vec<Value>, u64)> {
        let matcher = filter.matcher()?;
        let mut examined = 0;
        let mut ids = Vec::new();
        for (id, doc) in &self.docs {
            if let AccessPath::IndexScan { ids: candidates, .. } = access
                && !candidates.contains(id)
            {
                continue;
            }
            examined += 1;
            if matcher.matches(doc) {
                ids.push(id.clone());
            }
        }
        Ok((ids, examined))
    }

    fn scan(&self, filter: &Filter, options: &FindOptions) -> Result<ScanOutcome> {
        let access = self.plan(filter);
        let (ids, examined) = self.matching_ids(filter, &access)?;
        let mut docs: Vec<Document> = ids
            .iter()
            .filter_map(|id| self.docs.get(id).cloned())
            .collect();

        if let Some(sort) = &options.sort {
            sort.sort(&mut docs);
        }
        let docs = docs
            .into_iter()
            .skip(clamp_to_usize(options.skip))
            .take(options.limit.map_or(usize::MAX, clamp_to_usize));
        let docs = match &options.projection {
            Some(projection) => docs
                .map(|d| projection.apply(&d))
                .collect::<Result<Vec<_>>>()?,
            None => docs.collect(),
        };

        Ok(ScanOutcome {
            docs,
            examined,
            access,
        })
    }

    pub fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
        Ok(self.scan(filter, options)?.docs)
    }

    pub fn count(&self, filter: &Filter) -> Result<u64> {
        let access = self.plan(filter);
        Ok(self.matching_ids(filter, &access)?.0.len() as u64)
    }

    /// Returns `(matched, modified)`. Documents are updated one by one in natural
    /// order; a failure leaves earlier updates in place and reports how many were applied.
    pub fn update(&mut self, filter: &Filter, update: &UpdateSpec, multi: bool) -> Result<(u64, u64)> {
        let access = self.plan(filter);
        let (mut ids, _) = self.matching_ids(filter, &access)?;
        if !multi {
            ids.truncate(1);
        }

        let matched = ids.len() as u64;
        let mut modified = 0;
        for id in ids {
            let Some(original) = self.docs.get(&id).cloned() else {
                continue;
            };
            let mut updated = original.clone();
            let changed = update
                .apply(&mut updated)
                .map_err(|e| TomeError::write(error_message(e), modified))?;
            if !changed {
                continue;
            }
            self.replace(&original, updated)
                .map_err(|e| TomeError::write(error_message(e), modified))?;
            modified += 1;
        }
        Ok((matched, modified))
    }

    fn replace(&mut self, original: &Document, updated: Document) -> Result<()> {
        for index in &mut self.indexes {
            index.remove(original);
        }
        if let Some(err) = self.indexes.iter().find_map(|i| i.check_insert(&updated).err()) {
            for index in &mut self.indexes {
                index.insert(original)?;
            }
            return Err(err);
        }
        for index in &mut self.indexes {
            index.insert(&updated)?;
        }
        let id = updated.id().cloned().unwrap_or(Value::Null);
        self.docs.insert(id, updated);
        Ok(())
    }

    pub fn delete(&mut self, filter: &Filter, multi: bool) -> Result<u64> {
        let access = self.plan(filter);
        let (mut ids, _) = self.matching_ids(filter, &access)?;
        if !multi {
            ids.truncate(1);
        }
        Ok(ids
            .iter()
            .filter(|id| self.remove_by_id(id).is_some())
            .count() as u64)
    }

    pub fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>> {
        pipeline.execute(self.docs.values().cloned().collect())
    }

    pub fn create_index(&mut self, definition: IndexDefinition) -> Result<String> {
        if IndexDefinition::id_index().check_compatible(&definition)? {
            return Ok(ID_INDEX_NAME.to_string());
        }
        for existing in &self.indexes {
            if existing.definition().check_compatible(&definition)? {
                return Ok(existing.definition().name.clone());
            }
        }

        let mut index = Index::new(definition);
        for doc in self.docs.values() {
            index.insert(doc).map_err(|e| TomeError::Index(error_message(e)))?;
        }
        let name = index.definition().name.clone();
        self.indexes.push(index);
        Ok(name)
    }

    pub fn list_indexes(&self) -> Vec<IndexDefinition> {
        std::iter::once(IndexDefinition::id_index())
            .chain(self.indexes.iter().map(|i| i.definition().clone()))
            .collect()
    }

    pub fn explain(&self, filter: &Filter, options: &FindOptions) -> Result<ExplainReport> {
        let started = Instant::now();
        let outcome = self.scan(filter, options)?;
        let (input, keys) = match outcome.access {
            AccessPath::CollectionScan => (None, 0),
            AccessPath::IndexScan { index, keys, .. } => (
                Some(Box::new(PlanStage {
                    stage: "IXSCAN".to_string(),
                    index_name: Some(index),
                    input_stage: None,
                })),
                keys,
            ),
        };
        let winning_plan = match input {
            Some(ixscan) => PlanStage {
                stage: "FETCH".to_string(),
                index_name: None,
                input_stage: Some(ixscan),
            },
            None => PlanStage {
                stage: "COLLSCAN".to_string(),
                index_name: None,
                input_stage: None,
            },
        };
        Ok(ExplainReport {
            execution_time_millis: started.elapsed().as_millis() as u64,
            total_docs_examined: outcome.examined,
            total_keys_examined: keys,
            n_returned: outcome.docs.len() as u64,
            winning_plan,
        })
    }
}

fn error_message(err: TomeError) -> String {
    match err {
        TomeError::Write { message, .. } => message,
        other => other.to_string(),
    }
}
