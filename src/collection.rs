use crate::aggregate::Pipeline;
use crate::client::Client;
use crate::cursor::Cursor;
use crate::error::{Result, TomeError};
use crate::index::{IndexDefinition, IndexOptions, IndexSpec};
use crate::network::protocol::{Namespace, Request};
use crate::query::{Filter, FindOptions};
use crate::results::{
    DeleteResult, ExecutionStats, InsertOneResult, InsertResult, UpdateResult, expect_count,
    expect_index_name, expect_indexes,
};
use crate::types::{Document, Value};
use crate::update::UpdateSpec;

/// Options for `insert_many_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertManyOptions {
    /// All-or-nothing when true; best-effort when false.
    pub ordered: bool,
}

impl Default for InsertManyOptions {
    fn default() -> Self {
        Self { ordered: true }
    }
}

impl InsertManyOptions {
    pub fn unordered() -> Self {
        Self { ordered: false }
    }
}

/// Typed handle to one collection.
///
/// Arguments are validated before anything is sent, so a malformed filter or
/// update never reaches the store.
#[derive(Debug, Clone)]
pub struct Collection {
    client: Client,
    ns: Namespace,
}

impl Collection {
    pub(crate) fn new(client: Client, ns: Namespace) -> Self {
        Self { client, ns }
    }

    pub fn name(&self) -> &str {
        &self.ns.collection
    }

    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    pub async fn insert_one(&self, doc: Document) -> Result<InsertOneResult> {
        let result = self.insert_many(vec![doc]).await?;
        let inserted_id = result.inserted_ids.into_iter().next().ok_or_else(|| {
            TomeError::Protocol("insert acknowledged without an inserted id".into())
        })?;
        Ok(InsertOneResult { inserted_id })
    }

    /// Ordered insert: either every document is stored or none is.
    pub async fn insert_many(&self, docs: Vec<Document>) -> Result<InsertResult> {
        self.insert_many_with(docs, InsertManyOptions::default())
            .await
    }

    pub async fn insert_many_with(
        &self,
        docs: Vec<Document>,
        options: InsertManyOptions,
    ) -> Result<InsertResult> {
        if docs.is_empty() {
            return Err(TomeError::Validation(
                "insert requires at least one document".into(),
            ));
        }
        for doc in &docs {
            validate_document(doc)?;
        }
        let request = Request::Insert {
            ns: self.ns.clone(),
            documents: docs,
            ordered: options.ordered,
        };
        InsertResult::try_from(self.client.dispatch(request).await?)
    }

    /// Runs the query and buffers every matching document into a cursor.
    pub async fn find(&self, filter: impl Into<Filter>, options: FindOptions) -> Result<Cursor> {
        let filter = filter.into();
        filter.validate()?;
        options.validate()?;
        let request = Request::Find {
            ns: self.ns.clone(),
            filter,
            options,
        };
        Cursor::try_from(self.client.dispatch(request).await?)
    }

    pub async fn find_one(
        &self,
        filter: impl Into<Filter>,
        options: FindOptions,
    ) -> Result<Option<Document>> {
        let mut cursor = self.find(filter, options.limit(1)).await?;
        Ok(cursor.next())
    }

    pub async fn count_documents(&self, filter: impl Into<Filter>) -> Result<u64> {
        let filter = filter.into();
        filter.validate()?;
        let request = Request::Count {
            ns: self.ns.clone(),
            filter,
        };
        expect_count(self.client.dispatch(request).await?)
    }

    /// Updates at most one matching document, the first in the store's natural order.
    pub async fn update_one(
        &self,
        filter: impl Into<Filter>,
        update: UpdateSpec,
    ) -> Result<UpdateResult> {
        self.update(filter.into(), update, false).await
    }

    /// Updates every matching document. Not atomic: on failure the documents
    /// already updated stay updated and the error carries how many there were.
    pub async fn update_many(
        &self,
        filter: impl Into<Filter>,
        update: UpdateSpec,
    ) -> Result<UpdateResult> {
        self.update(filter.into(), update, true).await
    }

    async fn update(&self, filter: Filter, update: UpdateSpec, multi: bool) -> Result<UpdateResult> {
        filter.validate()?;
        update.validate()?;
        let request = Request::Update {
            ns: self.ns.clone(),
            filter,
            update,
            multi,
        };
        UpdateResult::try_from(self.client.dispatch(request).await?)
    }

    pub async fn delete_one(&self, filter: impl Into<Filter>) -> Result<DeleteResult> {
        self.delete(filter.into(), false).await
    }

    pub async fn delete_many(&self, filter: impl Into<Filter>) -> Result<DeleteResult> {
        self.delete(filter.into(), true).await
    }

    async fn delete(&self, filter: Filter, multi: bool) -> Result<DeleteResult> {
        filter.validate()?;
        let request = Request::Delete {
            ns: self.ns.clone(),
            filter,
            multi,
        };
        DeleteResult::try_from(self.client.dispatch(request).await?)
    }

    pub async fn aggregate(&self, pipeline: Pipeline) -> Result<Cursor> {
        pipeline.validate()?;
        let request = Request::Aggregate {
            ns: self.ns.clone(),
            pipeline,
        };
        Cursor::try_from(self.client.dispatch(request).await?)
    }

    /// Creates an index with the default name. Returns the index name.
    pub async fn create_index(&self, spec: IndexSpec) -> Result<String> {
        self.create_index_with(spec, IndexOptions::default()).await
    }

    /// Creates an index. Repeating an identical request returns the existing name.
    pub async fn create_index_with(&self, spec: IndexSpec, options: IndexOptions) -> Result<String> {
        spec.validate()?;
        if options.name.as_deref() == Some("") {
            return Err(TomeError::Validation("index name cannot be empty".into()));
        }
        let request = Request::CreateIndex {
            ns: self.ns.clone(),
            definition: IndexDefinition::new(spec, options),
        };
        expect_index_name(self.client.dispatch(request).await?)
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexDefinition>> {
        let request = Request::ListIndexes {
            ns: self.ns.clone(),
        };
        expect_indexes(self.client.dispatch(request).await?)
    }

    /// Reports how `find(filter, options)` executes without returning its documents.
    pub async fn explain(
        &self,
        filter: impl Into<Filter>,
        options: FindOptions,
    ) -> Result<ExecutionStats> {
        let filter = filter.into();
        filter.validate()?;
        options.validate()?;
        let request = Request::Explain {
            ns: self.ns.clone(),
            filter,
            options,
        };
        ExecutionStats::try_from(self.client.dispatch(request).await?)
    }
}

fn validate_document(doc: &Document) -> Result<()> {
    for key in doc.keys() {
        if key.is_empty() || key.starts_with('$') {
            return Err(TomeError::Validation(format!(
                "invalid top-level field name '{}'",
                key
            )));
        }
    }
    if let Some(Value::Array(_)) = doc.id() {
        return Err(TomeError::Validation("_id cannot be an array".into()));
    }
    Ok(())
}
