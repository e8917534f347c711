use crate::aggregate::Pipeline;
use crate::index::IndexDefinition;
use crate::query::{Filter, FindOptions};
use crate::types::{Document, Value};
use crate::update::UpdateSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified collection name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Represents a request sent from a client to the store.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    /// Round-trip check.
    Ping,
    /// Create a collection explicitly.
    CreateCollection { ns: Namespace },
    /// List collection names in a database.
    ListCollections { database: String },
    /// Insert documents; `ordered` selects all-or-nothing vs best-effort.
    Insert {
        ns: Namespace,
        documents: Vec<Document>,
        ordered: bool,
    },
    /// Query a collection.
    Find {
        ns: Namespace,
        filter: Filter,
        options: FindOptions,
    },
    /// Count matching documents.
    Count { ns: Namespace, filter: Filter },
    /// Update the first (`multi == false`) or every matching document.
    Update {
        ns: Namespace,
        filter: Filter,
        update: UpdateSpec,
        multi: bool,
    },
    /// Delete the first (`multi == false`) or every matching document.
    Delete {
        ns: Namespace,
        filter: Filter,
        multi: bool,
    },
    /// Run an aggregation pipeline.
    Aggregate { ns: Namespace, pipeline: Pipeline },
    /// Create an index.
    CreateIndex {
        ns: Namespace,
        definition: IndexDefinition,
    },
    /// List index definitions.
    ListIndexes { ns: Namespace },
    /// Report how a query would execute.
    Explain {
        ns: Namespace,
        filter: Filter,
        options: FindOptions,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::CreateCollection { .. } => "create",
            Request::ListCollections { .. } => "listCollections",
            Request::Insert { .. } => "insert",
            Request::Find { .. } => "find",
            Request::Count { .. } => "count",
            Request::Update { .. } => "update",
            Request::Delete { .. } => "delete",
            Request::Aggregate { .. } => "aggregate",
            Request::CreateIndex { .. } => "createIndexes",
            Request::ListIndexes { .. } => "listIndexes",
            Request::Explain { .. } => "explain",
        }
    }
}

/// Represents a response sent from the store to a client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    /// A successful operation with no return value.
    Done,
    /// Ids of inserted documents, in input order.
    Inserted(Vec<Value>),
    /// A batch of documents.
    Documents(Vec<Document>),
    /// A count.
    Count(u64),
    Updated { matched: u64, modified: u64 },
    Deleted(u64),
    IndexName(String),
    Indexes(Vec<IndexDefinition>),
    Names(Vec<String>),
    Explain(ExplainReport),
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Done => "done",
            Response::Inserted(_) => "inserted",
            Response::Documents(_) => "documents",
            Response::Count(_) => "count",
            Response::Updated { .. } => "updated",
            Response::Deleted(_) => "deleted",
            Response::IndexName(_) => "indexName",
            Response::Indexes(_) => "indexes",
            Response::Names(_) => "names",
            Response::Explain(_) => "explain",
        }
    }
}

/// One node of the winning query plan, e.g. `FETCH` over `IXSCAN`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStage {
    pub stage: String,
    pub index_name: Option<String>,
    pub input_stage: Option<Box<PlanStage>>,
}

/// Raw execution statistics as reported by the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainReport {
    pub execution_time_millis: u64,
    pub total_docs_examined: u64,
    pub total_keys_examined: u64,
    pub n_returned: u64,
    pub winning_plan: PlanStage,
}
