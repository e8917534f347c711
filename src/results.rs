//! Typed outcomes of collection operations, materialized from store responses.

use crate::error::{Result, TomeError};
use crate::network::protocol::{ExplainReport, Response};
use crate::types::Value;
use serde::Serialize;
use std::fmt;

/// Stage name the store reports for an index scan.
pub const INDEX_SCAN_STAGE: &str = "IXSCAN";

fn unexpected(expected: &str, response: &Response) -> TomeError {
    TomeError::Protocol(format!(
        "unexpected response: expected {}, got {}",
        expected,
        response.kind()
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub inserted_id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub inserted_count: u64,
    pub inserted_ids: Vec<Value>,
}

impl TryFrom<Response> for InsertResult {
    type Error = TomeError;

    fn try_from(response: Response) -> Result<Self> {
        match response {
            Response::Inserted(ids) => Ok(Self {
                inserted_count: ids.len() as u64,
                inserted_ids: ids,
            }),
            other => Err(unexpected("inserted", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl TryFrom<Response> for UpdateResult {
    type Error = TomeError;

    fn try_from(response: Response) -> Result<Self> {
        match response {
            Response::Updated { matched, modified } => Ok(Self {
                matched_count: matched,
                modified_count: modified,
            }),
            other => Err(unexpected("updated", &other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_count: u64,
}

impl TryFrom<Response> for DeleteResult {
    type Error = TomeError;

    fn try_from(response: Response) -> Result<Self> {
        match response {
            Response::Deleted(n) => Ok(Self { deleted_count: n }),
            other => Err(unexpected("deleted", &other)),
        }
    }
}

/// Summary of how a query executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub execution_time_millis: u64,
    pub total_docs_examined: u64,
    pub total_keys_examined: u64,
    pub n_returned: u64,
    /// True when the winning plan reads its input from an index scan.
    pub index_used: bool,
    pub index_name: Option<String>,
}

impl From<ExplainReport> for ExecutionStats {
    fn from(report: ExplainReport) -> Self {
        let input = report.winning_plan.input_stage.as_deref();
        let index_used = input.is_some_and(|stage| stage.stage == INDEX_SCAN_STAGE);
        Self {
            execution_time_millis: report.execution_time_millis,
            total_docs_examined: report.total_docs_examined,
            total_keys_examined: report.total_keys_examined,
            n_returned: report.n_returned,
            index_used,
            index_name: input
                .filter(|_| index_used)
                .and_then(|stage| stage.index_name.clone()),
        }
    }
}

impl TryFrom<Response> for ExecutionStats {
    type Error = TomeError;

    fn try_from(response: Response) -> Result<Self> {
        match response {
            Response::Explain(report) => Ok(report.into()),
            other => Err(unexpected("explain", &other)),
        }
    }
}

impl fmt::Display for ExecutionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ executionTime: {}ms, totalDocsExamined: {}, indexUsed: {} }}",
            self.execution_time_millis, self.total_docs_examined, self.index_used
        )
    }
}

pub(crate) fn expect_done(response: Response) -> Result<()> {
    match response {
        Response::Done => Ok(()),
        other => Err(unexpected("done", &other)),
    }
}

pub(crate) fn expect_count(response: Response) -> Result<u64> {
    match response {
        Response::Count(n) => Ok(n),
        other => Err(unexpected("count", &other)),
    }
}

pub(crate) fn expect_names(response: Response) -> Result<Vec<String>> {
    match response {
        Response::Names(names) => Ok(names),
        other => Err(unexpected("names", &other)),
    }
}

pub(crate) fn expect_index_name(response: Response) -> Result<String> {
    match response {
        Response::IndexName(name) => Ok(name),
        other => Err(unexpected("index name", &other)),
    }
}

pub(crate) fn expect_indexes(response: Response) -> Result<Vec<crate::index::IndexDefinition>> {
    match response {
        Response::Indexes(indexes) => Ok(indexes),
        other => Err(unexpected("indexes", &other)),
    }
}
