use crate::error::{Result, TomeError};
use crate::network::protocol::Response;
use crate::types::Document;
use std::collections::VecDeque;

/// A single-pass sequence over a result set that was fully materialized when the
/// query ran. To see fresh data, run the query again.
#[derive(Debug, Default)]
pub struct Cursor {
    buffer: VecDeque<Document>,
    returned: usize,
}

impl Cursor {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            buffer: documents.into(),
            returned: 0,
        }
    }

    /// Documents not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// Documents already handed out.
    pub fn returned(&self) -> usize {
        self.returned
    }

    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drains the rest of the cursor into a vector.
    pub fn into_vec(self) -> Vec<Document> {
        self.buffer.into()
    }
}

impl Iterator for Cursor {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        let doc = self.buffer.pop_front()?;
        self.returned += 1;
        Some(doc)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), Some(self.buffer.len()))
    }
}

impl ExactSizeIterator for Cursor {}

impl TryFrom<Response> for Cursor {
    type Error = TomeError;

    fn try_from(response: Response) -> Result<Self> {
        match response {
            Response::Documents(docs) => Ok(Cursor::new(docs)),
            other => Err(TomeError::Protocol(format!(
                "unexpected response: expected documents, got {}",
                other.kind()
            ))),
        }
    }
}
