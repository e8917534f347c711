pub mod aggregate;
pub mod client;
pub mod collection;
pub mod computed;
pub mod config;
pub mod cursor;
pub mod error;
pub mod index;
pub mod network;
pub mod query;
pub mod results;
pub mod storage;
pub mod types;
pub mod update;

pub use aggregate::{Accumulator, GroupSpec, Pipeline, ProjectSpec, Stage};
pub use client::{Client, Database};
pub use collection::{Collection, InsertManyOptions};
pub use computed::Expression;
pub use config::{ClientConfig, ConnectionUri};
pub use cursor::Cursor;
pub use error::{ErrorKind, Result, TomeError};
pub use index::{IndexDefinition, IndexOptions, IndexSpec};
pub use query::{
    Filter, FilterMatcher, FindOptions, Projection, QueryBuilder, SortOrder, SortSpec,
};
pub use results::{DeleteResult, ExecutionStats, InsertOneResult, InsertResult, UpdateResult};
pub use storage::MemoryStore;
pub use types::{Document, Value};
pub use update::UpdateSpec;
