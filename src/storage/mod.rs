pub mod collection_data;
pub mod memory;

pub use collection_data::CollectionData;
pub use memory::{MEMORY_SCHEME, MemoryStore, StoreStats};
