pub mod cache;
pub mod repository;
pub mod serialization;

pub use repository::{Repository, MemoryRepository, RecordKind, load, save};
pub use serialization::StoreError;
