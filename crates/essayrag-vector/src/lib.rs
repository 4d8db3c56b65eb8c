//! essayrag-vector
//!
//! Nearest-neighbor indices behind `essayrag_core::traits::VectorIndex`: an
//! exact in-memory flat L2 index rebuilt per query, and a Lance-backed flat
//! index persisted together with its chunk mapping.

pub mod flat;
pub mod lance_index;
pub mod mapping;
pub mod schema;
pub mod store;
pub mod table;

pub use flat::{l2_distance, FlatL2Index};
pub use lance_index::LanceIndex;
pub use mapping::{ChunkMapping, MappingEntry};
pub use store::{FlatHit, PersistedIndex, StagedIndex, MAPPINGS_FILE, VECTORS_DIR};
