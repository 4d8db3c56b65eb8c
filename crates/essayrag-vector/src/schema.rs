//! Arrow schema of the persisted chunk-vector table.
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ROW_COLUMN: &str = "row";
pub const ID_COLUMN: &str = "id";
pub const VECTOR_COLUMN: &str = "vector";

/// `row` is the insertion position, `id` the chunk key, `vector` the embedding.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ROW_COLUMN, DataType::Int32, false),
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
