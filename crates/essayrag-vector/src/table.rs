//! LanceDB connection helpers.
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> lancedb::Result<Connection> {
    connect(uri).execute().await
}

pub async fn table_exists(conn: &Connection, name: &str) -> lancedb::Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Creates `name` as an empty table with `schema` unless it already exists.
pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> lancedb::Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}
