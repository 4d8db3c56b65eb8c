//! Lance-backed flat index behind the synchronous `VectorIndex` contract.
//!
//! No ANN index is ever built on the table, so `vector_search` is an exact
//! scan and results are reproducible. Lance reports squared L2 in
//! `_distance`; it is converted back to Euclidean distance here.
//!
//! Lance does not order equal distances by insertion, so `search` scores
//! every row and applies the `(distance, row)` order and the `k` cut itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use tokio::runtime::Runtime;
use tracing::debug;

use essayrag_core::error::{Error, Result};
use essayrag_core::traits::VectorIndex;
use essayrag_core::types::Neighbor;

use crate::flat::{check_dim, sort_neighbors};
use crate::schema::{build_arrow_schema, ID_COLUMN, ROW_COLUMN};
use crate::table::{ensure_table, open_db, table_exists};

pub const TABLE_NAME: &str = "chunks";

pub struct LanceIndex {
    rt: Runtime,
    db: Connection,
    path: PathBuf,
    dim: usize,
    len: usize,
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
}

fn uri(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl LanceIndex {
    /// Creates a fresh, empty table at `path`, replacing whatever was there.
    pub fn create(path: &Path, dim: usize) -> Result<Self> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        let rt = runtime()?;
        let db = rt.block_on(open_db(&uri(path))).map_err(Error::store)?;
        rt.block_on(ensure_table(&db, TABLE_NAME, build_arrow_schema(dim as i32))).map_err(Error::store)?;
        debug!(path = %path.display(), dim, "created lance index");
        Ok(Self { rt, db, path: path.to_path_buf(), dim, len: 0 })
    }

    /// Opens an existing table; `dim` must match the stored vectors.
    pub fn open(path: &Path, dim: usize) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::Store(format!("vector store {} is missing", path.display())));
        }
        let rt = runtime()?;
        let db = rt.block_on(open_db(&uri(path))).map_err(Error::store)?;
        if !rt.block_on(table_exists(&db, TABLE_NAME)).map_err(Error::store)? {
            return Err(Error::Store(format!("vector store {} has no `{TABLE_NAME}` table", path.display())));
        }
        let mut index = Self { rt, db, path: path.to_path_buf(), dim, len: 0 };
        index.len = index.read_ids()?.len();
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends vectors tagged with `ids`; rows continue from the current length.
    pub fn add_with_ids(&mut self, ids: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if ids.len() != vectors.len() {
            return Err(Error::Store(format!("{} ids for {} vectors", ids.len(), vectors.len())));
        }
        if vectors.is_empty() {
            return Ok(());
        }
        for v in vectors {
            check_dim(self.dim, v)?;
        }
        let schema = build_arrow_schema(self.dim as i32);
        let rows: Vec<i32> = (self.len..self.len + vectors.len()).map(|r| r as i32).collect();
        let values: Vec<Option<Vec<Option<f32>>>> =
            vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect())).collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(rows)),
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(values, self.dim as i32)),
            ],
        )
        .map_err(Error::store)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.rt
            .block_on(async {
                let table = self.db.open_table(TABLE_NAME).execute().await?;
                table.add(reader).execute().await
            })
            .map_err(Error::store)?;
        self.len += vectors.len();
        Ok(())
    }

    /// Stored ids in row order.
    pub fn read_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<(i32, String)> = self
            .rt
            .block_on(async {
                let table = self.db.open_table(TABLE_NAME).execute().await?;
                let mut stream = table.query().select(Select::columns(&[ROW_COLUMN, ID_COLUMN])).execute().await?;
                let mut out = Vec::new();
                while let Some(batch) = stream.try_next().await? {
                    let (Some(row), Some(id)) = (int_column(&batch, ROW_COLUMN), string_column(&batch, ID_COLUMN)) else {
                        return Err(lancedb::Error::Runtime { message: "chunks table lacks row/id columns".into() });
                    };
                    for i in 0..batch.num_rows() {
                        out.push((row.value(i), id.value(i).to_string()));
                    }
                }
                Ok(out)
            })
            .map_err(Error::store)?;
        let mut rows = rows;
        rows.sort_by_key(|(row, _)| *row);
        if rows.iter().enumerate().any(|(i, (row, _))| *row as usize != i) {
            return Err(Error::Store("row numbers in the vector store are not contiguous".into()));
        }
        Ok(rows.into_iter().map(|(_, id)| id).collect())
    }
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Int32Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int32Array>())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Float32Array> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Float32Array>())
}

impl VectorIndex for LanceIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.len
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let ids: Vec<String> = (self.len..self.len + vectors.len()).map(|r| r.to_string()).collect();
        self.add_with_ids(&ids, vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.len == 0 {
            return Err(Error::IndexNotBuilt(format!("lance index at {} holds no vectors", self.path.display())));
        }
        check_dim(self.dim, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut neighbors = self
            .rt
            .block_on(async {
                let table = self.db.open_table(TABLE_NAME).execute().await?;
                let mut stream = table
                    .vector_search(query.to_vec())?
                    .distance_type(DistanceType::L2)
                    .limit(self.len)
                    .execute()
                    .await?;
                let mut out = Vec::new();
                while let Some(batch) = stream.try_next().await? {
                    let (Some(row), Some(dist)) = (int_column(&batch, ROW_COLUMN), float_column(&batch, "_distance")) else {
                        return Err(lancedb::Error::Runtime { message: "search results lack row/_distance columns".into() });
                    };
                    for i in 0..batch.num_rows() {
                        if row.is_null(i) {
                            continue;
                        }
                        let squared = dist.value(i).max(0.0);
                        out.push(Neighbor { position: row.value(i) as usize, distance: squared.sqrt() });
                    }
                }
                Ok(out)
            })
            .map_err(Error::store)?;
        sort_neighbors(&mut neighbors);
        neighbors.truncate(k);
        Ok(neighbors)
    }
}
