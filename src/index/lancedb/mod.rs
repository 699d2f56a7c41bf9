
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{SearchHit, VectorIndex};
use crate::embeddings::{Chunk, Embedding, ensure_dimension};
use crate::{Result, SynapseError};

const TABLE_NAME: &str = "chunks";

/// Extra rows fetched per search so ties straddling the cut-off still resolve by
/// insertion order. The fetch widens further while the tie reaches its last row.
const TIE_MARGIN: usize = 8;

/// Vector index persisted with LanceDB under a directory on disk.
///
/// Writers are serialised through an internal lock; readers see the table version
/// committed before or after a concurrent write.
pub struct LanceIndex {
    table: Table,
    dimension: usize,
    /// Insertion sequence of the next row, guarded so writes never interleave.
    /// Seeded from the row count on open, so only one process may write to a
    /// given index directory at a time.
    next_seq: Mutex<u64>,
}

impl std::fmt::Debug for LanceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceIndex")
            .field("table", &TABLE_NAME)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl LanceIndex {
    /// Open the index stored at `path`, creating it for `dimension`-sized vectors
    /// when absent.
    ///
    /// An existing index built for a different dimension is rejected with
    /// [`SynapseError::DimensionMismatch`].
    #[inline]
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SynapseError::InvalidInput(
                "vector dimension must be greater than 0".to_string(),
            ));
        }

        let connection = connect(path).await?;
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == TABLE_NAME) {
            let table = open_table(&connection).await?;
            let existing = detect_dimension(&table).await?;
            if existing != dimension {
                return Err(SynapseError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                });
            }
            table
        } else {
            info!(
                "Creating vector index at {} with {} dimensions",
                path.display(),
                dimension
            );
            connection
                .create_empty_table(TABLE_NAME, create_schema(dimension))
                .execute()
                .await
                .map_err(|e| {
                    SynapseError::IndexWriteFailed(format!("Failed to create table: {}", e))
                })?
        };

        Self::from_table(table, dimension).await
    }

    /// Open an index that must already exist, taking its dimension from disk
    #[inline]
    pub async fn open_existing(path: &Path) -> Result<Self> {
        let connection = connect(path).await?;
        let table = open_table(&connection).await?;
        let dimension = detect_dimension(&table).await?;
        Self::from_table(table, dimension).await
    }

    async fn from_table(table: Table, dimension: usize) -> Result<Self> {
        // Rows are append-only, so the row count is the next free sequence number
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to count rows: {}", e)))?;

        debug!("Opened vector index with {} entries", rows);

        Ok(Self {
            table,
            dimension,
            next_seq: Mutex::new(rows as u64),
        })
    }

    /// The `limit` nearest rows, sorted by distance then insertion order
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredRow>> {
        debug!("Searching vector index with limit: {}", limit);

        let mut results = self
            .table
            .vector_search(query)
            .map_err(|e| {
                SynapseError::IndexReadFailed(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to execute search: {}", e)))?;

        let mut rows = Vec::new();
        while let Some(batch) = results.try_next().await.map_err(|e| {
            SynapseError::IndexReadFailed(format!("Failed to read result stream: {}", e))
        })? {
            rows.extend(parse_search_batch(&batch)?);
        }

        rows.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.seq.cmp(&b.seq)));
        Ok(rows)
    }

    fn create_record_batch(
        &self,
        entries: &[(Chunk, Embedding)],
        first_seq: u64,
    ) -> Result<RecordBatch> {
        let len = entries.len();
        let created_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut seqs = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);

        for (seq, (chunk, vector)) in (first_seq..).zip(entries) {
            ids.push(Uuid::new_v4().to_string());
            seqs.push(seq);
            flat_values.extend_from_slice(vector);
            sources.push(chunk.source.as_str());
            pages.push(to_u32(chunk.page, "page")?);
            chunk_indices.push(to_u32(chunk.chunk_index, "chunk_index")?);
            contents.push(chunk.content.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| SynapseError::IndexWriteFailed(format!("Failed to build vectors: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(UInt64Array::from(seqs)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(create_schema(self.dimension), arrays).map_err(|e| {
            SynapseError::IndexWriteFailed(format!("Failed to create record batch: {}", e))
        })
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn insert_many(&self, entries: &[(Chunk, Embedding)]) -> Result<()> {
        if entries.is_empty() {
            debug!("No entries to insert");
            return Ok(());
        }

        let vectors: Vec<Embedding> = entries.iter().map(|(_, v)| v.clone()).collect();
        ensure_dimension(&vectors, self.dimension)?;

        let mut next_seq = self.next_seq.lock().await;
        let batch = self.create_record_batch(entries, *next_seq)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        self.table.add(reader).execute().await.map_err(|e| {
            SynapseError::IndexWriteFailed(format!("Failed to insert {} entries: {}", entries.len(), e))
        })?;

        *next_seq += entries.len() as u64;
        info!("Stored {} entries in vector index", entries.len());
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(SynapseError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let total = self.count().await?;
        if k == 0 || total == 0 {
            return Ok(Vec::new());
        }

        let mut limit = k.saturating_add(TIE_MARGIN).min(total);
        let mut rows = self.nearest(query, limit).await?;

        // Rows tied with the k-th best may have been cut off by the fetch limit
        while limit < total && ties_reach_last_row(&rows, k) {
            limit = limit.saturating_mul(2).min(total);
            debug!("Widening search to {} rows to resolve ties", limit);
            rows = self.nearest(query, limit).await?;
        }

        rows.truncate(k);

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                chunk: row.chunk,
                score: 1.0 - row.distance,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to count rows: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

struct ScoredRow {
    chunk: Chunk,
    seq: u64,
    distance: f32,
}

fn ties_reach_last_row(rows: &[ScoredRow], k: usize) -> bool {
    match (k.checked_sub(1).and_then(|i| rows.get(i)), rows.last()) {
        (Some(kth), Some(last)) => kth.distance.total_cmp(&last.distance).is_eq(),
        _ => false,
    }
}

async fn connect(path: &Path) -> Result<lancedb::Connection> {
    std::fs::create_dir_all(path).map_err(|e| {
        SynapseError::IndexWriteFailed(format!(
            "Failed to create vector database directory {}: {}",
            path.display(),
            e
        ))
    })?;

    let uri = format!("file://{}", path.display());
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to connect to LanceDB: {}", e)))
}

async fn open_table(connection: &lancedb::Connection) -> Result<Table> {
    connection
        .open_table(TABLE_NAME)
        .execute()
        .await
        .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to open table: {}", e)))
}

async fn detect_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| SynapseError::IndexReadFailed(format!("Failed to get table schema: {}", e)))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            SynapseError::IndexReadFailed(
                "Could not find vector column or determine dimension".to_string(),
            )
        })
}

fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("seq", DataType::UInt64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn to_u32(value: usize, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        SynapseError::IndexWriteFailed(format!("{} value {} does not fit the index", column, value))
    })
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SynapseError::IndexReadFailed(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SynapseError::IndexReadFailed(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredRow>> {
    let seqs = column::<UInt64Array>(batch, "seq")?;
    let sources = column::<StringArray>(batch, "source")?;
    let pages = column::<UInt32Array>(batch, "page")?;
    let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;
    let contents = column::<StringArray>(batch, "content")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    Ok((0..batch.num_rows())
        .map(|row| ScoredRow {
            chunk: Chunk {
                content: contents.value(row).to_string(),
                source: sources.value(row).to_string(),
                page: pages.value(row) as usize,
                chunk_index: chunk_indices.value(row) as usize,
            },
            seq: seqs.value(row),
            distance: if distances.is_null(row) {
                f32::MAX
            } else {
                distances.value(row)
            },
        })
        .collect())
}
