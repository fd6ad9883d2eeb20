use crate::error::{Result, VectorStoreError};
use arrow_array::{
    cast::AsArray, types::Float32Type, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex as AsyncMutex;

/// A threshold below which a `.lock` artifact is never considered stale,
/// regardless of whether its owning process still looks alive. Long
/// indexing runs legitimately hold a lock for minutes at a time.
const STALE_LOCK_MIN_AGE: Duration = Duration::from_secs(600);

const PAGINATION_PAGE_SIZE: usize = 1000;

/// A chunk ready for insertion: text plus its embedding and source span.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub path: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub start_line: i64,
    pub end_line: i64,
    pub content_hash: String,
}

/// A scored search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub text: String,
    pub score: f32,
    pub start_line: i64,
    pub end_line: i64,
}

/// One independent LanceDB-backed table (either the code table or the docs
/// table for a project). All writes go through `write_lock` so concurrent
/// callers never interleave table creation with inserts.
pub struct VectorTable {
    dir: PathBuf,
    table_name: String,
    connection: Connection,
    table: AsyncMutex<Option<Table>>,
    write_lock: AsyncMutex<()>,
}

impl VectorTable {
    /// Open (idempotently) the table rooted at `dir`. `dir` itself is the
    /// `.lancedb` directory (e.g. `index.lancedb`); `table_name` is the
    /// single table living inside it.
    pub async fn open(dir: &Path, table_name: &str) -> Result<Self> {
        clean_stale_locks(dir).await;
        tokio::fs::create_dir_all(dir).await?;
        let connection = connect(&dir.to_string_lossy()).execute().await?;
        let table = match connection.open_table(table_name).execute().await {
            Ok(t) => Some(t),
            Err(_) => None,
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            table_name: table_name.to_string(),
            connection,
            table: AsyncMutex::new(table),
            write_lock: AsyncMutex::new(()),
        })
    }

    /// Idempotent: drops the in-memory handle only. The on-disk table is
    /// untouched; a subsequent `open` reattaches to it.
    pub async fn close(&self) {
        *self.table.lock().await = None;
    }

    /// Dimension of the vectors stored in this table, if it has been
    /// created yet.
    pub async fn dimension(&self) -> Option<usize> {
        let guard = self.table.lock().await;
        let table = guard.as_ref()?;
        let schema = table.schema().await.ok()?;
        vector_field_dimension(&schema)
    }

    /// Insert chunks, creating the table from the first batch's vector
    /// width if it doesn't exist yet. No-op for empty input.
    pub async fn insert_chunks(&self, chunks: &[StoredChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;

        let dim = chunks[0].vector.len();
        for chunk in chunks {
            if chunk.vector.len() != dim {
                return Err(VectorStoreError::DimensionMismatch {
                    query: chunk.vector.len(),
                    table: dim,
                });
            }
        }

        let batch = chunks_to_batch(chunks, dim)?;
        let mut table_guard = self.table.lock().await;

        match table_guard.as_ref() {
            Some(table) => {
                if let Some(existing_dim) = table.schema().await.ok().and_then(|s| vector_field_dimension(&s)) {
                    if existing_dim != dim {
                        return Err(VectorStoreError::DimensionMismatch {
                            query: dim,
                            table: existing_dim,
                        });
                    }
                }
                let schema = batch.schema();
                let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
                table.add(Box::new(reader)).execute().await?;
            }
            None => {
                let schema = batch.schema();
                let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
                let table = self
                    .connection
                    .create_table(&self.table_name, Box::new(reader))
                    .execute()
                    .await?;
                *table_guard = Some(table);
            }
        }
        Ok(())
    }

    /// Delete every chunk with `relative_path`. Returns the number of rows
    /// removed.
    pub async fn delete_by_path(&self, relative_path: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let table_guard = self.table.lock().await;
        let Some(table) = table_guard.as_ref() else {
            return Ok(0);
        };
        let predicate = format!("path = '{}'", escape_sql_literal(relative_path));
        let before = table.count_rows(Some(predicate.clone())).await?;
        table.delete(&predicate).await?;
        Ok(before)
    }

    pub async fn count_chunks(&self) -> Result<usize> {
        let table_guard = self.table.lock().await;
        match table_guard.as_ref() {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    pub async fn count_files(&self) -> Result<usize> {
        Ok(self.get_indexed_files(usize::MAX).await?.len())
    }

    /// All distinct paths currently indexed, sorted. Pages through the
    /// table rather than issuing one unbounded scan.
    pub async fn get_indexed_files(&self, limit: usize) -> Result<Vec<String>> {
        let table_guard = self.table.lock().await;
        let Some(table) = table_guard.as_ref() else {
            return Ok(Vec::new());
        };

        let mut seen = std::collections::BTreeSet::new();
        let mut offset = 0usize;
        loop {
            let mut stream = table
                .query()
                .select(lancedb::query::Select::Columns(vec!["path".to_string()]))
                .offset(offset)
                .limit(PAGINATION_PAGE_SIZE)
                .execute()
                .await?;

            let mut rows_in_page = 0usize;
            while let Some(batch) = stream.try_next().await? {
                rows_in_page += batch.num_rows();
                let paths = batch
                    .column_by_name("path")
                    .ok_or(VectorStoreError::NotOpen)?
                    .as_string::<i32>();
                for path in paths.iter().flatten() {
                    seen.insert(path.to_string());
                    if seen.len() >= limit {
                        return Ok(seen.into_iter().collect());
                    }
                }
            }
            if rows_in_page < PAGINATION_PAGE_SIZE {
                break;
            }
            offset += PAGINATION_PAGE_SIZE;
        }
        Ok(seen.into_iter().collect())
    }

    /// K-nearest search. Empty if the table hasn't been created yet.
    pub async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let table_guard = self.table.lock().await;
        let Some(table) = table_guard.as_ref() else {
            return Ok(Vec::new());
        };

        if let Some(dim) = table.schema().await.ok().and_then(|s| vector_field_dimension(&s)) {
            if dim != query_vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    query: query_vector.len(),
                    table: dim,
                });
            }
        }

        let mut stream = table
            .query()
            .nearest_to(query_vector.to_vec())?
            .limit(top_k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_hits(&batch)?);
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Paths matching `glob_pattern`, sorted and deduplicated. The glob is
    /// converted to a LIKE expression with every character other than `**`,
    /// `*`, and `?` escaped before interpolation.
    pub async fn search_by_path(&self, glob_pattern: &str, limit: usize) -> Result<Vec<String>> {
        let like = glob_to_like(glob_pattern);
        let table_guard = self.table.lock().await;
        let Some(table) = table_guard.as_ref() else {
            return Ok(Vec::new());
        };

        let predicate = format!("path LIKE '{like}' ESCAPE '\\'");
        let mut stream = table
            .query()
            .only_if(predicate)
            .select(lancedb::query::Select::Columns(vec!["path".to_string()]))
            .limit(limit.max(1))
            .execute()
            .await?;

        let mut paths = std::collections::BTreeSet::new();
        while let Some(batch) = stream.try_next().await? {
            let col = batch
                .column_by_name("path")
                .ok_or(VectorStoreError::NotOpen)?
                .as_string::<i32>();
            for p in col.iter().flatten() {
                paths.insert(p.to_string());
                if paths.len() >= limit {
                    return Ok(paths.into_iter().collect());
                }
            }
        }
        Ok(paths.into_iter().collect())
    }

    pub async fn get_storage_size(&self) -> Result<u64> {
        Ok(dir_size(&self.dir).await)
    }

    pub async fn has_data(&self) -> Result<bool> {
        Ok(self.count_chunks().await? > 0)
    }

    /// Remove the table's directory from disk entirely.
    pub async fn delete(&self) -> Result<()> {
        *self.table.lock().await = None;
        if tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.dir).await?;
        }
        Ok(())
    }
}

fn vector_field_dimension(schema: &Schema) -> Option<usize> {
    let field = schema.field_with_name("vector").ok()?;
    match field.data_type() {
        DataType::FixedSizeList(_, len) => Some(*len as usize),
        _ => None,
    }
}

fn chunks_to_batch(chunks: &[StoredChunk], dim: usize) -> Result<RecordBatch> {
    let schema = chunk_schema(dim);

    let paths = StringArray::from_iter_values(chunks.iter().map(|c| c.path.as_str()));
    let texts = StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()));
    let starts = Int64Array::from_iter_values(chunks.iter().map(|c| c.start_line));
    let ends = Int64Array::from_iter_values(chunks.iter().map(|c| c.end_line));
    let hashes = StringArray::from_iter_values(chunks.iter().map(|c| c.content_hash.as_str()));

    let flat: Vec<f32> = chunks.iter().flat_map(|c| c.vector.iter().copied()).collect();
    let values = Float32Array::from(flat);
    let vector_field = Arc::new(Field::new("item", DataType::Float32, true));
    let vectors = arrow_array::FixedSizeListArray::new(vector_field, dim as i32, Arc::new(values), None);

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(paths),
            Arc::new(texts),
            Arc::new(vectors),
            Arc::new(starts),
            Arc::new(ends),
            Arc::new(hashes),
        ],
    )
    .map_err(VectorStoreError::Arrow)?;
    Ok(batch)
}

fn chunk_schema(dim: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("path", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            false,
        ),
        Field::new("start_line", DataType::Int64, false),
        Field::new("end_line", DataType::Int64, false),
        Field::new("content_hash", DataType::Utf8, false),
    ]))
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let paths = batch
        .column_by_name("path")
        .ok_or(VectorStoreError::NotOpen)?
        .as_string::<i32>();
    let texts = batch
        .column_by_name("text")
        .ok_or(VectorStoreError::NotOpen)?
        .as_string::<i32>();
    let starts = batch
        .column_by_name("start_line")
        .ok_or(VectorStoreError::NotOpen)?
        .as_primitive::<arrow_array::types::Int64Type>();
    let ends = batch
        .column_by_name("end_line")
        .ok_or(VectorStoreError::NotOpen)?
        .as_primitive::<arrow_array::types::Int64Type>();
    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_primitive::<Float32Type>().clone());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let distance = distances.as_ref().map_or(0.0, |d| d.value(i));
        let score = 1.0 / (1.0 + distance);
        hits.push(SearchHit {
            path: paths.value(i).to_string(),
            text: texts.value(i).to_string(),
            score,
            start_line: starts.value(i),
            end_line: ends.value(i),
        });
    }
    Ok(hits)
}

/// Convert a safe-search glob into an escaped SQL `LIKE` pattern. `**` and
/// `*` both become `%`, `?` becomes `_`; every other character is escaped
/// with a backslash before interpolation, so the caller's raw glob can never
/// inject SQL beyond the pattern language itself.
fn glob_to_like(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len());
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if matches!(chars.peek(), Some('*')) {
                    chars.next();
                }
                out.push('%');
            }
            '?' => out.push('_'),
            '%' | '_' | '\\' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

fn escape_sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

async fn dir_size(dir: &Path) -> u64 {
    let mut total = 0u64;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&current).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
    }
    total
}

/// Remove `.lock` artifacts under `dir` that are both older than
/// [`STALE_LOCK_MIN_AGE`] and whose owning process (its PID read from the
/// file's contents, if present) is no longer alive. Age alone is never
/// sufficient: a long-running index build legitimately holds a lock for
/// many minutes.
async fn clean_stale_locks(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("lock") {
            candidates.push(path);
        }
    }

    for lock_path in candidates {
        let Ok(meta) = tokio::fs::metadata(&lock_path).await else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age < STALE_LOCK_MIN_AGE {
            continue;
        }
        let owner_alive = tokio::fs::read_to_string(&lock_path)
            .await
            .ok()
            .and_then(|contents| contents.trim().parse::<u32>().ok())
            .is_some_and(process_is_alive);
        if !owner_alive {
            let _ = tokio::fs::remove_file(&lock_path).await;
        }
    }
}

#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    // Conservative: without a reliable liveness probe, assume alive so we
    // never delete a lock a live process still owns.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_to_like_converts_wildcards_and_escapes_rest() {
        assert_eq!(glob_to_like("src/**/*.rs"), "src/%/%.rs");
        assert_eq!(glob_to_like("a?b"), "a_b");
        assert_eq!(glob_to_like("100%_done"), "100\\%\\_done");
    }

    #[test]
    fn escape_sql_literal_doubles_quotes() {
        assert_eq!(escape_sql_literal("o'brien"), "o''brien");
    }

    #[tokio::test]
    async fn open_on_empty_dir_has_no_table_yet() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = VectorTable::open(&dir.path().join("index.lancedb"), "chunks")
            .await
            .unwrap();
        assert_eq!(table.count_chunks().await.unwrap(), 0);
        assert!(!table.has_data().await.unwrap());
    }

    #[tokio::test]
    async fn insert_chunks_is_noop_for_empty_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = VectorTable::open(&dir.path().join("index.lancedb"), "chunks")
            .await
            .unwrap();
        table.insert_chunks(&[]).await.unwrap();
        assert_eq!(table.count_chunks().await.unwrap(), 0);
    }
}
