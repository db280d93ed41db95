// ==========================================
// 客户关系管理工具 - 导入批次仓储
// ==========================================
// 职责: 记录每次导入调用的结果摘要（历史）
// 红线: 只做数据 CRUD, 不回滚已导入的客户
// ==========================================

use crate::domain::import::ImportBatch;
use crate::domain::types::MappingSource;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportBatchRepository Trait
// ==========================================
#[async_trait]
pub trait ImportBatchRepository: Send + Sync {
    /// 插入导入批次记录
    async fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()>;

    /// 查询最近的导入批次（按导入时间倒序）
    ///
    /// # 参数
    /// - limit: 返回记录数限制
    async fn recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>>;
}

// ==========================================
// ImportBatchRepositoryImpl
// ==========================================
pub struct ImportBatchRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepositoryImpl {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<(ImportBatch, String)> {
        let batch = ImportBatch {
            batch_id: row.get(0)?,
            file_name: row.get(1)?,
            total_rows: row.get::<_, i64>(2)?.max(0) as usize,
            success_rows: row.get::<_, i64>(3)?.max(0) as usize,
            failed_rows: row.get::<_, i64>(4)?.max(0) as usize,
            mapping_source: MappingSource::Heuristic,
            imported_at: row.get(6)?,
            elapsed_ms: row.get::<_, i64>(7)?.max(0) as u64,
        };
        let source: String = row.get(5)?;
        Ok((batch, source))
    }
}

fn parse_mapping_source(raw: &str) -> RepositoryResult<MappingSource> {
    MappingSource::parse(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "mapping_source".to_string(),
        message: format!("unknown value `{}`", raw),
    })
}

#[async_trait]
impl ImportBatchRepository for ImportBatchRepositoryImpl {
    async fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, total_rows, success_rows, failed_rows,
                mapping_source, imported_at, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.total_rows as i64,
                batch.success_rows as i64,
                batch.failed_rows as i64,
                batch.mapping_source.as_str(),
                batch.imported_at,
                batch.elapsed_ms as i64,
            ],
        )?;
        Ok(())
    }

    async fn recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, file_name, total_rows, success_rows, failed_rows,
                   mapping_source, imported_at, elapsed_ms
            FROM import_batch
            ORDER BY imported_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(mut batch, source)| {
                batch.mapping_source = parse_mapping_source(&source)?;
                Ok(batch)
            })
            .collect()
    }
}
