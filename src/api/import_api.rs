// ==========================================
// 客户关系管理工具 - 客户导入API
// ==========================================
// 职责: 封装客户导入/预览/模板/历史查询, 组装 SQLite 仓储与导入器
// 约束: 预览不落库; 导入部分成功仍返回 Ok, 行级错误在 result.errors
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{AppSettings, ImportConfigReader, ImportSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::customer::{Customer, Page};
use crate::domain::import::{ColumnMapping, ImportBatch, ImportTemplate, PreviewResult};
use crate::i18n::t_with_args;
use crate::importer::{resolver_for_settings, CustomerImporter, ImportOutcome, MappingResolver};
use crate::repository::{
    CustomerRepository, CustomerRepositoryImpl, ImportBatchRepository, ImportBatchRepositoryImpl,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 历史查询返回条数上限
pub const MAX_HISTORY_LIMIT: usize = 100;

/// 导入API
pub struct ImportApi {
    settings: AppSettings,
    importer: CustomerImporter<CustomerRepositoryImpl, ImportSettings>,
    customer_repo: CustomerRepositoryImpl,
    batch_repo: Arc<ImportBatchRepositoryImpl>,
}

impl ImportApi {
    /// 打开数据库并创建 ImportApi 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时创建）
    /// - settings: 应用设置（已应用环境变量覆写）
    pub fn new(db_path: &str, settings: AppSettings) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)), settings)
    }

    /// 从已有连接创建实例（初始化 schema）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, settings: AppSettings) -> ApiResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
            init_schema(&guard)?;
        }

        let batch_repo = Arc::new(ImportBatchRepositoryImpl::from_connection(conn.clone()));
        let resolver = resolver_for_settings(settings.import.mapping_strategy(), &settings.inference);
        let importer = CustomerImporter::with_defaults(
            CustomerRepositoryImpl::from_connection(conn.clone()),
            settings.import.clone(),
        )
        .with_resolver(resolver)
        .with_batch_log(batch_repo.clone());

        Ok(Self {
            settings,
            importer,
            customer_repo: CustomerRepositoryImpl::from_connection(conn),
            batch_repo,
        })
    }

    /// 替换列映射解析器（如注入自定义推理客户端）
    pub fn with_resolver(mut self, resolver: MappingResolver) -> Self {
        self.importer = self.importer.with_resolver(resolver);
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// 导入客户文件
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（决定解码格式）
    /// - mapping: 调用方指定的列映射（可选）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 导入汇总 + 实际使用的映射
    /// - Err(ApiError): 调用级失败（文件格式/大小、映射不可用等）
    pub async fn import_file(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        mapping: Option<ColumnMapping>,
    ) -> ApiResult<ImportOutcome> {
        let outcome = self
            .importer
            .import_from_file(bytes, file_name, mapping)
            .await?;
        Ok(outcome)
    }

    /// 从本地路径导入客户文件
    pub async fn import_path(
        &self,
        path: &Path,
        mapping: Option<ColumnMapping>,
    ) -> ApiResult<ImportOutcome> {
        let bytes = read_input_file(path).await?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        self.import_file(&bytes, file_name, mapping).await
    }

    /// 预览客户文件（不落库）
    ///
    /// # 返回
    /// - PreviewResult: 失败时 success=false 且 error 携带原因
    pub async fn preview_file(&self, bytes: &[u8], file_name: Option<&str>) -> PreviewResult {
        match self.importer.preview_file(bytes, file_name).await {
            Ok(preview) => preview,
            Err(e) => {
                let err = ApiError::from(e);
                warn!(file = file_name.unwrap_or("-"), error = %err, "预览失败");
                PreviewResult::failed(err.to_string())
            }
        }
    }

    /// 从本地路径预览客户文件
    pub async fn preview_path(&self, path: &Path) -> PreviewResult {
        match read_input_file(path).await {
            Ok(bytes) => {
                let file_name = path.file_name().and_then(|n| n.to_str());
                self.preview_file(&bytes, file_name).await
            }
            Err(e) => PreviewResult::failed(e.to_string()),
        }
    }

    /// 获取导入模板说明
    pub fn import_template(&self) -> ImportTemplate {
        let config = self.importer.config();
        ImportTemplate {
            required_columns: config.required_columns(),
            supported_formats: config.supported_extensions(),
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    /// 查询最近的导入批次
    ///
    /// # 参数
    /// - limit: 返回条数（限制在 1-100 之间）
    pub async fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.batch_repo.recent_batches(limit).await?)
    }

    /// 分页查询已导入客户
    pub async fn list_customers(&self, page: u32, page_size: u32) -> ApiResult<Page<Customer>> {
        if page == 0 || page_size == 0 {
            return Err(ApiError::InvalidInput(format!(
                "page/page_size 必须大于 0 (page={}, page_size={})",
                page, page_size
            )));
        }
        Ok(self.customer_repo.list(page, page_size).await?)
    }

    /// 统计客户总数
    pub async fn count_customers(&self) -> ApiResult<u64> {
        Ok(self.customer_repo.count().await?)
    }
}

async fn read_input_file(path: &Path) -> ApiResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            info!(path = %path.display(), size = bytes.len(), "读取导入文件");
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let display = path.display().to_string();
            Err(ApiError::NotFound(t_with_args(
                "import.file_not_found",
                &[("path", display.as_str())],
            )))
        }
        Err(e) => Err(ApiError::ImportError(format!("{}: {}", path.display(), e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> ImportApi {
        let conn = Connection::open_in_memory().unwrap();
        ImportApi::from_connection(Arc::new(Mutex::new(conn)), AppSettings::default()).unwrap()
    }

    #[test]
    fn test_import_template_defaults() {
        let template = api().import_template();
        assert_eq!(template.required_columns, vec!["name", "email", "phone"]);
        assert_eq!(template.supported_formats, vec![".csv", ".xlsx", ".xls"]);
        assert_eq!(template.max_file_size_mb, 10);
    }

    #[tokio::test]
    async fn test_import_then_history_and_list() {
        let api = api();
        let csv = "name,email,phone\n홍길동,hong@example.com,010-1234-5678\n";
        let outcome = api
            .import_file(csv.as_bytes(), Some("customers.csv"), None)
            .await
            .unwrap();
        assert_eq!(outcome.result.success, 1);

        let batches = api.recent_batches(0).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_id, outcome.batch_id);

        let page = api.list_customers(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].phone, "010-1234-5678");
    }

    #[tokio::test]
    async fn test_preview_failure_is_envelope() {
        let preview = api().preview_file(b"a,b", Some("notes.txt")).await;
        assert!(!preview.success);
        assert!(preview.error.is_some());
    }

    #[tokio::test]
    async fn test_list_customers_rejects_zero_page() {
        let err = api().list_customers(0, 10).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
