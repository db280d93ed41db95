// ==========================================
// 客户关系管理工具 - 客户导入器
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解码 → 列映射 → 投影 → 校验 → 去重/写入 → 汇总
// 顺序: 逐行严格串行, 去重检查必须看到本次调用中先前行的写入
// 不变式: total == success + failed; failed == errors.len()
// ==========================================

use crate::config::settings::InferenceSettings;
use crate::config::ImportConfigReader;
use crate::domain::import::{
    row_number_for_index, ColumnMapping, DecodedTable, ImportBatch, ImportError, ImportResult,
    ImportResultBuilder, MappingGuess, PreviewResult, RawRow, ValidatedRecord,
};
use crate::domain::types::MappingSource;
use crate::importer::column_mapper::{
    confidence_for, HeuristicColumnMapper, MappingResolver, MappingStrategy,
};
use crate::importer::error::{ImporterError, ImporterResult, MappingError};
use crate::importer::gemini_client::GeminiClient;
use crate::importer::importer_trait::TabularDecoder;
use crate::importer::inference::InferenceColumnMapper;
use crate::importer::row_projector::{project_row, project_rows, BoundMapping};
use crate::importer::tabular_decoder::UniversalDecoder;
use crate::importer::validator::validate_record;
use crate::repository::{CustomerRepository, ImportBatchRepository};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 预览返回的样本行/投影记录上限
pub const PREVIEW_ROWS: usize = 5;

// ==========================================
// ImportOutcome - 导入调用的完整产出
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub batch_id: String,
    pub mapping: MappingGuess,
    pub result: ImportResult,
    pub elapsed_ms: u64,
}

/// 按配置构造列映射解析器
///
/// 推理策略缺少凭据时退回启发式
pub fn resolver_for_settings(
    strategy: MappingStrategy,
    inference: &InferenceSettings,
) -> MappingResolver {
    match strategy {
        MappingStrategy::Heuristic => MappingResolver::heuristic(),
        MappingStrategy::Inference => match GeminiClient::from_settings(inference) {
            Some(client) => MappingResolver::new(Box::new(InferenceColumnMapper::new(
                Arc::new(client),
                Duration::from_millis(inference.timeout_ms),
            ))),
            None => {
                warn!("推理策略缺少 GEMINI_API_KEY 或 GCP_PROJECT_ID/GCP_ACCESS_TOKEN, 使用启发式映射");
                MappingResolver::heuristic()
            }
        },
    }
}

// ==========================================
// CustomerImporter - 客户导入器
// ==========================================
pub struct CustomerImporter<R, C>
where
    R: CustomerRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    customer_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    decoder: Box<dyn TabularDecoder>,
    resolver: MappingResolver,

    // 批次历史（可选）
    batch_log: Option<Arc<dyn ImportBatchRepository>>,
}

impl<R, C> CustomerImporter<R, C>
where
    R: CustomerRepository,
    C: ImportConfigReader,
{
    /// 创建新的 CustomerImporter 实例
    ///
    /// # 参数
    /// - customer_repo: 客户仓储（去重与写入协作者）
    /// - config: 导入配置读取器
    /// - decoder: 表格解码器
    /// - resolver: 列映射解析器
    pub fn new(
        customer_repo: R,
        config: C,
        decoder: Box<dyn TabularDecoder>,
        resolver: MappingResolver,
    ) -> Self {
        Self {
            customer_repo,
            config,
            decoder,
            resolver,
            batch_log: None,
        }
    }

    /// 使用配置中的大小上限与扩展名构造解码器, 启发式映射
    pub fn with_defaults(customer_repo: R, config: C) -> Self {
        let decoder = UniversalDecoder::new(
            config.max_file_size_bytes(),
            config.supported_extensions(),
        );
        Self::new(
            customer_repo,
            config,
            Box::new(decoder),
            MappingResolver::heuristic(),
        )
    }

    /// 替换列映射解析器
    pub fn with_resolver(mut self, resolver: MappingResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// 启用批次历史记录
    pub fn with_batch_log(mut self, batch_log: Arc<dyn ImportBatchRepository>) -> Self {
        self.batch_log = Some(batch_log);
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// 从文件内容导入客户
    ///
    /// # 参数
    /// - bytes: 上传文件内容
    /// - file_name: 原始文件名（用于格式判断与批次记录）
    /// - explicit_mapping: 调用方指定的列映射（跳过推断）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 部分成功也返回 Ok, 行级错误在 result.errors
    /// - Err(ImporterError): 解码失败 / 显式映射引用不存在的列 / 要求映射但无可用映射
    #[instrument(skip(self, bytes, explicit_mapping), fields(size = bytes.len(), batch_id = tracing::field::Empty))]
    pub async fn import_from_file(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        explicit_mapping: Option<ColumnMapping>,
    ) -> ImporterResult<ImportOutcome> {
        let table = self.decoder.decode(bytes, file_name)?;
        info!(
            file = file_name.unwrap_or("-"),
            columns = table.headers.len(),
            total_rows = table.total_rows(),
            "文件解码完成"
        );
        self.import_table(&table, file_name, explicit_mapping).await
    }

    /// 导入已解码的表格
    pub async fn import_table(
        &self,
        table: &DecodedTable,
        file_name: Option<&str>,
        explicit_mapping: Option<ColumnMapping>,
    ) -> ImporterResult<ImportOutcome> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        // === 阶段 1: 列映射 ===
        let guess = self.select_mapping(table, explicit_mapping).await?;
        let bound = BoundMapping::bind(guess.mapping.clone(), &table.headers)?;
        if bound.mapping().is_empty() && self.config.require_mapping() {
            warn!(batch_id = %batch_id, "无可用列映射, 中止导入");
            return Err(MappingError::NoUsableMapping.into());
        }

        // === 阶段 2-4: 逐行 投影 → 校验 → 去重/写入 ===
        let mut builder = ImportResultBuilder::new(table.total_rows());
        for (index, row) in table.rows.iter().enumerate() {
            let row_no = row_number_for_index(index);
            match self.process_row(row, &bound, row_no).await {
                Ok(()) => builder.record_success(),
                Err(err) => {
                    debug!(row = err.row, field = %err.field, message = %err.message, "行导入失败");
                    builder.record_error(err);
                }
            }
        }
        let result = builder.finish();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            batch_id = %batch_id,
            total = result.total,
            success = result.success,
            failed = result.failed,
            source = ?guess.source,
            elapsed_ms,
            "客户导入完成"
        );

        self.record_batch(&batch_id, file_name, &result, guess.source, elapsed_ms)
            .await;

        Ok(ImportOutcome {
            batch_id,
            mapping: guess,
            result,
            elapsed_ms,
        })
    }

    /// 预览文件（不落库）
    ///
    /// # 返回
    /// - Ok(PreviewResult): 表头 + 至多 5 行样本 + 映射 + 投影预览
    /// - Err(ImporterError::EmptyFile): 没有数据行
    /// - Err(ImporterError::Mapping): 严格模式下映射失败
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn preview_file(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImporterResult<PreviewResult> {
        let table = self.decoder.decode(bytes, file_name)?;
        if table.rows.is_empty() {
            return Err(ImporterError::EmptyFile);
        }

        let samples = self.mapping_samples(&table);
        let guess = self
            .resolver
            .resolve(&table.headers, samples, self.config.strict_mapping())
            .await
            .into_result()?;
        let bound = BoundMapping::bind(guess.mapping.clone(), &table.headers)?;

        let preview_rows: Vec<RawRow> = table.rows.iter().take(PREVIEW_ROWS).cloned().collect();
        let preview = project_rows(&preview_rows, &bound);

        debug!(
            total_rows = table.total_rows(),
            confidence = guess.confidence.as_str(),
            "预览生成完成"
        );

        Ok(PreviewResult {
            success: true,
            columns: table.headers.clone(),
            sample_rows: preview_rows,
            total_rows: table.total_rows(),
            mapping: Some(bound.into_inner()),
            preview: Some(preview),
            confidence: Some(guess.confidence),
            notes: Some(guess.notes),
            error: None,
        })
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    fn mapping_samples<'a>(&self, table: &'a DecodedTable) -> &'a [RawRow] {
        let n = self.config.sample_size().min(table.rows.len());
        &table.rows[..n]
    }

    /// 显式映射优先; 否则运行解析器（导入路径总是允许回退）
    async fn select_mapping(
        &self,
        table: &DecodedTable,
        explicit_mapping: Option<ColumnMapping>,
    ) -> ImporterResult<MappingGuess> {
        if let Some(mapping) = explicit_mapping {
            BoundMapping::bind(mapping.clone(), &table.headers)?;
            info!(
                name = ?mapping.name,
                email = ?mapping.email,
                phone = ?mapping.phone,
                "使用调用方指定的列映射"
            );
            return Ok(MappingGuess {
                confidence: confidence_for(&mapping),
                mapping,
                notes: "mapping provided by caller".to_string(),
                source: MappingSource::Explicit,
            });
        }

        if table.rows.is_empty() {
            // 无数据行时不调用外部服务
            return Ok(HeuristicColumnMapper.guess(&table.headers));
        }

        let samples = self.mapping_samples(table);
        let guess = self
            .resolver
            .resolve(&table.headers, samples, false)
            .await
            .into_result()?;
        Ok(guess)
    }

    /// 单行处理; 返回该行的首个错误
    async fn process_row(
        &self,
        row: &RawRow,
        mapping: &BoundMapping,
        row_no: usize,
    ) -> Result<(), ImportError> {
        let candidate = project_row(row, mapping);
        let record = validate_record(&candidate, row_no)?;
        self.insert_if_absent(record, row_no).await
    }

    async fn insert_if_absent(&self, record: ValidatedRecord, row_no: usize) -> Result<(), ImportError> {
        match self.customer_repo.exists_by_email(&record.email).await {
            Ok(true) => return Err(ImportError::duplicate_email(row_no)),
            Ok(false) => {}
            Err(e) => return Err(ImportError::persistence(row_no, e.to_string())),
        }

        match self.customer_repo.insert(record.into()).await {
            Ok(_) => Ok(()),
            // 存储层 UNIQUE 约束兜底（并发导入竞争）
            Err(e) if e.is_unique_violation() => Err(ImportError::duplicate_email(row_no)),
            Err(e) => Err(ImportError::persistence(row_no, e.to_string())),
        }
    }

    async fn record_batch(
        &self,
        batch_id: &str,
        file_name: Option<&str>,
        result: &ImportResult,
        source: MappingSource,
        elapsed_ms: u64,
    ) {
        let Some(batch_log) = self.batch_log.as_ref() else {
            return;
        };
        let batch = ImportBatch {
            batch_id: batch_id.to_string(),
            file_name: file_name.map(str::to_string),
            total_rows: result.total,
            success_rows: result.success,
            failed_rows: result.failed,
            mapping_source: source,
            imported_at: Utc::now(),
            elapsed_ms,
        };
        // 批次历史写入失败不影响已导入的数据
        if let Err(e) = batch_log.insert_batch(&batch).await {
            warn!(batch_id = %batch_id, error = %e, "导入批次记录写入失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ImportSettings;
    use crate::domain::customer::{Customer, NewCustomer, Page};
    use crate::domain::import::CellValue;
    use crate::repository::error::{RepositoryError, RepositoryResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 内存仓储（记录插入顺序）
    #[derive(Default)]
    struct MemoryRepo {
        emails: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CustomerRepository for MemoryRepo {
        async fn exists_by_email(&self, email: &str) -> RepositoryResult<bool> {
            Ok(self.emails.lock().unwrap().iter().any(|e| e == email))
        }

        async fn insert(&self, customer: NewCustomer) -> RepositoryResult<Customer> {
            self.emails.lock().unwrap().push(customer.email.clone());
            let now = Utc::now();
            Ok(Customer {
                id: Uuid::new_v4().to_string(),
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                created_at: now,
                updated_at: now,
            })
        }

        async fn find_by_email(&self, _email: &str) -> RepositoryResult<Option<Customer>> {
            Ok(None)
        }

        async fn count(&self) -> RepositoryResult<u64> {
            Ok(self.emails.lock().unwrap().len() as u64)
        }

        async fn list(&self, _page: u32, _page_size: u32) -> RepositoryResult<Page<Customer>> {
            Err(RepositoryError::DatabaseQueryError("not supported".to_string()))
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> DecodedTable {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|cells| {
                headers
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, c)| (h.clone(), CellValue::from(*c)))
                    .collect()
            })
            .collect();
        DecodedTable { headers, rows }
    }

    fn importer() -> CustomerImporter<MemoryRepo, ImportSettings> {
        CustomerImporter::with_defaults(MemoryRepo::default(), ImportSettings::default())
    }

    #[tokio::test]
    async fn test_rows_processed_in_order() {
        let importer = importer();
        let t = table(
            &["name", "email", "phone"],
            &[
                &["A", "a@b.com", "010"],
                &["", "x@b.com", "010"],
                &["B", "A@B.com", "011"],
            ],
        );
        let outcome = importer.import_table(&t, None, None).await.unwrap();
        let rows: Vec<usize> = outcome.result.errors.iter().map(|e| e.row).collect();
        assert_eq!(rows, vec![3, 4]);
        assert_eq!(outcome.result.success, 1);
        assert!(outcome.result.is_consistent());
    }

    #[tokio::test]
    async fn test_explicit_mapping_dangling_is_fatal() {
        let importer = importer();
        let t = table(&["a", "b"], &[&["x", "y"]]);
        let mapping = ColumnMapping {
            name: Some("a".to_string()),
            email: Some("missing".to_string()),
            phone: None,
        };
        let err = importer.import_table(&t, None, Some(mapping)).await.unwrap_err();
        assert!(matches!(
            err,
            ImporterError::Mapping(MappingError::DanglingHeader { .. })
        ));
        assert_eq!(importer.customer_repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_require_mapping_aborts_before_rows() {
        let mut settings = ImportSettings::default();
        settings.require_mapping = true;
        let importer = CustomerImporter::with_defaults(MemoryRepo::default(), settings);
        let t = table(&["col1", "col2"], &[&["x", "y"]]);

        let err = importer.import_table(&t, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ImporterError::Mapping(MappingError::NoUsableMapping)
        ));
    }

    #[tokio::test]
    async fn test_unmapped_columns_fail_every_row_by_default() {
        let importer = importer();
        let t = table(&["col1"], &[&["x"], &["y"]]);
        let outcome = importer.import_table(&t, None, None).await.unwrap();
        assert_eq!(outcome.result.failed, 2);
        assert!(outcome
            .result
            .errors
            .iter()
            .all(|e| e.field == "name" && e.message == "Name is required"));
    }

    #[tokio::test]
    async fn test_preview_limits_rows_and_never_writes() {
        let importer = importer();
        let mut csv = String::from("이름,이메일,연락처\n");
        for i in 0..8 {
            csv.push_str(&format!("user{},u{}@x.com,010-0000-000{}\n", i, i, i));
        }

        let preview = importer
            .preview_file(csv.as_bytes(), Some("c.csv"))
            .await
            .unwrap();
        assert!(preview.success);
        assert_eq!(preview.total_rows, 8);
        assert_eq!(preview.sample_rows.len(), 5);
        assert_eq!(preview.preview.as_ref().unwrap().len(), 5);
        assert_eq!(preview.preview.unwrap()[0].email, "u0@x.com");
        assert_eq!(importer.customer_repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preview_empty_file() {
        let importer = importer();
        let err = importer
            .preview_file(b"name,email,phone\n", Some("c.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImporterError::EmptyFile));
    }
}
