// ==========================================
// 客户关系管理工具 - 导入层
// ==========================================
// 职责: 表格文件 → 客户记录
// 支持: CSV, Excel (xlsx/xls/xlsm/xlsb), ODS
// 流程: 解码 → 列映射 → 投影 → 校验 → 去重/写入
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod customer_importer;
pub mod error;
pub mod gemini_client;
pub mod importer_trait;
pub mod inference;
pub mod report;
pub mod row_projector;
pub mod tabular_decoder;
pub mod validator;

// 重导出核心类型
pub use column_mapper::{HeuristicColumnMapper, MappingResolver, MappingState, MappingStrategy};
pub use customer_importer::{resolver_for_settings, CustomerImporter, ImportOutcome};
pub use error::{DecodeError, ImporterError, ImporterResult, MappingError};
pub use gemini_client::{GeminiAuth, GeminiClient};
pub use inference::InferenceColumnMapper;
pub use row_projector::BoundMapping;
pub use tabular_decoder::{CsvDecoder, SpreadsheetDecoder, UniversalDecoder};
pub use validator::{is_valid_email, is_valid_phone, normalize_email, normalize_phone, validate_record};

// 重导出 Trait 接口
pub use importer_trait::{ColumnMapper, InferenceClient, TabularDecoder};
