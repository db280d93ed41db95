// ==========================================
// 客户关系管理工具 - 领域模型层
// ==========================================
// 职责: 定义领域实体、导入管道数据结构、枚举类型
// 红线: 不含数据访问逻辑, 不含导入流程逻辑
// ==========================================

pub mod customer;
pub mod import;
pub mod types;

// 重导出核心类型
pub use customer::{Customer, NewCustomer, Page, Pagination};
pub use import::{
    row_number_for_index, CandidateRecord, CellValue, ColumnMapping, DecodedTable, ImportBatch,
    ImportError, ImportResult, ImportResultBuilder, ImportTemplate, MappingGuess, PreviewResult, RawRow,
    ValidatedRecord,
};
pub use types::{Confidence, ImportErrorKind, MappingSource, TargetField};
