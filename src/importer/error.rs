// ==========================================
// 客户关系管理工具 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: DecodeError(致命) / MappingError(可回退) / ImporterError(调用级)
// 行级错误不走这里, 记录在 ImportResult.errors
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

// ==========================================
// DecodeError - 表格解码错误（整个调用失败, 无部分结果）
// ==========================================
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported file format: {extension} (supported: {supported})")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    #[error("failed to parse CSV: {0}")]
    Csv(String),

    #[error("failed to parse spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("spreadsheet contains no worksheet")]
    NoWorksheet,

    #[error("file has no header row")]
    MissingHeaderRow,

    #[error("file is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),
}

impl From<csv::Error> for DecodeError {
    fn from(err: csv::Error) -> Self {
        DecodeError::Csv(err.to_string())
    }
}

impl From<calamine::Error> for DecodeError {
    fn from(err: calamine::Error) -> Self {
        DecodeError::Spreadsheet(err.to_string())
    }
}

// ==========================================
// MappingError - 列映射错误
// ==========================================
// 导入路径: 回退到启发式别名表
// 预览路径（严格模式）: 向调用方报告
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("inference service call failed: {0}")]
    Inference(String),

    #[error("inference service timed out after {0} ms")]
    Timeout(u64),

    #[error("no JSON object found in inference response")]
    NoJsonObject,

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("mapping for `{field}` references unknown column `{header}`")]
    DanglingHeader { field: String, header: String },

    #[error("no usable column mapping: none of name/email/phone could be resolved")]
    NoUsableMapping,
}

// ==========================================
// ImporterError - 调用级错误
// ==========================================
#[derive(Error, Debug)]
pub enum ImporterError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("column mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("file contains no data rows")]
    EmptyFile,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImporterError {
    fn from(err: std::io::Error) -> Self {
        ImporterError::Other(anyhow::Error::new(err))
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImporterError>;
