// ==========================================
// 客户关系管理工具 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供命令行/上层服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResponse, ApiResult};
pub use import_api::ImportApi;
