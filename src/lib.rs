// ==========================================
// 客户关系管理工具 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格客户数据导入（CSV / Excel → 客户表）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 应用设置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{Confidence, ImportErrorKind, MappingSource, TargetField};

// 领域实体
pub use domain::{
    ColumnMapping, Customer, ImportBatch, ImportError, ImportResult, ImportTemplate, MappingGuess,
    PreviewResult,
};

// 导入器
pub use importer::{CustomerImporter, ImportOutcome, MappingStrategy};

// API
pub use api::{ApiError, ApiResponse, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "PPOP CRM";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
