// ==========================================
// 客户关系管理工具 - 配置层
// ==========================================
// 职责: 应用设置加载/保存, 环境变量覆写
// 存储: settings.json
// ==========================================

pub mod import_config_trait;
pub mod settings;

pub use import_config_trait::ImportConfigReader;
pub use settings::{
    AppSettings, FileSettingsProvider, ImportSettings, InferenceSettings, SettingsError,
    SettingsResult, SmtpSettings, SmtpSettingsPatch,
};
