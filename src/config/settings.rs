// ==========================================
// 客户关系管理工具 - 应用设置
// ==========================================
// 存储: settings.json（APP_DATA_PATH 或系统数据目录下 ppop-crm/）
// 优先级: 环境变量 > 设置文件 > 默认值
// 说明: SMTP_HOST 存在时, 整个 SMTP 段取自环境变量
// ==========================================

use crate::importer::column_mapper::MappingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const APP_DIR_NAME: &str = "ppop-crm";

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;
pub const DEFAULT_SAMPLE_SIZE: usize = 5;
pub const DEFAULT_INFERENCE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_INFERENCE_LOCATION: &str = "asia-northeast3";
pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 15_000;

/// 必需列（导入模板）
pub const REQUIRED_COLUMNS: [&str; 3] = ["name", "email", "phone"];

// ==========================================
// SettingsError
// ==========================================
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no application data directory available")]
    NoDataDir,
}

pub type SettingsResult<T> = Result<T, SettingsError>;

// ==========================================
// 设置结构
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            user: String::new(),
            pass: String::new(),
            from: String::new(),
        }
    }
}

impl SmtpSettings {
    /// 五项均非空（端口非 0）才视为已配置
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
            && self.port != 0
            && !self.user.is_empty()
            && !self.pass.is_empty()
            && !self.from.is_empty()
    }
}

/// SMTP 部分更新（未给出的字段保持原值）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmtpSettingsPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: Option<String>,
}

impl SmtpSettingsPatch {
    fn apply(self, smtp: &mut SmtpSettings) {
        if let Some(host) = self.host {
            smtp.host = host;
        }
        if let Some(port) = self.port {
            smtp.port = port;
        }
        if let Some(user) = self.user {
            smtp.user = user;
        }
        if let Some(pass) = self.pass {
            smtp.pass = pass;
        }
        if let Some(from) = self.from {
            smtp.from = from;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub max_file_size_mb: u64,
    pub supported_extensions: Vec<String>,
    pub mapping_strategy: MappingStrategy,
    /// 推理失败时不回退启发式（预览路径）
    pub strict_mapping: bool,
    /// 映射三字段全部缺失时中止导入
    pub require_mapping: bool,
    pub sample_size: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            supported_extensions: vec![".csv".to_string(), ".xlsx".to_string(), ".xls".to_string()],
            mapping_strategy: MappingStrategy::Heuristic,
            strict_mapping: false,
            require_mapping: false,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub model: String,
    pub project_id: Option<String>,
    pub location: String,
    /// 不写入设置文件, 仅从环境变量读取
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub access_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_INFERENCE_MODEL.to_string(),
            project_id: None,
            location: DEFAULT_INFERENCE_LOCATION.to_string(),
            api_key: None,
            access_token: None,
            timeout_ms: DEFAULT_INFERENCE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub smtp: SmtpSettings,
    pub import: ImportSettings,
    pub inference: InferenceSettings,
}

impl AppSettings {
    /// 应用环境变量覆写
    ///
    /// # 参数
    /// - env: 环境变量快照（测试中可注入）
    pub fn apply_env(&mut self, env: &HashMap<String, String>) {
        let get = |key: &str| env_value(env, key);

        if let Some(host) = get("SMTP_HOST") {
            self.smtp = SmtpSettings {
                host: host.to_string(),
                port: get("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_SMTP_PORT),
                user: get("SMTP_USER").unwrap_or_default().to_string(),
                pass: get("SMTP_PASS").unwrap_or_default().to_string(),
                from: get("SMTP_FROM").unwrap_or_default().to_string(),
            };
        }

        if let Some(project) = get("GCP_PROJECT_ID") {
            self.inference.project_id = Some(project.to_string());
        }
        if let Some(location) = get("GCP_LOCATION") {
            self.inference.location = location.to_string();
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.inference.api_key = Some(key.to_string());
        }
        if let Some(token) = get("GCP_ACCESS_TOKEN") {
            self.inference.access_token = Some(token.to_string());
        }

        if let Some(raw) = get("PPOP_MAPPING_STRATEGY") {
            match MappingStrategy::parse(raw) {
                Some(strategy) => self.import.mapping_strategy = strategy,
                None => warn!(value = raw, "忽略无法识别的 PPOP_MAPPING_STRATEGY"),
            }
        }
        if let Some(raw) = get("PPOP_MAX_FILE_SIZE_MB") {
            match raw.parse::<u64>() {
                Ok(mb) if mb > 0 => self.import.max_file_size_mb = mb,
                _ => warn!(value = raw, "忽略无效的 PPOP_MAX_FILE_SIZE_MB"),
            }
        }
    }
}

fn env_value<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

// ==========================================
// FileSettingsProvider - 设置文件读写
// ==========================================
pub struct FileSettingsProvider {
    path: PathBuf,
    env: HashMap<String, String>,
}

impl FileSettingsProvider {
    /// 指定设置文件路径（环境变量取当前进程）
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env: std::env::vars().collect(),
        }
    }

    /// 默认路径: $APP_DATA_PATH/settings.json, 否则 <data_dir>/ppop-crm/settings.json
    pub fn from_default_location() -> SettingsResult<Self> {
        let dir = match std::env::var("APP_DATA_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => dirs::data_dir()
                .ok_or(SettingsError::NoDataDir)?
                .join(APP_DIR_NAME),
        };
        Ok(Self::new(dir.join(SETTINGS_FILE_NAME)))
    }

    /// 替换环境变量快照
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 只读取设置文件（不应用环境变量）; 文件不存在时返回默认值
    pub fn load_file(&self) -> SettingsResult<AppSettings> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "设置文件不存在, 使用默认值");
            return Ok(AppSettings::default());
        }
        let path = self.path.display().to_string();
        let raw = fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse { path, source })
    }

    /// 读取生效设置（默认值 ← 文件 ← 环境变量）
    pub fn load(&self) -> SettingsResult<AppSettings> {
        let mut settings = self.load_file()?;
        settings.apply_env(&self.env);
        Ok(settings)
    }

    /// 写入完整设置（自动创建目录）
    pub fn save(&self, settings: &AppSettings) -> SettingsResult<()> {
        let path = self.path.display().to_string();
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|source| SettingsError::Io { path, source })?;
        debug!(path = %self.path.display(), "设置已保存");
        Ok(())
    }

    /// 合并更新 SMTP 设置并写回文件
    ///
    /// # 返回
    /// - 合并后（文件层面）的 SMTP 设置
    pub fn update_smtp_settings(&self, patch: SmtpSettingsPatch) -> SettingsResult<SmtpSettings> {
        let mut settings = self.load_file()?;
        patch.apply(&mut settings.smtp);
        self.save(&settings)?;
        Ok(settings.smtp)
    }

    /// 生效 SMTP 设置是否完整
    pub fn is_smtp_configured(&self) -> SettingsResult<bool> {
        Ok(self.load()?.smtp.is_configured())
    }
}
