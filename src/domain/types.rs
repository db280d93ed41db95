// ==========================================
// 客户关系管理工具 - 领域枚举类型
// ==========================================
// 职责: 映射目标字段 / 置信度 / 映射来源 / 行错误类别
// 序列化: 全小写（与前端契约一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// TargetField - 映射目标字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetField {
    Name,
    Email,
    Phone,
}

impl TargetField {
    /// 固定顺序: name → email → phone
    pub const ALL: [TargetField; 3] = [TargetField::Name, TargetField::Email, TargetField::Phone];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Name => "name",
            TargetField::Email => "email",
            TargetField::Phone => "phone",
        }
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Confidence - 映射置信度（仅供参考, 下游不校验）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// 宽松解析推理服务返回值（未知值一律视为 Low）
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

// ==========================================
// MappingSource - 映射来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingSource {
    /// 静态别名表
    Heuristic,
    /// 外部推理服务（LLM）
    Inference,
    /// 调用方显式指定
    Explicit,
}

impl MappingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingSource::Heuristic => "heuristic",
            MappingSource::Inference => "inference",
            MappingSource::Explicit => "explicit",
        }
    }

    /// 严格解析存储值（未知值返回 None）
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "heuristic" => Some(MappingSource::Heuristic),
            "inference" => Some(MappingSource::Inference),
            "explicit" => Some(MappingSource::Explicit),
            _ => None,
        }
    }
}

// ==========================================
// ImportErrorKind - 行级错误类别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportErrorKind {
    /// 必填/格式校验失败
    Validation,
    /// 邮箱已存在（库内或同批次）
    Duplicate,
    /// 落库失败
    Persistence,
}
