// ==========================================
// 客户关系管理工具 - 列映射器实现
// ==========================================
// 阶段 1: 表头 + 样本行 → name/email/phone 列映射
// 策略: 启发式别名表 / 外部推理服务（失败时回退启发式）
// ==========================================

use crate::domain::import::{ColumnMapping, MappingGuess, RawRow};
use crate::domain::types::{Confidence, MappingSource, TargetField};
use crate::importer::error::MappingError;
use crate::importer::importer_trait::ColumnMapper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

// ==========================================
// 别名表（封闭集合, 比较时忽略大小写）
// ==========================================
pub const NAME_ALIASES: &[&str] = &["name", "이름", "고객명", "성명"];
pub const EMAIL_ALIASES: &[&str] = &["email", "이메일", "메일", "e-mail"];
pub const PHONE_ALIASES: &[&str] = &["phone", "전화번호", "연락처", "핸드폰", "tel"];

pub fn aliases_for(field: TargetField) -> &'static [&'static str] {
    match field {
        TargetField::Name => NAME_ALIASES,
        TargetField::Email => EMAIL_ALIASES,
        TargetField::Phone => PHONE_ALIASES,
    }
}

// ==========================================
// HeuristicColumnMapper - 静态别名匹配
// ==========================================
pub struct HeuristicColumnMapper;

impl HeuristicColumnMapper {
    /// 同步计算映射（无外部调用, 永不失败）
    pub fn guess(&self, headers: &[String]) -> MappingGuess {
        let mut mapping = ColumnMapping::default();

        for field in TargetField::ALL {
            let aliases = aliases_for(field);
            // 按表头顺序, 首个命中者胜出
            let matched = headers.iter().find(|header| {
                let normalized = header.trim().to_lowercase();
                aliases.iter().any(|alias| *alias == normalized)
            });
            mapping.set(field, matched.cloned());
        }

        let missing = mapping.missing_fields();
        let confidence = confidence_for(&mapping);
        let notes = if missing.is_empty() {
            "all fields matched by header alias".to_string()
        } else {
            let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            format!("no header alias matched for: {}", names.join(", "))
        };

        MappingGuess {
            mapping,
            confidence,
            notes,
            source: MappingSource::Heuristic,
        }
    }
}

/// 按已解析字段数给出置信度: 3 → high, 1~2 → medium, 0 → low
pub fn confidence_for(mapping: &ColumnMapping) -> Confidence {
    match mapping.missing_fields().len() {
        0 => Confidence::High,
        3 => Confidence::Low,
        _ => Confidence::Medium,
    }
}

#[async_trait]
impl ColumnMapper for HeuristicColumnMapper {
    async fn infer_mapping(
        &self,
        headers: &[String],
        _samples: &[RawRow],
    ) -> Result<MappingGuess, MappingError> {
        Ok(self.guess(headers))
    }
}

// ==========================================
// MappingStrategy - 映射策略（由配置选择）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStrategy {
    #[default]
    Heuristic,
    Inference,
}

impl MappingStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Some(MappingStrategy::Heuristic),
            "inference" | "ai" | "llm" => Some(MappingStrategy::Inference),
            _ => None,
        }
    }
}

// ==========================================
// MappingState - 映射解析状态机
// ==========================================
// NotStarted → InferenceRequested → {MappingFound | MappingAbsentFallbackHeuristic | MappingFailed}
#[derive(Debug, Clone, PartialEq)]
pub enum MappingState {
    NotStarted,
    InferenceRequested,
    MappingFound(MappingGuess),
    MappingAbsentFallbackHeuristic {
        guess: MappingGuess,
        cause: MappingError,
    },
    MappingFailed(MappingError),
}

impl MappingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MappingState::MappingFound(_)
                | MappingState::MappingAbsentFallbackHeuristic { .. }
                | MappingState::MappingFailed(_)
        )
    }

    /// 终态 → 结果（非终态视为内部错误, 不应发生）
    pub fn into_result(self) -> Result<MappingGuess, MappingError> {
        match self {
            MappingState::MappingFound(guess) => Ok(guess),
            MappingState::MappingAbsentFallbackHeuristic { guess, .. } => Ok(guess),
            MappingState::MappingFailed(err) => Err(err),
            MappingState::NotStarted | MappingState::InferenceRequested => Err(
                MappingError::Inference("mapping resolution did not complete".to_string()),
            ),
        }
    }
}

impl fmt::Display for MappingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MappingState::NotStarted => "NotStarted",
            MappingState::InferenceRequested => "InferenceRequested",
            MappingState::MappingFound(_) => "MappingFound",
            MappingState::MappingAbsentFallbackHeuristic { .. } => "MappingAbsentFallbackHeuristic",
            MappingState::MappingFailed(_) => "MappingFailed",
        };
        f.write_str(label)
    }
}

// ==========================================
// MappingResolver - 映射解析器
// ==========================================
// 职责: 调用所选映射器 → 校验 → 失败时回退启发式或报告错误
pub struct MappingResolver {
    mapper: Box<dyn ColumnMapper>,
}

impl MappingResolver {
    /// # 参数
    /// - mapper: 主映射器（启发式或推理服务）
    pub fn new(mapper: Box<dyn ColumnMapper>) -> Self {
        Self { mapper }
    }

    pub fn heuristic() -> Self {
        Self::new(Box::new(HeuristicColumnMapper))
    }

    /// 运行状态机直到终态
    ///
    /// # 参数
    /// - strict: 为 true 时映射失败直接进入 MappingFailed, 不回退启发式
    pub async fn resolve(&self, headers: &[String], samples: &[RawRow], strict: bool) -> MappingState {
        let mut state = MappingState::NotStarted;
        debug!(state = %state, columns = headers.len(), "开始列映射解析");

        state = MappingState::InferenceRequested;
        debug!(state = %state, samples = samples.len(), "请求列映射推断");

        let outcome = self
            .mapper
            .infer_mapping(headers, samples)
            .await
            .and_then(|guess| ensure_headers_exist(&guess.mapping, headers).map(|_| guess));

        state = match outcome {
            Ok(guess) => {
                info!(
                    source = ?guess.source,
                    confidence = guess.confidence.as_str(),
                    name = ?guess.mapping.name,
                    email = ?guess.mapping.email,
                    phone = ?guess.mapping.phone,
                    "列映射已确定"
                );
                MappingState::MappingFound(guess)
            }
            Err(cause) if strict => {
                warn!(error = %cause, "列映射失败（严格模式, 不回退）");
                MappingState::MappingFailed(cause)
            }
            Err(cause) => {
                warn!(error = %cause, "列映射推断失败, 回退到启发式别名表");
                let guess = HeuristicColumnMapper.guess(headers);
                MappingState::MappingAbsentFallbackHeuristic { guess, cause }
            }
        };

        debug!(state = %state, "列映射解析结束");
        state
    }
}

/// 校验映射中的每个列名都存在于表头中
pub fn ensure_headers_exist(mapping: &ColumnMapping, headers: &[String]) -> Result<(), MappingError> {
    for field in TargetField::ALL {
        if let Some(header) = mapping.get(field) {
            if !headers.iter().any(|h| h == header) {
                return Err(MappingError::DanglingHeader {
                    field: field.as_str().to_string(),
                    header: header.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct FailingMapper;

    #[async_trait]
    impl ColumnMapper for FailingMapper {
        async fn infer_mapping(
            &self,
            _headers: &[String],
            _samples: &[RawRow],
        ) -> Result<MappingGuess, MappingError> {
            Err(MappingError::Timeout(100))
        }
    }

    struct DanglingMapper;

    #[async_trait]
    impl ColumnMapper for DanglingMapper {
        async fn infer_mapping(
            &self,
            _headers: &[String],
            _samples: &[RawRow],
        ) -> Result<MappingGuess, MappingError> {
            Ok(MappingGuess {
                mapping: ColumnMapping {
                    name: Some("Full Name".to_string()),
                    email: None,
                    phone: None,
                },
                confidence: Confidence::High,
                notes: String::new(),
                source: MappingSource::Inference,
            })
        }
    }

    #[test]
    fn test_heuristic_korean_headers() {
        let guess = HeuristicColumnMapper.guess(&headers(&["고객명", "이메일", "연락처"]));
        assert_eq!(guess.mapping.name.as_deref(), Some("고객명"));
        assert_eq!(guess.mapping.email.as_deref(), Some("이메일"));
        assert_eq!(guess.mapping.phone.as_deref(), Some("연락처"));
        assert_eq!(guess.confidence, Confidence::High);
        assert_eq!(guess.source, MappingSource::Heuristic);
    }

    #[test]
    fn test_heuristic_is_case_insensitive() {
        let guess = HeuristicColumnMapper.guess(&headers(&["NAME", "E-Mail", "Tel"]));
        assert_eq!(guess.mapping.name.as_deref(), Some("NAME"));
        assert_eq!(guess.mapping.email.as_deref(), Some("E-Mail"));
        assert_eq!(guess.mapping.phone.as_deref(), Some("Tel"));
    }

    #[test]
    fn test_heuristic_first_match_wins() {
        let guess = HeuristicColumnMapper.guess(&headers(&["이름", "name", "email"]));
        assert_eq!(guess.mapping.name.as_deref(), Some("이름"));
        assert_eq!(guess.confidence, Confidence::Medium);
        assert!(guess.notes.contains("phone"));
    }

    #[test]
    fn test_heuristic_no_match() {
        let guess = HeuristicColumnMapper.guess(&headers(&["a", "b"]));
        assert!(guess.mapping.is_empty());
        assert_eq!(guess.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_resolver_falls_back_on_failure() {
        let resolver = MappingResolver::new(Box::new(FailingMapper));
        let state = resolver.resolve(&headers(&["name", "email", "phone"]), &[], false).await;

        match state {
            MappingState::MappingAbsentFallbackHeuristic { guess, cause } => {
                assert_eq!(cause, MappingError::Timeout(100));
                assert_eq!(guess.source, MappingSource::Heuristic);
                assert_eq!(guess.mapping.email.as_deref(), Some("email"));
            }
            other => panic!("unexpected state: {}", other),
        }
    }

    #[tokio::test]
    async fn test_resolver_strict_reports_failure() {
        let resolver = MappingResolver::new(Box::new(FailingMapper));
        let state = resolver.resolve(&headers(&["name"]), &[], true).await;
        assert!(state.is_terminal());
        assert!(matches!(state, MappingState::MappingFailed(MappingError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_resolver_rejects_dangling_header() {
        let resolver = MappingResolver::new(Box::new(DanglingMapper));
        let state = resolver.resolve(&headers(&["이름", "메일"]), &[], false).await;

        match state {
            MappingState::MappingAbsentFallbackHeuristic { guess, cause } => {
                assert!(matches!(cause, MappingError::DanglingHeader { .. }));
                // 回退后的映射只引用真实存在的列
                assert_eq!(guess.mapping.name.as_deref(), Some("이름"));
                assert_eq!(guess.mapping.email.as_deref(), Some("메일"));
            }
            other => panic!("unexpected state: {}", other),
        }
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(MappingStrategy::parse("AI"), Some(MappingStrategy::Inference));
        assert_eq!(MappingStrategy::parse("heuristic"), Some(MappingStrategy::Heuristic));
        assert_eq!(MappingStrategy::parse("magic"), None);
    }
}
