// ==========================================
// 客户关系管理工具 - 推理服务列映射器
// ==========================================
// 流程: 构造提示词 → InferenceClient → 提取首个 JSON 对象 → 解析映射
// 超时: tokio::time::timeout 限定单次调用, 不重试
// ==========================================

use crate::domain::import::{ColumnMapping, MappingGuess, RawRow};
use crate::domain::types::{Confidence, MappingSource, TargetField};
use crate::importer::column_mapper::ensure_headers_exist;
use crate::importer::error::MappingError;
use crate::importer::importer_trait::{ColumnMapper, InferenceClient};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 嵌入提示词的样本行数
pub const PROMPT_SAMPLE_ROWS: usize = 3;

// ==========================================
// 提示词构造
// ==========================================

/// 构造列映射提示词
///
/// # 参数
/// - headers: 表头（按列顺序）
/// - samples: 样本行（只取前 3 行, 按表头顺序输出单元格）
pub fn build_mapping_prompt(headers: &[String], samples: &[RawRow]) -> String {
    let header_json =
        serde_json::to_string_pretty(headers).unwrap_or_else(|_| format!("{:?}", headers));

    let sample_values: Vec<BTreeMap<&str, Value>> = samples
        .iter()
        .take(PROMPT_SAMPLE_ROWS)
        .map(|row| {
            headers
                .iter()
                .filter_map(|h| {
                    row.get(h)
                        .map(|cell| (h.as_str(), serde_json::to_value(cell).unwrap_or(Value::Null)))
                })
                .collect()
        })
        .collect();
    let sample_json =
        serde_json::to_string_pretty(&sample_values).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"당신은 고객 데이터 변환 전문가입니다.
아래 표 데이터를 분석하여 고객 데이터 형식(name, email, phone)으로 열을 매핑해주세요.

## 대상 필드 (모두 필수)
- name: 고객 이름
- email: 이메일 주소
- phone: 전화번호

## 입력 열 이름
{header_json}

## 샘플 데이터 (처음 {sample_count}행)
{sample_json}

## 요청사항
1. 각 열이 name, email, phone 중 어느 필드에 해당하는지 판단해주세요.
2. 열 이름이 한국어이거나 다른 형태여도 내용을 보고 판단해주세요.
   - "고객명", "이름", "성명", "Name" → name
   - "이메일", "메일", "Email", "E-mail" → email
   - "연락처", "전화번호", "핸드폰", "Phone", "Tel" → phone
3. 반드시 위 열 이름 중 하나를 그대로 사용하고, 매핑할 수 없는 필드는 null로 표시해주세요.

## 응답 형식 (JSON만 출력)
{{
  "mapping": {{
    "name": "원본 열 이름 또는 null",
    "email": "원본 열 이름 또는 null",
    "phone": "원본 열 이름 또는 null"
  }},
  "confidence": "high | medium | low",
  "notes": "매핑 관련 참고사항"
}}"#,
        header_json = header_json,
        sample_count = PROMPT_SAMPLE_ROWS,
        sample_json = sample_json,
    )
}

// ==========================================
// 响应解析
// ==========================================

/// 在任意文本中查找首个语法完整的 JSON 对象
///
/// 模型常在 JSON 外包裹说明文字或 markdown 代码块
pub fn extract_first_json_object(text: &str) -> Option<Map<String, Value>> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(object))) = stream.next() {
            return Some(object);
        }
    }
    None
}

/// 解析单个映射字段: 字符串 / null / 缺失; "" 与 "null" 视为未映射
fn parse_mapping_field(
    mapping: &Map<String, Value>,
    field: TargetField,
) -> Result<Option<String>, MappingError> {
    match mapping.get(field.as_str()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(header)) => {
            let trimmed = header.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                Ok(Some(header.clone()))
            }
        }
        Some(other) => Err(MappingError::MalformedResponse(format!(
            "mapping.{} must be a string or null, got {}",
            field, other
        ))),
    }
}

/// 推理响应文本 → MappingGuess（不含表头校验）
pub fn parse_mapping_response(text: &str) -> Result<MappingGuess, MappingError> {
    let object = extract_first_json_object(text).ok_or(MappingError::NoJsonObject)?;

    let mapping_obj = match object.get("mapping") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(MappingError::MalformedResponse(
                "`mapping` is not an object".to_string(),
            ))
        }
        None => {
            return Err(MappingError::MalformedResponse(
                "`mapping` field is missing".to_string(),
            ))
        }
    };

    let mut mapping = ColumnMapping::default();
    for field in TargetField::ALL {
        mapping.set(field, parse_mapping_field(mapping_obj, field)?);
    }

    let confidence = object
        .get("confidence")
        .and_then(Value::as_str)
        .map(Confidence::parse_lenient)
        .unwrap_or(Confidence::Low);
    let notes = object
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(MappingGuess {
        mapping,
        confidence,
        notes,
        source: MappingSource::Inference,
    })
}

// ==========================================
// InferenceColumnMapper
// ==========================================
pub struct InferenceColumnMapper {
    client: Arc<dyn InferenceClient>,
    timeout: Duration,
}

impl InferenceColumnMapper {
    pub fn new(client: Arc<dyn InferenceClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ColumnMapper for InferenceColumnMapper {
    #[instrument(skip(self, headers, samples), fields(columns = headers.len()))]
    async fn infer_mapping(
        &self,
        headers: &[String],
        samples: &[RawRow],
    ) -> Result<MappingGuess, MappingError> {
        let prompt = build_mapping_prompt(headers, samples);
        debug!(prompt_len = prompt.len(), "发送列映射推理请求");

        let text = match tokio::time::timeout(self.timeout, self.client.generate(&prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                warn!(timeout_ms = ms, "推理服务调用超时");
                return Err(MappingError::Timeout(ms));
            }
        };

        let guess = parse_mapping_response(&text)?;
        ensure_headers_exist(&guess.mapping, headers)?;
        Ok(guess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::CellValue;

    struct CannedClient(String);

    #[async_trait]
    impl InferenceClient for CannedClient {
        async fn generate(&self, _prompt: &str) -> Result<String, MappingError> {
            Ok(self.0.clone())
        }
    }

    fn headers() -> Vec<String> {
        vec!["성함".to_string(), "메일주소".to_string(), "휴대폰".to_string()]
    }

    #[test]
    fn test_extract_json_from_prose() {
        let text = "분석 결과입니다 {not json} 그리고\n```json\n{\"mapping\": {\"name\": \"a\"}}\n```";
        let object = extract_first_json_object(text).unwrap();
        assert!(object.contains_key("mapping"));
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_first_json_object("no braces here").is_none());
        assert!(extract_first_json_object("{ broken").is_none());
    }

    #[test]
    fn test_parse_response_null_variants() {
        let text = r#"{"mapping":{"name":"성함","email":"","phone":"null"},"confidence":"MEDIUM","notes":"ok"}"#;
        let guess = parse_mapping_response(text).unwrap();
        assert_eq!(guess.mapping.name.as_deref(), Some("성함"));
        assert_eq!(guess.mapping.email, None);
        assert_eq!(guess.mapping.phone, None);
        assert_eq!(guess.confidence, Confidence::Medium);
        assert_eq!(guess.notes, "ok");
        assert_eq!(guess.source, MappingSource::Inference);
    }

    #[test]
    fn test_parse_response_defaults_confidence_low() {
        let guess = parse_mapping_response(r#"{"mapping":{}}"#).unwrap();
        assert!(guess.mapping.is_empty());
        assert_eq!(guess.confidence, Confidence::Low);
    }

    #[test]
    fn test_parse_response_malformed() {
        assert_eq!(
            parse_mapping_response("plain text").unwrap_err(),
            MappingError::NoJsonObject
        );
        assert!(matches!(
            parse_mapping_response(r#"{"mapping":{"name":42}}"#).unwrap_err(),
            MappingError::MalformedResponse(_)
        ));
        assert!(matches!(
            parse_mapping_response(r#"{"confidence":"high"}"#).unwrap_err(),
            MappingError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_prompt_embeds_headers_and_three_samples() {
        let samples: Vec<RawRow> = (0..5)
            .map(|i| {
                let mut row = RawRow::new();
                row.insert("성함".to_string(), CellValue::Text(format!("sample-{}", i)));
                row
            })
            .collect();
        let prompt = build_mapping_prompt(&headers(), &samples);
        assert!(prompt.contains("메일주소"));
        assert!(prompt.contains("sample-2"));
        assert!(!prompt.contains("sample-3"));
    }

    #[tokio::test]
    async fn test_mapper_accepts_valid_response() {
        let client = CannedClient(
            r#"{"mapping":{"name":"성함","email":"메일주소","phone":"휴대폰"},"confidence":"high","notes":""}"#
                .to_string(),
        );
        let mapper = InferenceColumnMapper::new(Arc::new(client), Duration::from_secs(1));
        let guess = mapper.infer_mapping(&headers(), &[]).await.unwrap();
        assert_eq!(guess.mapping.phone.as_deref(), Some("휴대폰"));
        assert_eq!(guess.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_mapper_rejects_unknown_header() {
        let client = CannedClient(r#"{"mapping":{"name":"Name"}}"#.to_string());
        let mapper = InferenceColumnMapper::new(Arc::new(client), Duration::from_secs(1));
        let err = mapper.infer_mapping(&headers(), &[]).await.unwrap_err();
        assert!(matches!(err, MappingError::DanglingHeader { .. }));
    }
}
