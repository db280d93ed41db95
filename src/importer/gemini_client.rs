// ==========================================
// 客户关系管理工具 - Gemini 推理客户端
// ==========================================
// 协议: generateContent REST（JSON 请求/响应）
// 鉴权: API Key（Generative Language API）或 Bearer Token（Vertex AI）
// 执行: ureq 阻塞调用, 经 spawn_blocking 转入阻塞线程池
// ==========================================

use crate::config::settings::InferenceSettings;
use crate::importer::error::MappingError;
use crate::importer::importer_trait::InferenceClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const GENERATIVE_LANGUAGE_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const USER_AGENT: &str = concat!("ppop-crm/", env!("CARGO_PKG_VERSION"));

/// 调用凭据
#[derive(Clone)]
pub enum GeminiAuth {
    /// Generative Language API（x-goog-api-key 请求头）
    ApiKey(String),
    /// Vertex AI（Authorization: Bearer）
    Vertex {
        project_id: String,
        location: String,
        access_token: String,
    },
}

impl std::fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 凭据不输出
        match self {
            GeminiAuth::ApiKey(_) => f.write_str("ApiKey(***)"),
            GeminiAuth::Vertex {
                project_id,
                location,
                ..
            } => write!(f, "Vertex {{ project_id: {}, location: {} }}", project_id, location),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    auth: GeminiAuth,
    model: String,
    timeout: Duration,
    base_url: String,
}

impl GeminiClient {
    pub fn new(auth: GeminiAuth, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            auth,
            model: model.into(),
            timeout,
            base_url: GENERATIVE_LANGUAGE_BASE.to_string(),
        }
    }

    /// 替换 Generative Language API 基础地址（仅 API Key 模式生效）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 从推理配置构造客户端
    ///
    /// # 返回
    /// - None: 未配置 API Key, 且未同时配置 GCP 项目与访问令牌
    pub fn from_settings(settings: &InferenceSettings) -> Option<Self> {
        let auth = if let Some(key) = non_empty(settings.api_key.as_deref()) {
            GeminiAuth::ApiKey(key.to_string())
        } else {
            let project_id = non_empty(settings.project_id.as_deref())?;
            let access_token = non_empty(settings.access_token.as_deref())?;
            GeminiAuth::Vertex {
                project_id: project_id.to_string(),
                location: settings.location.clone(),
                access_token: access_token.to_string(),
            }
        };
        Some(Self::new(
            auth,
            settings.model.clone(),
            Duration::from_millis(settings.timeout_ms),
        ))
    }

    /// generateContent 端点 URL（不含凭据）
    pub fn endpoint(&self) -> String {
        match &self.auth {
            GeminiAuth::ApiKey(_) => format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ),
            GeminiAuth::Vertex {
                project_id,
                location,
                ..
            } => format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
                loc = location,
                project = project_id,
                model = self.model
            ),
        }
    }

    fn build_agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout_connect(self.timeout)
            .timeout_read(self.timeout)
            .timeout_write(self.timeout)
            .user_agent(USER_AGENT)
            .build()
    }

    /// 阻塞调用（在阻塞线程池中执行）
    fn call_blocking(&self, prompt: &str) -> Result<String, MappingError> {
        let payload = request_payload(prompt);
        let mut request = self
            .build_agent()
            .post(&self.endpoint())
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        request = match &self.auth {
            GeminiAuth::ApiKey(key) => request.set("x-goog-api-key", key),
            GeminiAuth::Vertex { access_token, .. } => {
                request.set("Authorization", &format!("Bearer {}", access_token))
            }
        };

        let response = request.send_json(payload).map_err(error_from_ureq)?;
        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| MappingError::MalformedResponse(format!("response is not JSON: {}", e)))?;
        extract_candidate_text(&body)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, MappingError> {
        debug!(model = %self.model, auth = ?self.auth, "调用 Gemini generateContent");
        let client = self.clone();
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || client.call_blocking(&prompt))
            .await
            .map_err(|e| MappingError::Inference(format!("inference task failed: {}", e)))?
    }
}

/// generateContent 请求体
pub fn request_payload(prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "temperature": 0.0
        }
    })
}

/// 响应文本位于 candidates[0].content.parts[0].text; 缺失时为空串
pub fn extract_candidate_text(body: &Value) -> Result<String, MappingError> {
    if let Some(err) = body.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(MappingError::Inference(message.to_string()));
    }
    Ok(body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn error_from_ureq(err: ureq::Error) -> MappingError {
    match err {
        ureq::Error::Status(status, _) => {
            warn!(status, "Gemini 返回非 2xx 状态");
            MappingError::Inference(format!("http status {}", status))
        }
        ureq::Error::Transport(transport) => {
            // Display 会带出完整 URL, 只保留种类与消息
            let kind = transport.kind();
            let message = transport.message().unwrap_or("no detail");
            warn!(kind = ?kind, detail = message, "Gemini 传输层错误");
            MappingError::Inference(format!("transport error ({:?}): {}", kind, message))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> InferenceSettings {
        InferenceSettings::default()
    }

    #[test]
    fn test_from_settings_requires_credentials() {
        assert!(GeminiClient::from_settings(&settings()).is_none());

        let mut s = settings();
        s.project_id = Some("demo".to_string());
        // 只有项目没有令牌
        assert!(GeminiClient::from_settings(&s).is_none());
    }

    #[test]
    fn test_api_key_endpoint() {
        let mut s = settings();
        s.api_key = Some("k-123".to_string());
        let client = GeminiClient::from_settings(&s).unwrap();
        let url = client.endpoint();
        assert_eq!(
            url,
            format!("{}/models/gemini-2.5-flash:generateContent", GENERATIVE_LANGUAGE_BASE)
        );
        assert!(!url.contains("k-123"));
    }

    #[tokio::test]
    async fn test_failed_call_does_not_expose_api_key() {
        // 端口 9 (discard) 无监听, 连接立即失败
        let key = "SUPERSECRETKEY123";
        let client = GeminiClient::new(
            GeminiAuth::ApiKey(key.to_string()),
            "gemini-2.5-flash",
            Duration::from_secs(2),
        )
        .with_base_url("http://127.0.0.1:9/v1beta");

        let err = client.generate("hi").await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, MappingError::Inference(_)));
        assert!(message.contains("transport error"));
        assert!(!message.contains(key));
    }

    #[test]
    fn test_vertex_endpoint() {
        let mut s = settings();
        s.project_id = Some("crm-prod".to_string());
        s.access_token = Some("tok".to_string());
        let client = GeminiClient::from_settings(&s).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://asia-northeast3-aiplatform.googleapis.com/v1/projects/crm-prod/locations/asia-northeast3/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = GeminiAuth::ApiKey("secret".to_string());
        assert!(!format!("{:?}", auth).contains("secret"));
    }

    #[test]
    fn test_extract_candidate_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"mapping\":{}}" }] } }]
        });
        assert_eq!(extract_candidate_text(&body).unwrap(), "{\"mapping\":{}}");
        assert_eq!(extract_candidate_text(&json!({})).unwrap(), "");

        let err = extract_candidate_text(&json!({"error": {"message": "quota"}})).unwrap_err();
        assert_eq!(err, MappingError::Inference("quota".to_string()));
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = request_payload("hi");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "hi");
    }
}
