use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{
    AgentResource, AttachLlm, AttachTool, CreateAgent, CreateLlm, CreateTool, Envelope,
    InvokeRequest, Llm, Prediction, ToolResource,
};

/// 托管 Agent API 客户端
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    api_key: String,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let api_key = config.resolved_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(ApiClient {
            client,
            config,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub async fn create_llm(&self, request: &CreateLlm) -> Result<Llm, ApiError> {
        self.send(Method::POST, "/api/v1/llms", Some(request)).await
    }

    pub async fn create_agent(&self, request: &CreateAgent) -> Result<AgentResource, ApiError> {
        self.send(Method::POST, "/api/v1/agents", Some(request)).await
    }

    /// 为 agent 绑定 LLM
    pub async fn add_llm(&self, agent_id: &str, llm_id: &str) -> Result<(), ApiError> {
        let body = AttachLlm {
            llm_id: llm_id.to_string(),
        };
        let path = format!("/api/v1/agents/{}/llms", agent_id);
        self.send::<Value, _>(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn create_tool(&self, request: &CreateTool) -> Result<ToolResource, ApiError> {
        self.send(Method::POST, "/api/v1/tools", Some(request)).await
    }

    /// 为 agent 绑定工具
    pub async fn add_tool(&self, agent_id: &str, tool_id: &str) -> Result<(), ApiError> {
        let body = AttachTool {
            tool_id: tool_id.to_string(),
        };
        let path = format!("/api/v1/agents/{}/tools", agent_id);
        self.send::<Value, _>(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn invoke(
        &self,
        agent_id: &str,
        input: &str,
        session_id: &str,
    ) -> Result<Prediction, ApiError> {
        let body = InvokeRequest {
            input: input.to_string(),
            session_id: session_id.to_string(),
            enable_streaming: false,
        };
        let path = format!("/api/v1/agents/{}/invoke", agent_id);
        self.send(Method::POST, &path, Some(&body)).await
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/v1/agents/{}", agent_id);
        self.send::<Value, ()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    pub async fn delete_llm(&self, llm_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/v1/llms/{}", llm_id);
        self.send::<Value, ()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    pub async fn delete_tool(&self, tool_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/v1/tools/{}", tool_id);
        self.send::<Value, ()>(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// 发送请求，可重试错误按指数退避重试
    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let attempts = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.send_once(method.clone(), path, body).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        %path,
                        attempt,
                        max = attempts,
                        error = %e,
                        "API call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url(), path);
        tracing::debug!(%method, %url, "sending request");

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status { status, body: text });
        }

        decode(&text)
    }
}

/// 解析响应包装并取出 data
fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    // DELETE 等请求可能返回空 body
    let text = if text.trim().is_empty() { "{}" } else { text };

    let envelope: Envelope<Value> =
        serde_json::from_str(text).map_err(|source| ApiError::Decode {
            source,
            body: text.to_string(),
        })?;

    if !envelope.success {
        let reason = envelope
            .error
            .map(|e| match e {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| "success=false".to_string());
        return Err(ApiError::Rejected(reason));
    }

    let data = envelope.data.unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|source| ApiError::Decode {
        source,
        body: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_extracts_data() {
        let llm: Llm = decode(r#"{"success": true, "data": {"id": "llm-1", "provider": "OPENAI"}}"#)
            .unwrap();
        assert_eq!(llm.id, "llm-1");
    }

    #[test]
    fn decode_rejects_unsuccessful_envelope() {
        let err = decode::<Value>(r#"{"success": false, "error": "bad key"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(msg) if msg == "bad key"));
    }

    #[test]
    fn decode_accepts_empty_body() {
        let value: Value = decode("").unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn decode_reports_malformed_json() {
        let err = decode::<Value>("<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[test]
    fn client_requires_api_key() {
        let config = ApiConfig {
            api_key: None,
            ..ApiConfig::default()
        };
        assert!(matches!(ApiClient::new(config), Err(ApiError::MissingApiKey)));
    }
}
