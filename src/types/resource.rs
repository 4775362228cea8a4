use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API 统一响应包装 `{ "success": bool, "data": ... }`
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<Value>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LlmProvider {
    OpenAi,
    AzureOpenAi,
    HuggingFace,
    Anthropic,
    Other(String),
}

impl From<String> for LlmProvider {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "OPENAI" => LlmProvider::OpenAi,
            "AZURE_OPENAI" => LlmProvider::AzureOpenAi,
            "HUGGINGFACE" => LlmProvider::HuggingFace,
            "ANTHROPIC" => LlmProvider::Anthropic,
            _ => LlmProvider::Other(s),
        }
    }
}

impl From<LlmProvider> for String {
    fn from(p: LlmProvider) -> Self {
        match p {
            LlmProvider::OpenAi => "OPENAI".to_string(),
            LlmProvider::AzureOpenAi => "AZURE_OPENAI".to_string(),
            LlmProvider::HuggingFace => "HUGGINGFACE".to_string(),
            LlmProvider::Anthropic => "ANTHROPIC".to_string(),
            LlmProvider::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLlm {
    pub provider: LlmProvider,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Llm {
    pub id: String,
    pub provider: LlmProvider,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgent {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub initial_message: String,
    pub llm_model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachLlm {
    pub llm_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachTool {
    pub tool_id: String,
}

/// 函数工具的元数据：远端只保存函数名和参数 schema，执行在本地
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    pub function_name: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub metadata: ToolMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub tool_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<ToolMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_round_trips_known_and_unknown() {
        let known: LlmProvider = serde_json::from_value(json!("openai")).unwrap();
        assert_eq!(known, LlmProvider::OpenAi);
        assert_eq!(serde_json::to_value(&known).unwrap(), json!("OPENAI"));

        let other: LlmProvider = serde_json::from_value(json!("MISTRAL")).unwrap();
        assert_eq!(other, LlmProvider::Other("MISTRAL".to_string()));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("MISTRAL"));
    }

    #[test]
    fn create_tool_uses_wire_names() {
        let req = CreateTool {
            name: "Get weather".to_string(),
            description: "Look up the weather".to_string(),
            tool_type: "FUNCTION".to_string(),
            metadata: ToolMetadata {
                function_name: "get_weather".to_string(),
                args: json!({"location": {"type": "string"}}),
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["type"], "FUNCTION");
        assert_eq!(v["metadata"]["functionName"], "get_weather");
        assert_eq!(v["metadata"]["args"]["location"]["type"], "string");
    }

    #[test]
    fn create_agent_is_camel_case_and_skips_empty_avatar() {
        let req = CreateAgent {
            name: "a".into(),
            description: "d".into(),
            is_active: true,
            initial_message: "hi".into(),
            llm_model: "GPT_4_0613".into(),
            prompt: "p".into(),
            avatar: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["isActive"], true);
        assert_eq!(v["llmModel"], "GPT_4_0613");
        assert!(v.get("avatar").is_none());
    }

    #[test]
    fn envelope_without_data() {
        let env: Envelope<Llm> = serde_json::from_value(json!({"success": false})).unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
    }
}
