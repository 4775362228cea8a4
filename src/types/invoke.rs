use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    pub input: String,
    pub session_id: String,
    pub enable_streaming: bool,
}

/// Agent 调用结果
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub intermediate_steps: Vec<IntermediateStep>,
}

/// 远端 agent 选择的工具及参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub log: Option<String>,
}

impl AgentAction {
    /// 把 tool_input 规整成参数对象
    ///
    /// 对象原样使用；能解析为 JSON 对象的字符串先解析；其余字符串放进
    /// `{"input": ...}`；null 视为空参数。
    pub fn arguments(&self) -> Result<Map<String, Value>, DispatchError> {
        match &self.tool_input {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Ok(map),
                _ => {
                    let mut map = Map::new();
                    map.insert("input".to_string(), Value::String(s.clone()));
                    Ok(map)
                }
            },
            other => Err(DispatchError::InvalidArguments {
                tool: self.tool.clone(),
                reason: format!("不支持的参数类型：{}", other),
            }),
        }
    }
}

/// 中间步骤：`[action, observation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateStep(pub AgentAction, pub Value);

impl IntermediateStep {
    pub fn action(&self) -> &AgentAction {
        &self.0
    }

    pub fn observation(&self) -> &Value {
        &self.1
    }
}
