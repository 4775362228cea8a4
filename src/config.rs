use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// 配置根目录 ~/.agentlink
pub fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentlink")
}

/// 托管 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: std::env::var("AGENTLINK_API_URL")
                .unwrap_or_else(|_| "https://api.beta.superagent.sh".to_string()),
            api_key: std::env::var("AGENTLINK_API_KEY").ok(),
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl ApiConfig {
    /// 返回 API key，未配置时报错
    pub fn resolved_api_key(&self) -> Result<&str, ApiError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ApiError::MissingApiKey)
    }
}

/// 远端 Agent 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub initial_message: String,
    pub llm_provider: String,
    pub llm_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    pub max_tool_calls: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            name: "agentlink".to_string(),
            description: "Assistant that calls local functions".to_string(),
            prompt: "You are a helpful assistant. Use the available tools when they help answer the question.".to_string(),
            initial_message: "Hi there, how can I help you?".to_string(),
            llm_provider: "OPENAI".to_string(),
            llm_model: "GPT_3_5_TURBO_16K_0613".to_string(),
            llm_api_key: std::env::var("OPENAI_API_KEY").ok(),
            max_tool_calls: 5,
        }
    }
}

/// Workspace 配置（文件类工具的根目录）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            root: base_dir().join("workspace"),
        }
    }
}

/// Session 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage_path: PathBuf,
    pub auto_save: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            storage_path: base_dir().join("sessions"),
            auto_save: true,
        }
    }
}

/// 统一配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub agent: AgentConfig,
    pub workspace: WorkspaceConfig,
    pub session: SessionConfig,
}

impl Config {
    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败：{}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败：{}", path.display()))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        base_dir().join("config.toml")
    }

    /// 从默认位置加载配置
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    /// setup 生成的远端资源记录
    pub fn deployment_path(&self) -> PathBuf {
        base_dir().join("deployment.toml")
    }

    pub fn ensure_workspace(&self) -> Result<()> {
        fs::create_dir_all(&self.workspace.root)?;
        Ok(())
    }

    pub fn ensure_sessions(&self) -> Result<()> {
        fs::create_dir_all(&self.session.storage_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.agent.max_tool_calls, 5);
        assert!(config.session.auto_save);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[api]
base_url = "http://localhost:9000"
max_retries = 1

[agent]
max_tool_calls = 2
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.max_retries, 1);
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.agent.max_tool_calls, 2);
        assert_eq!(config.agent.llm_provider, "OPENAI");
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.agent.name = "weather-bot".to_string();
        config.api.api_key = Some("secret".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.agent.name, "weather-bot");
        assert_eq!(loaded.api.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn blank_api_key_is_missing() {
        let api = ApiConfig {
            api_key: Some("  ".to_string()),
            ..ApiConfig::default()
        };
        assert!(matches!(api.resolved_api_key(), Err(ApiError::MissingApiKey)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\nbase_url = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
