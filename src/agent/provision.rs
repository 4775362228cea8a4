use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::AgentConfig;
use crate::tools::FunctionRegistry;
use crate::types::{CreateAgent, CreateLlm, LlmProvider};

use super::client::ApiClient;

/// setup 在远端创建的资源。已删除的资源 id 置空
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub llm_id: String,
    /// 函数名 -> 远端 tool id
    #[serde(default)]
    pub tools: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let deployment = toml::from_str(&content)
            .with_context(|| format!("解析部署文件失败：{}", path.display()))?;
        Ok(Some(deployment))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// 远端资源已全部删除
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_empty() && self.llm_id.is_empty() && self.tools.is_empty()
    }

    /// 本地分发表里有、但远端未注册的函数
    pub fn missing_tools<'a>(&self, registry: &'a FunctionRegistry) -> Vec<&'a str> {
        registry
            .names()
            .into_iter()
            .filter(|name| !self.tools.contains_key(*name))
            .collect()
    }
}

/// 创建 LLM、agent，并把分发表中的每个函数注册成远端工具
///
/// 中途失败时删除已创建的资源再返回错误。
pub async fn provision(
    client: &ApiClient,
    config: &AgentConfig,
    registry: &FunctionRegistry,
) -> Result<Deployment> {
    let llm_api_key = config
        .llm_api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .context("未配置 LLM API key（设置 OPENAI_API_KEY 或 agent.llm_api_key）")?;

    let mut deployment = Deployment {
        agent_id: String::new(),
        llm_id: String::new(),
        tools: BTreeMap::new(),
        created_at: Utc::now(),
    };

    if let Err(e) = create_resources(client, config, registry, &llm_api_key, &mut deployment).await {
        tracing::warn!(error = %e, "provisioning failed, rolling back");
        let failures = teardown(client, &mut deployment).await;
        if failures > 0 {
            return Err(e.context(format!("回滚未完成，残留资源：{:?}", deployment)));
        }
        return Err(e);
    }

    Ok(deployment)
}

/// 每创建一个资源就记入 deployment，失败时可据此回滚
async fn create_resources(
    client: &ApiClient,
    config: &AgentConfig,
    registry: &FunctionRegistry,
    llm_api_key: &str,
    deployment: &mut Deployment,
) -> Result<()> {
    let llm = client
        .create_llm(&CreateLlm {
            provider: LlmProvider::from(config.llm_provider.clone()),
            api_key: llm_api_key.to_string(),
            options: None,
        })
        .await
        .context("创建 LLM 失败")?;
    tracing::info!(llm = %llm.id, "llm created");
    deployment.llm_id = llm.id;

    let agent = client
        .create_agent(&CreateAgent {
            name: config.name.clone(),
            description: config.description.clone(),
            is_active: true,
            initial_message: config.initial_message.clone(),
            llm_model: config.llm_model.clone(),
            prompt: config.prompt.clone(),
            avatar: None,
        })
        .await
        .context("创建 agent 失败")?;
    tracing::info!(agent = %agent.id, "agent created");
    deployment.agent_id = agent.id;

    client
        .add_llm(&deployment.agent_id, &deployment.llm_id)
        .await
        .context("绑定 LLM 失败")?;

    for spec in registry.specs() {
        let tool = client
            .create_tool(&spec.to_create_request())
            .await
            .with_context(|| format!("创建工具失败：{}", spec.function_name))?;
        deployment
            .tools
            .insert(spec.function_name.clone(), tool.id.clone());

        client
            .add_tool(&deployment.agent_id, &tool.id)
            .await
            .with_context(|| format!("绑定工具失败：{}", spec.function_name))?;
        tracing::info!(tool = %spec.function_name, id = %tool.id, "tool attached");
    }

    Ok(())
}

/// 依次删除工具、agent、LLM，单个失败不影响其余删除；返回失败数
///
/// 删除成功（或远端已不存在）的 id 会从 deployment 中移除，失败后重跑只处理剩余资源。
pub async fn teardown(client: &ApiClient, deployment: &mut Deployment) -> usize {
    let mut failures = 0;

    let tools = std::mem::take(&mut deployment.tools);
    for (name, id) in tools {
        match client.delete_tool(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(tool = %name, %id, "tool already gone");
            }
            Err(e) => {
                tracing::warn!(tool = %name, %id, error = %e, "failed to delete tool");
                deployment.tools.insert(name, id);
                failures += 1;
            }
        }
    }

    if !deployment.agent_id.is_empty() {
        match client.delete_agent(&deployment.agent_id).await {
            Ok(()) => deployment.agent_id.clear(),
            Err(e) if e.is_not_found() => deployment.agent_id.clear(),
            Err(e) => {
                tracing::warn!(agent = %deployment.agent_id, error = %e, "failed to delete agent");
                failures += 1;
            }
        }
    }

    if !deployment.llm_id.is_empty() {
        match client.delete_llm(&deployment.llm_id).await {
            Ok(()) => deployment.llm_id.clear(),
            Err(e) if e.is_not_found() => deployment.llm_id.clear(),
            Err(e) => {
                tracing::warn!(llm = %deployment.llm_id, error = %e, "failed to delete llm");
                failures += 1;
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolSpec;
    use serde_json::json;

    fn deployment() -> Deployment {
        Deployment {
            agent_id: "agent-1".into(),
            llm_id: "llm-1".into(),
            tools: BTreeMap::from([("get_time".to_string(), "tool-1".to_string())]),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn deployment_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.toml");
        assert!(Deployment::load(&path).unwrap().is_none());

        let original = deployment();
        original.save(&path).unwrap();
        assert_eq!(Deployment::load(&path).unwrap(), Some(original));
    }

    #[test]
    fn emptied_deployment_is_empty() {
        let mut d = deployment();
        assert!(!d.is_empty());
        d.agent_id.clear();
        d.llm_id.clear();
        d.tools.clear();
        assert!(d.is_empty());
    }

    #[test]
    fn missing_tools_lists_unregistered_functions() {
        let mut registry = FunctionRegistry::new();
        registry.register_fn(ToolSpec::new("get_time", "t", "", json!({})), |_| Ok(json!(0)));
        registry.register_fn(ToolSpec::new("get_weather", "w", "", json!({})), |_| Ok(json!(0)));

        assert_eq!(deployment().missing_tools(&registry), vec!["get_weather"]);
    }
}
