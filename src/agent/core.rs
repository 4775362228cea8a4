use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::tools::{FunctionRegistry, StepExecutor, StepRecord};

use super::client::ApiClient;
use super::provision::Deployment;
use super::session::{SessionManager, Turn};

/// 一次 ask 的结果
#[derive(Debug, Clone)]
pub struct Reply {
    pub output: String,
    pub steps: Vec<StepRecord>,
}

impl Reply {
    pub fn executed(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_executed()).count()
    }
}

pub struct Agent {
    client: ApiClient,
    executor: StepExecutor,
    session_manager: SessionManager,
    deployment: Deployment,
    auto_save: bool,
}

impl Agent {
    pub fn new(
        client: ApiClient,
        deployment: Deployment,
        registry: Arc<FunctionRegistry>,
        max_tool_calls: usize,
        session_config: SessionConfig,
    ) -> Self {
        let mut session_manager = SessionManager::new(session_config.storage_path);

        if let Err(e) = session_manager.load_all() {
            tracing::warn!(error = %e, "failed to load sessions");
        }

        // 继续该 agent 最近的会话，没有则新建
        if session_manager.resume_latest(&deployment.agent_id).is_none() {
            session_manager.create(&deployment.agent_id, None);
        }

        let missing = deployment.missing_tools(&registry);
        if !missing.is_empty() {
            tracing::warn!(?missing, "local functions not registered remotely, run setup again");
        }

        Agent {
            client,
            executor: StepExecutor::new(registry, max_tool_calls),
            session_manager,
            deployment,
            auto_save: session_config.auto_save,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.session_manager.current_session_id()
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session_manager
    }

    pub fn session_manager_mut(&mut self) -> &mut SessionManager {
        &mut self.session_manager
    }

    /// 新建会话并切换过去
    pub fn new_session(&mut self, name: Option<String>) -> String {
        self.session_manager
            .create(&self.deployment.agent_id, name)
            .id()
            .to_string()
    }

    /// 调用远端 agent，把中间步骤分发给本地函数，记录本轮对话
    pub async fn ask(&mut self, input: &str) -> Result<Reply> {
        let input = input.trim();
        if input.is_empty() {
            return Err(anyhow!("输入不能为空"));
        }

        let session_id = self
            .session_manager
            .current_session_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("没有当前会话"))?;

        let prediction = self
            .client
            .invoke(&self.deployment.agent_id, input, &session_id)
            .await
            .context("调用 agent 失败")?;

        tracing::info!(
            session = %session_id,
            steps = prediction.intermediate_steps.len(),
            "agent replied"
        );

        let steps = self.executor.dispatch(&prediction.intermediate_steps);

        if let Some(session) = self.session_manager.current_mut() {
            session.push_turn(Turn {
                input: input.to_string(),
                output: prediction.output.clone(),
                steps: steps.clone(),
                at: Utc::now(),
            });
        }

        if self.auto_save {
            if let Err(e) = self.session_manager.save_current() {
                tracing::warn!(error = %e, "failed to save session");
            }
        }

        Ok(Reply {
            output: prediction.output,
            steps,
        })
    }

    /// 清空当前会话的本地记录，开启 auto_save 时同步写盘
    pub fn clear_history(&mut self) -> Result<()> {
        if let Some(session) = self.session_manager.current_mut() {
            session.clear();
        }

        if self.auto_save {
            self.session_manager.save_current()?;
        }
        Ok(())
    }
}
