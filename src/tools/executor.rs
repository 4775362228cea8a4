use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::types::IntermediateStep;

use super::registry::FunctionRegistry;

/// 单个中间步骤的本地处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Executed { output: Value },
    Failed { error: String },
    InvalidArguments { error: String },
    /// 分发表中没有同名函数
    Unmatched,
    /// 超过 max_tool_calls，未执行
    Skipped,
}

impl StepOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, StepOutcome::Executed { .. })
    }

    /// 给用户看的一行描述
    pub fn summary(&self, tool: &str) -> String {
        match self {
            StepOutcome::Executed { output } => format!("✅ {} -> {}", tool, output),
            StepOutcome::Failed { error } => format!("❌ {} 执行失败：{}", tool, error),
            StepOutcome::InvalidArguments { error } => format!("❌ {} 参数无效：{}", tool, error),
            StepOutcome::Unmatched => format!("⚠️ 未找到工具对应的函数：{}", tool),
            StepOutcome::Skipped => format!("⏭️ {} 已跳过（超过单次调用上限）", tool),
        }
    }
}

/// 步骤及其结果，写入会话记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub tool: String,
    pub arguments: Value,
    #[serde(default)]
    pub observation: Value,
    pub outcome: StepOutcome,
}

/// 按工具名把中间步骤分发给本地函数
pub struct StepExecutor {
    registry: Arc<FunctionRegistry>,
    max_tool_calls: usize,
}

impl StepExecutor {
    pub fn new(registry: Arc<FunctionRegistry>, max_tool_calls: usize) -> Self {
        StepExecutor {
            registry,
            max_tool_calls,
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// 依次处理每个步骤，每个步骤恰好产生一个结果，不会中途中止
    pub fn dispatch(&self, steps: &[IntermediateStep]) -> Vec<StepRecord> {
        if steps.len() > self.max_tool_calls {
            tracing::warn!(
                steps = steps.len(),
                limit = self.max_tool_calls,
                "too many tool calls, extra steps skipped"
            );
        }

        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let action = step.action();
                let outcome = if index >= self.max_tool_calls {
                    StepOutcome::Skipped
                } else {
                    self.run(step)
                };

                StepRecord {
                    tool: action.tool.clone(),
                    arguments: action.tool_input.clone(),
                    observation: step.observation().clone(),
                    outcome,
                }
            })
            .collect()
    }

    fn run(&self, step: &IntermediateStep) -> StepOutcome {
        let action = step.action();

        let args = match action.arguments() {
            Ok(args) => args,
            Err(e) => return Self::outcome_for(&action.tool, e),
        };

        tracing::info!(tool = %action.tool, ?args, "calling tool");

        match self.registry.call(&action.tool, &args) {
            Ok(output) => {
                tracing::debug!(tool = %action.tool, %output, "tool finished");
                StepOutcome::Executed { output }
            }
            Err(e) => Self::outcome_for(&action.tool, e),
        }
    }

    fn outcome_for(tool: &str, error: DispatchError) -> StepOutcome {
        match error {
            DispatchError::UnknownTool(name) => {
                tracing::warn!("no function found for tool: {}", name);
                StepOutcome::Unmatched
            }
            DispatchError::InvalidArguments { reason, .. } => {
                tracing::warn!(%tool, %reason, "invalid tool arguments");
                StepOutcome::InvalidArguments { error: reason }
            }
            DispatchError::Failed { source, .. } => {
                tracing::warn!(%tool, error = %source, "tool failed");
                StepOutcome::Failed {
                    error: format!("{:#}", source),
                }
            }
        }
    }
}
