pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod tools;
pub mod types;

pub use agent::{Agent, ApiClient, Deployment, Reply};
pub use cli::run_cli;
pub use config::{AgentConfig, ApiConfig, Config, SessionConfig, WorkspaceConfig};
pub use error::{ApiError, DispatchError};
pub use tools::{FunctionRegistry, StepExecutor, StepOutcome, ToolSpec};
