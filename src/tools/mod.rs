pub mod builtins;
pub mod executor;
pub mod registry;

pub use executor::{StepExecutor, StepOutcome, StepRecord};
pub use registry::{FunctionRegistry, ToolFunction, ToolSpec};
