mod invoke;
mod resource;

pub use invoke::{AgentAction, IntermediateStep, InvokeRequest, Prediction};
pub use resource::{
    AgentResource, AttachLlm, AttachTool, CreateAgent, CreateLlm, CreateTool, Envelope, Llm,
    LlmProvider, ToolMetadata, ToolResource,
};
