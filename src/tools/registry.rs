use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::types::{CreateTool, ToolMetadata};

use super::builtins::{clock, fs::FsTools};

/// 本地函数：参数对象 -> JSON 结果
pub type ToolFunction = Arc<dyn Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

/// 工具描述，既用于注册远端 Tool，也作为本地分发表的键
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub function_name: String,
    pub display_name: String,
    pub description: String,
    /// 参数 schema：参数名 -> {type, description}
    pub args: Value,
}

impl ToolSpec {
    pub fn new(function_name: &str, display_name: &str, description: &str, args: Value) -> Self {
        ToolSpec {
            function_name: function_name.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            args,
        }
    }

    pub fn to_create_request(&self) -> CreateTool {
        CreateTool {
            name: self.display_name.clone(),
            description: self.description.clone(),
            tool_type: "FUNCTION".to_string(),
            metadata: ToolMetadata {
                function_name: self.function_name.clone(),
                args: self.args.clone(),
            },
        }
    }
}

struct Entry {
    spec: ToolSpec,
    function: ToolFunction,
}

/// 工具名 -> 本地函数的分发表
#[derive(Default)]
pub struct FunctionRegistry {
    entries: BTreeMap<String, Entry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置工具：get_time 和 workspace 文件工具
    pub fn with_builtins(workspace_root: PathBuf) -> Self {
        let mut registry = Self::new();
        registry.register_fn(clock::spec(), clock::execute);
        FsTools::new(workspace_root).register_all(&mut registry);
        registry
    }

    /// 注册函数，同名覆盖
    pub fn register(&mut self, spec: ToolSpec, function: ToolFunction) {
        let name = spec.function_name.clone();
        if self.entries.contains_key(&name) {
            tracing::warn!(tool = %name, "tool already registered, replacing");
        }
        self.entries.insert(name, Entry { spec, function });
    }

    pub fn register_fn<F>(&mut self, spec: ToolSpec, function: F)
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(spec, Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<ToolFunction> {
        self.entries.get(name).map(|e| Arc::clone(&e.function))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.entries.values().map(|e| &e.spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn call(&self, name: &str, args: &Map<String, Value>) -> Result<Value, DispatchError> {
        let function = self
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        function(args).map_err(|source| DispatchError::Failed {
            tool: name.to_string(),
            source,
        })
    }
}

/// 取必填字符串参数
pub fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("缺少 {} 参数", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_spec() -> ToolSpec {
        ToolSpec::new(
            "echo",
            "Echo",
            "Returns its input",
            json!({"text": {"type": "string"}}),
        )
    }

    #[test]
    fn registered_function_is_callable_by_name() {
        let mut registry = FunctionRegistry::new();
        registry.register_fn(echo_spec(), |args| Ok(json!(required_str(args, "text")?)));

        let mut args = Map::new();
        args.insert("text".into(), json!("hi"));
        assert_eq!(registry.call("echo", &args).unwrap(), json!("hi"));
        assert!(registry.contains("echo"));
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn unknown_tool_is_reported() {
        let registry = FunctionRegistry::new();
        let err = registry.call("missing", &Map::new()).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool(name) if name == "missing"));
    }

    #[test]
    fn function_errors_carry_tool_name() {
        let mut registry = FunctionRegistry::new();
        registry.register_fn(echo_spec(), |args| Ok(json!(required_str(args, "text")?)));

        let err = registry.call("echo", &Map::new()).unwrap_err();
        match err {
            DispatchError::Failed { tool, source } => {
                assert_eq!(tool, "echo");
                assert!(source.to_string().contains("text"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn re_registering_replaces_entry() {
        let mut registry = FunctionRegistry::new();
        registry.register_fn(echo_spec(), |_| Ok(json!(1)));
        registry.register_fn(echo_spec(), |_| Ok(json!(2)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.call("echo", &Map::new()).unwrap(), json!(2));
    }

    #[test]
    fn spec_builds_function_tool_request() {
        let req = echo_spec().to_create_request();
        assert_eq!(req.name, "Echo");
        assert_eq!(req.tool_type, "FUNCTION");
        assert_eq!(req.metadata.function_name, "echo");
    }

    #[test]
    fn builtins_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FunctionRegistry::with_builtins(dir.path().to_path_buf());
        for name in ["get_time", "fs_read", "fs_write", "fs_list"] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }
}
