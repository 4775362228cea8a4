use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::tools::registry::{required_str, FunctionRegistry, ToolSpec};

/// 限定在 workspace 内的文件工具
#[derive(Debug, Clone)]
pub struct FsTools {
    workspace_root: PathBuf,
}

impl FsTools {
    pub fn new(workspace_root: PathBuf) -> Self {
        FsTools { workspace_root }
    }

    /// 注册 fs_read / fs_write / fs_list
    pub fn register_all(self, registry: &mut FunctionRegistry) {
        let tools = Arc::new(self);

        let t = Arc::clone(&tools);
        registry.register_fn(
            ToolSpec::new(
                "fs_read",
                "Read file",
                "读取 workspace 内的文件内容",
                json!({"path": {"type": "string", "description": "相对于 workspace 的文件路径"}}),
            ),
            move |args| t.read(required_str(args, "path")?),
        );

        let t = Arc::clone(&tools);
        registry.register_fn(
            ToolSpec::new(
                "fs_write",
                "Write file",
                "写入文件到 workspace 内（覆盖模式）",
                json!({
                    "path": {"type": "string", "description": "相对于 workspace 的文件路径"},
                    "content": {"type": "string", "description": "文件内容"}
                }),
            ),
            move |args| t.write(required_str(args, "path")?, required_str(args, "content")?),
        );

        let t = tools;
        registry.register_fn(
            ToolSpec::new(
                "fs_list",
                "List directory",
                "列出 workspace 内的目录内容",
                json!({"path": {"type": "string", "description": "相对于 workspace 的目录路径，默认根目录"}}),
            ),
            move |args: &Map<String, Value>| {
                let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
                t.list(path)
            },
        );
    }

    /// 解析路径，拒绝绝对路径、`..` 以及经符号链接指向 workspace 外的路径
    fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if escapes {
            return Err(anyhow::anyhow!("路径超出 workspace 范围：{}", path));
        }

        let full_path = self.workspace_root.join(relative);

        // workspace 尚未创建时其中不可能有符号链接
        let Ok(root) = fs::canonicalize(&self.workspace_root) else {
            return Ok(full_path);
        };

        // 待写入的文件可能还不存在，检查已存在的最深一级
        let existing = full_path
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(self.workspace_root.as_path());
        let real = fs::canonicalize(existing)
            .with_context(|| format!("无法解析路径：{}", path))?;

        if !real.starts_with(&root) {
            return Err(anyhow::anyhow!("路径超出 workspace 范围：{}", path));
        }

        Ok(full_path)
    }

    pub fn read(&self, path: &str) -> Result<Value> {
        let full_path = self.resolve_path(path)?;
        let content = fs::read_to_string(&full_path)
            .with_context(|| format!("读取文件失败：{}", path))?;
        Ok(json!({ "path": path, "content": content }))
    }

    pub fn write(&self, path: &str, content: &str) -> Result<Value> {
        let full_path = self.resolve_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&full_path, content).with_context(|| format!("写入文件失败：{}", path))?;
        Ok(json!({ "path": path, "bytes": content.len() }))
    }

    pub fn list(&self, path: &str) -> Result<Value> {
        let full_path = self.resolve_path(path)?;

        if !full_path.is_dir() {
            return Err(anyhow::anyhow!("目录不存在：{}", path));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&full_path).with_context(|| format!("读取目录失败：{}", path))? {
            let entry = entry?;
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "dir": entry.path().is_dir(),
            }));
        }

        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        Ok(Value::Array(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> (tempfile::TempDir, FsTools) {
        let dir = tempfile::tempdir().unwrap();
        let tools = FsTools::new(dir.path().to_path_buf());
        (dir, tools)
    }

    #[test]
    fn write_then_read() {
        let (_dir, tools) = tools();
        let written = tools.write("notes/todo.txt", "buy milk").unwrap();
        assert_eq!(written["bytes"], 8);

        let read = tools.read("notes/todo.txt").unwrap();
        assert_eq!(read["content"], "buy milk");
    }

    #[test]
    fn list_is_sorted_and_marks_dirs() {
        let (_dir, tools) = tools();
        tools.write("b.txt", "").unwrap();
        tools.write("a/inner.txt", "").unwrap();

        let listed = tools.list(".").unwrap();
        let names: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b.txt"]);
        assert_eq!(listed[0]["dir"], true);
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let (_dir, tools) = tools();
        assert!(tools.read("../etc/passwd").is_err());
        assert!(tools.read("/etc/passwd").is_err());
        assert!(tools.write("a/../../x", "x").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_out_of_the_workspace_are_rejected() {
        let (dir, tools) = tools();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(tools.read("link/secret.txt").is_err());
        assert!(tools.write("link/new.txt", "x").is_err());
        assert!(tools.list("link").is_err());
        assert!(!outside.path().join("new.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_inside_the_workspace_still_work() {
        let (dir, tools) = tools();
        tools.write("real/a.txt", "hi").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        assert_eq!(tools.read("alias/a.txt").unwrap()["content"], "hi");
    }

    #[test]
    fn listing_a_missing_directory_fails() {
        let (_dir, tools) = tools();
        assert!(tools.list("nope").is_err());
    }
}
