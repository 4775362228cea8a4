use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::tools::StepRecord;

/// 一轮对话：用户输入、agent 输出和本地执行的步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    pub at: DateTime<Utc>,
}

/// 会话。id 同时作为远端 invoke 的 sessionId
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: String,
    agent_id: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    turns: Vec<Turn>,
}

impl Session {
    pub fn new(agent_id: &str, name: Option<String>) -> Self {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            name,
            created_at: now,
            updated_at: now,
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn rename(&mut self, name: &str) {
        self.name = Some(name.to_string());
        self.updated_at = Utc::now();
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.updated_at = turn.at;
        self.turns.push(turn);
    }

    /// 只清空本地记录，远端会话历史不受影响
    pub fn clear(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }

    fn file_path(storage_path: &Path, id: &str) -> PathBuf {
        storage_path.join(format!("{}.json", id))
    }

    pub fn save(&self, storage_path: &Path) -> Result<()> {
        fs::create_dir_all(storage_path)?;
        let path = Self::file_path(storage_path, &self.id);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("保存会话失败：{}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("解析会话文件失败：{}", path.display()))?;
        Ok(session)
    }
}

/// 会话管理器
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    storage_path: PathBuf,
    current_session_id: Option<String>,
}

impl SessionManager {
    pub fn new(storage_path: PathBuf) -> Self {
        SessionManager {
            sessions: HashMap::new(),
            storage_path,
            current_session_id: None,
        }
    }

    /// 创建新会话并设为当前会话
    pub fn create(&mut self, agent_id: &str, name: Option<String>) -> &Session {
        let session = Session::new(agent_id, name);
        let id = session.id().to_string();
        tracing::info!(session = %id, "session created");

        self.current_session_id = Some(id.clone());
        self.sessions.entry(id).or_insert(session)
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn current(&self) -> Option<&Session> {
        self.current_session_id
            .as_ref()
            .and_then(|id| self.sessions.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut Session> {
        let id = self.current_session_id.as_ref()?;
        self.sessions.get_mut(id)
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn switch(&mut self, id: &str) -> bool {
        if self.sessions.contains_key(id) {
            self.current_session_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// 完整 ID 或唯一前缀匹配
    pub fn resolve(&self, id_or_prefix: &str) -> Option<&str> {
        if let Some((id, _)) = self.sessions.get_key_value(id_or_prefix) {
            return Some(id.as_str());
        }

        let mut matches = self
            .sessions
            .keys()
            .filter(|id| id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) if !id_or_prefix.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    /// 删除会话（内存和磁盘）
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if self.current_session_id.as_deref() == Some(id) {
            self.current_session_id = None;
        }

        let path = Session::file_path(&self.storage_path, id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("删除会话文件失败：{}", path.display()))?;
        }

        Ok(self.sessions.remove(id).is_some())
    }

    /// 按创建时间排序
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<_> = self.sessions.values().collect();
        sessions.sort_by_key(|s| s.created_at());
        sessions
    }

    pub fn save(&self, id: &str) -> Result<()> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("会话不存在：{}", id))?;
        session.save(&self.storage_path)
    }

    pub fn save_current(&self) -> Result<()> {
        let id = self
            .current_session_id
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("没有当前会话"))?;
        self.save(id)
    }

    pub fn load(&mut self, id: &str) -> Result<()> {
        let session = Session::load(&Session::file_path(&self.storage_path, id))?;
        self.sessions.insert(session.id().to_string(), session);
        Ok(())
    }

    /// 加载目录下所有会话，损坏的文件跳过
    pub fn load_all(&mut self) -> Result<usize> {
        if !self.storage_path.exists() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in fs::read_dir(&self.storage_path)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Session::load(&path) {
                Ok(session) => {
                    self.sessions.insert(session.id().to_string(), session);
                    loaded += 1;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping session file"),
            }
        }

        Ok(loaded)
    }

    /// 选择指定 agent 最近更新的会话作为当前会话
    pub fn resume_latest(&mut self, agent_id: &str) -> Option<&str> {
        let latest = self
            .sessions
            .values()
            .filter(|s| s.agent_id() == agent_id)
            .max_by_key(|s| s.updated_at())
            .map(|s| s.id().to_string())?;
        self.current_session_id = Some(latest);
        self.current_session_id.as_deref()
    }
}
