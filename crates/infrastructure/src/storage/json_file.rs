use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use gently_core::{GentlyError, GentlyResult, SnapshotStore};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// 基于 JSON 文件的快照存储
///
/// 先写入同目录下的临时文件再重命名覆盖，读者不会看到写了一半的文档。
#[derive(Debug, Clone)]
pub struct JsonFileStore<S> {
    path: PathBuf,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S> JsonFileStore<S> {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _snapshot: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<S> SnapshotStore<S> for JsonFileStore<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> GentlyResult<Option<S>> {
        if !self.path.exists() {
            debug!("快照文件不存在，按空存储处理: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            GentlyError::persistence_error(format!("读取 {} 失败: {e}", self.path.display()))
        })?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &S) -> GentlyResult<()> {
        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| GentlyError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, content).map_err(|e| {
            GentlyError::persistence_error(format!("写入 {} 失败: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            GentlyError::persistence_error(format!("替换 {} 失败: {e}", self.path.display()))
        })?;

        debug!("快照已写入: {}", self.path.display());
        Ok(())
    }
}
