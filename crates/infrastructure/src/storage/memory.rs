use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gently_core::{GentlyError, GentlyResult, SnapshotStore};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<Vec<u8>>,
    save_count: usize,
    fail_saves: bool,
}

/// 内存快照存储
///
/// 保存序列化后的字节而不是对象本身，和文件存储一样经过完整的编解码。
/// 克隆共享同一份状态，便于测试中在交给队列之后继续观察存储内容。
#[derive(Debug)]
pub struct InMemoryStore<S> {
    state: Arc<Mutex<MemoryState>>,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S> Clone for InMemoryStore<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            _snapshot: PhantomData,
        }
    }
}

impl<S> Default for InMemoryStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> InMemoryStore<S> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            _snapshot: PhantomData,
        }
    }

    /// 当前保存的原始文档
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.state().document.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state().save_count
    }

    /// 让之后的写入全部失败
    pub fn fail_saves(&self, fail: bool) {
        self.state().fail_saves = fail;
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> InMemoryStore<S>
where
    S: DeserializeOwned,
{
    /// 解码当前保存的快照
    pub fn snapshot(&self) -> Option<S> {
        self.bytes()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }
}

impl<S> SnapshotStore<S> for InMemoryStore<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> GentlyResult<Option<S>> {
        match self.bytes() {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &S) -> GentlyResult<()> {
        let mut state = self.state();
        if state.fail_saves {
            return Err(GentlyError::persistence_error("内存存储被设置为写入失败"));
        }
        let bytes =
            serde_json::to_vec(snapshot).map_err(|e| GentlyError::Serialization(e.to_string()))?;
        state.document = Some(bytes);
        state.save_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gently_core::models::QueueSnapshot;

    #[test]
    fn test_clones_share_state() {
        let store: InMemoryStore<QueueSnapshot> = InMemoryStore::new();
        let observer = store.clone();

        assert!(store.load().unwrap().is_none());
        store.save(&QueueSnapshot::new(Vec::new())).unwrap();

        assert_eq!(observer.save_count(), 1);
        assert!(observer.snapshot().unwrap().requests.is_empty());
    }

    #[test]
    fn test_failing_saves_keep_previous_document() {
        let store: InMemoryStore<QueueSnapshot> = InMemoryStore::new();
        store.save(&QueueSnapshot::new(Vec::new())).unwrap();
        let before = store.bytes();

        store.fail_saves(true);
        assert!(store.save(&QueueSnapshot::new(Vec::new())).is_err());
        assert_eq!(store.bytes(), before);
        assert_eq!(store.save_count(), 1);
    }
}
