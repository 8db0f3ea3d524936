use crate::errors::GentlyResult;

/// 快照持久化接口
///
/// 队列与注册表各持有一个存储，每次变更后整体写回快照。实现只需保证
/// `save` 要么完整写入、要么返回错误。
pub trait SnapshotStore<S>: Send + Sync {
    /// 读取最近一次保存的快照，存储为空时返回 `None`
    fn load(&self) -> GentlyResult<Option<S>>;

    /// 整体写入快照
    fn save(&self, snapshot: &S) -> GentlyResult<()>;
}
