//! 发件箱存储协议（OutboxStore）
//!
//! 生产方在发布失败时写入，调度器读取、重放并在确认投递后删除。
//! 调度器是唯一的删除方，记录不做原地更新。
//!
use super::{NewOutboxRecord, OutboxRecord};
use crate::error::RelayResult;
use async_trait::async_trait;
use bon::Builder;

/// 查询条件，默认匹配全部待投递记录
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboxQuery {
    /// 只返回指定事件名的记录
    #[builder(into)]
    event_name: Option<String>,
    /// 最多返回的记录数
    limit: Option<usize>,
}

impl OutboxQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, record: &OutboxRecord) -> bool {
        match &self.event_name {
            Some(name) => record.event_name() == Some(name.as_str()),
            None => true,
        }
    }
}

/// 发件箱存储
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// 持久化记录并分配唯一 ID；事件内容原样保存
    async fn create(&self, record: NewOutboxRecord) -> RelayResult<OutboxRecord>;

    /// 按插入顺序返回匹配的待投递记录
    async fn find(&self, query: &OutboxQuery) -> RelayResult<Vec<OutboxRecord>>;

    /// 删除记录，返回记录此前是否存在
    async fn delete(&self, id: &str) -> RelayResult<bool>;

    /// 将无法重建的记录移入死信区，返回记录此前是否存在
    async fn dead_letter(&self, id: &str, reason: &str) -> RelayResult<bool>;

    async fn count(&self) -> RelayResult<usize> {
        Ok(self.find(&OutboxQuery::all()).await?.len())
    }
}
