//! 事件总线（EventBus）协议
//!
//! 发布方向未连接时 `publish` 立即返回 `Ok(false)`，不做任何 I/O，调用方据此写入 Outbox；
//! 已连接但发送失败时返回错误。两者都应视为未投递。
//!
use super::Subscription;
use crate::{error::RelayResult as Result, integration_event::IntegrationEvent};
use async_trait::async_trait;
use std::time::Duration;

/// 事件总线：负责发布集成事件与注册订阅
#[async_trait]
pub trait EventBus: Send + Sync {
    fn is_publish_connected(&self) -> bool;

    fn is_subscribe_connected(&self) -> bool;

    /// 建立发布方向连接；`max_retries = 0` 表示无限重试
    async fn connect_publisher(&self, max_retries: u32, interval: Duration) -> Result<()>;

    /// 建立订阅方向连接；`max_retries = 0` 表示无限重试
    async fn connect_subscriber(&self, max_retries: u32, interval: Duration) -> Result<()>;

    /// 发布事件，返回是否确认投递
    async fn publish(&self, event: &IntegrationEvent, routing_key: &str) -> Result<bool>;

    /// 注册入站消费者；订阅方向未连接时返回 `Ok(false)`
    async fn subscribe(&self, subscription: Subscription) -> Result<bool>;

    /// 关闭两个方向的连接，幂等
    async fn dispose(&self) -> Result<()>;
}
