use crate::error::RelayResult;
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 从代理收到的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// 消息代理客户端协议
///
/// 每个实例对应一条独立连接；发布与订阅方向各持有一个实例。
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// 建立一次连接，失败即返回错误，不做重试
    async fn connect(&self) -> RelayResult<()>;

    /// 挂起直到当前连接断开；未连接时立即返回
    async fn disconnected(&self);

    async fn send(&self, routing_key: &str, body: &[u8]) -> RelayResult<()>;

    /// 返回指定路由键的 'static 消息流，便于在 tokio::spawn 中消费；连接断开时流结束
    async fn consume(
        &self,
        routing_key: &str,
    ) -> RelayResult<BoxStream<'static, RelayResult<Delivery>>>;

    async fn close(&self) -> RelayResult<()>;
}
