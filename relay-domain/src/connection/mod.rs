//! 连接管理（connection）
//!
//! - `BrokerTransport`：底层消息代理客户端的最小协议（连接、断线通知、收发、关闭）；
//! - `ConnectionManager`：单方向（发布或订阅）的连接/重试状态机，断线后自动重连；
//! - `InMemoryBroker`/`InMemoryTransport`：内存代理，支持故障注入，用于测试与示例。
//!
mod in_memory;
mod manager;
mod transport;

pub use in_memory::{InMemoryBroker, InMemoryTransport};
pub use manager::{ConnectionManager, Direction};
pub use transport::{BrokerTransport, Delivery};
