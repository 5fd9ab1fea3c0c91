//! 集成事件中继（relay-domain）
//!
//! 在消息代理可能短暂不可用的前提下，为集成事件提供“至少一次”投递：
//! - 发布/订阅两个方向独立的连接重试状态机（`connection`）；
//! - 持久化发布失败事件的发件箱（`outbox`）；
//! - 连接后立即、之后周期性清扫发件箱的调度器（`eventing::EventBusTask`）；
//! - 封闭的事件种类集合与类型化重建（`integration_event`、`model`）。
//!
//! 本 crate 与具体消息代理及数据库解耦，仅定义协议（`BrokerTransport`、`OutboxStore`），
//! 并提供内存实现以便测试与本地开发。
//!
//! 典型用法：
//! 1. 为两个方向各提供一个 `BrokerTransport`，构造 `BrokerEventBus`；
//! 2. 选择 `OutboxStore` 实现；
//! 3. 使用 `EventBusTask::builder()` 装配并 `run()`，退出前 `stop()`。
//!
pub mod connection;
pub mod error;
pub mod eventing;
pub mod integration_event;
pub mod model;
pub mod outbox;
