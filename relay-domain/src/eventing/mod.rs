//! 事件子系统（eventing）
//!
//! 提供集成事件发布/订阅与补偿投递的抽象与运行时：
//! - `EventBus`：统一发布/订阅接口，断线时发布返回 `false` 而不是报错；
//! - `BrokerEventBus`：基于两条独立连接（发布/订阅）的总线实现；
//! - `IntegrationEventHandler`：对外部事件进行消费处理；
//! - `EventBusTask`：编排订阅注册与 Outbox 补偿投递（连接后立即清扫，之后周期清扫）。
//!
pub mod broker_bus;
pub mod bus;
pub mod config;
pub mod handler;
pub mod sweep;
pub mod task;

pub use broker_bus::BrokerEventBus;
pub use bus::EventBus;
pub use config::EventBusTaskConfig;
pub use handler::{IntegrationEventHandler, Subscription};
pub use sweep::{ReplayOutcome, SweepReport, SweepSkip};
pub use task::EventBusTask;
