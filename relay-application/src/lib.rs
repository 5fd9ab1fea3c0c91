//! 生产方应用服务
//!
//! 发布集成事件；总线未确认投递时写入 Outbox，交由 `EventBusTask` 周期补投。
//!
pub mod dto;
pub mod error;
pub mod publisher;

pub use dto::PublishOutcome;
pub use error::{AppError, AppResult};
pub use publisher::{EventPublisher, IntegrationEventPublisher};
