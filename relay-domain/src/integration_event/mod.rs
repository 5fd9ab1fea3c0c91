//! 集成事件（Integration Event）
//!
//! 定义发往消息总线的事件信封 `IntegrationEvent`、事件种类的封闭集合 `EventKind`，
//! 以及从存储 JSON 重建类型化信封的 `Reconstruction`。
//!
mod envelope;
mod kind;
mod reconstruction;

pub use envelope::{EventPayload, IntegrationEvent};
pub use kind::EventKind;
pub use reconstruction::Reconstruction;

/// 事件判别字段名
pub const EVENT_NAME_FIELD: &str = "event_name";
/// 事件时间字段名
pub const TIMESTAMP_FIELD: &str = "timestamp";
