//! 事件发件箱（outbox）
//!
//! 持久化发布失败的集成事件，等待调度器补偿投递：
//! - `OutboxRecord`/`NewOutboxRecord`：记录的存储形态与线上文档格式；
//! - `OutboxStore`：存储协议（创建、查询、删除、死信）；
//! - `InMemoryOutboxStore`：内存实现，用于测试与本地开发。
//!
//! 记录只会因发布失败而创建，只会在同一事件确认投递后被删除，不做原地更新。
//!
mod in_memory;
mod record;
mod store;

pub use in_memory::{DeadLetter, InMemoryOutboxStore};
pub use record::{
    NewOutboxRecord, OPERATION_FIELD, OutboxOperation, OutboxRecord, ROUTING_KEY_FIELD,
};
pub use store::{OutboxQuery, OutboxStore};
