//! 统一错误定义
//!
//! 聚焦序列化/事件重建、连接与总线、Outbox 存储与生命周期管理等最小必要集合，
//! 便于在各适配层统一转换为 `RelayError`。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RelayError {
    // --- 序列化/事件重建 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
    #[error("unknown event kind: {event_name}")]
    UnknownEventKind { event_name: String },
    #[error("malformed event: event_name={event_name}, reason={reason}")]
    MalformedEvent { event_name: String, reason: String },

    // --- 连接与总线 ---
    #[error("connection error: attempts={attempts}, reason={reason}")]
    Connection { attempts: u32, reason: String },
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    Handler { handler: String, reason: String },

    // --- Outbox 持久化 ---
    #[error("outbox error: {reason}")]
    Outbox { reason: String },

    // --- 生命周期 ---
    #[error("disposal failed: {reason}")]
    Disposal { reason: String },

    // --- 通用 ---
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
}

impl RelayError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        RelayError::EventBus {
            reason: reason.into(),
        }
    }

    pub fn outbox(reason: impl Into<String>) -> Self {
        RelayError::Outbox {
            reason: reason.into(),
        }
    }

    pub fn connection(attempts: u32, reason: impl Into<String>) -> Self {
        RelayError::Connection {
            attempts,
            reason: reason.into(),
        }
    }

    pub fn handler(handler: impl Into<String>, err: anyhow::Error) -> Self {
        RelayError::Handler {
            handler: handler.into(),
            reason: format!("{err:#}"),
        }
    }
}

/// 统一 Result 类型别名
pub type RelayResult<T> = Result<T, RelayError>;

impl From<chrono::ParseError> for RelayError {
    fn from(err: chrono::ParseError) -> Self {
        RelayError::Parse {
            reason: err.to_string(),
        }
    }
}
