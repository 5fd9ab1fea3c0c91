use crate::error::{RelayError, RelayResult};
use crate::integration_event::{EVENT_NAME_FIELD, IntegrationEvent, Reconstruction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 控制字段：待执行的操作
pub const OPERATION_FIELD: &str = "__operation";
/// 控制字段：目标路由键
pub const ROUTING_KEY_FIELD: &str = "__routing_key";

/// 记录对应的待执行操作（目前只有发布）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxOperation {
    #[default]
    Publish,
}

impl OutboxOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            OutboxOperation::Publish => "publish",
        }
    }

    pub fn parse(value: &str) -> RelayResult<Self> {
        match value {
            "publish" => Ok(OutboxOperation::Publish),
            other => Err(RelayError::Parse {
                reason: format!("unsupported outbox operation: {other}"),
            }),
        }
    }
}

impl fmt::Display for OutboxOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待写入的记录（尚未分配 ID）
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxRecord {
    event: Value,
    operation: OutboxOperation,
    routing_key: String,
}

impl NewOutboxRecord {
    /// 为一次失败的发布构造记录
    pub fn publish(event: &IntegrationEvent, routing_key: impl Into<String>) -> RelayResult<Self> {
        Ok(Self {
            event: event.to_json()?,
            operation: OutboxOperation::Publish,
            routing_key: routing_key.into(),
        })
    }

    /// 从原始事件文档构造记录，事件内容原样保存
    pub fn from_raw(event: Value, routing_key: impl Into<String>) -> Self {
        Self {
            event,
            operation: OutboxOperation::Publish,
            routing_key: routing_key.into(),
        }
    }

    /// 解析线上文档（事件字段 + `__operation` + `__routing_key`）
    pub fn from_document(document: Value) -> RelayResult<Self> {
        let Value::Object(mut fields) = document else {
            return Err(RelayError::outbox("outbox document must be a JSON object"));
        };

        let operation = match fields.remove(OPERATION_FIELD) {
            None => OutboxOperation::Publish,
            Some(Value::String(op)) => OutboxOperation::parse(&op)?,
            Some(other) => {
                return Err(RelayError::outbox(format!(
                    "{OPERATION_FIELD} must be a string, found {other}"
                )));
            }
        };

        let routing_key = match fields.remove(ROUTING_KEY_FIELD) {
            Some(Value::String(key)) => key,
            _ => {
                return Err(RelayError::outbox(format!(
                    "{ROUTING_KEY_FIELD} is missing or not a string"
                )));
            }
        };

        Ok(Self {
            event: Value::Object(fields),
            operation,
            routing_key,
        })
    }

    pub fn from_json_str(json: &str) -> RelayResult<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn event(&self) -> &Value {
        &self.event
    }

    pub fn operation(&self) -> OutboxOperation {
        self.operation
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// 检查记录能否以存储形态表示
    pub fn validate(&self) -> RelayResult<()> {
        if !self.event.is_object() {
            return Err(RelayError::outbox("outbox event must be a JSON object"));
        }
        if self.routing_key.trim().is_empty() {
            return Err(RelayError::outbox("outbox routing key must not be empty"));
        }
        Ok(())
    }

    /// 分配 ID 后成为持久化记录
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> OutboxRecord {
        OutboxRecord {
            id,
            event: self.event,
            operation: self.operation,
            routing_key: self.routing_key,
            created_at,
        }
    }
}

/// 已持久化的发件箱记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    id: String,
    /// 事件文档（可能是任意、甚至损坏的 JSON 对象）
    event: Value,
    operation: OutboxOperation,
    routing_key: String,
    created_at: DateTime<Utc>,
}

impl OutboxRecord {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &Value {
        &self.event
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event.get(EVENT_NAME_FIELD).and_then(Value::as_str)
    }

    pub fn operation(&self) -> OutboxOperation {
        self.operation
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 从存储的 JSON 重新派生一份类型化信封
    pub fn reconstruct(&self) -> Reconstruction {
        Reconstruction::from_json(&self.event)
    }

    /// 线上文档格式
    pub fn to_document(&self) -> Value {
        let mut doc = match &self.event {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        doc.insert(
            OPERATION_FIELD.to_string(),
            Value::String(self.operation.as_str().to_string()),
        );
        doc.insert(
            ROUTING_KEY_FIELD.to_string(),
            Value::String(self.routing_key.clone()),
        );
        Value::Object(doc)
    }
}
