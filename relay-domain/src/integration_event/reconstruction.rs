use super::{EVENT_NAME_FIELD, EventKind, EventPayload, IntegrationEvent, TIMESTAMP_FIELD};
use crate::error::{RelayError, RelayResult};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// 事件重建结果
///
/// 未识别与损坏的记录以显式变体返回，并保留原始文档，便于统计、告警与人工恢复。
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstruction {
    Known(IntegrationEvent),
    /// `event_name` 缺失或不在已知集合中
    Unrecognized {
        event_name: Option<String>,
        raw: Value,
    },
    /// 事件种类已知，但时间戳或负载无法重建
    Malformed {
        kind: EventKind,
        reason: String,
        raw: Value,
    },
}

impl Reconstruction {
    pub fn from_json(value: &Value) -> Self {
        let event_name = value.get(EVENT_NAME_FIELD).and_then(Value::as_str);
        let Some(kind) = event_name.and_then(EventKind::from_event_name) else {
            return Reconstruction::Unrecognized {
                event_name: event_name.map(str::to_string),
                raw: value.clone(),
            };
        };

        match Self::known(kind, value) {
            Ok(event) => Reconstruction::Known(event),
            Err(e) => Reconstruction::Malformed {
                kind,
                reason: e.to_string(),
                raw: value.clone(),
            },
        }
    }

    fn known(kind: EventKind, value: &Value) -> RelayResult<IntegrationEvent> {
        let timestamp = match value.get(TIMESTAMP_FIELD) {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc),
            Some(other) => {
                return Err(RelayError::Parse {
                    reason: format!("timestamp must be a string, found {other}"),
                });
            }
            None => {
                return Err(RelayError::Parse {
                    reason: "missing timestamp".to_string(),
                });
            }
        };

        let field = kind.payload_field();
        let snapshot = value.get(field).ok_or_else(|| RelayError::Parse {
            reason: format!("missing payload field `{field}`"),
        })?;

        let payload = EventPayload::from_json(kind, snapshot)?;
        Ok(IntegrationEvent::with_timestamp(payload, timestamp))
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Reconstruction::Known(_))
    }

    /// 原始事件名（若存在）
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Reconstruction::Known(e) => Some(e.event_name()),
            Reconstruction::Unrecognized { event_name, .. } => event_name.as_deref(),
            Reconstruction::Malformed { kind, .. } => Some(kind.event_name()),
        }
    }

    pub fn into_event(self) -> RelayResult<IntegrationEvent> {
        match self {
            Reconstruction::Known(event) => Ok(event),
            Reconstruction::Unrecognized { event_name, .. } => Err(RelayError::UnknownEventKind {
                event_name: event_name.unwrap_or_else(|| "<missing>".to_string()),
            }),
            Reconstruction::Malformed { kind, reason, .. } => Err(RelayError::MalformedEvent {
                event_name: kind.event_name().to_string(),
                reason,
            }),
        }
    }
}
