use serde::Serialize;

/// 发布结果
///
/// - `Delivered`：总线已确认投递；
/// - `Saved`：未确认投递，事件已写入 Outbox，等待补投。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Delivered,
    Saved { record_id: String },
}

impl PublishOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PublishOutcome::Delivered)
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            PublishOutcome::Delivered => None,
            PublishOutcome::Saved { record_id } => Some(record_id),
        }
    }
}
