use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 周期清扫的最小间隔
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// 事件总线任务配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusTaskConfig {
    /// 连接重试次数，0 表示无限重试
    pub connect_retries: u32,
    /// 连接重试间隔
    #[serde(rename = "connect_interval_ms", with = "duration_ms")]
    pub connect_interval: Duration,
    /// Outbox 周期清扫间隔
    #[serde(rename = "sweep_interval_ms", with = "duration_ms")]
    pub sweep_interval: Duration,
    /// 单次清扫中并发重放的记录数上限
    pub max_concurrent_replays: usize,
    /// 连续多少次清扫无法重建后移入死信区，`None` 表示永不移入
    pub dead_letter_after: Option<u32>,
}

impl Default for EventBusTaskConfig {
    fn default() -> Self {
        Self {
            connect_retries: 0,
            connect_interval: Duration::from_millis(1500),
            sweep_interval: Duration::from_millis(300_000),
            max_concurrent_replays: 16,
            dead_letter_after: Some(5),
        }
    }
}

impl EventBusTaskConfig {
    /// 解析并校验配置
    pub fn from_json_str(json: &str) -> RelayResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RelayResult<()> {
        let invalid = |reason: &str| -> RelayResult<()> {
            Err(RelayError::InvalidValue {
                reason: reason.to_string(),
            })
        };
        if self.connect_interval.is_zero() {
            return invalid("connect_interval_ms must be greater than zero");
        }
        if self.sweep_interval.is_zero() {
            return invalid("sweep_interval_ms must be greater than zero");
        }
        if self.max_concurrent_replays == 0 {
            return invalid("max_concurrent_replays must be greater than zero");
        }
        Ok(())
    }

    /// 实际用于定时器的清扫周期，不低于 `MIN_SWEEP_INTERVAL`
    pub fn sweep_period(&self) -> Duration {
        self.sweep_interval.max(MIN_SWEEP_INTERVAL)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
