//! 清扫结果（SweepReport）
//!
//! 一次清扫对每条 Outbox 记录产生一个 `ReplayOutcome`，汇总为 `SweepReport`，
//! 用于日志与测试断言。
//!
use std::fmt;

/// 清扫被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSkip {
    /// 发布方向未连接，未访问存储
    Disconnected,
    /// 已有清扫在执行
    AlreadyRunning,
}

/// 单条记录的重放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// 已确认投递并删除记录
    Delivered,
    /// 已确认投递，但删除记录失败
    DeliveredCleanupFailed,
    /// 总线未连接，记录保留
    NotDelivered,
    /// 发送报错，记录保留
    Rejected,
    /// 事件名未知，记录保留
    Unrecognized,
    /// 事件名已知但无法重建，记录保留
    Malformed,
    /// 多次无法重建，已移入死信区
    DeadLettered,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub fetched: usize,
    pub delivered: usize,
    pub cleanup_failed: usize,
    pub not_delivered: usize,
    pub rejected: usize,
    pub unrecognized: usize,
    pub malformed: usize,
    pub dead_lettered: usize,
    pub skipped: Option<SweepSkip>,
    /// 查询失败时的原因，本轮清扫提前结束
    pub aborted: Option<String>,
}

impl SweepReport {
    pub fn skipped(reason: SweepSkip) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            aborted: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: ReplayOutcome) {
        match outcome {
            ReplayOutcome::Delivered => self.delivered += 1,
            ReplayOutcome::DeliveredCleanupFailed => {
                self.delivered += 1;
                self.cleanup_failed += 1;
            }
            ReplayOutcome::NotDelivered => self.not_delivered += 1,
            ReplayOutcome::Rejected => self.rejected += 1,
            ReplayOutcome::Unrecognized => self.unrecognized += 1,
            ReplayOutcome::Malformed => self.malformed += 1,
            ReplayOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }

    /// 本轮结束后仍留在 Outbox 中的记录数
    pub fn pending(&self) -> usize {
        self.not_delivered + self.rejected + self.unrecognized + self.malformed
    }

    pub fn ran(&self) -> bool {
        self.skipped.is_none() && self.aborted.is_none()
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(skip) = self.skipped {
            return write!(f, "skipped ({skip:?})");
        }
        if let Some(reason) = &self.aborted {
            return write!(f, "aborted ({reason})");
        }
        write!(
            f,
            "fetched={} delivered={} pending={} dead_lettered={} cleanup_failed={}",
            self.fetched,
            self.delivered,
            self.pending(),
            self.dead_lettered,
            self.cleanup_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_are_counted() {
        let mut report = SweepReport {
            fetched: 6,
            ..Default::default()
        };
        for o in [
            ReplayOutcome::Delivered,
            ReplayOutcome::DeliveredCleanupFailed,
            ReplayOutcome::NotDelivered,
            ReplayOutcome::Rejected,
            ReplayOutcome::Unrecognized,
            ReplayOutcome::DeadLettered,
        ] {
            report.record(o);
        }
        assert_eq!(report.delivered, 2);
        assert_eq!(report.cleanup_failed, 1);
        assert_eq!(report.pending(), 3);
        assert!(report.ran());
        assert_eq!(
            report.to_string(),
            "fetched=6 delivered=2 pending=3 dead_lettered=1 cleanup_failed=1"
        );
        assert!(!SweepReport::skipped(SweepSkip::Disconnected).ran());
    }
}
