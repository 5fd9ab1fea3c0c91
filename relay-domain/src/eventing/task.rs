//! 事件总线任务（EventBusTask）
//!
//! 统一编排两个长驻活动：
//! - 订阅：连接订阅方向并注册入站处理器；
//! - 补偿投递：连接发布方向后立即清扫一次 Outbox，之后按固定周期清扫，直到 `stop()`。
//!
//! 同一时刻最多只有一次清扫在执行；`stop()` 返回后不会再开始新的清扫，
//! 已在执行的清扫允许完成其未决的发布。
//!
use super::sweep::{ReplayOutcome, SweepReport, SweepSkip};
use super::{EventBus, EventBusTaskConfig, Subscription};
use crate::error::{RelayError, RelayResult};
use crate::integration_event::Reconstruction;
use crate::outbox::{OutboxQuery, OutboxRecord, OutboxStore};
use bon::Builder;
use futures_util::{StreamExt, stream};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// EventBusTask：
/// - `run()` 启动订阅与补偿投递两个后台任务
/// - `stop()` 取消周期清扫并关闭总线
#[derive(Builder)]
pub struct EventBusTask {
    event_bus: Arc<dyn EventBus>,
    outbox: Arc<dyn OutboxStore>,
    #[builder(default)]
    subscriptions: Vec<Subscription>,
    #[builder(default)]
    config: EventBusTaskConfig,
    #[builder(skip)]
    state: Mutex<TaskState>,
    // 单飞：清扫期间持有
    #[builder(skip)]
    sweep_gate: tokio::sync::Mutex<()>,
    /// 记录 ID -> 连续无法重建的清扫次数
    #[builder(skip)]
    strikes: Mutex<HashMap<String, u32>>,
}

#[derive(Default)]
enum TaskState {
    #[default]
    Stopped,
    Running(RunningTask),
}

struct RunningTask {
    _schedule: ScheduleGuard,
    _tasks: Vec<JoinHandle<()>>,
}

/// 周期调度的所有权：被丢弃时取消调度，覆盖 `stop()` 与任务被直接丢弃两种路径
struct ScheduleGuard(CancellationToken);

impl Drop for ScheduleGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl EventBusTask {
    pub fn config(&self) -> &EventBusTaskConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), TaskState::Running(_))
    }

    /// 启动任务；已在运行时不做任何事并返回 `false`
    pub fn run(self: &Arc<Self>) -> bool {
        let mut state = self.lock_state();
        if matches!(*state, TaskState::Running(_)) {
            warn!("event bus task is already running");
            return false;
        }

        let token = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(self.clone().subscribe_events(token.clone())),
            tokio::spawn(self.clone().publish_saved_events(token.clone())),
        ];
        *state = TaskState::Running(RunningTask {
            _schedule: ScheduleGuard(token),
            _tasks: tasks,
        });
        info!("event bus task started");
        true
    }

    /// 停止任务并关闭总线；未启动过也可调用，可重复调用
    pub async fn stop(&self) -> RelayResult<()> {
        let previous = std::mem::take(&mut *self.lock_state());
        if let TaskState::Running(running) = previous {
            drop(running);
            info!("event bus task stopped");
        }

        self.event_bus.dispose().await.map_err(|e| match e {
            RelayError::Disposal { .. } => e,
            other => RelayError::Disposal {
                reason: other.to_string(),
            },
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TaskState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn subscribe_events(self: Arc<Self>, token: CancellationToken) {
        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            r = self
                .event_bus
                .connect_subscriber(self.config.connect_retries, self.config.connect_interval) => r,
        };
        if let Err(e) = connected {
            error!(error = %e, "subscribe connection could not be established");
            return;
        }

        for subscription in &self.subscriptions {
            if token.is_cancelled() {
                return;
            }
            match self.event_bus.subscribe(subscription.clone()).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    routing_key = subscription.routing_key(),
                    "subscribe connection dropped before registering consumer"
                ),
                Err(e) => error!(
                    routing_key = subscription.routing_key(),
                    error = %e,
                    "failed to register consumer"
                ),
            }
        }
    }

    async fn publish_saved_events(self: Arc<Self>, token: CancellationToken) {
        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            r = self
                .event_bus
                .connect_publisher(self.config.connect_retries, self.config.connect_interval) => r,
        };
        if let Err(e) = connected {
            error!(
                error = %e,
                "publish connection could not be established, saved events stay in the outbox"
            );
            return;
        }

        if self.config.sweep_interval.is_zero() {
            warn!(
                period_ms = self.config.sweep_period().as_millis() as u64,
                "sweep interval is zero, using the minimum period"
            );
        }

        // 首个 tick 立即完成：连接后立刻清扫一次
        let mut ticker = time::interval(self.config.sweep_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// 执行一次清扫：重放 Outbox 中全部待投递记录，确认投递后删除
    pub async fn sweep(&self) -> SweepReport {
        let Ok(_in_flight) = self.sweep_gate.try_lock() else {
            debug!("outbox sweep already in progress");
            return SweepReport::skipped(SweepSkip::AlreadyRunning);
        };

        if !self.event_bus.is_publish_connected() {
            debug!("publish connection down, outbox sweep skipped");
            return SweepReport::skipped(SweepSkip::Disconnected);
        }

        let records = match self.outbox.find(&OutboxQuery::all()).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load saved events from the outbox");
                return SweepReport::aborted(e.to_string());
            }
        };

        let mut report = SweepReport {
            fetched: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            self.forget_strikes(&HashSet::new());
            return report;
        }

        let ids: HashSet<String> = records.iter().map(|r| r.id().to_string()).collect();
        let concurrency = self.config.max_concurrent_replays.max(1);
        let outcomes: Vec<ReplayOutcome> = stream::iter(records)
            .map(|record| async move { self.replay(record).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        self.forget_strikes(&ids);

        info!(
            fetched = report.fetched,
            delivered = report.delivered,
            pending = report.pending(),
            dead_lettered = report.dead_lettered,
            "outbox sweep finished"
        );
        report
    }

    async fn replay(&self, record: OutboxRecord) -> ReplayOutcome {
        let event = match record.reconstruct() {
            Reconstruction::Known(event) => event,
            Reconstruction::Unrecognized { event_name, .. } => {
                let name = event_name.unwrap_or_else(|| "<missing>".to_string());
                let reason = format!("unknown event kind: {name}");
                return self
                    .strike(&record, &reason, ReplayOutcome::Unrecognized)
                    .await;
            }
            Reconstruction::Malformed { kind, reason, .. } => {
                let reason = format!("malformed {kind}: {reason}");
                return self.strike(&record, &reason, ReplayOutcome::Malformed).await;
            }
        };
        self.clear_strikes(record.id());

        match self.event_bus.publish(&event, record.routing_key()).await {
            Ok(true) => match self.outbox.delete(record.id()).await {
                Ok(_) => {
                    info!(
                        record_id = record.id(),
                        event_name = event.event_name(),
                        routing_key = record.routing_key(),
                        "saved event published"
                    );
                    ReplayOutcome::Delivered
                }
                Err(e) => {
                    error!(
                        record_id = record.id(),
                        event_name = event.event_name(),
                        error = %e,
                        "saved event published but the outbox record could not be deleted"
                    );
                    ReplayOutcome::DeliveredCleanupFailed
                }
            },
            Ok(false) => {
                warn!(
                    record_id = record.id(),
                    event_name = event.event_name(),
                    "event bus unavailable, saved event kept for the next sweep"
                );
                ReplayOutcome::NotDelivered
            }
            Err(e) => {
                warn!(
                    record_id = record.id(),
                    event_name = event.event_name(),
                    error = %e,
                    "saved event publish failed, kept for the next sweep"
                );
                ReplayOutcome::Rejected
            }
        }
    }

    async fn strike(
        &self,
        record: &OutboxRecord,
        reason: &str,
        outcome: ReplayOutcome,
    ) -> ReplayOutcome {
        let Some(limit) = self.config.dead_letter_after else {
            warn!(record_id = record.id(), reason, "saved event skipped");
            return outcome;
        };

        let strikes = {
            let mut map = self
                .strikes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let entry = map.entry(record.id().to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if strikes < limit {
            warn!(
                record_id = record.id(),
                reason,
                strikes,
                limit,
                "saved event skipped"
            );
            return outcome;
        }

        match self.outbox.dead_letter(record.id(), reason).await {
            Ok(existed) => {
                self.clear_strikes(record.id());
                if existed {
                    error!(
                        record_id = record.id(),
                        reason,
                        strikes,
                        "saved event moved to dead letter"
                    );
                    ReplayOutcome::DeadLettered
                } else {
                    outcome
                }
            }
            Err(e) => {
                error!(
                    record_id = record.id(),
                    error = %e,
                    "failed to dead-letter saved event"
                );
                outcome
            }
        }
    }

    fn clear_strikes(&self, id: &str) {
        self.strikes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
    }

    fn forget_strikes(&self, live: &HashSet<String>) {
        self.strikes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|id, _| live.contains(id));
    }
}
