//! 连接管理器（ConnectionManager）
//!
//! 单方向的连接/重试状态机：
//! - `try_connect(max_retries, interval)`：`max_retries = 0` 表示无限重试，每次失败后等待 `interval`；
//! - 连接成功后由后台守护任务监听断线，断线时将 `is_connected` 置为 false 并自动重连；
//! - `close()` 取消重试与守护任务，幂等，未连接过也可安全调用。
//!
use super::BrokerTransport;
use crate::error::{RelayError, RelayResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 连接方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Publish,
    Subscribe,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Publish => f.write_str("publish"),
            Direction::Subscribe => f.write_str("subscribe"),
        }
    }
}

#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    direction: Direction,
    transport: Arc<dyn BrokerTransport>,
    connected: watch::Sender<bool>,
    // 串行化单次连接尝试，不跨越重试间隔持有
    attempt_lock: tokio::sync::Mutex<()>,
    token: Mutex<CancellationToken>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(direction: Direction, transport: Arc<dyn BrokerTransport>) -> Self {
        let (connected, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                direction,
                transport,
                connected,
                attempt_lock: tokio::sync::Mutex::new(()),
                token: Mutex::new(CancellationToken::new()),
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    pub fn transport(&self) -> &Arc<dyn BrokerTransport> {
        &self.inner.transport
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected.borrow()
    }

    /// 订阅连接状态变化
    pub fn watch_connectivity(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// 挂起直到连接建立
    pub async fn wait_connected(&self) {
        let mut rx = self.inner.connected.subscribe();
        // Sender 由 self 持有，wait_for 不会因通道关闭而返回错误
        let _ = rx.wait_for(|connected| *connected).await;
    }

    /// 连接并按需重试；`max_retries = 0` 表示无限重试
    pub async fn try_connect(&self, max_retries: u32, interval: Duration) -> RelayResult<()> {
        let token = self.inner.current_token();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.inner.attempt(&token).await {
                Ok(()) => {
                    self.ensure_supervisor(interval, token);
                    return Ok(());
                }
                Err(e) => {
                    if max_retries != 0 && attempts >= max_retries {
                        warn!(
                            direction = %self.inner.direction,
                            attempts,
                            error = %e,
                            "giving up connecting to broker"
                        );
                        return Err(RelayError::connection(attempts, e.to_string()));
                    }
                    debug!(
                        direction = %self.inner.direction,
                        attempts,
                        error = %e,
                        "broker connection attempt failed, retrying"
                    );
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(RelayError::connection(attempts, "connection manager closed"));
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// 关闭连接并停止重试/守护任务
    pub async fn close(&self) -> RelayResult<()> {
        let token = {
            let mut guard = self
                .inner
                .token
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        token.cancel();

        let supervisor = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = supervisor {
            handle.abort();
            let _ = handle.await;
        }

        // 等待进行中的连接尝试结束，避免关闭后状态被翻回 true
        let _attempt = self.inner.attempt_lock.lock().await;
        let was_connected = self.inner.connected.send_replace(false);
        if was_connected {
            self.inner.transport.close().await?;
            info!(direction = %self.inner.direction, "broker connection closed");
        }
        Ok(())
    }

    fn ensure_supervisor(&self, interval: Duration, token: CancellationToken) {
        let mut slot = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let inner = self.inner.clone();
        *slot = Some(tokio::spawn(inner.supervise(interval, token)));
    }
}

impl Inner {
    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn attempt(&self, token: &CancellationToken) -> RelayResult<()> {
        let _guard = self.attempt_lock.lock().await;
        if token.is_cancelled() {
            return Err(RelayError::connection(0, "connection manager closed"));
        }
        if *self.connected.borrow() {
            return Ok(());
        }

        self.transport.connect().await?;
        self.connected.send_replace(true);
        info!(direction = %self.direction, "connected to broker");
        Ok(())
    }

    /// 守护任务：监听断线并无限重连，直到被取消
    async fn supervise(self: Arc<Self>, interval: Duration, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = self.transport.disconnected() => {}
            }

            if self.connected.send_replace(false) {
                warn!(direction = %self.direction, "broker connection lost, reconnecting");
            }

            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    r = self.attempt(&token) => r,
                };
                match result {
                    Ok(()) => {
                        info!(direction = %self.direction, attempts, "broker connection restored");
                        break;
                    }
                    Err(e) => {
                        debug!(
                            direction = %self.direction,
                            attempts,
                            error = %e,
                            "reconnect attempt failed"
                        );
                    }
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
    }
}
