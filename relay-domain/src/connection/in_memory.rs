//! 内存版消息代理（InMemoryBroker）
//!
//! 基于 `tokio::sync::broadcast` 的轻量代理，每个 `InMemoryTransport` 代表一条独立连接。
//! 提供故障注入：代理整体不可用、单连接断开、拒绝重连、发送失败。
//!
//! 注意：若发送时没有订阅者，消息只记录在 `published()` 中，不会被消费。

use super::{BrokerTransport, Delivery};
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<BrokerShared>,
}

struct BrokerShared {
    tx: broadcast::Sender<Delivery>,
    available: AtomicBool,
    fail_sends: AtomicBool,
    published: Mutex<Vec<Delivery>>,
    next_session: AtomicU64,
}

impl InMemoryBroker {
    /// 创建内存代理，`capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            shared: Arc::new(BrokerShared {
                tx,
                available: AtomicBool::new(true),
                fail_sends: AtomicBool::new(false),
                published: Mutex::new(Vec::new()),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// 新建一条（尚未连接的）连接
    pub fn transport(&self) -> InMemoryTransport {
        let (session, _rx) = watch::channel(None);
        InMemoryTransport {
            broker: self.clone(),
            session,
            refuse: AtomicBool::new(false),
            connect_attempts: AtomicU32::new(0),
        }
    }

    /// 代理不可用时，所有连接尝试失败（已建立的连接不受影响）
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// 使所有发送返回错误
    pub fn fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// 已成功发送的消息
    pub fn published(&self) -> Vec<Delivery> {
        self.shared
            .published
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub struct InMemoryTransport {
    broker: InMemoryBroker,
    /// 当前会话 ID，`None` 表示未连接
    session: watch::Sender<Option<u64>>,
    refuse: AtomicBool,
    connect_attempts: AtomicU32,
}

impl InMemoryTransport {
    /// 模拟连接被对端断开：已交出的消费流随之结束
    pub fn sever(&self) {
        self.session.send_replace(None);
    }

    /// 使本连接的后续连接尝试失败
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.session.borrow().is_some()
    }

    fn ensure_open(&self) -> RelayResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(RelayError::event_bus("in-memory transport is not connected"))
        }
    }
}

#[async_trait]
impl BrokerTransport for InMemoryTransport {
    async fn connect(&self) -> RelayResult<()> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = &self.broker.shared;
        if !shared.available.load(Ordering::SeqCst) || self.refuse.load(Ordering::SeqCst) {
            return Err(RelayError::connection(attempt, "in-memory broker unavailable"));
        }
        let id = shared.next_session.fetch_add(1, Ordering::SeqCst);
        self.session.send_replace(Some(id));
        Ok(())
    }

    async fn disconnected(&self) {
        let mut rx = self.session.subscribe();
        let current = *rx.borrow_and_update();
        if current.is_none() {
            return;
        }
        let _ = rx.wait_for(|session| *session != current).await;
    }

    async fn send(&self, routing_key: &str, body: &[u8]) -> RelayResult<()> {
        self.ensure_open()?;
        let shared = &self.broker.shared;
        if shared.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::event_bus("in-memory broker rejected the message"));
        }

        let delivery = Delivery {
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        };
        shared
            .published
            .lock()
            .map_err(|_| RelayError::event_bus("published log poisoned"))?
            .push(delivery.clone());
        // 若当前无订阅者，broadcast 的 send 会返回错误，这里视为非致命并忽略
        let _ = shared.tx.send(delivery);
        Ok(())
    }

    async fn consume(
        &self,
        routing_key: &str,
    ) -> RelayResult<BoxStream<'static, RelayResult<Delivery>>> {
        self.ensure_open()?;
        // 流与当前会话绑定：断开或重连到新会话后结束
        let mut session = self.session.subscribe();
        let current = *session.borrow_and_update();
        let session_ended = async move {
            let _ = session.wait_for(|s| *s != current).await;
        };

        let routing_key = routing_key.to_string();
        let stream = BroadcastStream::new(self.broker.shared.tx.subscribe()).filter_map(
            move |r| {
                let item = match r {
                    Ok(d) if d.routing_key == routing_key => Some(Ok(d)),
                    Ok(_) => None,
                    Err(e) => Some(Err(RelayError::event_bus(e.to_string()))),
                };
                futures_util::future::ready(item)
            },
        );
        Ok(Box::pin(stream.take_until(session_ended)))
    }

    async fn close(&self) -> RelayResult<()> {
        self.session.send_replace(None);
        Ok(())
    }
}
