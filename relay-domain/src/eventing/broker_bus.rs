//! 基于消息代理的事件总线（BrokerEventBus）
//!
//! 发布与订阅各持有一个独立的 `ConnectionManager`，一侧断线不影响另一侧。
//! 入站消息按路由键消费，重建为 `IntegrationEvent` 后分发给匹配事件种类的处理器。
//! 订阅方向断线重连后，每个路由键的消费者会自动重新订阅。
//!
use super::{EventBus, Subscription};
use crate::connection::{BrokerTransport, ConnectionManager, Delivery, Direction};
use crate::error::{RelayError, RelayResult as Result};
use crate::integration_event::{IntegrationEvent, Reconstruction};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Routes = DashMap<String, Vec<Subscription>>;

/// 未调用 `connect_subscriber` 时的重新订阅间隔
const DEFAULT_RESUBSCRIBE_INTERVAL: Duration = Duration::from_millis(1500);

pub struct BrokerEventBus {
    publisher: ConnectionManager,
    subscriber: ConnectionManager,
    /// 路由键 -> 订阅列表
    routes: Arc<Routes>,
    consumers: Mutex<Vec<(String, JoinHandle<()>)>>,
    token: Mutex<CancellationToken>,
    // 沿用最近一次 `connect_subscriber` 的重试间隔
    resubscribe_interval: Mutex<Duration>,
}

impl BrokerEventBus {
    /// `publish` 与 `subscribe` 必须是两条独立连接
    pub fn new(
        publish: Arc<dyn BrokerTransport>,
        subscribe: Arc<dyn BrokerTransport>,
    ) -> Self {
        Self {
            publisher: ConnectionManager::new(Direction::Publish, publish),
            subscriber: ConnectionManager::new(Direction::Subscribe, subscribe),
            routes: Arc::new(DashMap::new()),
            consumers: Mutex::new(Vec::new()),
            token: Mutex::new(CancellationToken::new()),
            resubscribe_interval: Mutex::new(DEFAULT_RESUBSCRIBE_INTERVAL),
        }
    }

    pub fn connection_pub(&self) -> &ConnectionManager {
        &self.publisher
    }

    pub fn connection_sub(&self) -> &ConnectionManager {
        &self.subscriber
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn has_consumer(&self, routing_key: &str) -> bool {
        self.consumers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|(key, handle)| key == routing_key && !handle.is_finished())
    }

    fn resubscribe_interval(&self) -> Duration {
        *self
            .resubscribe_interval
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 单个路由键的消费循环：流结束（通常是连接断开）后等待重连并重新订阅
    async fn consume_loop(
        routes: Arc<Routes>,
        subscriber: ConnectionManager,
        routing_key: String,
        mut stream: BoxStream<'static, Result<Delivery>>,
        interval: Duration,
        token: CancellationToken,
    ) {
        loop {
            Self::drain(&routes, &routing_key, stream, &token).await;
            if token.is_cancelled() {
                return;
            }
            debug!(routing_key = %routing_key, "inbound stream ended, resubscribing");

            stream = match Self::resubscribe(&subscriber, &routing_key, interval, &token).await {
                Some(stream) => stream,
                None => return,
            };
            info!(routing_key = %routing_key, "inbound consumer restored");
        }
    }

    async fn drain(
        routes: &Routes,
        routing_key: &str,
        mut stream: BoxStream<'static, Result<Delivery>>,
        token: &CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                next = stream.next() => match next {
                    Some(Ok(delivery)) => Self::dispatch(routes, &delivery).await,
                    Some(Err(e)) => {
                        warn!(routing_key, error = %e, "inbound delivery error");
                    }
                    None => return,
                }
            }
        }
    }

    /// 等待订阅方向恢复连接后重新消费；被取消时返回 `None`
    async fn resubscribe(
        subscriber: &ConnectionManager,
        routing_key: &str,
        interval: Duration,
        token: &CancellationToken,
    ) -> Option<BoxStream<'static, Result<Delivery>>> {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                _ = tokio::time::sleep(interval) => {}
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                _ = subscriber.wait_connected() => {}
            }
            match subscriber.transport().consume(routing_key).await {
                Ok(stream) => return Some(stream),
                Err(e) => debug!(routing_key, error = %e, "resubscribe attempt failed"),
            }
        }
    }

    async fn dispatch(routes: &Routes, delivery: &Delivery) {
        let value: Value = match serde_json::from_slice(&delivery.body) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "discarding non-JSON delivery"
                );
                return;
            }
        };

        let event = match Reconstruction::from_json(&value) {
            Reconstruction::Known(event) => event,
            other => {
                warn!(
                    routing_key = %delivery.routing_key,
                    event_name = other.event_name().unwrap_or("<missing>"),
                    "discarding delivery that cannot be reconstructed"
                );
                return;
            }
        };

        // 先复制出处理器列表，避免跨 await 持有 DashMap 分片锁
        let handlers: Vec<Subscription> = routes
            .get(&delivery.routing_key)
            .map(|subs| {
                subs.iter()
                    .filter(|s| s.kind() == event.kind())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for sub in handlers {
            if let Err(e) = sub.handler().handle(&event).await {
                let err = RelayError::handler(sub.handler().handler_name(), e);
                error!(
                    event_name = event.event_name(),
                    error = %err,
                    "integration event handler failed"
                );
            }
        }
    }
}

#[async_trait]
impl EventBus for BrokerEventBus {
    fn is_publish_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    fn is_subscribe_connected(&self) -> bool {
        self.subscriber.is_connected()
    }

    async fn connect_publisher(&self, max_retries: u32, interval: Duration) -> Result<()> {
        self.publisher.try_connect(max_retries, interval).await
    }

    async fn connect_subscriber(&self, max_retries: u32, interval: Duration) -> Result<()> {
        *self
            .resubscribe_interval
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = interval;
        self.subscriber.try_connect(max_retries, interval).await
    }

    async fn publish(&self, event: &IntegrationEvent, routing_key: &str) -> Result<bool> {
        if !self.publisher.is_connected() {
            return Ok(false);
        }
        let body = event.to_bytes()?;
        self.publisher.transport().send(routing_key, &body).await?;
        debug!(event_name = event.event_name(), routing_key, "integration event published");
        Ok(true)
    }

    async fn subscribe(&self, subscription: Subscription) -> Result<bool> {
        if !self.subscriber.is_connected() {
            return Ok(false);
        }
        let routing_key = subscription.routing_key().to_string();

        {
            let mut subs = self.routes.entry(routing_key.clone()).or_default();
            if !subs.iter().any(|s| s.same_as(&subscription)) {
                subs.push(subscription.clone());
            }
        }

        if self.has_consumer(&routing_key) {
            return Ok(true);
        }

        let stream = self.subscriber.transport().consume(&routing_key).await?;
        let handle = tokio::spawn(Self::consume_loop(
            self.routes.clone(),
            self.subscriber.clone(),
            routing_key.clone(),
            stream,
            self.resubscribe_interval(),
            self.current_token(),
        ));
        self.consumers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((routing_key.clone(), handle));
        info!(
            routing_key = %routing_key,
            event_name = subscription.kind().event_name(),
            handler = subscription.handler().handler_name(),
            "subscribed to integration events"
        );
        Ok(true)
    }

    async fn dispose(&self) -> Result<()> {
        {
            let mut guard = self
                .token
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, CancellationToken::new()).cancel();
        }
        let consumers = std::mem::take(
            &mut *self
                .consumers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for (_, handle) in consumers {
            handle.abort();
        }

        let publish = self.publisher.close().await;
        let subscribe = self.subscriber.close().await;
        let failures: Vec<String> = [("publish", publish), ("subscribe", subscribe)]
            .into_iter()
            .filter_map(|(direction, r)| r.err().map(|e| format!("{direction}: {e}")))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Disposal {
                reason: failures.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{InMemoryBroker, InMemoryTransport};
    use crate::eventing::IntegrationEventHandler;
    use crate::integration_event::{EventKind, EventPayload};
    use crate::model::User;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: &'static str,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl IntegrationEventHandler for CountingHandler {
        fn handler_name(&self) -> &str {
            self.name
        }
        async fn handle(&self, event: &IntegrationEvent) -> anyhow::Result<()> {
            assert!(matches!(event.payload(), EventPayload::UserDelete(_)));
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn bus(broker: &InMemoryBroker) -> (BrokerEventBus, Arc<InMemoryTransport>) {
        let publish = Arc::new(broker.transport());
        let bus = BrokerEventBus::new(publish.clone(), Arc::new(broker.transport()));
        (bus, publish)
    }

    fn user_deleted() -> IntegrationEvent {
        IntegrationEvent::user_delete(User::builder().id("u-1".to_string()).build())
    }

    #[tokio::test]
    async fn publish_while_disconnected_returns_false_without_io() {
        let broker = InMemoryBroker::new(16);
        let (bus, publish) = bus(&broker);

        assert!(!bus.publish(&user_deleted(), "users.delete").await.unwrap());
        assert_eq!(publish.connect_attempts(), 0);
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn publish_sends_wire_json_once_connected() {
        let broker = InMemoryBroker::new(16);
        let (bus, _publish) = bus(&broker);
        bus.connect_publisher(1, Duration::from_millis(10)).await.unwrap();

        assert!(bus.publish(&user_deleted(), "users.delete").await.unwrap());
        let sent = broker.published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].routing_key, "users.delete");
        let body: Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(body["event_name"], "UserDeleteEvent");
        assert_eq!(body["user"]["id"], "u-1");
        bus.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn send_failure_is_an_error_not_false() {
        let broker = InMemoryBroker::new(16);
        let (bus, _publish) = bus(&broker);
        bus.connect_publisher(1, Duration::from_millis(10)).await.unwrap();
        broker.fail_sends(true);

        let err = bus.publish(&user_deleted(), "users.delete").await.unwrap_err();
        assert!(matches!(err, RelayError::EventBus { .. }));
        bus.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_safe_when_never_connected() {
        let broker = InMemoryBroker::new(16);
        let (bus, _publish) = bus(&broker);
        bus.dispose().await.unwrap();
        bus.dispose().await.unwrap();

        bus.connect_publisher(1, Duration::from_millis(10)).await.unwrap();
        bus.connect_subscriber(1, Duration::from_millis(10)).await.unwrap();
        bus.dispose().await.unwrap();
        bus.dispose().await.unwrap();
        assert!(!bus.is_publish_connected());
        assert!(!bus.is_subscribe_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inbound_events_reach_matching_handlers_once() {
        let broker = InMemoryBroker::new(16);
        let (bus, _publish) = bus(&broker);
        let handler = Arc::new(CountingHandler {
            name: "user-deleted",
            handled: AtomicUsize::new(0),
        });

        let sub = Subscription::with_default_route(EventKind::UserDelete, handler.clone());
        assert!(!bus.subscribe(sub.clone()).await.unwrap());

        bus.connect_subscriber(0, Duration::from_millis(10)).await.unwrap();
        bus.connect_publisher(0, Duration::from_millis(10)).await.unwrap();
        assert!(bus.subscribe(sub.clone()).await.unwrap());
        // 重复注册不会重复分发
        assert!(bus.subscribe(sub).await.unwrap());

        bus.publish(&user_deleted(), "users.delete").await.unwrap();
        bus.publish(&user_deleted(), "children.update").await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while handler.handled.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handler invoked");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);

        bus.dispose().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn consumers_resume_after_the_subscribe_side_reconnects() {
        let broker = InMemoryBroker::new(16);
        let subscribe = Arc::new(broker.transport());
        let bus = BrokerEventBus::new(Arc::new(broker.transport()), subscribe.clone());
        let handler = Arc::new(CountingHandler {
            name: "user-deleted",
            handled: AtomicUsize::new(0),
        });

        bus.connect_subscriber(0, Duration::from_millis(10)).await.unwrap();
        bus.connect_publisher(0, Duration::from_millis(10)).await.unwrap();
        let sub = Subscription::with_default_route(EventKind::UserDelete, handler.clone());
        assert!(bus.subscribe(sub).await.unwrap());

        let handled_at_least = |n: usize| {
            let handler = handler.clone();
            let bus = &bus;
            async move {
                tokio::time::timeout(Duration::from_secs(2), async {
                    while handler.handled.load(Ordering::SeqCst) < n {
                        bus.publish(&user_deleted(), "users.delete").await.unwrap();
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                })
                .await
                .is_ok()
            }
        };
        assert!(handled_at_least(1).await, "delivered before the drop");

        subscribe.sever();
        tokio::time::timeout(Duration::from_secs(2), async {
            while subscribe.connect_attempts() < 2 || !bus.is_subscribe_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscribe side reconnected");

        let before = handler.handled.load(Ordering::SeqCst);
        assert!(
            handled_at_least(before + 1).await,
            "delivered after the reconnect"
        );

        bus.dispose().await.unwrap();
    }

    #[test]
    fn handler_failure_is_reported_as_handler_error() {
        let err = RelayError::handler("user-deleted", anyhow::anyhow!("db down"));
        assert_eq!(
            err.to_string(),
            "event handler error: handler=user-deleted, reason=db down"
        );
    }
}
