//! 事件处理器（IntegrationEventHandler）
//!
//! 定义消费某类集成事件的处理逻辑与元信息（名称、订阅的事件与路由键）。
//!
use crate::integration_event::{EventKind, IntegrationEvent};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// 事件处理器：处理某一类型的集成事件
#[async_trait]
pub trait IntegrationEventHandler: Send + Sync {
    /// 处理器名称（用于日志与去重）
    fn handler_name(&self) -> &str;
    /// 处理事件
    async fn handle(&self, event: &IntegrationEvent) -> anyhow::Result<()>;
}

/// 一条入站订阅：事件种类 + 路由键 + 处理器
#[derive(Clone)]
pub struct Subscription {
    kind: EventKind,
    routing_key: String,
    handler: Arc<dyn IntegrationEventHandler>,
}

impl Subscription {
    pub fn new(
        kind: EventKind,
        routing_key: impl Into<String>,
        handler: Arc<dyn IntegrationEventHandler>,
    ) -> Self {
        Self {
            kind,
            routing_key: routing_key.into(),
            handler,
        }
    }

    /// 使用事件种类的默认路由键
    pub fn with_default_route(kind: EventKind, handler: Arc<dyn IntegrationEventHandler>) -> Self {
        Self::new(kind, kind.default_routing_key(), handler)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn handler(&self) -> &Arc<dyn IntegrationEventHandler> {
        &self.handler
    }

    pub(crate) fn same_as(&self, other: &Subscription) -> bool {
        self.kind == other.kind
            && self.routing_key == other.routing_key
            && self.handler.handler_name() == other.handler.handler_name()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("routing_key", &self.routing_key)
            .field("handler", &self.handler.handler_name())
            .finish()
    }
}
