use crate::{dto::PublishOutcome, error::AppError, error::AppResult};
use async_trait::async_trait;
use relay_domain::eventing::EventBus;
use relay_domain::integration_event::IntegrationEvent;
use relay_domain::outbox::{NewOutboxRecord, OutboxStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 集成事件发布入口（生产方依赖此协议，而非具体总线）
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &IntegrationEvent, routing_key: &str)
    -> AppResult<PublishOutcome>;

    /// 使用事件种类的默认路由键发布
    async fn publish_default(&self, event: &IntegrationEvent) -> AppResult<PublishOutcome> {
        self.publish(event, event.kind().default_routing_key()).await
    }
}

/// 先尝试总线发布，未确认投递（返回 `false` 或出错）时写入 Outbox
pub struct IntegrationEventPublisher {
    bus: Arc<dyn EventBus>,
    outbox: Arc<dyn OutboxStore>,
}

impl IntegrationEventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { bus, outbox }
    }

    async fn save(&self, event: &IntegrationEvent, routing_key: &str) -> AppResult<PublishOutcome> {
        let new_record = NewOutboxRecord::publish(event, routing_key)?;
        let record = self
            .outbox
            .create(new_record)
            .await
            .map_err(|source| AppError::Persistence {
                event_name: event.event_name(),
                source,
            })?;

        info!(
            record_id = record.id(),
            event_name = event.event_name(),
            routing_key,
            "event saved to the outbox"
        );
        Ok(PublishOutcome::Saved {
            record_id: record.id().to_string(),
        })
    }
}

#[async_trait]
impl EventPublisher for IntegrationEventPublisher {
    async fn publish(
        &self,
        event: &IntegrationEvent,
        routing_key: &str,
    ) -> AppResult<PublishOutcome> {
        if routing_key.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "routing key is empty for {}",
                event.event_name()
            )));
        }

        match self.bus.publish(event, routing_key).await {
            Ok(true) => {
                debug!(event_name = event.event_name(), routing_key, "event published");
                return Ok(PublishOutcome::Delivered);
            }
            Ok(false) => warn!(
                event_name = event.event_name(),
                routing_key, "event bus unavailable, saving event to the outbox"
            ),
            Err(e) => warn!(
                event_name = event.event_name(),
                routing_key,
                error = %e,
                "event publish failed, saving event to the outbox"
            ),
        }

        self.save(event, routing_key).await
    }
}
