/// 集成事件中继（内存版）示例
/// 展示 断线 -> 写入 Outbox -> 重连 -> 清扫补投 -> 订阅方消费 的闭环
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use relay_domain::connection::InMemoryBroker;
use relay_domain::eventing::{
    BrokerEventBus, EventBus, EventBusTask, EventBusTaskConfig, IntegrationEventHandler,
    Subscription,
};
use relay_domain::integration_event::{EventKind, IntegrationEvent};
use relay_domain::model::{Institution, User};
use relay_domain::outbox::{InMemoryOutboxStore, NewOutboxRecord, OutboxStore};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct PrintHandler;

#[async_trait]
impl IntegrationEventHandler for PrintHandler {
    fn handler_name(&self) -> &str {
        "printer"
    }

    async fn handle(&self, event: &IntegrationEvent) -> anyhow::Result<()> {
        println!(
            "📨 收到事件: {} (id={:?})",
            event.event_name(),
            event.payload().subject_id()
        );
        Ok(())
    }
}

/// 发布失败时写入 Outbox
async fn publish_or_save(
    bus: &dyn EventBus,
    outbox: &dyn OutboxStore,
    event: IntegrationEvent,
) -> AnyResult<()> {
    let routing_key = event.kind().default_routing_key();
    match bus.publish(&event, routing_key).await {
        Ok(true) => println!("✅ 直接发布: {}", event.event_name()),
        Ok(false) | Err(_) => {
            let record = outbox
                .create(NewOutboxRecord::publish(&event, routing_key)?)
                .await?;
            println!("💾 总线不可用，已写入 Outbox: {}", record.id());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let broker = InMemoryBroker::new(64);
    broker.set_available(false);

    let bus = Arc::new(BrokerEventBus::new(
        Arc::new(broker.transport()),
        Arc::new(broker.transport()),
    ));
    let outbox = Arc::new(InMemoryOutboxStore::new());

    let task = Arc::new(
        EventBusTask::builder()
            .event_bus(bus.clone())
            .outbox(outbox.clone())
            .subscriptions(vec![
                Subscription::with_default_route(EventKind::UserDelete, Arc::new(PrintHandler)),
                Subscription::with_default_route(
                    EventKind::InstitutionDelete,
                    Arc::new(PrintHandler),
                ),
            ])
            .config(EventBusTaskConfig {
                connect_interval: Duration::from_millis(200),
                sweep_interval: Duration::from_secs(1),
                ..Default::default()
            })
            .build(),
    );
    task.run();
    println!("✅ 任务已启动（代理不可用）");

    publish_or_save(
        bus.as_ref(),
        outbox.as_ref(),
        IntegrationEvent::user_delete(
            User::builder()
                .id("5a62be07d6f33400146c9b61".to_string())
                .username("BR9999".to_string())
                .build(),
        ),
    )
    .await?;
    publish_or_save(
        bus.as_ref(),
        outbox.as_ref(),
        IntegrationEvent::institution_delete(
            Institution::builder()
                .id("5a62be07de34500146d9c544".to_string())
                .name("NUTES".to_string())
                .build(),
        ),
    )
    .await?;
    println!("📦 Outbox 待投递: {}", outbox.count().await?);

    tokio::time::sleep(Duration::from_millis(500)).await;
    broker.set_available(true);
    println!("🔌 代理恢复");

    // 等订阅注册完成后再触发一次清扫，确保消费方能收到补投事件
    tokio::time::sleep(Duration::from_millis(500)).await;
    let report = task.sweep().await;
    println!("🧹 清扫结果: {report}");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    println!("📦 Outbox 待投递: {}", outbox.count().await?);

    task.stop().await?;
    println!("\n✅ 优雅关闭完成");
    Ok(())
}
