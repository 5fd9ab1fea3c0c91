use relay_domain::connection::InMemoryBroker;
use relay_domain::eventing::{BrokerEventBus, EventBus, EventBusTask, EventBusTaskConfig};
use relay_domain::integration_event::IntegrationEvent;
use relay_domain::model::{Child, User};
use relay_domain::outbox::{InMemoryOutboxStore, NewOutboxRecord, OutboxStore};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> EventBusTaskConfig {
    EventBusTaskConfig {
        connect_interval: Duration::from_millis(20),
        sweep_interval: Duration::from_millis(100),
        ..Default::default()
    }
}

async fn wait_until_empty(outbox: &InMemoryOutboxStore, within: Duration) {
    tokio::time::timeout(within, async {
        while outbox.count().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("outbox drained in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn saved_user_delete_event_is_relayed_after_start() {
    let broker = InMemoryBroker::new(64);
    let bus = Arc::new(BrokerEventBus::new(
        Arc::new(broker.transport()),
        Arc::new(broker.transport()),
    ));
    let outbox = Arc::new(InMemoryOutboxStore::new());

    outbox
        .create(
            NewOutboxRecord::from_json_str(
                r#"{
                    "event_name": "UserDeleteEvent",
                    "timestamp": "2021-03-01T12:00:00.000Z",
                    "user": { "id": "5a62be07de34500146d9c544", "username": "BR9999", "type": "child" },
                    "__operation": "publish",
                    "__routing_key": "users.delete"
                }"#,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let task = Arc::new(
        EventBusTask::builder()
            .event_bus(bus.clone())
            .outbox(outbox.clone())
            .config(fast_config())
            .build(),
    );
    task.run();

    wait_until_empty(&outbox, Duration::from_secs(2)).await;

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].routing_key, "users.delete");
    let body: Value = serde_json::from_slice(&published[0].body).unwrap();
    assert_eq!(body["event_name"], "UserDeleteEvent");
    assert_eq!(body["user"]["id"], "5a62be07de34500146d9c544");
    assert_eq!(body["user"]["username"], "BR9999");
    assert!(body.get("__routing_key").is_none());

    task.stop().await.unwrap();
    assert!(!bus.is_publish_connected());
}

#[tokio::test(flavor = "multi_thread")]
async fn events_saved_during_an_outage_are_delivered_after_recovery() {
    let broker = InMemoryBroker::new(64);
    broker.set_available(false);
    let publish = Arc::new(broker.transport());
    let bus = Arc::new(BrokerEventBus::new(
        publish.clone(),
        Arc::new(broker.transport()),
    ));
    let outbox = Arc::new(InMemoryOutboxStore::new());
    let task = Arc::new(
        EventBusTask::builder()
            .event_bus(bus.clone())
            .outbox(outbox.clone())
            .config(fast_config())
            .build(),
    );
    task.run();

    // 断线期间：发布返回 false，生产方写入 Outbox
    let event = IntegrationEvent::child_update(Child {
        account: User::builder().id("c-1".to_string()).build(),
        age: Some(9),
        ..Default::default()
    });
    assert!(!bus.publish(&event, "children.update").await.unwrap());
    outbox
        .create(NewOutboxRecord::publish(&event, "children.update").unwrap())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(outbox.count().await.unwrap(), 1);
    assert!(broker.published().is_empty());

    broker.set_available(true);
    wait_until_empty(&outbox, Duration::from_secs(2)).await;
    assert_eq!(broker.published().len(), 1);

    // 连接再次中断并恢复后，新保存的事件由周期清扫投递
    broker.set_available(false);
    publish.sever();
    tokio::time::timeout(Duration::from_secs(2), async {
        while bus.is_publish_connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loss detected");

    outbox
        .create(NewOutboxRecord::from_raw(
            json!({
                "event_name": "InstitutionDeleteEvent",
                "timestamp": "2021-03-02T08:30:00.000Z",
                "institution": { "id": "i-1", "name": "NUTES" },
            }),
            "institutions.delete",
        ))
        .await
        .unwrap();
    broker.set_available(true);
    wait_until_empty(&outbox, Duration::from_secs(2)).await;

    let published = broker.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].routing_key, "institutions.delete");

    task.stop().await.unwrap();
}
