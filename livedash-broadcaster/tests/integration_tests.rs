use livedash_broadcaster::client::{self, ClientOutbox};
use livedash_broadcaster::{BroadcastEvent, ClientManager, Total};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn like(total: u64) -> BroadcastEvent {
    BroadcastEvent::Like(Total { total })
}

async fn next_json(outbox: &mut ClientOutbox) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_millis(500), outbox.recv())
        .await
        .expect("timed out waiting for message")
        .expect("outbox closed");
    serde_json::from_str(&msg).unwrap()
}

#[tokio::test]
async fn test_broken_client_does_not_affect_others() {
    let manager = ClientManager::new();
    let mut healthy = Vec::new();

    for _ in 0..4 {
        let (client, outbox) = client::channel(16);
        manager.register(client).await;
        healthy.push(outbox);
    }

    // Permanently broken send path
    let (broken, mut broken_out) = client::channel(16);
    manager.register(broken).await;
    broken_out.close();

    assert_eq!(manager.client_count().await, 5);

    let reached = assert_ok!(manager.deliver(&like(42)).await);
    assert_eq!(reached, 4);
    assert_eq!(manager.client_count().await, 4);

    for outbox in healthy.iter_mut() {
        let value = next_json(outbox).await;
        assert_eq!(value["type"], "like");
        assert_eq!(value["data"]["total"], 42);
    }

    // Later deliveries skip the removed client entirely
    let reached = assert_ok!(manager.deliver(&like(43)).await);
    assert_eq!(reached, 4);
}

#[tokio::test]
async fn test_stalled_client_is_dropped_without_blocking() {
    let manager = ClientManager::new();

    let (fast, mut fast_out) = client::channel(64);
    let (slow, _slow_out) = client::channel(2);
    manager.register(fast).await;
    manager.register(slow).await;

    // The slow client never drains; deliveries must still complete promptly
    let delivered = tokio::time::timeout(Duration::from_secs(1), async {
        for total in 0..10 {
            manager.deliver(&like(total)).await.unwrap();
        }
    })
    .await;
    assert!(delivered.is_ok(), "delivery blocked on a stalled client");

    assert_eq!(manager.client_count().await, 1);
    for total in 0..10 {
        let value = next_json(&mut fast_out).await;
        assert_eq!(value["data"]["total"], total);
    }
}

#[tokio::test]
async fn test_per_client_order_is_preserved() {
    let manager = ClientManager::new();
    let (a, mut a_out) = client::channel(32);
    let (b, mut b_out) = client::channel(32);
    manager.register(a).await;
    manager.register(b).await;

    let sequence = vec![
        BroadcastEvent::Reset,
        BroadcastEvent::Viewer(Total { total: 3 }),
        like(1),
        BroadcastEvent::Share(Total { total: 1 }),
        like(2),
    ];
    for event in &sequence {
        manager.deliver(event).await.unwrap();
    }

    for outbox in [&mut a_out, &mut b_out] {
        for expected in &sequence {
            let value = next_json(outbox).await;
            assert_eq!(value["type"], expected.kind());
        }
    }
}

#[tokio::test]
async fn test_no_backlog_for_late_joiner() {
    let manager = ClientManager::new();
    manager.deliver(&like(1)).await.unwrap();

    let (late, mut late_out) = client::channel(8);
    manager.register(late).await;
    manager.deliver(&like(2)).await.unwrap();

    let value = next_json(&mut late_out).await;
    assert_eq!(value["data"]["total"], 2);
}

#[tokio::test]
async fn test_catch_up_goes_to_one_client() {
    let manager = ClientManager::new();
    let (a, mut a_out) = client::channel(8);
    let (b, mut b_out) = client::channel(8);
    let a_id = manager.register(a).await;
    manager.register(b).await;

    assert_ok!(manager.send_to(a_id, &[like(7), BroadcastEvent::Reset]).await);
    manager.deliver(&like(8)).await.unwrap();

    assert_eq!(next_json(&mut a_out).await["data"]["total"], 7);
    assert_eq!(next_json(&mut a_out).await["type"], "reset");
    assert_eq!(next_json(&mut a_out).await["data"]["total"], 8);
    assert_eq!(next_json(&mut b_out).await["data"]["total"], 8);

    manager.unregister(a_id).await;
    assert_err!(manager.send_to(a_id, &[like(9)]).await);
}

#[tokio::test]
async fn test_concurrent_register_and_deliver() {
    let manager = ClientManager::new();
    let mut tasks = Vec::new();

    for i in 0..8 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            let (client, outbox) = client::channel(64);
            manager.register(client).await;
            manager.deliver(&like(i)).await.unwrap();
            outbox
        }));
    }

    let mut outboxes = Vec::new();
    for task in tasks {
        outboxes.push(task.await.unwrap());
    }

    assert_eq!(manager.client_count().await, 8);
    // Every client saw at least the message it delivered itself
    for outbox in outboxes.iter_mut() {
        let value = next_json(outbox).await;
        assert_eq!(value["type"], "like");
    }
}
