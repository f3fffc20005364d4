use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sakura_events::{handler, sync_handler, Event, EventBus, Handler};
use sakura_topics::{TOPIC_CART_ADD_ITEM, TOPIC_FILTER_CHANGE, TOPIC_PRODUCT_INFO_LOADING};
use serde_json::json;
use tokio::time::{sleep, Duration};

fn collecting(sink: &Arc<Mutex<Vec<Event>>>) -> Handler {
    let sink = Arc::clone(sink);
    sync_handler(move |event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    })
}

#[tokio::test]
async fn batch_subscribed_handler_sees_each_topic_once() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let h = collecting(&seen);
    bus.subscribe_batch([("topicA", h.clone()), ("topicB", h.clone())]);

    bus.publish("topicA", None).await;
    bus.publish("topicB", None).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].topic, "topicA");
    assert_eq!(seen[1].topic, "topicB");
}

#[tokio::test]
async fn subscribe_all_and_unsubscribe_all_share_one_handler() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let h = collecting(&seen);
    bus.subscribe_all([TOPIC_CART_ADD_ITEM, TOPIC_FILTER_CHANGE], &h);
    bus.publish(TOPIC_FILTER_CHANGE, None).await;

    bus.unsubscribe_all([TOPIC_CART_ADD_ITEM, TOPIC_FILTER_CHANGE], &h);
    bus.publish(TOPIC_CART_ADD_ITEM, None).await;
    bus.publish(TOPIC_FILTER_CHANGE, None).await;

    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn publish_waits_for_async_handlers_to_settle() {
    let bus = EventBus::new();
    let loading_cleared = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&loading_cleared);
    bus.subscribe(
        TOPIC_PRODUCT_INFO_LOADING,
        handler(move |_| {
            let flag = Arc::clone(&flag);
            async move {
                sleep(Duration::from_millis(20)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        }),
    );

    let report = bus.publish(TOPIC_PRODUCT_INFO_LOADING, Some(json!(true))).await;

    assert!(report.is_clean());
    assert!(loading_cleared.load(Ordering::SeqCst));
}

#[tokio::test]
async fn async_handlers_start_in_order_and_do_not_serialise() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for (label, delay) in [("slow", 30u64), ("fast", 1u64)] {
        let order = Arc::clone(&order);
        bus.subscribe(
            "timing",
            handler(move |_| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(format!("start:{label}"));
                    sleep(Duration::from_millis(delay)).await;
                    order.lock().unwrap().push(format!("end:{label}"));
                    Ok(())
                }
            }),
        );
    }

    bus.publish("timing", None).await;

    assert_eq!(
        *order.lock().unwrap(),
        vec!["start:slow", "start:fast", "end:fast", "end:slow"]
    );
}

#[tokio::test]
async fn handlers_added_during_dispatch_wait_for_the_next_publish() {
    let bus = EventBus::new();
    let late_calls = Arc::new(AtomicUsize::new(0));
    let late_counter = Arc::clone(&late_calls);
    let late: Handler = sync_handler(move |_| {
        late_counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let adder_bus = bus.clone();
    let adder_late = late.clone();
    bus.subscribe(
        "grow",
        sync_handler(move |_| {
            adder_bus.subscribe("grow", adder_late.clone());
            Ok(())
        }),
    );

    let first = bus.publish("grow", None).await;
    assert_eq!(first.invoked(), 1);
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    bus.publish("grow", None).await;
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handlers_removed_during_dispatch_finish_the_current_publish_only() {
    let bus = EventBus::new();
    let victim_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&victim_calls);
    let victim: Handler = sync_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let remover_bus = bus.clone();
    let remover_victim = victim.clone();
    bus.subscribe(
        "shrink",
        sync_handler(move |_| {
            remover_bus.unsubscribe("shrink", &remover_victim);
            Ok(())
        }),
    );
    bus.subscribe("shrink", victim.clone());

    bus.publish("shrink", None).await;
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);

    bus.publish("shrink", None).await;
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
    assert!(!bus.is_subscribed("shrink", &victim));
}

#[tokio::test]
async fn publish_to_unknown_topic_invokes_nothing() {
    let bus = EventBus::new();
    let report = bus.publish("nobody:listens", Some(json!({}))).await;
    assert_eq!(report.topic, "nobody:listens");
    assert_eq!(report.invoked(), 0);
    assert!(report.is_clean());
}
