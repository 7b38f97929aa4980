//! End-to-end exercise of [`rabbit::engine::Burrow`] over an in-memory
//! tunnel pair: handshake, directory listing, content fetch, and the
//! publish/subscribe fan-out path (spec §8 scenarios S1-S3).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rabbit::engine::Burrow;
use rabbit_core::{BurrowConfig, Capabilities, Tunnel};
use rabbit_proto::{Dispatcher, ResumeRegistry, TopicRegistry};
use rabbit_registry::MemoryRegistry;
use rabbit_testkit::tunnel_pair;
use rabbit_wire::{Body, Frame, StartLine};

fn sample_registry() -> Arc<MemoryRegistry> {
    let reg = MemoryRegistry::new();
    reg.add_menu(
        "/",
        "root",
        vec!["/0/readme".to_string(), "/q/news".to_string()],
    );
    reg.add_item(
        "/0/readme",
        "readme",
        "text/plain",
        Bytes::from_static(b"Rabbit runs fast and light."),
    );
    reg.add_topic("/q/news", "news");
    Arc::new(reg)
}

fn responder_burrow(tunnel: Arc<Tunnel>) -> Burrow<MemoryRegistry> {
    let dispatcher = Dispatcher::new(sample_registry(), 1024);
    Burrow::new(
        tunnel,
        dispatcher,
        Arc::new(TopicRegistry::new(256)),
        Arc::new(ResumeRegistry::new()),
        Capabilities::LANES | Capabilities::ASYNC | Capabilities::RESUME,
    )
}

#[tokio::test]
async fn hello_then_list_then_fetch_over_a_tunnel_pair() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(0).unwrap();
    let mut hello = Frame::new(StartLine::new("HELLO", vec!["RABBIT/1.0".to_string()]));
    hello.headers.push("Caps", "lanes,async").unwrap();
    pair.initiator.send(0, hello, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.word, "200");
    assert_eq!(resp.start.args, vec!["HELLO".to_string()]);

    pair.initiator.open_lane(1).unwrap();
    let mut list = Frame::new(StartLine::new("LIST", vec!["/".to_string()]));
    list.headers.push("Txn", "L1").unwrap();
    pair.initiator.send(1, list, false).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["MENU".to_string()]);
    let body = std::str::from_utf8(resp.body.as_bytes().unwrap()).unwrap();
    assert!(body.contains("/0/readme"));
    assert!(body.ends_with(".\r\n"));

    let mut fetch = Frame::new(StartLine::new("FETCH", vec!["/0/readme".to_string()]));
    fetch.headers.push("Txn", "F1").unwrap();
    pair.initiator.send(1, fetch, false).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["CONTENT".to_string()]);
    assert_eq!(
        resp.body.as_bytes().unwrap().as_ref(),
        b"Rabbit runs fast and light."
    );
}

#[tokio::test]
async fn duplicate_idem_is_not_redispatched() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(1).unwrap();
    let mut fetch = Frame::new(StartLine::new("FETCH", vec!["/0/readme".to_string()]));
    fetch.headers.push("Idem", "dup-1").unwrap();
    pair.initiator.send(1, fetch.clone(), false).await.unwrap();
    let (_, first) = pair.initiator.recv().await.unwrap();
    assert_eq!(first.start.args, vec!["CONTENT".to_string()]);

    // Same Idem token again: the responder answers nothing further for it,
    // so the next thing the initiator sees is an unrelated PING reply.
    pair.initiator.send(1, fetch, false).await.unwrap();
    let mut ping = Frame::new(StartLine::new("PING", vec![]));
    ping.headers.push("Lane", "1").unwrap();
    pair.initiator.send(1, ping, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["PONG".to_string()]);
}

#[tokio::test]
async fn subscribe_then_publish_delivers_event() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(2).unwrap();
    let sub = Frame::new(StartLine::new("SUBSCRIBE", vec!["/q/news".to_string()]));
    pair.initiator.send(2, sub, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["SUBSCRIBED".to_string()]);

    pair.initiator.open_lane(3).unwrap();
    let mut publish = Frame::new(StartLine::new("PUBLISH", vec!["/q/news".to_string()]));
    publish.body = Body::Full(Bytes::from_static(b"breaking news"));
    pair.initiator.send(3, publish, false).await.unwrap();

    // The EVENT fan-out (lane 2, the subscriber) and the PUBLISH ack (lane
    // 3, the publisher) are independent sends; collect both regardless of
    // arrival order.
    let mut saw_event = false;
    let mut saw_done = false;
    for _ in 0..2 {
        let (_, resp) = pair.initiator.recv().await.unwrap();
        match resp.start.word.as_str() {
            "EVENT" => {
                saw_event = true;
                assert_eq!(resp.body.as_bytes().unwrap().as_ref(), b"breaking news");
            }
            "204" => saw_done = true,
            other => panic!("unexpected frame {other}"),
        }
    }
    assert!(saw_event && saw_done);
}

#[tokio::test]
async fn cancel_closes_lane_and_answers_canceled() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(1).unwrap();
    let mut cancel = Frame::new(StartLine::new("CANCEL", vec![]));
    cancel.headers.push("Txn", "C1").unwrap();
    pair.initiator.send(1, cancel, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.word, "499");
    assert_eq!(resp.start.args, vec!["CANCELED".to_string()]);
    assert_eq!(resp.headers.get("Txn"), Some("C1"));
}

#[tokio::test]
async fn a_credit_exhausted_subscriber_does_not_block_other_subscribers_or_the_publishers_done() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    // Two subscribers on the same topic; lane 2's is torn down from the
    // responder's side (standing in for an outbound send failure, e.g. a
    // credit-exhausted lane) after both subscribe but before the publish,
    // so its delivery is the one that fails.
    pair.initiator.open_lane(2).unwrap();
    let sub = Frame::new(StartLine::new("SUBSCRIBE", vec!["/q/news".to_string()]));
    pair.initiator.send(2, sub, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["SUBSCRIBED".to_string()]);

    pair.initiator.open_lane(4).unwrap();
    let healthy_sub = Frame::new(StartLine::new("SUBSCRIBE", vec!["/q/news".to_string()]));
    pair.initiator.send(4, healthy_sub, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["SUBSCRIBED".to_string()]);

    pair.responder.close_lane(2);

    pair.initiator.open_lane(3).unwrap();
    let mut publish = Frame::new(StartLine::new("PUBLISH", vec!["/q/news".to_string()]));
    publish.body = Body::Full(Bytes::from_static(b"breaking news"));
    pair.initiator.send(3, publish, false).await.unwrap();

    let mut saw_event_on_lane_4 = false;
    let mut saw_done = false;
    for _ in 0..2 {
        let (lane_id, resp) = pair.initiator.recv().await.unwrap();
        match resp.start.word.as_str() {
            "EVENT" => {
                assert_eq!(lane_id, 4);
                saw_event_on_lane_4 = true;
            }
            "204" => saw_done = true,
            other => panic!("unexpected frame {other}"),
        }
    }
    assert!(saw_event_on_lane_4 && saw_done);
}

#[tokio::test]
async fn timeout_header_of_zero_yields_408_instead_of_the_normal_response() {
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(1).unwrap();
    let mut fetch = Frame::new(StartLine::new("FETCH", vec!["/0/readme".to_string()]));
    fetch.headers.push("Timeout", "0").unwrap();
    pair.initiator.send(1, fetch, false).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.word, "408");
    assert_eq!(resp.start.args, vec!["TIMEOUT".to_string()]);
}

#[tokio::test]
async fn acking_a_subscriber_lets_it_keep_receiving_past_the_inflight_limit() {
    let dispatcher = Dispatcher::new(sample_registry(), 1024);
    let pair = tunnel_pair(BurrowConfig::default());
    let responder = Burrow::new(
        pair.responder.clone(),
        dispatcher,
        Arc::new(TopicRegistry::new(1)),
        Arc::new(ResumeRegistry::new()),
        Capabilities::LANES | Capabilities::ASYNC,
    );
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    pair.initiator.open_lane(2).unwrap();
    let sub = Frame::new(StartLine::new("SUBSCRIBE", vec!["/q/news".to_string()]));
    pair.initiator.send(2, sub, true).await.unwrap();
    let (_, resp) = pair.initiator.recv().await.unwrap();
    assert_eq!(resp.start.args, vec!["SUBSCRIBED".to_string()]);

    for n in 0..3 {
        pair.initiator.open_lane(3).unwrap();
        let mut publish = Frame::new(StartLine::new("PUBLISH", vec!["/q/news".to_string()]));
        publish.body = Body::Full(Bytes::from(format!("event {n}")));
        pair.initiator.send(3, publish, false).await.unwrap();

        let (_, event) = pair.initiator.recv().await.unwrap();
        assert_eq!(event.start.word, "EVENT");
        let seq: u64 = event.headers.get("Seq").unwrap().parse().unwrap();

        let mut ack = Frame::new(StartLine::new("ACK", vec![]));
        ack.headers.push("Ack", seq.to_string()).unwrap();
        pair.initiator.send(2, ack, true).await.unwrap();

        let (_, done) = pair.initiator.recv().await.unwrap();
        assert_eq!(done.start.word, "204");
    }
}

#[tokio::test]
async fn idle_tunnel_gets_a_heartbeat_ping() {
    let mut config = BurrowConfig::default();
    config.heartbeat = Duration::from_millis(20);
    let pair = tunnel_pair(config);
    let responder = responder_burrow(pair.responder.clone());
    tokio::spawn(async move {
        let _ = responder.run().await;
    });

    let (_, ping) = tokio::time::timeout(Duration::from_secs(1), pair.initiator.recv())
        .await
        .expect("expected a heartbeat PING within 1s")
        .unwrap();
    assert_eq!(ping.start.word, "PING");
}
