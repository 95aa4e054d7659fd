//! End-to-end forwarder scenarios, driven entirely through `ForwarderCommand`
//! (the one channel every face or client actually uses) rather than real
//! sockets — the forwarder core doesn't know or care what's on the other
//! end of a face's sender.

use bytes::Bytes;
use ccnd_common::metrics::ForwarderMetrics;
use ccnd_common::name::Name;
use ccnd_common::packet::{self, ContentObject, ContentType, Interest, SignedInfo};
use ccnd_common::types::FaceId;
use ccnd_core::{Forwarder, ForwarderCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn spawn() -> (mpsc::UnboundedSender<ForwarderCommand>, Arc<ForwarderMetrics>) {
    let metrics = Arc::new(ForwarderMetrics::new());
    let (forwarder, tx) = Forwarder::new(metrics.clone());
    tokio::spawn(forwarder.run());
    (tx, metrics)
}

async fn attach(tx: &mpsc::UnboundedSender<ForwarderCommand>, face: FaceId) -> mpsc::UnboundedReceiver<Bytes> {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    tx.send(ForwarderCommand::FaceUp { face, sender: out_tx }).unwrap();
    out_rx
}

fn register(tx: &mpsc::UnboundedSender<ForwarderCommand>, prefix: &str, face: FaceId) {
    tx.send(ForwarderCommand::RegisterPrefix { prefix: Name::from_uri(prefix), face }).unwrap();
}

#[tokio::test]
async fn echo_scenario_interest_is_answered_by_matching_content() {
    let (tx, _metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    let mut consumer = attach(&tx, FaceId(2)).await;
    register(&tx, "ccnx:/echo", FaceId(1));

    let interest = Interest::new(Name::from_uri("ccnx:/echo/ping")).with_nonce(Bytes::from_static(b"n-echo"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(2), bytes: packet::encode_interest(&interest) }).unwrap();

    let forwarded = producer.recv().await.unwrap();
    let (decoded, _) = packet::parse_interest(&forwarded).unwrap();
    assert_eq!(decoded.name, interest.name);

    let co = ContentObject::new_signed(Name::from_uri("ccnx:/echo/ping"), SignedInfo::new(ContentType::Data), Bytes::from_static(b"pong"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(1), bytes: packet::encode_content_object(&co) }).unwrap();

    let reply = consumer.recv().await.unwrap();
    let (decoded_co, _, _) = packet::parse_content_object(&reply).unwrap();
    assert_eq!(decoded_co.content, Bytes::from_static(b"pong"));
}

#[tokio::test]
async fn aggregation_scenario_one_upstream_forward_answers_two_downstream_interests() {
    let (tx, metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    let mut consumer_a = attach(&tx, FaceId(2)).await;
    let mut consumer_b = attach(&tx, FaceId(3)).await;
    register(&tx, "ccnx:/agg", FaceId(1));

    let name = Name::from_uri("ccnx:/agg/shared");
    tx.send(ForwarderCommand::Inbound {
        face: FaceId(2),
        bytes: packet::encode_interest(&Interest::new(name.clone()).with_nonce(Bytes::from_static(b"a"))),
    })
    .unwrap();
    tx.send(ForwarderCommand::Inbound {
        face: FaceId(3),
        bytes: packet::encode_interest(&Interest::new(name.clone()).with_nonce(Bytes::from_static(b"b"))),
    })
    .unwrap();

    // Only the first Interest should reach the producer; the second
    // aggregates onto the same PIT entry.
    let forwarded = producer.recv().await.unwrap();
    let (decoded, _) = packet::parse_interest(&forwarded).unwrap();
    assert_eq!(decoded.name, name);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), producer.recv()).await.is_err(),
        "second Interest must not generate a second upstream forward"
    );

    let co = ContentObject::new_signed(name, SignedInfo::new(ContentType::Data), Bytes::from_static(b"shared-data"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(1), bytes: packet::encode_content_object(&co) }).unwrap();

    let reply_a = consumer_a.recv().await.unwrap();
    let reply_b = consumer_b.recv().await.unwrap();
    assert_eq!(reply_a, reply_b);
    assert_eq!(metrics.interests_aggregated.value(), 1);
}

#[tokio::test]
async fn loop_suppression_drops_a_repeated_nonce_on_the_same_fingerprint() {
    let (tx, metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    let _consumer = attach(&tx, FaceId(2)).await;
    register(&tx, "ccnx:/loop", FaceId(1));

    let interest = Interest::new(Name::from_uri("ccnx:/loop/x")).with_nonce(Bytes::from_static(b"dup"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(2), bytes: packet::encode_interest(&interest) }).unwrap();
    producer.recv().await.unwrap();

    // Same fingerprint, same nonce, different arrival face: must be
    // recognized as a loop and dropped rather than aggregated or forwarded
    // again.
    tx.send(ForwarderCommand::Inbound { face: FaceId(3), bytes: packet::encode_interest(&interest) }).unwrap();

    assert!(
        tokio::time::timeout(Duration::from_millis(50), producer.recv()).await.is_err(),
        "a repeated nonce must not trigger a second upstream forward"
    );
    assert_eq!(metrics.interests_dropped_loop.value(), 1);
}

#[tokio::test]
async fn content_store_serves_a_second_interest_without_reaching_the_producer() {
    let (tx, metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    let mut consumer = attach(&tx, FaceId(2)).await;
    register(&tx, "ccnx:/cache", FaceId(1));

    let name = Name::from_uri("ccnx:/cache/object");
    tx.send(ForwarderCommand::Inbound {
        face: FaceId(2),
        bytes: packet::encode_interest(&Interest::new(name.clone()).with_nonce(Bytes::from_static(b"first"))),
    })
    .unwrap();
    producer.recv().await.unwrap();

    let co = ContentObject::new_signed(name.clone(), SignedInfo::new(ContentType::Data), Bytes::from_static(b"cached"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(1), bytes: packet::encode_content_object(&co) }).unwrap();
    consumer.recv().await.unwrap();

    // A fresh Interest for the same name should be answered straight from
    // the content store; the producer must see nothing further.
    tx.send(ForwarderCommand::Inbound {
        face: FaceId(2),
        bytes: packet::encode_interest(&Interest::new(name).with_nonce(Bytes::from_static(b"second"))),
    })
    .unwrap();
    let cached_reply = consumer.recv().await.unwrap();
    let (decoded, _, _) = packet::parse_content_object(&cached_reply).unwrap();
    assert_eq!(decoded.content, Bytes::from_static(b"cached"));

    assert!(
        tokio::time::timeout(Duration::from_millis(50), producer.recv()).await.is_err(),
        "a cache hit must not reach the producer face"
    );
    assert_eq!(metrics.cs_hits.value(), 1);
}

#[tokio::test]
async fn a_locally_published_object_is_cached_before_any_interest_arrives() {
    let (tx, metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    let mut consumer = attach(&tx, FaceId(2)).await;
    register(&tx, "ccnx:/x", FaceId(1));

    let name = Name::from_uri("ccnx:/x/y");
    let co = ContentObject::new_signed(name.clone(), SignedInfo::new(ContentType::Data), Bytes::from_static(b"published"));
    tx.send(ForwarderCommand::Inbound { face: FaceId(1), bytes: packet::encode_content_object(&co) }).unwrap();
    // Give the forwarder task a moment to process the unsolicited publish.
    tokio::time::sleep(Duration::from_millis(20)).await;

    tx.send(ForwarderCommand::Inbound {
        face: FaceId(2),
        bytes: packet::encode_interest(&Interest::new(name).with_nonce(Bytes::from_static(b"q"))),
    })
    .unwrap();
    let reply = consumer.recv().await.unwrap();
    let (decoded, _, _) = packet::parse_content_object(&reply).unwrap();
    assert_eq!(decoded.content, Bytes::from_static(b"published"));

    assert!(
        tokio::time::timeout(Duration::from_millis(50), producer.recv()).await.is_err(),
        "a cache hit on pre-published content must not forward an Interest to the publisher"
    );
    assert_eq!(metrics.content_unsolicited.value(), 1);
}

#[tokio::test]
async fn expiry_without_satisfaction_deletes_the_entry_and_re_expression_starts_fresh() {
    let (tx, metrics) = spawn();
    let mut producer = attach(&tx, FaceId(1)).await;
    register(&tx, "ccnx:/expiry", FaceId(1));

    let name = Name::from_uri("ccnx:/expiry/never-answered");
    let first = Interest::new(name.clone()).with_nonce(Bytes::from_static(b"e1")).with_lifetime_ms(200);
    tx.send(ForwarderCommand::Inbound { face: FaceId(2), bytes: packet::encode_interest(&first) }).unwrap();
    producer.recv().await.unwrap();

    // F2 never answers; the PIT sweep (every 100ms) must delete the entry
    // once its 200ms lifetime elapses, with no further forward generated.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        tokio::time::timeout(Duration::from_millis(50), producer.recv()).await.is_err(),
        "an expired entry must not be retransmitted on its own"
    );
    assert_eq!(metrics.interests_timed_out.value(), 1);

    // Re-expressing with a fresh nonce starts a brand new PIT entry and is
    // forwarded again.
    let second = Interest::new(name).with_nonce(Bytes::from_static(b"e2")).with_lifetime_ms(4000);
    tx.send(ForwarderCommand::Inbound { face: FaceId(2), bytes: packet::encode_interest(&second) }).unwrap();
    let refreshed = producer.recv().await.unwrap();
    let (decoded, _) = packet::parse_interest(&refreshed).unwrap();
    assert_eq!(decoded.nonce, second.nonce);
}
