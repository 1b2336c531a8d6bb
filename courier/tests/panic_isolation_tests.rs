/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Subscriber panic isolation.
//!
//! These tests panic on purpose inside subscribers, so they use
//! `#[tokio::test]`: the `#[courier_test]` panic hook would fail them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use courier::prelude::*;

#[tokio::test]
async fn test_panicking_subscriber_is_isolated() -> anyhow::Result<()> {
    let bus = Bus::with_config(BusConfig::default());
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counter = hits.clone();
        bus.subscribe("fragile", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }
    let _faulty = bus.subscribe("fragile", |_, _| panic!("Intentional test panic in subscriber"));

    bus.publish("fragile", json!(1));
    bus.publish("fragile", json!(2));

    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(bus.stats().subscriber_panics(), 2);
    assert_eq!(bus.stats().delivered(), 4);
    assert_eq!(bus.subscriber_count("fragile"), 3);
    Ok(())
}

#[tokio::test]
async fn test_panicking_responder_leads_to_timeout() -> anyhow::Result<()> {
    let bus = Bus::with_config(BusConfig::default());
    let _faulty = bus.subscribe("explode", |_, _| panic!("Intentional test panic in responder"));

    let outcome = bus
        .request_with_timeout("explode", json!(null), std::time::Duration::from_millis(20))
        .await;

    assert!(matches!(outcome, Err(BusError::Timeout { .. })));
    assert_eq!(bus.channel_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_panicking_subscriber_still_relays() -> anyhow::Result<()> {
    let bus = Bus::with_config(BusConfig::default());
    let (near, far) = MemoryEndpoint::pair("near", "far");
    bus.attach(&near)?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    assert!(far.listen(Arc::new(move |value: Value| {
        let _ = tx.send(value);
    })));
    let _faulty = bus.subscribe("alerts", |_, _| panic!("Intentional test panic before relay"));

    bus.publish("alerts", json!("fire"));

    let relayed = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await?;
    let envelope = relayed
        .as_ref()
        .and_then(Envelope::recognize)
        .expect("relayed value is an envelope");
    assert_eq!(envelope.channel(), "alerts");
    assert_eq!(envelope.payload(), &json!("fire"));
    Ok(())
}
