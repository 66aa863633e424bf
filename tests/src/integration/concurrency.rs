//! # Concurrent In-Flight Requests
//!
//! Many outstanding calls from one context must each settle with their own
//! response, whatever order the handlers finish in, and unrelated traffic
//! on the page channel must not disturb them.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{delayed, Harness};
    use bridge_bus::{BusResponder, PageChannel, PostMessageBus, RequestSink};
    use bridge_runtime::{BrowserFamily, Realm};
    use bridge_types::{
        BusMessage, BusResponse, CorrelationId, FetchRecommendedPrice,
        FetchRecommendedPriceRequest, RequestEnvelope, ResponseEnvelope,
    };
    use futures::future::join_all;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const N: u64 = 8;
    const STEP: Duration = Duration::from_millis(15);
    const SETTLE: Duration = Duration::from_secs(3);

    /// Request `i` finishes after `(N - i) * STEP`, so the last one sent
    /// finishes first.
    fn reversed_requests() -> Vec<(u64, FetchRecommendedPriceRequest)> {
        (0..N)
            .map(|i| {
                let request = FetchRecommendedPriceRequest {
                    market_hash_name: delayed(STEP * (N - i) as u32, 1000 + i),
                };
                (1000 + i, request)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_reverse_completion_order_native() {
        let harness = Harness::start().unwrap();
        let client = harness.client(Realm::ContentScript, BrowserFamily::Chromium);

        let calls = reversed_requests().into_iter().map(|(expected, request)| {
            let client = &client;
            async move {
                let response = client.send(FetchRecommendedPrice, request).await.unwrap();
                (expected, response.price)
            }
        });

        let results = timeout(SETTLE, join_all(calls)).await.unwrap();
        for (expected, actual) in results {
            assert_eq!(expected, actual);
        }
        assert_eq!(harness.handler_calls(), N as usize);
    }

    #[tokio::test]
    async fn test_reverse_completion_order_over_bus() {
        let harness = Harness::start().unwrap().with_relay();
        let client = harness.client(Realm::Page, BrowserFamily::Firefox);

        let calls = reversed_requests().into_iter().map(|(expected, request)| {
            let client = &client;
            async move {
                let response = client.send(FetchRecommendedPrice, request).await.unwrap();
                (expected, response.price)
            }
        });

        let results = timeout(SETTLE, join_all(calls)).await.unwrap();
        for (expected, actual) in results {
            assert_eq!(expected, actual);
        }

        let stats = client.bus_stats().unwrap();
        assert_eq!(stats.completed, N);
        assert_eq!(stats.outstanding, 0);
    }

    // =========================================================================
    // SCENARIO C: RESPONSES ARRIVE OUT OF ORDER
    // =========================================================================

    #[tokio::test]
    async fn test_bus_routes_by_id_not_arrival_order() {
        let page = PageChannel::new();
        let mut requests = page.subscribe();
        let bus = PostMessageBus::attach(page.clone());

        let first = bus.send_request(RequestEnvelope::with_id(
            CorrelationId::from_raw(111),
            "FETCH_PRICE",
            json!({"name": "first"}),
        ));
        let second = bus.send_request(RequestEnvelope::with_id(
            CorrelationId::from_raw(222),
            "FETCH_PRICE",
            json!({"name": "second"}),
        ));

        // Answer once both requests are on the channel: 222 first, then 111.
        let responder = page.clone();
        let answer = async move {
            let mut seen = Vec::new();
            while seen.len() < 2 {
                if let Some(BusMessage::Request(request)) =
                    requests.recv().await.as_ref().and_then(BusMessage::from_value)
                {
                    seen.push(request.id);
                }
            }
            for (id, payload) in [(222, json!({"price": 2})), (111, json!({"price": 1}))] {
                let response =
                    BusResponse::new(CorrelationId::from_raw(id), ResponseEnvelope::success(payload));
                responder.post(BusMessage::Response(response).to_value());
            }
            seen
        };

        let (first, second, seen) = timeout(SETTLE, async { tokio::join!(first, second, answer) })
            .await
            .unwrap();

        assert_eq!(first, Ok(json!({"price": 1})));
        assert_eq!(second, Ok(json!({"price": 2})));
        assert_eq!(seen.len(), 2);
    }

    // =========================================================================
    // NOISY CHANNEL
    // =========================================================================

    struct Echo;

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(SETTLE, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition reached");
    }

    #[async_trait::async_trait]
    impl RequestSink for Echo {
        async fn deliver(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
            ResponseEnvelope::success(envelope.request)
        }
    }

    #[tokio::test]
    async fn test_noise_and_stray_responses_do_not_disturb_callers() {
        let page = PageChannel::new();
        BusResponder::new(&page, Arc::new(Echo)).spawn();
        let bus = PostMessageBus::attach(page.clone());

        let noise_page = page.clone();
        let noise = tokio::spawn(async move {
            for i in 0..2_000u64 {
                noise_page.post(json!({"source": "react-devtools", "seq": i}));
                noise_page.post(json!("hello"));
                noise_page.post(json!({"type": "BRIDGE_RESPONSE", "id": "not-a-number"}));
                noise_page.post(
                    BusMessage::Response(BusResponse::new(
                        CorrelationId::from_raw(CorrelationId::MAX - i),
                        ResponseEnvelope::failure("stray"),
                    ))
                    .to_value(),
                );
                tokio::task::yield_now().await;
            }
        });

        let calls = (0..20u64).map(|i| {
            let bus = &bus;
            async move {
                let response = bus
                    .send_request(RequestEnvelope::new("ECHO", json!({ "seq": i })))
                    .await;
                (i, response)
            }
        });
        let results = timeout(SETTLE, join_all(calls)).await.unwrap();
        noise.await.unwrap();

        for (i, response) in results {
            assert_eq!(response, Ok(json!({ "seq": i })));
        }
        assert_eq!(bus.stats().completed, 20);
        wait_until(|| bus.stats().unroutable > 0).await;
    }

    #[tokio::test]
    async fn test_two_buses_on_one_page_stay_separate() {
        let page = PageChannel::new();
        BusResponder::new(&page, Arc::new(Echo)).spawn();
        let left = PostMessageBus::attach(page.clone());
        let right = PostMessageBus::attach(page.clone());

        let (l, r) = timeout(SETTLE, async {
            tokio::join!(
                left.send_request(RequestEnvelope::new("ECHO", json!("left"))),
                right.send_request(RequestEnvelope::new("ECHO", json!("right"))),
            )
        })
        .await
        .unwrap();

        assert_eq!(l, Ok(json!("left")));
        assert_eq!(r, Ok(json!("right")));
        // Each bus sees the other's response and drops it.
        wait_until(|| left.stats().unroutable == 1 && right.stats().unroutable == 1).await;
    }
}
