//! # End-to-End Request Flows
//!
//! Every context issues requests against one background worker:
//!
//! - Chromium page / content script: native messaging straight to the worker
//! - Firefox page: fallback bus -> content-script relay -> native messaging

#[cfg(test)]
mod tests {
    use crate::integration::harness::{Harness, EXTENSION_ID, REDLINE_PRICE};
    use bridge_bus::PostMessageBus;
    use bridge_runtime::{BridgeClient, BrowserFamily, ExecutionContext, Realm, TransportKind};
    use bridge_types::{
        BusMessage, ErrorKind, ExtensionVersion, FetchPrice, FetchPriceRequest, FetchStall,
        FetchStallRequest, ListItem, ListItemRequest, RequestEnvelope,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const SETTLE: Duration = Duration::from_secs(2);

    /// One client per transport path.
    fn clients(harness: &Harness) -> Vec<BridgeClient> {
        vec![
            harness.client(Realm::ContentScript, BrowserFamily::Firefox),
            harness.client(Realm::Page, BrowserFamily::Chromium),
            harness.client(Realm::Page, BrowserFamily::Firefox),
        ]
    }

    fn redline() -> FetchPriceRequest {
        FetchPriceRequest {
            name: "AK-47 | Redline".into(),
        }
    }

    // =========================================================================
    // SCENARIO A: REGISTERED HANDLER
    // =========================================================================

    #[tokio::test]
    async fn test_fetch_price_resolves_on_every_path() {
        let harness = Harness::start().unwrap().with_relay();

        for client in clients(&harness) {
            let response = timeout(SETTLE, client.send(FetchPrice, redline()))
                .await
                .expect("request settled")
                .expect("request resolved");
            assert_eq!(response.price, REDLINE_PRICE, "via {}", client.transport_kind());
        }
        assert_eq!(harness.handler_calls(), 3);

        harness.shutdown().await;
    }

    #[tokio::test]
    async fn test_raw_and_typed_sends_agree() {
        let harness = Harness::start().unwrap();
        let client = harness.client(Realm::Page, BrowserFamily::Chromium);

        let raw = client
            .send_raw("FETCH_PRICE", json!({"name": "AK-47 | Redline"}))
            .await
            .unwrap();
        assert_eq!(raw, json!({"price": 1250}));

        let listing = client
            .send(
                ListItem,
                ListItemRequest {
                    asset_id: "30123456789".into(),
                    price: 1250,
                    description: None,
                    private: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(listing.id, "listing-30123456789");
    }

    #[tokio::test]
    async fn test_extension_version_from_every_context() {
        let harness = Harness::start().unwrap().with_relay();

        for client in clients(&harness) {
            let response = timeout(SETTLE, client.send(ExtensionVersion, ()))
                .await
                .unwrap()
                .unwrap();
            assert!(!response.version.is_empty());
        }
    }

    // =========================================================================
    // SCENARIO B: UNREGISTERED TYPE
    // =========================================================================

    #[tokio::test]
    async fn test_unregistered_type_is_rejected_on_every_path() {
        let harness = Harness::start().unwrap().with_relay();

        for client in clients(&harness) {
            let err = timeout(SETTLE, client.send_raw("NOT_REGISTERED", json!({})))
                .await
                .unwrap()
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnknownRequestType);
            assert!(err.to_string().contains("UNKNOWN_REQUEST_TYPE"));
            assert!(err.message.contains("NOT_REGISTERED"));
        }
        assert_eq!(harness.handler_calls(), 0);
    }

    #[tokio::test]
    async fn test_catalog_type_without_handler_is_unknown() {
        let harness = Harness::start().unwrap();
        let client = harness.client(Realm::Background, BrowserFamily::Chromium);

        let err = client.send_raw("FETCH_SKIN_MODEL", json!({})).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownRequestType);
    }

    // =========================================================================
    // VERSIONING
    // =========================================================================

    #[tokio::test]
    async fn test_future_version_is_rejected_before_any_handler_runs() {
        let harness = Harness::start().unwrap().with_relay();

        for client in clients(&harness) {
            let mut envelope = RequestEnvelope::new("FETCH_PRICE", json!({"name": "AK-47 | Redline"}));
            envelope.version = 2;

            let err = timeout(SETTLE, client.send_envelope(envelope))
                .await
                .unwrap()
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnsupportedVersion);
        }
        assert_eq!(harness.handler_calls(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_version_is_answered_on_both_transports() {
        let harness = Harness::start().unwrap().with_relay();
        let huge = |id: u64| {
            json!({
                "version": 4_294_967_296u64,
                "request_type": "FETCH_PRICE",
                "request": {"name": "AK-47 | Redline"},
                "id": id
            })
        };

        let native = harness
            .hub
            .messenger()
            .send_value(EXTENSION_ID, huge(7))
            .await
            .unwrap();
        assert_eq!(native.into_result().unwrap_err().kind, ErrorKind::UnsupportedVersion);

        // Posted the way a page script would, then answered by the relay.
        let mut watcher = harness.page.subscribe();
        let mut message = huge(111);
        message["type"] = json!("BRIDGE_REQUEST");
        harness.page.post(message);

        let response = timeout(SETTLE, async {
            loop {
                if let Some(BusMessage::Response(response)) =
                    watcher.recv().await.as_ref().and_then(BusMessage::from_value)
                {
                    break response;
                }
            }
        })
        .await
        .expect("relay answered");
        let (id, envelope) = response.into_parts();
        assert_eq!(id.as_u64(), 111);
        assert_eq!(envelope.into_result().unwrap_err().kind, ErrorKind::UnsupportedVersion);
        assert_eq!(harness.handler_calls(), 0);
    }

    // =========================================================================
    // HANDLER FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_handler_failure_message_is_preserved() {
        let harness = Harness::start().unwrap().with_relay();

        for client in clients(&harness) {
            let err = timeout(
                SETTLE,
                client.send(FetchStall, FetchStallRequest { steam_id: "private".into() }),
            )
            .await
            .unwrap()
            .unwrap_err();
            assert_eq!(err.kind, ErrorKind::HandlerFailure);
            assert_eq!(err.message, "stall is private");
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_the_dispatcher() {
        let harness = Harness::start().unwrap();
        let client = harness.client(Realm::ContentScript, BrowserFamily::Chromium);

        let err = client
            .send(FetchStall, FetchStallRequest { steam_id: "panic".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::HandlerFailure);
        assert!(err.message.contains("stall cache poisoned"));

        let price = client.send(FetchPrice, redline()).await.unwrap();
        assert_eq!(price.price, REDLINE_PRICE);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_a_handler_failure() {
        let harness = Harness::start().unwrap();
        let client = harness.client(Realm::Page, BrowserFamily::Chromium);

        let err = client
            .send_raw("FETCH_PRICE", json!({"item": 42}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::HandlerFailure);
        assert!(err.message.contains("FETCH_PRICE"));
    }

    // =========================================================================
    // TRANSPORT EDGES
    // =========================================================================

    #[tokio::test]
    async fn test_wrong_extension_id_is_unreachable() {
        let harness = Harness::start().unwrap();
        let client = harness
            .client(Realm::Page, BrowserFamily::Chromium)
            .with_extension_id("someone-else");

        let err = client.send(FetchPrice, redline()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnreachableExtension);
    }

    #[tokio::test]
    async fn test_worker_serving_page_directly() {
        let harness = Harness::start().unwrap();
        harness.worker.serve_page(&harness.page);

        let ctx = ExecutionContext::new(Realm::Page, BrowserFamily::Firefox);
        let client = BridgeClient::fallback(ctx, Arc::new(PostMessageBus::attach(harness.page.clone())));
        assert_eq!(client.transport_kind(), TransportKind::FallbackBus);

        let price = timeout(SETTLE, client.send(FetchPrice, redline()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(price.price, REDLINE_PRICE);
    }

    #[tokio::test]
    async fn test_shutdown_worker_rejects_every_path() {
        let harness = Harness::start().unwrap().with_relay();
        let firefox_page = harness.client(Realm::Page, BrowserFamily::Firefox);
        let chrome_page = harness.client(Realm::Page, BrowserFamily::Chromium);
        assert!(harness.hub.is_listening(EXTENSION_ID));

        let Harness {
            hub, worker, relay, ..
        } = harness;
        worker.shutdown().await;
        assert!(!hub.is_listening(EXTENSION_ID));

        let err = chrome_page.send(FetchPrice, redline()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnreachableExtension);

        // The relay is still up and reports the dead worker back over the bus.
        let err = timeout(SETTLE, firefox_page.send(FetchPrice, redline()))
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnreachableExtension);

        if let Some(relay) = relay {
            relay.stop().await;
        }
    }
}
