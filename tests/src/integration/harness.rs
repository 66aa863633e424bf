//! A background worker with a small set of test handlers, plus clients for
//! any context.
//!
//! ## Handlers
//!
//! - `FETCH_PRICE`: fixed price table, unknown items fail
//! - `FETCH_RECOMMENDED_PRICE`: `market_hash_name = "<delay_ms>:<price>"`,
//!   sleeps then answers with the price
//! - `FETCH_STALL`: `steam_id = "private"` fails, `"panic"` panics
//! - `LIST_ITEM`: answers with `listing-<asset_id>`
//! - `EXTENSION_VERSION`: built in

use bridge_bus::PageChannel;
use bridge_runtime::{
    BackgroundWorker, BridgeClient, BridgeConfig, BrowserFamily, ContentScriptRelay,
    ExecutionContext, HandlerRegistryBuilder, NativeMessaging, Realm, RegistryError, SimpleHandler,
};
use bridge_types::{
    FetchPrice, FetchPriceResponse, FetchRecommendedPrice, FetchRecommendedPriceResponse,
    FetchStall, FetchStallResponse, ListItem, ListItemResponse,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const EXTENSION_ID: &str = "bridge-test-extension";

/// Price of the one item in the price table, in cents.
pub const REDLINE_PRICE: u64 = 1250;

pub struct Harness {
    pub hub: NativeMessaging,
    pub page: PageChannel,
    pub config: BridgeConfig,
    pub worker: BackgroundWorker,
    /// Handler invocations across all test handlers.
    pub calls: Arc<AtomicUsize>,
    /// Present after [`with_relay`](Self::with_relay).
    pub relay: Option<ContentScriptRelay>,
}

impl Harness {
    pub fn start() -> anyhow::Result<Self> {
        let config = BridgeConfig {
            extension_id: EXTENSION_ID.to_string(),
            ..BridgeConfig::default()
        };
        let hub = NativeMessaging::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let worker = BackgroundWorker::start(&config, &hub, move |builder, _fetcher| {
            register_test_handlers(builder, counter)
        })?;

        Ok(Self {
            hub,
            page: PageChannel::new(),
            config,
            worker,
            calls,
            relay: None,
        })
    }

    /// Start the content-script relay for the page channel.
    pub fn with_relay(mut self) -> Self {
        self.relay = Some(ContentScriptRelay::start(
            &self.page,
            self.hub.messenger(),
            EXTENSION_ID,
        ));
        self
    }

    /// A client for `realm` on `browser`, with transport picked accordingly.
    pub fn client(&self, realm: Realm, browser: BrowserFamily) -> BridgeClient {
        BridgeClient::for_context(
            ExecutionContext::new(realm, browser),
            &self.config,
            self.hub.messenger(),
            &self.page,
        )
    }

    pub fn handler_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        if let Some(relay) = self.relay {
            relay.stop().await;
        }
        self.worker.shutdown().await;
    }
}

/// Encode a delayed recommended-price request.
pub fn delayed(delay: Duration, price: u64) -> String {
    format!("{}:{}", delay.as_millis(), price)
}

fn register_test_handlers(
    builder: &mut HandlerRegistryBuilder,
    calls: Arc<AtomicUsize>,
) -> Result<(), RegistryError> {
    let counter = Arc::clone(&calls);
    builder.register(
        FetchPrice,
        SimpleHandler::new(FetchPrice, move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match req.name.as_str() {
                    "AK-47 | Redline" => Ok(FetchPriceResponse {
                        price: REDLINE_PRICE,
                    }),
                    other => anyhow::bail!("no price for {other}"),
                }
            }
        }),
    )?;

    let counter = Arc::clone(&calls);
    builder.register(
        FetchRecommendedPrice,
        SimpleHandler::new(FetchRecommendedPrice, move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let (delay, price) = req
                    .market_hash_name
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("expected <delay_ms>:<price>"))?;
                let delay: u64 = delay.parse()?;
                let price: u64 = price.parse()?;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                anyhow::Ok(FetchRecommendedPriceResponse { price })
            }
        }),
    )?;

    let counter = Arc::clone(&calls);
    builder.register(
        FetchStall,
        SimpleHandler::new(FetchStall, move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match req.steam_id.as_str() {
                    "private" => anyhow::bail!("stall is private"),
                    "panic" => panic!("stall cache poisoned"),
                    _ => Ok(FetchStallResponse::default()),
                }
            }
        }),
    )?;

    builder.register(
        ListItem,
        SimpleHandler::new(ListItem, move |req| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                anyhow::Ok(ListItemResponse {
                    id: format!("listing-{}", req.asset_id),
                })
            }
        }),
    )?;

    Ok(())
}
