//! Feed Session Walkthrough
//!
//! Drives a `FeedEngine` through one scripted publisher session: admission
//! under a channel limit, synchronisation, release into the deactivation
//! cache, a timed-out activation with retry, and an offline/online sweep.
//! The publisher side is played by this program, answering the requests the
//! engine puts on the wire.
//!
//! # Running
//!
//! ```bash
//! cargo run --example feed_session
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use sirocco_core::error::WireError;
use sirocco_core::prelude::*;
use sirocco_engine::{FeedEngine, RequestTransport};

/// Transport that parks each request for the scripted publisher to answer.
#[derive(Clone, Default)]
struct ScriptedWire {
    sent: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl ScriptedWire {
    fn drain(&self) -> Vec<OutboundRequest> {
        self.sent.lock().drain(..).collect()
    }
}

impl RequestTransport for ScriptedWire {
    fn send(&mut self, request: &OutboundRequest) -> Result<(), WireError> {
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

/// Answers every pending activation with one trade print and a
/// synchronisation-complete marker, skipping `silent` if given.
fn answer_activations(
    engine: &mut FeedEngine<ScriptedWire>,
    wire: &ScriptedWire,
    silent: Option<SubscriptionId>,
) {
    for request in wire.drain() {
        if !request.is_activate() || silent == Some(request.subscription) {
            continue;
        }
        let print = TradePrint::new(
            Symbol::new_unchecked("BTC-USDT"),
            Timestamp::new_unchecked(1_756_425_600_000),
            Price::new_unchecked(dec!(64250)),
            Qty::new_unchecked(dec!(0.25)),
        );
        engine.handle_message(PublisherMessage::data(
            request.subscription,
            request.request_nr,
            FeedPayload::Trade(print),
        ));
        engine.handle_message(PublisherMessage::sync_complete(
            request.subscription,
            request.request_nr,
        ));
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("═══════════════════════════════════════════════════");
    info!("        Sirocco Feed Session Walkthrough");
    info!("═══════════════════════════════════════════════════");

    // Trades channel: at most two active feeds, released feeds linger in
    // the cache for two seconds before the unsubscribe goes out.
    let config = FeedConfig::default().with_channel(
        ChannelKind::Trades,
        ChannelConfig::default()
            .with_active_limit(2)
            .with_cache_delay(Duration::from_secs(2)),
    );
    let wire = ScriptedWire::default();
    let mut engine = FeedEngine::new(config, wire.clone())?;
    engine.come_online();

    // ─── Step 1: three subscriptions, two slots ────────────────────────
    let btc = engine.subscribe(DataDefinition::trades(Symbol::new("BTC-USDT")?));
    let eth = engine.subscribe(DataDefinition::trades(Symbol::new("ETH-USDT")?));
    let sol = engine.subscribe(DataDefinition::trades(Symbol::new("SOL-USDT")?));

    engine.attach_observer(&btc, |_, notice| {
        info!(?notice, "btc notice");
    });

    engine.tick(MonoTime::from_millis(10))?;
    let stats = engine.admission_stats(ChannelKind::Trades);
    info!(kept = stats.kept, queued = stats.queued, "after admission");
    info!(badness = %engine.snapshot(&sol).unwrap().badness, "sol waiting for a slot");

    // ETH stays silent so its activation times out later.
    let eth_id = eth.id();
    answer_activations(&mut engine, &wire, Some(eth_id));
    engine.tick(MonoTime::from_millis(20))?;
    info!(badness = %engine.snapshot(&btc).unwrap().badness, "btc synchronised");

    // ─── Step 2: release BTC, the queued SOL takes its slot ────────────
    engine.unsubscribe(&btc)?;
    engine.tick(MonoTime::from_millis(30))?;
    answer_activations(&mut engine, &wire, Some(eth_id));
    engine.tick(MonoTime::from_millis(40))?;
    let stats = engine.admission_stats(ChannelKind::Trades);
    info!(
        kept = stats.kept,
        cached = stats.cached,
        "btc cached, sol active"
    );

    // Subscribing BTC again inside the cache window needs no wire traffic.
    let btc = engine.subscribe(DataDefinition::trades(Symbol::new("BTC-USDT")?));
    engine.tick(MonoTime::from_millis(50))?;
    info!(
        pending = engine.pending_requests(),
        "btc reclaimed from cache"
    );

    // ─── Step 3: the silent ETH activation times out and retries ───────
    engine.tick(MonoTime::from_millis(5_050))?;
    info!(badness = %engine.snapshot(&eth).unwrap().badness, "eth timed out");
    engine.tick(MonoTime::from_millis(5_350))?;
    answer_activations(&mut engine, &wire, None);
    engine.tick(MonoTime::from_millis(5_360))?;
    info!(badness = %engine.snapshot(&eth).unwrap().badness, "eth recovered on retry");

    // ─── Step 4: connection drops and comes back ───────────────────────
    engine.go_offline("publisher closed the socket");
    info!(badness = %engine.snapshot(&btc).unwrap().badness, "while offline");
    engine.come_online();
    engine.tick(MonoTime::from_millis(6_000))?;
    answer_activations(&mut engine, &wire, None);
    engine.tick(MonoTime::from_millis(6_010))?;
    info!(badness = %engine.snapshot(&btc).unwrap().badness, "after reconnect");

    info!(
        subscriptions = engine.subscription_count(),
        "session complete"
    );
    Ok(())
}
