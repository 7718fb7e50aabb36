//! Immutable descriptions of what a subscriber wants from the feed.
//!
//! A [`DataDefinition`] names an instrument plus a [`ChannelSpec`] selecting
//! the payload kind and its parameters. Definitions marked *referencable*
//! derive a stable [`FeedKey`] from their parameters; the engine deduplicates
//! such definitions so that several subscribers share one wire subscription.

use crate::types::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Aggregation period for candle data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    /// 1 minute candles
    M1,
    /// 5 minute candles
    M5,
    /// 15 minute candles
    M15,
    /// 30 minute candles
    M30,
    /// 1 hour candles
    H1,
    /// 4 hour candles
    H4,
    /// 1 day candles
    D1,
}

impl CandleInterval {
    /// Returns the duration of one candle at this interval.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::M1 => Duration::from_secs(60),
            Self::M5 => Duration::from_secs(5 * 60),
            Self::M15 => Duration::from_secs(15 * 60),
            Self::M30 => Duration::from_secs(30 * 60),
            Self::H1 => Duration::from_secs(60 * 60),
            Self::H4 => Duration::from_secs(4 * 60 * 60),
            Self::D1 => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::M1 => write!(f, "1m"),
            Self::M5 => write!(f, "5m"),
            Self::M15 => write!(f, "15m"),
            Self::M30 => write!(f, "30m"),
            Self::H1 => write!(f, "1h"),
            Self::H4 => write!(f, "4h"),
            Self::D1 => write!(f, "1d"),
        }
    }
}

/// The channel a definition requests, with its per-channel parameters.
///
/// Channels with different parameters (depth levels, candle interval) are
/// distinct subscriptions, but admission limits apply per [`ChannelKind`],
/// ignoring the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSpec {
    /// Individual trade prints.
    Trades,
    /// Best bid/ask quote updates.
    Quotes,
    /// Order-book depth snapshots limited to the given number of levels.
    Depth {
        /// Number of price levels per side.
        levels: u32,
    },
    /// Aggregated candles at a fixed interval.
    Candles {
        /// Aggregation period.
        interval: CandleInterval,
    },
}

impl ChannelSpec {
    /// Returns the parameter-free channel kind used for admission limits.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::Trades => ChannelKind::Trades,
            Self::Quotes => ChannelKind::Quotes,
            Self::Depth { .. } => ChannelKind::Depth,
            Self::Candles { .. } => ChannelKind::Candles,
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trades => write!(f, "trades"),
            Self::Quotes => write!(f, "quotes"),
            Self::Depth { levels } => write!(f, "depth@{levels}"),
            Self::Candles { interval } => write!(f, "candles@{interval}"),
        }
    }
}

/// Parameter-free channel discriminant; the admission controller's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Trade prints.
    Trades,
    /// Quote updates.
    Quotes,
    /// Order-book depth.
    Depth,
    /// Candles.
    Candles,
}

impl ChannelKind {
    /// All kinds, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Trades, Self::Quotes, Self::Depth, Self::Candles];

    /// Returns the kind as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Quotes => "quotes",
            Self::Depth => "depth",
            Self::Candles => "candles",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Send priority for the wire requests a definition generates.
///
/// High-priority requests bypass the throttled queue. Reserved for
/// control-plane subscriptions a host cannot afford to have queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    /// Throttled queue; the default for market data.
    #[default]
    Normal,
    /// Unthrottled queue.
    High,
}

impl fmt::Display for RequestPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Stable deduplication key for a referencable definition.
///
/// Two definitions with equal keys are the same logical feed and share one
/// subscription. The key text is derived, never parsed back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedKey(String);

impl FeedKey {
    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable description of one requested feed.
///
/// Constructed once and never mutated for the life of any subscription built
/// from it. The convenience constructors produce referencable definitions at
/// normal priority; chain [`Self::private`], [`Self::with_priority`] or
/// [`Self::with_resend_on_timeout`] to deviate.
///
/// # Examples
///
/// ```
/// use sirocco_core::definition::{CandleInterval, DataDefinition};
/// use sirocco_core::types::Symbol;
///
/// let btc = Symbol::new_unchecked("BTC-USDT");
/// let depth = DataDefinition::depth(btc.clone(), 10);
/// assert_eq!(depth.key().unwrap().as_str(), "depth@10/BTC-USDT");
///
/// let private = DataDefinition::candles(btc, CandleInterval::M1).private();
/// assert!(private.key().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataDefinition {
    /// Instrument the feed is for.
    pub symbol: Symbol,
    /// Channel and per-channel parameters.
    pub spec: ChannelSpec,
    /// Whether equal definitions may share one subscription.
    pub referencable: bool,
    /// Queue the definition's wire requests go to.
    pub priority: RequestPriority,
    /// Whether a timed-out activation is retried by resending.
    pub resend_on_timeout: bool,
}

impl DataDefinition {
    /// Creates a referencable, normal-priority definition.
    #[must_use]
    pub fn new(symbol: Symbol, spec: ChannelSpec) -> Self {
        Self {
            symbol,
            spec,
            referencable: true,
            priority: RequestPriority::Normal,
            resend_on_timeout: true,
        }
    }

    /// Creates a trade-print definition for a symbol.
    #[must_use]
    pub fn trades(symbol: Symbol) -> Self {
        Self::new(symbol, ChannelSpec::Trades)
    }

    /// Creates a quote definition for a symbol.
    #[must_use]
    pub fn quotes(symbol: Symbol) -> Self {
        Self::new(symbol, ChannelSpec::Quotes)
    }

    /// Creates a depth definition with the given level count.
    #[must_use]
    pub fn depth(symbol: Symbol, levels: u32) -> Self {
        Self::new(symbol, ChannelSpec::Depth { levels })
    }

    /// Creates a candle definition at the given interval.
    #[must_use]
    pub fn candles(symbol: Symbol, interval: CandleInterval) -> Self {
        Self::new(symbol, ChannelSpec::Candles { interval })
    }

    /// Marks the definition non-referencable: it always gets its own
    /// subscription, even when an equal definition is already active.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.referencable = false;
        self
    }

    /// Overrides the wire priority.
    #[must_use]
    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Overrides whether timed-out activations are resent.
    #[must_use]
    pub fn with_resend_on_timeout(mut self, resend: bool) -> Self {
        self.resend_on_timeout = resend;
        self
    }

    /// Returns the admission-controller channel for this definition.
    #[must_use]
    pub const fn channel(&self) -> ChannelKind {
        self.spec.kind()
    }

    /// Derives the stable deduplication key, if the definition is
    /// referencable.
    ///
    /// The key covers every parameter that distinguishes feeds (channel,
    /// channel parameters, symbol) but not delivery preferences such as
    /// priority.
    #[must_use]
    pub fn key(&self) -> Option<FeedKey> {
        if !self.referencable {
            return None;
        }
        Some(FeedKey(format!("{}/{}", self.spec, self.symbol)))
    }
}

impl fmt::Display for DataDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.spec, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> Symbol {
        Symbol::new_unchecked("BTC-USDT")
    }

    #[test]
    fn test_key_covers_channel_parameters() {
        let d10 = DataDefinition::depth(btc(), 10);
        let d20 = DataDefinition::depth(btc(), 20);
        assert_eq!(d10.key().unwrap().as_str(), "depth@10/BTC-USDT");
        assert_ne!(d10.key(), d20.key());

        let c1 = DataDefinition::candles(btc(), CandleInterval::M1);
        let c5 = DataDefinition::candles(btc(), CandleInterval::M5);
        assert_eq!(c1.key().unwrap().as_str(), "candles@1m/BTC-USDT");
        assert_ne!(c1.key(), c5.key());
    }

    #[test]
    fn test_key_ignores_delivery_preferences() {
        let normal = DataDefinition::trades(btc());
        let high = DataDefinition::trades(btc()).with_priority(RequestPriority::High);
        assert_eq!(normal.key(), high.key());
    }

    #[test]
    fn test_private_definition_has_no_key() {
        assert!(DataDefinition::quotes(btc()).private().key().is_none());
    }

    #[test]
    fn test_channel_kind_ignores_parameters() {
        assert_eq!(DataDefinition::depth(btc(), 5).channel(), ChannelKind::Depth);
        assert_eq!(DataDefinition::depth(btc(), 50).channel(), ChannelKind::Depth);
        assert_eq!(
            DataDefinition::candles(btc(), CandleInterval::H1).channel(),
            ChannelKind::Candles
        );
    }

    #[test]
    fn test_interval_durations() {
        assert_eq!(CandleInterval::M1.duration(), Duration::from_secs(60));
        assert_eq!(CandleInterval::H4.duration(), Duration::from_secs(14_400));
    }

    #[test]
    fn test_display() {
        let def = DataDefinition::depth(btc(), 10);
        assert_eq!(def.to_string(), "depth@10/BTC-USDT");
        assert_eq!(ChannelKind::Candles.to_string(), "candles");
    }
}
