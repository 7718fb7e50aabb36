//! Configuration structures and loading.
//!
//! [`FeedConfig`] carries every engine knob: per-channel admission limits
//! and cache delays, the normal-queue throttle, and the response timeout.
//! [`ConfigLoader`] reads it from YAML, TOML or JSON with environment
//! variable overrides.

mod engine;
mod loader;

pub use engine::{ChannelConfig, FeedConfig, ThrottleConfig, WireConfig};
pub use loader::{ConfigFormat, ConfigLoader};
