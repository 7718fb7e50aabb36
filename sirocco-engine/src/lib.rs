//! # Sirocco Engine
//!
//! The subscription engine for the Sirocco market-data feed.
//!
//! This crate provides:
//! - `FeedEngine`, the synchronous orchestrator: subscribe/unsubscribe,
//!   message handling, and the periodic `tick` that drives all timed work
//! - Per-channel admission control with want lists, soft active limits and
//!   a deactivation cache (`ChannelAdmission`)
//! - The per-subscription protocol state machine with retry and backoff
//! - The wire scheduler: priority queues, windowed throttling, in-flight
//!   response tracking (`WireManager`, `RequestTransport`)
//! - Re-entrancy-safe observer notification (`ObserverSet`, `Outbox`)
//! - `FeedRuntime`, a tokio event loop wrapping the engine for async hosts

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

/// Per-channel admission control
pub mod admission;

/// The orchestrating engine
pub mod engine;

/// Subscription notices and the dispatch outbox
pub mod events;

/// Observer registration and snapshotting
pub mod observer;

/// Retry policies and backoff strategies
pub mod retry;

/// Tokio event loop around the engine
pub mod runtime;

/// Subscription record and state enums
pub mod subscription;

/// Request scheduling and response tracking
pub mod wire;

mod protocol;

pub use engine::{FeedEngine, SubscriptionHandle, SubscriptionSnapshot};
pub use runtime::{ChannelTransport, EngineCommand, FeedRuntime, FeedRuntimeHandle, RuntimeObserver};
pub use wire::RequestTransport;
