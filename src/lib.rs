//! # presence-tracker
//!
//! Technician presence for a service shop: who is online, what they are
//! working on, and when they went quiet.
//!
//! Provides the roster store, the session-guarded presence tracker, idle
//! and heartbeat timers driven by tokio, and OpenTelemetry observability.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod idle;
pub mod model;
pub mod roster;
pub mod service;
pub mod telemetry;
pub mod tracker;
