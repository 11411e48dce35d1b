//! Pasteguard - Rate-limited paste storage
//!
//! This crate implements the storage and abuse-control core of a pastebin:
//! fixed-window rate limiting per client and action, unguessable paste ids,
//! expiring and one-use pastes, and the background jobs that keep both the
//! limiter state and the paste table bounded.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod paste;
pub mod ratelimit;
pub mod service;
