//! Rally route watcher.
//!
//! Periodically crawls the provider's one-way transfer offers, works out
//! which routes appeared or vanished since the last run, and tells users
//! about new routes touching their favourite stations.

pub mod config;
pub mod domain;
pub mod geocode;
pub mod notify;
pub mod rally;
pub mod store;
pub mod sync;
pub mod web;
