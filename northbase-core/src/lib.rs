#![doc = "northbase-core: core logic library for northbase."]

//! This crate holds everything northbase does apart from talking HTTP and
//! parsing command lines: path sanitising, the cache index, the session
//! lifecycle, the bounded worker pool and the get/put/pull engine.
//!
//! # Usage
//! Implement [`contract::RemoteStore`] for a concrete backend, build a
//! [`synchronise::SyncEngine`] from [`config::Settings`], and call its
//! operations.

pub mod cache_index;
pub mod config;
pub mod contract;
pub mod error;
pub mod executor;
mod fsutil;
pub mod path;
pub mod session;
pub mod session_store;
pub mod synchronise;

pub use error::{NorthbaseError, RemoteError, Result};
