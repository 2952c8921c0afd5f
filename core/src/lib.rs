//! Asynchronous client for the CPAS administrative API.
//!
//! # Overview
//! CPAS manages bans and forum verification for game servers. This crate
//! turns typed calls (info, ban, ban info, ban history) into HTTP GETs
//! against `base_url/api_key/host/port/<call path>`, runs them on a bounded
//! worker pool with a per-call timeout, decodes the JSON reply and delivers
//! the outcome to a completion handler exactly once.
//!
//! # Design
//! - `request` encodes call paths; identifiers and free text are sent as
//!   URL-safe base64.
//! - `decode` maps response bodies onto the shapes in `types`.
//! - `dispatcher` owns the pool, the timeout and the exactly-once delivery.
//! - `config` holds the connection settings; they can be swapped at any time
//!   without affecting calls already submitted.
//! - `CpasClient` composes the above into one call per operation.

pub mod client;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod error;
pub mod request;
pub mod types;

pub use client::CpasClient;
pub use config::{ConfigHolder, ConnectionConfig, DispatcherConfig};
pub use dispatcher::{CallHandle, Dispatcher, DispatcherMetrics};
pub use error::CpasError;
pub use request::{BanQuery, InfoQuery};
pub use types::{
    BanHistoryResult, BanInfoResult, BanRecord, BanSuccessResult, CpasResponse,
    DedicatedSupporterInfo, Group, InfoResult, Shape,
};
