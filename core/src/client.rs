//! Public entry point for the CPAS API.
//!
//! # Design
//! `CpasClient` is an explicit instance rather than a process-wide
//! singleton, so independent clients (and tests) never share configuration.
//! Each operation encodes its call path, hands it to the `Dispatcher` and
//! names the response type to decode into. Results arrive through the
//! handler, on a pool thread; callers that need them elsewhere forward them
//! through a channel.
//!
//! A client owns its worker pool. Drop it (or call `shutdown`) from plain
//! threads, not from inside an async runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigHolder, ConnectionConfig, DispatcherConfig};
use crate::dispatcher::{CallHandle, Dispatcher, DispatcherMetrics};
use crate::error::CpasError;
use crate::request::{encode_ban_history, encode_ban_info, BanQuery, InfoQuery};
use crate::types::{BanHistoryResult, BanInfoResult, BanSuccessResult, InfoResult};

/// Asynchronous client for the CPAS API.
pub struct CpasClient {
    connection: Arc<ConfigHolder>,
    dispatcher: Dispatcher,
}

impl CpasClient {
    /// A client with the default pool: up to 5 concurrent calls, 60 s idle
    /// timeout, 5 s fetch timeout. Must be configured before use.
    pub fn new() -> Result<Self, CpasError> {
        Self::with_settings(DispatcherConfig::default())
    }

    pub fn with_settings(settings: DispatcherConfig) -> Result<Self, CpasError> {
        let connection = Arc::new(ConfigHolder::new());
        let dispatcher = Dispatcher::new(connection.clone(), settings)?;
        Ok(Self {
            connection,
            dispatcher,
        })
    }

    /// Replace the connection settings. Calls already submitted keep the
    /// settings they started with; calls submitted afterwards use the new
    /// ones.
    pub fn reconfigure(
        &self,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<(), CpasError> {
        self.connection.reconfigure(base_url, api_key, host, port)
    }

    pub fn reconfigure_with(&self, config: ConnectionConfig) {
        self.connection.replace(config);
    }

    /// The connection settings new calls would use.
    pub fn connection(&self) -> Result<Arc<ConnectionConfig>, CpasError> {
        self.connection.snapshot()
    }

    /// Look up a game ID and its associated forum user. The service creates
    /// a blank entry for game IDs it has not seen.
    pub fn fetch_info<F>(&self, query: &InfoQuery, on_complete: F) -> CallHandle
    where
        F: FnOnce(Result<InfoResult, CpasError>) + Send + 'static,
    {
        self.dispatcher.submit(query.path(), on_complete)
    }

    /// Ban a game ID. A service-side refusal arrives as `Ok` with
    /// `BanSuccessResult::service_error` set.
    pub fn ban_user<F>(&self, ban: &BanQuery, on_complete: F) -> CallHandle
    where
        F: FnOnce(Result<BanSuccessResult, CpasError>) + Send + 'static,
    {
        self.dispatcher.submit(ban.path(), on_complete)
    }

    pub fn fetch_ban_info<F>(&self, game_id: &str, on_complete: F) -> CallHandle
    where
        F: FnOnce(Result<BanInfoResult, CpasError>) + Send + 'static,
    {
        self.dispatcher.submit(encode_ban_info(game_id), on_complete)
    }

    /// Up to `count` past bans. `count` is sent as given; the service
    /// replaces out-of-range values.
    pub fn fetch_ban_history<F>(&self, game_id: &str, count: i32, on_complete: F) -> CallHandle
    where
        F: FnOnce(Result<BanHistoryResult, CpasError>) + Send + 'static,
    {
        self.dispatcher.submit(encode_ban_history(game_id, count), on_complete)
    }

    pub fn metrics(&self) -> DispatcherMetrics {
        self.dispatcher.metrics()
    }

    /// Drain outstanding calls for up to `grace`, then stop the pool.
    pub fn shutdown(self, grace: Duration) {
        self.dispatcher.shutdown(grace);
    }
}
