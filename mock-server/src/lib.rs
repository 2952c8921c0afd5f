//! In-memory stand-in for the CPAS HTTP API.
//!
//! Answers `GET /<key>/<host>/<port>/<call>/...` for the `info`, `ban`,
//! `banInfo` and `banHistory` calls with the same JSON the real service
//! sends. Bans are kept in memory per decoded game ID. A configurable delay
//! and status code let tests exercise timeouts and transport failures, and
//! the state counts concurrent requests so pool limits can be observed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{extract::State, http::Uri, Json, Router};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub use axum::http::StatusCode;

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// The only key the server accepts.
    pub api_key: String,
    /// Artificial latency added to every call.
    pub delay: Duration,
    /// Status code of every response.
    pub status: StatusCode,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            api_key: "test-key".to_string(),
            delay: Duration::ZERO,
            status: StatusCode::OK,
        }
    }
}

#[derive(Clone, Debug)]
struct StoredBan {
    date: i64,
    minutes: i32,
    reason: String,
}

struct Inner {
    config: MockConfig,
    bans: RwLock<HashMap<String, Vec<StoredBan>>>,
    inflight: AtomicUsize,
    peak: AtomicUsize,
    requests: AtomicUsize,
}

/// Shared server state. Clones observe the same counters and ban store.
#[derive(Clone)]
pub struct MockState {
    inner: Arc<Inner>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                bans: RwLock::new(HashMap::new()),
                inflight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Highest number of calls handled at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }
}

pub fn app() -> Router {
    app_with(MockState::new(MockConfig::default()))
}

pub fn app_with(state: MockState) -> Router {
    Router::new().fallback(handle_call).with_state(state)
}

pub async fn run_with(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

struct InflightGuard<'a>(&'a Inner);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn handle_call(State(state): State<MockState>, uri: Uri) -> (StatusCode, Json<Value>) {
    let inner = &*state.inner;
    inner.requests.fetch_add(1, Ordering::SeqCst);
    let now = inner.inflight.fetch_add(1, Ordering::SeqCst) + 1;
    inner.peak.fetch_max(now, Ordering::SeqCst);
    let _guard = InflightGuard(inner);

    if !inner.config.delay.is_zero() {
        tokio::time::sleep(inner.config.delay).await;
    }

    let segments: Vec<&str> = uri.path().trim_start_matches('/').split('/').collect();
    debug!(path = uri.path(), "mock call");
    let body = match segments.as_slice() {
        [key, _host, _port, call @ ..] if *key == inner.config.api_key => dispatch(inner, call).await,
        [_, _, _, _, ..] => service_error("Invalid API key", "key not recognised"),
        _ => service_error("Malformed request", "expected /key/host/port/call"),
    };
    (inner.config.status, Json(body))
}

async fn dispatch(inner: &Inner, call: &[&str]) -> Value {
    let result = match call {
        ["info", game_id, _ip, verbose] => info(game_id, verbose),
        ["ban", game_id, handle, banner, admins, minutes, reason] => {
            ban(inner, game_id, handle, banner, admins, minutes, reason).await
        }
        ["banInfo", game_id] => ban_info(inner, game_id).await,
        ["banHistory", game_id, count] => ban_history(inner, game_id, count).await,
        _ => Err("Unknown API call".to_string()),
    };
    result.unwrap_or_else(|e| service_error(&e, ""))
}

fn service_error(error: &str, internal: &str) -> Value {
    json!({ "error": error, "internalError": internal })
}

fn decode_segment(segment: &str) -> Result<String, String> {
    let bytes = URL_SAFE
        .decode(segment)
        .map_err(|e| format!("Invalid base64 segment: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("Invalid UTF-8 segment: {e}"))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn info(game_id: &str, verbose: &str) -> Result<Value, String> {
    let game_id = decode_segment(game_id)?;
    let game_id = Uuid::parse_str(&game_id).unwrap_or_else(|_| Uuid::new_v4());
    let state = if verbose == "verbose" {
        json!(["not active"])
    } else {
        json!(0)
    };
    Ok(json!({
        "gameid": game_id,
        "userid": 0,
        "name": "",
        "primaryGroup": "",
        "primaryRank": 0,
        "groups": [],
        "division": "",
        "divisionName": "",
        "state": state,
        "dsInfo": {
            "ds": false,
            "chatTag": false,
            "chatAds": true,
            "motdAds": true,
            "spotlight": false,
            "nameColor": "",
            "joinMessage": ""
        },
        "verification": false,
        "verificationExpired": false
    }))
}

async fn ban(
    inner: &Inner,
    game_id: &str,
    handle: &str,
    banner: &str,
    admins: &str,
    minutes: &str,
    reason: &str,
) -> Result<Value, String> {
    let game_id = decode_segment(game_id)?;
    decode_segment(handle)?;
    decode_segment(banner)?;
    for admin in admins.split(',').filter(|a| !a.is_empty()) {
        decode_segment(admin)?;
    }
    let minutes: i32 = minutes.parse().map_err(|_| "Invalid ban time".to_string())?;
    let reason = match decode_segment(reason)? {
        r if r.is_empty() => "Banned".to_string(),
        r => r,
    };

    inner.bans.write().await.entry(game_id).or_default().push(StoredBan {
        date: unix_now(),
        minutes,
        reason,
    });
    Ok(json!({ "success": true }))
}

fn remaining(ban: &StoredBan) -> i32 {
    if ban.minutes == 0 {
        -1
    } else {
        ban.minutes
    }
}

async fn ban_info(inner: &Inner, game_id: &str) -> Result<Value, String> {
    let game_id = decode_segment(game_id)?;
    let bans = inner.bans.read().await;
    let latest = bans.get(&game_id).and_then(|b| b.last());
    Ok(match latest {
        Some(ban) => json!({ "duration": remaining(ban), "reason": ban.reason }),
        None => json!({ "duration": 0, "reason": "" }),
    })
}

async fn ban_history(inner: &Inner, game_id: &str, count: &str) -> Result<Value, String> {
    let game_id = decode_segment(game_id)?;
    let count = match count.parse::<i32>() {
        Ok(n) if n > 0 => n as usize,
        _ => 1,
    };
    let bans = inner.bans.read().await;
    let history: Vec<Value> = bans
        .get(&game_id)
        .map(|b| b.as_slice())
        .unwrap_or_default()
        .iter()
        .rev()
        .take(count)
        .map(|ban| {
            json!({
                "date": ban.date,
                "duration": remaining(ban),
                "length": ban.minutes,
                "reason": ban.reason,
            })
        })
        .collect();
    Ok(json!({ "bans": history }))
}
