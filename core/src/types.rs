//! Response shapes returned by the CPAS API.
//!
//! # Design
//! Field names follow the service's JSON, which mixes lowercase (`gameid`,
//! `userid`) and camelCase keys. Unknown keys such as `division` and `state`
//! are ignored. Every non-optional field is required: a payload missing one
//! fails to decode as a whole rather than producing a half-filled value.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of response shapes a call can decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Info,
    BanSuccess,
    BanInfo,
    BanHistory,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Info => "info",
            Shape::BanSuccess => "ban-success",
            Shape::BanInfo => "ban-info",
            Shape::BanHistory => "ban-history",
        };
        f.write_str(name)
    }
}

/// A type the dispatcher can decode a response body into.
pub trait CpasResponse: DeserializeOwned + Send + 'static {
    const SHAPE: Shape;
}

/// A forum group and its rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub rank: i32,
}

/// Display preferences of a dedicated supporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DedicatedSupporterInfo {
    #[serde(rename = "ds")]
    pub is_dedicated_supporter: bool,
    #[serde(rename = "chatTag")]
    pub display_chat_tag: bool,
    #[serde(rename = "chatAds")]
    pub display_chat_ads: bool,
    #[serde(rename = "motdAds")]
    pub display_motd_ads: bool,
    #[serde(rename = "spotlight")]
    pub display_in_spotlight: bool,
    #[serde(rename = "nameColor")]
    pub name_color: String,
    #[serde(rename = "joinMessage")]
    pub join_message: String,
}

/// Identity and verification state for a game ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResult {
    #[serde(rename = "gameid", alias = "gameId")]
    pub game_id: Uuid,
    /// Forum user ID; 0 when the game ID has no associated user.
    #[serde(rename = "userid", alias = "userId")]
    pub user_id: i32,
    pub name: String,
    pub primary_group: String,
    pub primary_rank: i32,
    pub groups: Vec<Group>,
    pub division_name: String,
    pub ds_info: DedicatedSupporterInfo,
    pub verification: bool,
    pub verification_expired: bool,
}

impl InfoResult {
    /// The primary group paired with its rank.
    pub fn primary(&self) -> Group {
        Group {
            name: self.primary_group.clone(),
            rank: self.primary_rank,
        }
    }
}

impl CpasResponse for InfoResult {
    const SHAPE: Shape = Shape::Info;
}

/// Result of a ban request.
///
/// The service answers `{"success": true}` or an error document with `error`
/// and `internalError` keys; both decode into this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BanSuccessResult {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub internal_error: Option<String>,
}

impl BanSuccessResult {
    pub fn is_success(&self) -> bool {
        self.success == Some(true)
    }

    /// The service-reported error, if the response carried one.
    pub fn service_error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl CpasResponse for BanSuccessResult {
    const SHAPE: Shape = Shape::BanSuccess;
}

/// Current ban state of a game ID. `duration` is 0 when not banned and -1
/// for a permanent ban.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanInfoResult {
    pub duration: i32,
    pub reason: String,
}

impl CpasResponse for BanInfoResult {
    const SHAPE: Shape = Shape::BanInfo;
}

/// One past ban.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanRecord {
    /// Unix timestamp, in seconds, of when the ban was placed.
    #[serde(rename = "date")]
    pub banned_at: i64,
    /// Minutes remaining.
    pub duration: i32,
    /// Total length in minutes.
    pub length: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanHistoryResult {
    pub bans: Vec<BanRecord>,
}

impl CpasResponse for BanHistoryResult {
    const SHAPE: Shape = Shape::BanHistory;
}
