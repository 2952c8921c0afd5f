//! Builds the call paths appended to the connection URL.
//!
//! # Design
//! Every identifier and free-text value is sent as URL-safe base64 of its
//! UTF-8 bytes (`+` becomes `-`, `/` becomes `_`, padding kept), so a
//! segment can never contain a raw path separator. The player IP and the
//! ban minutes / history count are sent verbatim; the service validates
//! them, not the client.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

/// URL-safe base64 of `value`'s UTF-8 bytes, padding kept.
pub fn encode_safe(value: &str) -> String {
    URL_SAFE.encode(value.as_bytes())
}

/// `info/<gameId>/<ip>/<verbose>`, with empty segments for omitted options.
pub fn encode_info(game_id: &str, player_ip: &str, verbose: bool) -> String {
    let game_id = encode_safe(game_id);
    [
        "info",
        game_id.as_str(),
        player_ip,
        if verbose { "verbose" } else { "" },
    ]
    .join("/")
}

/// `ban/<gameId>/<handle>/<bannerId>/<admins>/<minutes>/<reason>`.
pub fn encode_ban<S: AsRef<str>>(
    game_id: &str,
    handle: &str,
    banner_id: &str,
    admin_ids: &[S],
    minutes: i32,
    reason: &str,
) -> String {
    let admins = admin_ids
        .iter()
        .map(|admin| encode_safe(admin.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    let reason = if reason.is_empty() {
        String::new()
    } else {
        encode_safe(reason)
    };
    [
        "ban".to_string(),
        encode_safe(game_id),
        encode_safe(handle),
        encode_safe(banner_id),
        admins,
        minutes.to_string(),
        reason,
    ]
    .join("/")
}

pub fn encode_ban_info(game_id: &str) -> String {
    format!("banInfo/{}", encode_safe(game_id))
}

/// `count` is passed through unclamped, including zero and negatives.
pub fn encode_ban_history(game_id: &str, count: i32) -> String {
    format!("banHistory/{}/{count}", encode_safe(game_id))
}

/// Parameters of an info lookup. Defaults to no player IP and a non-verbose
/// state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoQuery {
    pub game_id: String,
    pub player_ip: String,
    pub verbose: bool,
}

impl InfoQuery {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            ..Self::default()
        }
    }

    /// IP of a player who just joined; used by the service for verification.
    pub fn player_ip(mut self, ip: impl Into<String>) -> Self {
        self.player_ip = ip.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn path(&self) -> String {
        encode_info(&self.game_id, &self.player_ip, self.verbose)
    }
}

/// Parameters of a ban. Defaults to no other admins online, zero minutes
/// (permanent) and no reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanQuery {
    pub game_id: String,
    /// In-game name at the time of the ban.
    pub handle: String,
    /// Game ID of the banning admin; empty for the console.
    pub banner_id: String,
    pub admin_ids: Vec<String>,
    pub minutes: i32,
    pub reason: String,
}

impl BanQuery {
    pub fn new(
        game_id: impl Into<String>,
        handle: impl Into<String>,
        banner_id: impl Into<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            handle: handle.into(),
            banner_id: banner_id.into(),
            ..Self::default()
        }
    }

    pub fn admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_ids = admins.into_iter().map(Into::into).collect();
        self
    }

    pub fn minutes(mut self, minutes: i32) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn path(&self) -> String {
        encode_ban(
            &self.game_id,
            &self.handle,
            &self.banner_id,
            self.admin_ids.as_slice(),
            self.minutes,
            &self.reason,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn encode_safe_substitutes_unsafe_characters() {
        // "??>" encodes to "Pz8+" and "???" to "Pz8/" in the standard alphabet.
        assert_eq!(encode_safe("??>"), "Pz8-");
        assert_eq!(encode_safe("???"), "Pz8_");
    }

    #[test]
    fn encode_safe_keeps_padding() {
        assert_eq!(encode_safe("a"), "YQ==");
    }

    #[test]
    fn encode_safe_uses_utf8_bytes() {
        assert_eq!(encode_safe("é"), "w6k=");
    }

    #[test]
    fn encoded_segments_decode_back() {
        let reason = "a/b+c ??? >>> ünïcode";
        let path = encode_ban("id/with+slash", "h", "", &[] as &[&str], 10, reason);
        let segments: Vec<&str> = path.split('/').collect();
        assert_eq!(segments.len(), 7);

        let restore = |s: &str| {
            let standard = s.replace('_', "/").replace('-', "+");
            String::from_utf8(STANDARD.decode(standard).unwrap()).unwrap()
        };
        assert_eq!(restore(segments[1]), "id/with+slash");
        assert_eq!(restore(segments[6]), reason);
        assert!(!segments[6].contains('+'));
    }

    #[test]
    fn info_path_with_defaults() {
        assert_eq!(encode_info("abc", "", false), "info/YWJj//");
        assert_eq!(InfoQuery::new("abc").path(), "info/YWJj//");
    }

    #[test]
    fn info_path_with_ip_and_verbose() {
        let query = InfoQuery::new("abc").player_ip("10.0.0.1").verbose(true);
        assert_eq!(query.path(), "info/YWJj/10.0.0.1/verbose");
    }

    #[test]
    fn info_path_verbose_without_ip() {
        assert_eq!(encode_info("abc", "", true), "info/YWJj//verbose");
    }

    #[test]
    fn ban_path_joins_admins_with_commas() {
        let query = BanQuery::new("abc", "player", "admin")
            .admins(["a1", "a2"])
            .minutes(30)
            .reason("spam");
        assert_eq!(
            query.path(),
            "ban/YWJj/cGxheWVy/YWRtaW4=/YTE=,YTI=/30/c3BhbQ=="
        );
    }

    #[test]
    fn ban_path_with_defaults() {
        let query = BanQuery::new("abc", "player", "");
        assert_eq!(query.path(), "ban/YWJj/cGxheWVy///0/");
    }

    #[test]
    fn ban_info_path() {
        assert_eq!(encode_ban_info("abc"), "banInfo/YWJj");
    }

    #[test]
    fn ban_history_count_is_not_clamped() {
        assert_eq!(encode_ban_history("abc", 0), "banHistory/YWJj/0");
        assert_eq!(encode_ban_history("abc", -5), "banHistory/YWJj/-5");
    }
}
