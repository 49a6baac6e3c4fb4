//! Room invites and links.
//!
//! A room is addressed as `{origin}/room/{game_id}?c={code}`.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInvite {
    pub game_id: String,
    /// Join code (the room password).
    pub code: String,
}

impl RoomInvite {
    pub fn new(game_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            code: code.into(),
        }
    }

    pub fn path(&self) -> String {
        format!("/room/{}?c={}", self.game_id, self.code)
    }

    pub fn link(&self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self.path())
    }

    /// Parses a full link, a `/room/..` path, or `game_id code`.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let input = input.trim();
        let mut words = input.split_whitespace();
        if let (Some(game_id), Some(code), None) = (words.next(), words.next(), words.next()) {
            if ![game_id, code].iter().any(|w| w.contains(['/', '?'])) {
                return Ok(Self::new(game_id, code));
            }
        }

        let link = input.split_whitespace().next().unwrap_or_default();
        let (_, rest) = link
            .split_once("/room/")
            .with_context(|| format!("'{input}' is not a room link"))?;
        let (game_id, query) = rest
            .split_once('?')
            .with_context(|| format!("'{input}' has no join code"))?;
        let code = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("c="))
            .with_context(|| format!("'{input}' has no join code"))?;
        let game_id = percent_decode(game_id.trim_end_matches('/'))?;
        let code = percent_decode(code.split('#').next().unwrap_or_default())?;
        if game_id.is_empty() || code.is_empty() {
            bail!("'{input}' has an empty game id or join code");
        }
        Ok(Self::new(game_id, code))
    }
}

/// Decodes `%XX` escapes and `+` as used in query strings.
fn percent_decode(raw: &str) -> anyhow::Result<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = [bytes.next(), bytes.next()];
                let [Some(hi), Some(lo)] = hex else {
                    bail!("truncated escape in '{raw}'");
                };
                let digit = |d: u8| char::from(d).to_digit(16);
                let (Some(hi), Some(lo)) = (digit(hi), digit(lo)) else {
                    bail!("bad escape in '{raw}'");
                };
                out.push((hi * 16 + lo) as u8);
            }
            _ => out.push(b),
        }
    }
    String::from_utf8(out).with_context(|| format!("'{raw}' is not valid UTF-8 once decoded"))
}

impl std::fmt::Display for RoomInvite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room {} (code {})", self.game_id, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_format() {
        let invite = RoomInvite::new("12", "x9k");
        assert_eq!(
            invite.link("http://localhost:3000/"),
            "http://localhost:3000/room/12?c=x9k"
        );
    }

    #[test]
    fn parses_links_paths_and_pairs() {
        let want = RoomInvite::new("12", "x9k");
        assert_eq!(
            RoomInvite::parse("https://play.example/room/12?c=x9k").unwrap(),
            want
        );
        assert_eq!(RoomInvite::parse("/room/12?foo=1&c=x9k").unwrap(), want);
        assert_eq!(RoomInvite::parse("12 x9k").unwrap(), want);
    }

    #[test]
    fn link_with_trailing_word_is_still_a_link() {
        assert_eq!(
            RoomInvite::parse("https://play.example/room/12?c=x9k please").unwrap(),
            RoomInvite::new("12", "x9k")
        );
        assert_eq!(
            RoomInvite::parse("/room/7?c=abc thanks").unwrap(),
            RoomInvite::new("7", "abc")
        );
    }

    #[test]
    fn join_code_is_percent_decoded() {
        assert_eq!(RoomInvite::parse("/room/12?c=a%20b").unwrap().code, "a b");
        assert_eq!(RoomInvite::parse("/room/12?c=a+b%2Fc").unwrap().code, "a b/c");
        assert!(RoomInvite::parse("/room/12?c=x%2").is_err());
        assert!(RoomInvite::parse("/room/12?c=x%zz").is_err());
        assert!(RoomInvite::parse("/room/12?c=x%+1").is_err());
    }

    #[test]
    fn rejects_incomplete_links() {
        assert!(RoomInvite::parse("https://play.example/room/12").is_err());
        assert!(RoomInvite::parse("https://play.example/lobby?c=1").is_err());
        assert!(RoomInvite::parse("/room/?c=").is_err());
    }
}
