// src/ingest/normalize.rs
//! Raw feed event → canonical post.
//!
//! Pure: the same `RawEvent` always yields the same outcome.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::ingest::types::{CanonicalPost, RawEvent};

/// Timestamp layout used by the feed, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const FEED_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Why an event did not produce a canonical post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dropped {
    /// Rebroadcast of another author's post; no original commentary.
    Repost,
    /// A required field is missing or unreadable.
    Malformed(&'static str),
}

impl Dropped {
    pub fn reason(&self) -> &'static str {
        match self {
            Dropped::Repost => "repost",
            Dropped::Malformed(_) => "malformed",
        }
    }
}

pub fn normalize(ev: &RawEvent) -> Result<CanonicalPost, Dropped> {
    if ev.is_repost() {
        return Err(Dropped::Repost);
    }

    let text = body_text(ev)?;
    let location = geo_location(ev.geo.as_ref()).or_else(|| profile_location(ev));

    let user = ev.user.as_ref().ok_or(Dropped::Malformed("user"))?;
    let author_id = user
        .id_str
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| user.id.map(|id| id.to_string()))
        .ok_or(Dropped::Malformed("author id"))?;

    let created_at = ev
        .created_at
        .as_deref()
        .and_then(parse_created_at)
        .ok_or(Dropped::Malformed("created_at"))?;

    Ok(CanonicalPost {
        author_id,
        created_at,
        text,
        location,
        follower_count: user.followers_count.unwrap_or(0),
    })
}

/// Truncated events carry the full body only in `extended_tweet.full_text`; the
/// short `text` field is never used for them.
fn body_text(ev: &RawEvent) -> Result<String, Dropped> {
    let raw = if ev.truncated.unwrap_or(false) {
        ev.extended_tweet
            .as_ref()
            .and_then(|x| x.full_text.as_deref())
            .ok_or(Dropped::Malformed("full_text"))?
    } else {
        ev.text.as_deref().ok_or(Dropped::Malformed("text"))?
    };

    // The feed escapes `&`, `<` and `>` in bodies.
    let text = html_escape::decode_html_entities(raw).to_string();
    if text.trim().is_empty() {
        return Err(Dropped::Malformed("empty text"));
    }
    Ok(text)
}

fn geo_location(geo: Option<&Value>) -> Option<String> {
    match geo? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(obj) => {
            let coords = obj.get("coordinates")?.as_array()?;
            let lat = coords.first()?.as_f64()?;
            let lon = coords.get(1)?.as_f64()?;
            Some(format!("{lat},{lon}"))
        }
        _ => None,
    }
}

fn profile_location(ev: &RawEvent) -> Option<String> {
    ev.user
        .as_ref()?
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_created_at(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s.trim(), FEED_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s.trim()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
