//! Live sources, channel groups and programme guides.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::source::extractors::EngineProfile;
use crate::source::{ParseMode, PlayableReference};

/// Name of the favourites group kept at the top of every source.
pub const KEEP_GROUP: &str = "Keep";

/// A live source as configured, filled in by a `LiveLoader`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Live {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// IANA zone used for EPG dates ("" = process default).
    #[serde(default)]
    pub time_zone: String,
    /// XMLTV sources for the whole playlist.
    #[serde(default)]
    pub epg_xml: Vec<String>,
    /// Per-channel EPG URL template (`{name}`, `{epg}`, `{date}`).
    #[serde(default)]
    pub epg: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Native engine settings for `tvbus://` channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<EngineProfile>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Live {
    pub fn zone(&self) -> Tz {
        time_zone(&self.time_zone)
    }

    /// Drop empty groups and make sure the keep group comes first.
    pub fn verify(&mut self) {
        self.groups.retain(|g| !g.is_empty());
        if self.groups.is_empty() || self.groups[0].keep {
            return;
        }
        self.groups.insert(0, Group::keep_group());
    }

    pub fn find(&self, group: &str, channel: &str) -> Option<&LiveChannel> {
        self.groups
            .iter()
            .find(|g| g.name == group)?
            .channels
            .iter()
            .find(|c| c.name == channel)
    }
}

/// Resolve an IANA zone name; empty or unknown names fall back to `$TZ`, then UTC.
pub fn time_zone(name: &str) -> Tz {
    let name = name.trim();
    if !name.is_empty() {
        if let Ok(tz) = name.parse::<Tz>() {
            return tz;
        }
        tracing::warn!(zone = name, "unknown time zone");
    }
    std::env::var("TZ")
        .ok()
        .and_then(|tz| tz.trim_start_matches(':').parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Today's date in `tz`, formatted like EPG dates.
pub fn today(tz: Tz) -> String {
    Utc::now().with_timezone(&tz).format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub keep: bool,
    #[serde(default)]
    pub channels: Vec<LiveChannel>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Group::default()
        }
    }

    /// Always kept, even when empty.
    pub fn keep_group() -> Self {
        Self {
            name: KEEP_GROUP.to_string(),
            keep: true,
            channels: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.keep && self.channels.is_empty()
    }
}

/// One channel and its alternative lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveChannel {
    pub name: String,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Index into `urls` of the line being played.
    #[serde(default)]
    pub line: usize,
    /// EPG URL template for this channel.
    #[serde(default)]
    pub epg: String,
    #[serde(default)]
    pub tvg_id: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(skip)]
    pub data: Epg,
    /// Resolved URL of the current line.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parse_mode: ParseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Catchup::is_empty")]
    pub catchup: Catchup,
}

impl LiveChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..LiveChannel::default()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            msg: Some(msg.into()),
            ..LiveChannel::default()
        }
    }

    pub fn current_line(&self) -> Option<&str> {
        self.urls.get(self.line).map(String::as_str)
    }

    /// Move to the next line, wrapping around.
    pub fn next_line(&mut self) {
        if !self.urls.is_empty() {
            self.line = (self.line + 1) % self.urls.len();
        }
    }

    pub fn playable(&self) -> Option<PlayableReference> {
        let url = self.current_line()?;
        Some(PlayableReference::new(url).with_headers(self.headers.clone()))
    }

    pub fn apply(&mut self, reference: PlayableReference) {
        self.url = reference.url;
        self.headers = reference.headers;
        self.parse_mode = reference.parse_mode;
    }
}

lazy_static! {
    static ref TIME_PATTERN: Regex = Regex::new(r"\$\{\((b|e)\)([^}]*)\}").expect("catch-up time pattern");
}

/// Time-shift query used when a channel asks for catch-up without a source.
pub const DEFAULT_CATCHUP_SOURCE: &str = "?playseek=${(b)yyyyMMddHHmmss}-${(e)yyyyMMddHHmmss}";

/// Catch-up (time-shift) settings of a channel, from the playlist's
/// `catchup`, `catchup-source` and `catchup-replace` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catchup {
    /// `append`, `default`, `shift`... Empty when the channel has no catch-up.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Query or URL template with `${(b)FMT}`, `${(e)FMT}`, `{utc}`, `{utcend}`, `{duration}`.
    #[serde(default)]
    pub source: String,
    /// `from->to` rewrite applied to the live URL first.
    #[serde(default)]
    pub replace: String,
}

/// `yyyyMMddHHmmss`-style pattern to a chrono format string.
fn chrono_pattern(pattern: &str) -> String {
    pattern
        .replace('%', "%%")
        .replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

impl Catchup {
    pub fn is_empty(&self) -> bool {
        self.kind.trim().is_empty() && self.source.trim().is_empty()
    }

    /// Fields left empty here are taken from `defaults` (playlist-wide settings).
    pub fn or(mut self, defaults: &Catchup) -> Catchup {
        for (field, fallback) in [
            (&mut self.kind, &defaults.kind),
            (&mut self.source, &defaults.source),
            (&mut self.replace, &defaults.replace),
        ] {
            if field.trim().is_empty() {
                field.clone_from(fallback);
            }
        }
        self
    }

    fn fill(source: &str, start: &DateTime<Tz>, end: &DateTime<Tz>) -> String {
        let filled = TIME_PATTERN.replace_all(source, |caps: &Captures| {
            let at = if &caps[1] == "b" { start } else { end };
            at.format(&chrono_pattern(&caps[2])).to_string()
        });
        let (begin, finish) = (start.timestamp(), end.timestamp());
        filled
            .replace("${start}", &begin.to_string())
            .replace("${end}", &finish.to_string())
            .replace("{utc}", &begin.to_string())
            .replace("{utcend}", &finish.to_string())
            .replace("{start}", &begin.to_string())
            .replace("{end}", &finish.to_string())
            .replace("{duration}", &(finish - begin).to_string())
    }

    /// Playback URL for the programme between `start` and `end`, given the
    /// resolved live URL. Channels without catch-up keep `url`.
    pub fn format(&self, url: &str, start: &DateTime<Tz>, end: &DateTime<Tz>) -> String {
        if self.is_empty() {
            return url.to_string();
        }
        let mut base = url.to_string();
        if let Some((from, to)) = self.replace.split_once("->") {
            if !from.is_empty() {
                base = base.replace(from, to);
            }
        }
        let source = match self.source.trim() {
            "" => DEFAULT_CATCHUP_SOURCE,
            source => source,
        };
        let filled = Self::fill(source, start, end);
        if self.kind.eq_ignore_ascii_case("default") || filled.contains("://") {
            return filled;
        }
        match filled.strip_prefix('?') {
            Some(query) if base.contains('?') => format!("{}&{}", base, query),
            _ => format!("{}{}", base, filled),
        }
    }
}

/// Programme guide of one channel for one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Epg {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "epg_data", default)]
    pub list: Vec<EpgData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpgData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(skip)]
    pub start_ms: i64,
    #[serde(skip)]
    pub end_ms: i64,
    #[serde(default)]
    pub selected: bool,
}

fn local_millis(tz: Tz, date: &str, time: &str) -> Option<i64> {
    let text = format!("{}{}", date.trim(), time.trim());
    let naive = ["%Y-%m-%d%H:%M", "%Y-%m-%d%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&text, fmt).ok())?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

impl EpgData {
    /// Start and end of the programme in `tz`, when the guide gave both.
    pub fn window(&self, tz: Tz) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        if self.start_ms <= 0 || self.end_ms <= self.start_ms {
            return None;
        }
        let start = tz.timestamp_millis_opt(self.start_ms).single()?;
        let end = tz.timestamp_millis_opt(self.end_ms).single()?;
        Some((start, end))
    }
}

impl Epg {
    /// Parse an EPG JSON payload. Unparseable payloads give an empty guide for `key`.
    pub fn from_json(text: &str, key: &str, tz: Tz) -> Epg {
        let mut epg: Epg = serde_json::from_str(text.trim()).unwrap_or_else(|e| {
            tracing::debug!("unparseable epg payload: {}", e);
            Epg::default()
        });
        epg.key = key.to_string();
        for item in &mut epg.list {
            item.start_ms = local_millis(tz, &epg.date, &item.start).unwrap_or_default();
            item.end_ms = local_millis(tz, &epg.date, &item.end).unwrap_or_default();
            if item.end_ms <= item.start_ms && item.start_ms > 0 {
                item.end_ms += ChronoDuration::days(1).num_milliseconds();
            }
        }
        epg
    }

    pub fn is_for(&self, date: &str) -> bool {
        !self.date.is_empty() && self.date == date
    }

    /// Mark the programme airing at `now`; everything else is unselected.
    pub fn select_current<Z: TimeZone>(&mut self, now: &DateTime<Z>) -> &Self {
        let now = now.timestamp_millis();
        for item in &mut self.list {
            item.selected = item.start_ms <= now && now < item.end_ms;
        }
        self
    }

    pub fn current(&self) -> Option<&EpgData> {
        self.list.iter().find(|d| d.selected)
    }
}
