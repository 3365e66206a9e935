//! VOD catalog types: sites, listings, detail payloads and play flags.
//!
//! Provider payloads use the usual TVBox JSON field names (`vod_id`,
//! `vod_play_from`, `playUrl`, ...). Parsing is lenient: unknown fields are
//! ignored and ids may arrive as numbers.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::source::{ParseMode, PlayableReference};

/// How a site is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteKind {
    /// CMS API answering XML.
    Xml,
    /// CMS API answering JSON.
    Json,
    /// Plugin ("spider") executed by the host.
    Spider,
    /// Remote endpoint speaking the plugin protocol over HTTP.
    Remote,
}

impl SiteKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => SiteKind::Xml,
            3 => SiteKind::Spider,
            4 => SiteKind::Remote,
            _ => SiteKind::Json,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SiteKind::Xml => 0,
            SiteKind::Json => 1,
            SiteKind::Spider => 3,
            SiteKind::Remote => 4,
        }
    }

    /// Listings use `ac=videolist` on XML sites and `ac=detail` elsewhere.
    pub fn list_action(self) -> &'static str {
        match self {
            SiteKind::Xml => "videolist",
            _ => "detail",
        }
    }
}

fn default_one() -> i32 {
    1
}

/// One content site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_one")]
    pub site_type: i32,
    #[serde(default)]
    pub api: String,
    /// Opaque extension sent as `extend`; GET when short, POST when long.
    #[serde(default)]
    pub ext: String,
    #[serde(default = "default_one")]
    pub searchable: i32,
    #[serde(default = "default_one")]
    pub quick_search: i32,
    /// Parser prefix for play URLs; non-empty means the player must sniff.
    #[serde(default)]
    pub play_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Category names allowed on the home page (empty: all).
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Default for Site {
    fn default() -> Self {
        Self {
            key: String::new(),
            name: String::new(),
            site_type: 1,
            api: String::new(),
            ext: String::new(),
            searchable: 1,
            quick_search: 1,
            play_url: String::new(),
            headers: HashMap::new(),
            categories: Vec::new(),
        }
    }
}

impl Site {
    pub fn kind(&self) -> SiteKind {
        SiteKind::from_code(self.site_type)
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable != 0
    }

    pub fn is_quick_search(&self) -> bool {
        self.quick_search != 0
    }

    /// Placeholder site: no key and no API.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.api.is_empty()
    }
}

/// Configured sites plus the selection state the sessions need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteCatalog {
    /// Key of the home site; the first site when unset.
    #[serde(default)]
    pub home: Option<String>,
    /// Flags whose episodes go through a VIP parser.
    #[serde(default)]
    pub vip_flags: Vec<String>,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl SiteCatalog {
    pub fn site(&self, key: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.key == key)
    }

    pub fn home_site(&self) -> Option<&Site> {
        match &self.home {
            Some(key) => self.site(key),
            None => self.sites.first(),
        }
    }

    pub fn searchable(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter().filter(|s| s.is_searchable())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or_default() as i32,
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        serde_json::Value::Bool(b) => i32::from(b),
        _ => 0,
    })
}

/// Headers arrive either as an object or as a JSON string holding one.
fn lenient_headers<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let object = match value {
        serde_json::Value::String(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::Null),
        other => other,
    };
    let mut headers = HashMap::new();
    if let serde_json::Value::Object(map) = object {
        for (k, v) in map {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            headers.insert(k, v);
        }
    }
    Ok(headers)
}

/// A category tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Class {
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_id: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub type_flag: String,
}

/// One playable entry of a flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    pub url: String,
}

impl Episode {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A play source ("line") of a title and its episodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub flag: String,
    pub episodes: Vec<Episode>,
}

impl Flag {
    pub fn new(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            episodes: Vec::new(),
        }
    }

    /// Single-episode flag pointing at `url` (pushed links).
    pub fn single(flag: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            flag: flag.into(),
            episodes: vec![Episode::new(url.clone(), url)],
        }
    }

    /// Parse `name$url#name$url...`. Entries without a name are numbered.
    pub fn parse_episodes(text: &str) -> Vec<Episode> {
        text.split('#')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .enumerate()
            .filter_map(|(i, item)| match item.split_once('$') {
                Some((name, url)) if !url.trim().is_empty() => {
                    let name = if name.trim().is_empty() {
                        (i + 1).to_string()
                    } else {
                        name.trim().to_string()
                    };
                    Some(Episode::new(name, url.trim()))
                }
                Some(_) => None,
                None => Some(Episode::new((i + 1).to_string(), item)),
            })
            .collect()
    }

    pub fn episode(&self, name: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.name == name)
    }
}

/// A title in a listing or detail payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vod {
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_id: String,
    #[serde(default)]
    pub vod_name: String,
    #[serde(default)]
    pub vod_pic: String,
    #[serde(default)]
    pub vod_remarks: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_year: String,
    #[serde(default)]
    pub vod_area: String,
    #[serde(default)]
    pub vod_actor: String,
    #[serde(default)]
    pub vod_director: String,
    #[serde(default)]
    pub vod_content: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub vod_play_from: String,
    #[serde(default)]
    pub vod_play_url: String,
    /// Built from `vod_play_from` / `vod_play_url`.
    #[serde(default, skip_deserializing)]
    pub vod_flags: Vec<Flag>,
    /// Key of the site the title came from (set on search results).
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
}

impl Vod {
    /// Split the play fields into flags: sources on `$$$`, episodes on `#`, name/url on `$`.
    pub fn build_flags(&mut self) {
        let urls: Vec<&str> = self.vod_play_url.split("$$$").collect();
        self.vod_flags = self
            .vod_play_from
            .split("$$$")
            .enumerate()
            .filter_map(|(i, from)| {
                let episodes = Flag::parse_episodes(urls.get(i)?);
                let from = from.trim();
                let name = if from.is_empty() {
                    format!("line{}", i + 1)
                } else {
                    from.to_string()
                };
                (!episodes.is_empty()).then_some(Flag {
                    flag: name,
                    episodes,
                })
            })
            .collect();
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.vod_flags.iter().find(|f| f.flag == name)
    }
}

/// Provider response for listing, detail, player and action calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VodResult {
    #[serde(default)]
    pub class: Vec<Class>,
    #[serde(default)]
    pub list: Vec<Vod>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default)]
    pub flag: String,
    /// 1: the player must sniff the page for media.
    #[serde(default, deserialize_with = "lenient_i32")]
    pub parse: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub jx: i32,
    #[serde(rename = "header", default, deserialize_with = "lenient_headers")]
    pub headers: HashMap<String, String>,
    #[serde(rename = "playUrl", default)]
    pub play_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub page: i32,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub pagecount: i32,
}

impl VodResult {
    /// Parse a JSON payload; anything unparseable yields an empty result.
    pub fn from_json(text: &str) -> VodResult {
        let text = text.trim();
        if text.is_empty() {
            return VodResult::default();
        }
        match serde_json::from_str(text) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!("unparseable provider payload: {}", e);
                VodResult::default()
            }
        }
    }

    /// Parse a payload according to the site kind.
    ///
    /// XML payloads are decoded by the host; here they only succeed when the
    /// endpoint answered JSON anyway.
    pub fn from_kind(kind: SiteKind, text: &str) -> VodResult {
        if kind == SiteKind::Xml && text.trim_start().starts_with('<') {
            tracing::warn!("xml payload not decoded");
            return VodResult::default();
        }
        Self::from_json(text)
    }

    pub fn error(msg: impl Into<String>) -> VodResult {
        VodResult {
            msg: Some(msg.into()),
            ..VodResult::default()
        }
    }

    pub fn single(vod: Vod) -> VodResult {
        VodResult {
            list: vec![vod],
            ..VodResult::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty() && self.class.is_empty() && self.url.is_empty()
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.parse == 1 {
            ParseMode::NeedsSniff
        } else {
            ParseMode::None
        }
    }

    /// Player-facing view of this result.
    pub fn playable(&self) -> PlayableReference {
        PlayableReference {
            url: self.url.clone(),
            headers: self.headers.clone(),
            parse_mode: self.parse_mode(),
        }
    }

    /// Take over a resolved reference.
    pub fn apply(&mut self, reference: PlayableReference) {
        self.url = reference.url;
        self.headers = reference.headers;
        self.parse = match reference.parse_mode {
            ParseMode::NeedsSniff => 1,
            ParseMode::None => 0,
        };
    }

    pub fn tag_site(&mut self, key: &str) {
        for vod in &mut self.list {
            vod.site_key = Some(key.to_string());
        }
    }
}
