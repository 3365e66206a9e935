//! Contracts for the collaborators the sessions drive.
//!
//! Plugins ("spiders") run inside a host sandbox this crate does not provide;
//! the sessions only see the `Spider` capability and get instances through a
//! `SpiderLoader`. Live playlists and XMLTV guides come through `LiveLoader`
//! and `EpgXmlParser`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::m3u;
use crate::model::{Catchup, Group, Live, LiveChannel, Site};
use crate::net::{self, HttpRequest, HttpTransport};

/// Plugin capability. Every call answers provider JSON text.
#[async_trait]
pub trait Spider: Send + Sync {
    async fn home_content(&self, filter: bool) -> Result<String>;

    async fn home_video_content(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn category_content(
        &self,
        tid: &str,
        page: &str,
        filter: bool,
        extend: &HashMap<String, String>,
    ) -> Result<String>;

    async fn detail_content(&self, ids: &[String]) -> Result<String>;

    async fn player_content(&self, flag: &str, id: &str, vip_flags: &[String]) -> Result<String>;

    async fn search_content(&self, keyword: &str, quick: bool, page: &str) -> Result<String>;

    async fn action(&self, _action: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Produces the spider for a plugin site.
pub trait SpiderLoader: Send + Sync {
    fn spider(&self, site: &Site) -> Result<Arc<dyn Spider>>;
}

/// Loader for hosts without a plugin runtime: every plugin site fails to load.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpiders;

impl SpiderLoader for NoSpiders {
    fn spider(&self, site: &Site) -> Result<Arc<dyn Spider>> {
        anyhow::bail!("site '{}' needs a plugin runtime", site.key)
    }
}

/// Fills a live source with its groups and channels.
#[async_trait]
pub trait LiveLoader: Send + Sync {
    async fn load(&self, live: &Live) -> Result<Live>;
}

/// Parses one XMLTV guide for a live source. `Ok(true)` when it applied.
#[async_trait]
pub trait EpgXmlParser: Send + Sync {
    async fn parse(&self, live: &Live, url: &str) -> Result<bool>;
}

/// Parser for hosts without an XMLTV decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEpgXml;

#[async_trait]
impl EpgXmlParser for NoEpgXml {
    async fn parse(&self, _live: &Live, url: &str) -> Result<bool> {
        tracing::debug!(url, "no xmltv decoder configured");
        Ok(false)
    }
}

/// Loads M3U and `name,url` text playlists over HTTP.
pub struct PlaylistLiveLoader {
    transport: Arc<dyn HttpTransport>,
}

impl PlaylistLiveLoader {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

fn group_mut<'a>(groups: &'a mut Vec<Group>, name: &str) -> &'a mut Group {
    match groups.iter().position(|g| g.name == name) {
        Some(i) => &mut groups[i],
        None => {
            groups.push(Group::new(name));
            let last = groups.len() - 1;
            &mut groups[last]
        }
    }
}

fn add_channel(group: &mut Group, channel: LiveChannel) {
    if let Some(existing) = group.channels.iter_mut().find(|c| c.name == channel.name) {
        existing.urls.extend(channel.urls);
        return;
    }
    group.channels.push(channel);
}

fn m3u_channel(entry: m3u::M3uEntry, defaults: &Catchup) -> LiveChannel {
    let mut channel = LiveChannel::new(entry.name);
    channel.urls.push(entry.url);
    channel.tvg_id = entry.tvg_id.unwrap_or_default();
    channel.logo = entry.tvg_logo.unwrap_or_default();
    if let Some(ua) = entry.user_agent {
        channel.headers.insert("User-Agent".to_string(), ua);
    }
    channel.catchup = Catchup {
        kind: entry.catchup.unwrap_or_default(),
        source: entry.catchup_source.unwrap_or_default(),
        replace: entry.catchup_replace.unwrap_or_default(),
    }
    .or(defaults);
    channel
}

/// Parse playlist text into groups, merging repeated channel names into lines.
pub fn parse_playlist(content: &str) -> Vec<Group> {
    let mut groups = Vec::new();
    if m3u::is_playlist(content) {
        let header = m3u::parse_header(content);
        let defaults = Catchup {
            kind: header.catchup.unwrap_or_default(),
            source: header.catchup_source.unwrap_or_default(),
            ..Catchup::default()
        };
        for mut entry in m3u::parse(content) {
            let title = entry.group_title.take().unwrap_or_else(|| "Default".to_string());
            add_channel(group_mut(&mut groups, &title), m3u_channel(entry, &defaults));
        }
        return groups;
    }

    let mut current = String::from("Default");
    for line in content.lines().map(str::trim) {
        let Some((name, value)) = line.split_once(',') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if value == "#genre#" {
            current = name.to_string();
            continue;
        }
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let group = group_mut(&mut groups, &current);
        for url in value.split('#').map(str::trim).filter(|u| !u.is_empty()) {
            let mut channel = LiveChannel::new(name);
            channel.urls.push(url.to_string());
            add_channel(group, channel);
        }
    }
    groups
}

fn apply_epg_template(live: &mut Live) {
    if live.epg.is_empty() {
        return;
    }
    for channel in live.groups.iter_mut().flat_map(|g| g.channels.iter_mut()) {
        if !channel.epg.is_empty() {
            continue;
        }
        let key = if channel.tvg_id.is_empty() {
            channel.name.as_str()
        } else {
            channel.tvg_id.as_str()
        };
        channel.epg = live.epg.replace("{name}", &channel.name).replace("{epg}", key);
    }
}

#[async_trait]
impl LiveLoader for PlaylistLiveLoader {
    async fn load(&self, live: &Live) -> Result<Live> {
        let request = HttpRequest::get(&live.url).headers(&live.headers);
        let content = net::fetch_text(Arc::clone(&self.transport), request)
            .await
            .with_context(|| format!("load live source '{}'", live.name))?;
        let mut loaded = live.clone();
        loaded.groups = parse_playlist(&content);
        for url in m3u::parse_header(&content).epg_urls {
            if !loaded.epg_xml.contains(&url) {
                loaded.epg_xml.push(url);
            }
        }
        apply_epg_template(&mut loaded);
        tracing::info!(
            source = %live.name,
            groups = loaded.groups.len(),
            "live source loaded"
        );
        Ok(loaded)
    }
}
