//! Live TV: playlist loading, programme guides and line resolution.

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::Services;
use crate::channel::ResultChannel;
use crate::model::live::{self, Epg, EpgData, Live, LiveChannel};
use crate::net::{self, HttpRequest};
use crate::slot::{SlotConfig, TaskSlot};
use crate::spider::{EpgXmlParser, LiveLoader};

#[derive(Clone)]
struct LiveApi {
    services: Arc<Services>,
    loader: Arc<dyn LiveLoader>,
    xml: Arc<dyn EpgXmlParser>,
    zone: Arc<Mutex<Tz>>,
    guides: Arc<Mutex<HashMap<String, Epg>>>,
}

impl LiveApi {
    fn zone(&self) -> Tz {
        *self.zone.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn live(&self, item: Live) -> Result<Live> {
        let mut loaded = self.loader.load(&item).await?;
        *self.zone.lock().unwrap_or_else(PoisonError::into_inner) = loaded.zone();
        self.guides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        loaded.verify();
        self.services.publish_engine_profile(loaded.core.clone());
        Ok(loaded)
    }

    async fn xml(&self, item: Live) -> Result<bool> {
        for url in &item.epg_xml {
            match self.xml.parse(&item, url).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => tracing::debug!(url = %url, "xmltv parse failed: {:#}", e),
            }
        }
        Ok(false)
    }

    async fn epg(&self, channel: LiveChannel) -> Result<Epg> {
        let zone = self.zone();
        let date = live::today(zone);
        let url = channel.epg.replace("{date}", &date);
        let key = if channel.tvg_id.is_empty() {
            channel.name.clone()
        } else {
            channel.tvg_id.clone()
        };

        let cached = self
            .guides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .filter(|epg| epg.is_for(&date))
            .cloned();
        let mut epg = match cached {
            Some(epg) => epg,
            None if url.starts_with("http") => {
                let body = net::fetch_text(Arc::clone(&self.services.transport), HttpRequest::get(&url))
                    .await
                    .with_context(|| format!("fetch epg for '{}'", channel.name))?;
                let epg = Epg::from_json(&body, &key, zone);
                self.guides
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, epg.clone());
                epg
            }
            None => channel.data.clone(),
        };
        epg.select_current(&Utc::now());
        Ok(epg)
    }

    async fn url(&self, mut channel: LiveChannel) -> Result<LiveChannel> {
        channel.msg = None;
        self.services.resolver.stop_all();
        let reference = channel
            .playable()
            .with_context(|| format!("channel '{}' has no lines", channel.name))?;
        let resolved = self.services.resolver.fetch(&reference).await?;
        channel.apply(resolved);
        Ok(channel)
    }

    async fn catchup(&self, channel: LiveChannel, data: EpgData) -> Result<LiveChannel> {
        let (start, end) = data
            .window(self.zone())
            .with_context(|| format!("programme '{}' has no start and end times", data.title))?;
        let mut channel = self.url(channel).await?;
        if channel.catchup.is_empty() {
            tracing::debug!(channel = %channel.name, "no catch-up settings; playing live");
        }
        channel.url = channel.catchup.format(&channel.url, &start, &end);
        Ok(channel)
    }
}

/// Owner of the live channels.
pub struct LiveSession {
    api: LiveApi,
    live: TaskSlot<Live>,
    epg: TaskSlot<Epg>,
    xml: TaskSlot<bool>,
    url: TaskSlot<LiveChannel>,
}

impl LiveSession {
    /// Create the session's channels. Must be called inside a runtime.
    pub fn new(services: Arc<Services>, loader: Arc<dyn LiveLoader>, xml: Arc<dyn EpgXmlParser>) -> Self {
        let t = services.timeouts.clone();
        let pool = services.pools.general.clone();
        let main = services.main.clone();
        Self {
            live: TaskSlot::new(SlotConfig::live(&t), pool.clone(), ResultChannel::new("live", main.clone())),
            epg: TaskSlot::new(SlotConfig::epg(&t), pool.clone(), ResultChannel::new("epg", main.clone())),
            xml: TaskSlot::new(SlotConfig::xml(&t), pool.clone(), ResultChannel::new("xml", main.clone())),
            url: TaskSlot::new(SlotConfig::url(&t), pool, ResultChannel::new("url", main)),
            api: LiveApi {
                services,
                loader,
                xml,
                zone: Arc::new(Mutex::new(live::time_zone(""))),
                guides: Arc::new(Mutex::new(HashMap::new())),
            },
        }
    }

    pub fn live(&self) -> &ResultChannel<Live> {
        self.live.sink()
    }

    pub fn epg(&self) -> &ResultChannel<Epg> {
        self.epg.sink()
    }

    pub fn xml(&self) -> &ResultChannel<bool> {
        self.xml.sink()
    }

    pub fn url(&self) -> &ResultChannel<LiveChannel> {
        self.url.sink()
    }

    /// Load a source: groups, time zone, keep group and engine settings.
    pub fn get_live(&self, item: Live) {
        let api = self.api.clone();
        self.live.dispatch(async move { api.live(item).await });
    }

    /// True on the xml channel when any of the source's XMLTV guides applied.
    pub fn get_xml(&self, item: Live) {
        let api = self.api.clone();
        self.xml.dispatch(async move { api.xml(item).await });
    }

    /// Today's guide for a channel with the current programme selected.
    pub fn get_epg(&self, channel: LiveChannel) {
        let api = self.api.clone();
        self.epg.dispatch(async move { api.epg(channel).await });
    }

    /// Resolve the channel's current line. Stops running extractions first.
    pub fn get_url(&self, channel: LiveChannel) {
        let api = self.api.clone();
        self.url.dispatch(async move { api.url(channel).await });
    }

    /// Resolve the current line, then point it at the programme `data` through
    /// the channel's catch-up settings. Delivered on the url channel.
    pub fn get_catchup_url(&self, channel: LiveChannel, data: &EpgData) {
        let api = self.api.clone();
        let data = data.clone();
        self.url.dispatch(async move { api.catchup(channel, data).await });
    }

    pub fn shutdown(&self) {
        self.live.shutdown();
        self.epg.shutdown();
        self.xml.shutdown();
        self.url.shutdown();
    }
}
