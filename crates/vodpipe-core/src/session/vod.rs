//! VOD browsing: home, category, detail, player, search and action channels.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use std::collections::HashMap;
use std::sync::Arc;

use super::Services;
use crate::channel::{Outcome, ResultChannel, Subscription};
use crate::model::{Episode, Flag, Site, SiteKind, Vod, VodResult};
use crate::net::{self, HttpRequest};
use crate::search::{SearchFanout, SearchProvider, SearchQuery};
use crate::slot::{SlotConfig, TaskSlot};
use crate::source::sniffer;

/// Pseudo-site key for links pushed from another device.
pub const PUSH_AGENT: &str = "push_agent";

/// Extensions longer than this are sent by POST.
const MAX_GET_EXT: usize = 1000;

/// Provider calls shared by every channel of a `VodSession`.
#[derive(Clone)]
struct VodApi {
    services: Arc<Services>,
}

fn set_param(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    match params.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl VodApi {
    fn site(&self, key: &str) -> Result<Site> {
        self.services
            .catalog
            .site(key)
            .cloned()
            .with_context(|| format!("unknown site '{}'", key))
    }

    async fn fetch(&self, request: HttpRequest) -> Result<String> {
        net::fetch_text(Arc::clone(&self.services.transport), request).await
    }

    /// Query an HTTP site: GET while `ext` is short, POST otherwise.
    async fn call(&self, site: &Site, mut params: Vec<(String, String)>) -> Result<String> {
        if !site.ext.is_empty() {
            set_param(&mut params, "extend", &site.ext);
        }
        let request = if site.ext.len() <= MAX_GET_EXT {
            HttpRequest::get(&site.api)
        } else {
            HttpRequest::post(&site.api)
        };
        self.fetch(request.headers(&site.headers).params(params)).await
    }

    /// Listings without pictures are re-queried as details.
    async fn fetch_pic(&self, site: &Site, mut result: VodResult) -> Result<VodResult> {
        let first_has_pic = result.list.first().map_or(true, |v| !v.vod_pic.is_empty());
        if site.kind().code() > 2 || first_has_pic {
            return Ok(result);
        }
        let ids = result
            .list
            .iter()
            .filter(|v| site.categories.is_empty() || site.categories.contains(&v.type_name))
            .map(|v| v.vod_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        if ids.is_empty() {
            result.list.clear();
            return Ok(result);
        }
        let request = HttpRequest::get(&site.api)
            .headers(&site.headers)
            .param("ac", site.kind().list_action())
            .param("ids", ids);
        let body = self.fetch(request).await?;
        result.list = VodResult::from_kind(site.kind(), &body).list;
        Ok(result)
    }

    async fn home(&self) -> Result<VodResult> {
        let site = self
            .services
            .catalog
            .home_site()
            .cloned()
            .context("no home site configured")?;
        match site.kind() {
            SiteKind::Spider => {
                let spider = self.services.spiders.spider(&site)?;
                let mut result = VodResult::from_json(&spider.home_content(true).await?);
                if result.list.is_empty() {
                    result.list = VodResult::from_json(&spider.home_video_content().await?).list;
                }
                Ok(result)
            }
            SiteKind::Remote => {
                let body = self.call(&site, params(&[("filter", "true")])).await?;
                Ok(VodResult::from_json(&body))
            }
            kind => {
                let body = self.fetch(HttpRequest::get(&site.api).headers(&site.headers)).await?;
                self.fetch_pic(&site, VodResult::from_kind(kind, &body)).await
            }
        }
    }

    async fn category(
        &self,
        key: &str,
        tid: &str,
        page: &str,
        filter: bool,
        extend: &HashMap<String, String>,
    ) -> Result<VodResult> {
        let site = self.site(key)?;
        tracing::debug!(site = key, tid, page, "category content");
        if site.kind() == SiteKind::Spider {
            let spider = self.services.spiders.spider(&site)?;
            return Ok(VodResult::from_json(
                &spider.category_content(tid, page, filter, extend).await?,
            ));
        }
        let mut query = Vec::new();
        if site.kind() == SiteKind::Json && !extend.is_empty() {
            query.push(("f".to_string(), serde_json::to_string(extend)?));
        }
        if site.kind() == SiteKind::Remote {
            let encoded = URL_SAFE.encode(serde_json::to_string(extend)?);
            query.push(("ext".to_string(), encoded));
        }
        query.extend(params(&[("ac", site.kind().list_action()), ("t", tid), ("pg", page)]));
        let body = self.call(&site, query).await?;
        Ok(VodResult::from_kind(site.kind(), &body))
    }

    async fn detail(&self, key: &str, id: &str) -> Result<VodResult> {
        tracing::debug!(site = key, id, "detail content");
        let site = match self.services.catalog.site(key) {
            Some(site) => site.clone(),
            None if key == PUSH_AGENT => {
                let mut vod = Vod {
                    vod_id: id.to_string(),
                    vod_name: id.to_string(),
                    vod_flags: vec![Flag::single("push", id)],
                    ..Vod::default()
                };
                self.services.episodes.resolve(&mut vod.vod_flags).await;
                return Ok(VodResult::single(vod));
            }
            None => anyhow::bail!("unknown site '{}'", key),
        };

        let mut result = match site.kind() {
            SiteKind::Spider => {
                let spider = self.services.spiders.spider(&site)?;
                VodResult::from_json(&spider.detail_content(&[id.to_string()]).await?)
            }
            kind => {
                let body = self
                    .call(&site, params(&[("ac", kind.list_action()), ("ids", id)]))
                    .await?;
                VodResult::from_kind(kind, &body)
            }
        };
        if let Some(vod) = result.list.first_mut() {
            vod.build_flags();
            self.services.episodes.resolve(&mut vod.vod_flags).await;
        }
        Ok(result)
    }

    /// Resolve the result's URL through the extractor chain, if one claims it.
    async fn resolve(&self, result: &mut VodResult) -> Result<()> {
        let reference = result.playable();
        if self.services.resolver.find(&reference.url).is_none() {
            return Ok(());
        }
        let resolved = self.services.resolver.fetch(&reference).await?;
        result.apply(resolved);
        Ok(())
    }

    async fn player(&self, key: &str, flag: &str, id: &str) -> Result<VodResult> {
        self.services.resolver.stop_all();
        tracing::debug!(site = key, flag, id, "player content");
        let site = match self.services.catalog.site(key) {
            Some(site) => site.clone(),
            None if key == PUSH_AGENT => {
                let mut result = VodResult {
                    url: id.to_string(),
                    flag: flag.to_string(),
                    ..VodResult::default()
                };
                self.resolve(&mut result).await?;
                return Ok(result);
            }
            None => anyhow::bail!("unknown site '{}'", key),
        };

        let mut result = match site.kind() {
            SiteKind::Spider => {
                let spider = self.services.spiders.spider(&site)?;
                let body = spider
                    .player_content(flag, id, &self.services.catalog.vip_flags)
                    .await?;
                let mut result = VodResult::from_json(&body);
                result.key = key.to_string();
                result
            }
            SiteKind::Remote => {
                let body = self.call(&site, params(&[("play", id), ("flag", flag)])).await?;
                VodResult::from_json(&body)
            }
            SiteKind::Json | SiteKind::Xml => {
                let direct = sniffer::is_video_format(id) && site.play_url.is_empty();
                VodResult {
                    url: id.to_string(),
                    play_url: site.play_url.clone(),
                    parse: if direct { 0 } else { 1 },
                    ..VodResult::default()
                }
            }
        };
        if result.flag.is_empty() {
            result.flag = flag.to_string();
        }
        if result.headers.is_empty() {
            result.headers = site.headers.clone();
        }
        self.resolve(&mut result).await?;
        Ok(result)
    }

    async fn search(&self, site: &Site, query: &SearchQuery) -> Result<VodResult> {
        if query.quick && !site.is_quick_search() {
            return Ok(VodResult::default());
        }
        let mut result = match site.kind() {
            SiteKind::Spider => {
                let spider = self.services.spiders.spider(site)?;
                let body = spider
                    .search_content(&query.keyword, query.quick, &query.page)
                    .await?;
                VodResult::from_json(&body)
            }
            kind => {
                let quick = query.quick.to_string();
                let mut search = params(&[("wd", query.keyword.as_str()), ("quick", quick.as_str()), ("extend", "")]);
                if query.page != "1" {
                    search.push(("pg".to_string(), query.page.clone()));
                }
                let body = self.call(site, search).await?;
                self.fetch_pic(site, VodResult::from_kind(kind, &body)).await?
            }
        };
        tracing::debug!(site = %site.key, keyword = %query.keyword, hits = result.list.len(), "search");
        result.tag_site(&site.key);
        Ok(result)
    }

    async fn action(&self, key: &str, action: &str) -> Result<VodResult> {
        let site = self.site(key)?;
        tracing::debug!(site = key, action, "action");
        match site.kind() {
            SiteKind::Spider => {
                let spider = self.services.spiders.spider(&site)?;
                Ok(VodResult::from_json(&spider.action(action).await?))
            }
            SiteKind::Remote => Ok(VodResult::from_json(&self.fetch(HttpRequest::get(action)).await?)),
            _ => Ok(VodResult::default()),
        }
    }
}

/// One searchable site bound to the session's provider calls.
struct SiteSearch {
    api: VodApi,
    site: Site,
}

#[async_trait]
impl SearchProvider<VodResult> for SiteSearch {
    fn name(&self) -> &str {
        &self.site.key
    }

    async fn search(&self, query: &SearchQuery) -> Result<VodResult> {
        self.api.search(&self.site, query).await
    }
}

/// Owner of the VOD channels.
pub struct VodSession {
    api: VodApi,
    result: TaskSlot<VodResult>,
    player: TaskSlot<VodResult>,
    action: TaskSlot<VodResult>,
    fanout: SearchFanout<VodResult>,
    episode: ResultChannel<Episode>,
}

impl VodSession {
    /// Create the session's channels. Must be called inside a runtime.
    pub fn new(services: Arc<Services>) -> Self {
        let t = services.timeouts.clone();
        let general = services.pools.general.clone();
        let main = services.main.clone();
        Self {
            result: TaskSlot::new(SlotConfig::result(&t), general.clone(), ResultChannel::new("result", main.clone())),
            player: TaskSlot::new(SlotConfig::player(&t), general.clone(), ResultChannel::new("player", main.clone())),
            action: TaskSlot::new(SlotConfig::action(&t), general, ResultChannel::new("action", main.clone())),
            fanout: SearchFanout::new(services.pools.search.clone(), ResultChannel::new("search", main.clone())),
            episode: ResultChannel::new("episode", main),
            api: VodApi { services },
        }
    }

    pub fn result(&self) -> &ResultChannel<VodResult> {
        self.result.sink()
    }

    pub fn player(&self) -> &ResultChannel<VodResult> {
        self.player.sink()
    }

    /// Per-site results of `search_all`.
    pub fn search(&self) -> &ResultChannel<VodResult> {
        self.fanout.sink()
    }

    pub fn action(&self) -> &ResultChannel<VodResult> {
        self.action.sink()
    }

    pub fn episode(&self) -> &ResultChannel<Episode> {
        &self.episode
    }

    pub fn subscribe_result(&self) -> Subscription<VodResult> {
        self.result.subscribe()
    }

    /// Clear the latest value of every channel.
    pub fn reset(&self) {
        self.result().reset();
        self.player().reset();
        self.search().reset();
        self.action().reset();
        self.episode.reset();
    }

    pub fn home_content(&self) {
        let api = self.api.clone();
        self.result.dispatch(async move { api.home().await });
    }

    pub fn category_content(&self, key: &str, tid: &str, page: &str, filter: bool, extend: HashMap<String, String>) {
        let api = self.api.clone();
        let (key, tid, page) = (key.to_string(), tid.to_string(), page.to_string());
        self.result
            .dispatch(async move { api.category(&key, &tid, &page, filter, &extend).await });
    }

    /// Detail of one title; its flags are built and episodes pre-resolved.
    pub fn detail_content(&self, key: &str, id: &str) {
        let api = self.api.clone();
        let (key, id) = (key.to_string(), id.to_string());
        self.result.dispatch(async move { api.detail(&key, &id).await });
    }

    /// Player URL for an episode. Stops running extractions first.
    pub fn player_content(&self, key: &str, flag: &str, id: &str) {
        let api = self.api.clone();
        let (key, flag, id) = (key.to_string(), flag.to_string(), id.to_string());
        self.player.dispatch(async move { api.player(&key, &flag, &id).await });
    }

    /// Search every searchable site; results arrive per site on the search channel.
    pub fn search_all(&self, keyword: &str, quick: bool) {
        let providers: Vec<Arc<dyn SearchProvider<VodResult>>> = self
            .api
            .services
            .catalog
            .searchable()
            .map(|site| {
                Arc::new(SiteSearch {
                    api: self.api.clone(),
                    site: site.clone(),
                }) as Arc<dyn SearchProvider<VodResult>>
            })
            .collect();
        self.fanout.search_all(&providers, &SearchQuery::new(keyword, quick));
    }

    /// One page of results from one site, delivered on the result channel.
    pub fn search_page(&self, key: &str, keyword: &str, quick: bool, page: &str) {
        let api = self.api.clone();
        let key = key.to_string();
        let query = SearchQuery::new(keyword, quick).page(page);
        self.result.dispatch(async move {
            let site = api.site(&key)?;
            api.search(&site, &query).await
        });
    }

    pub fn action_content(&self, key: &str, action: &str) {
        let api = self.api.clone();
        let (key, action) = (key.to_string(), action.to_string());
        self.action.dispatch(async move { api.action(&key, &action).await });
    }

    pub fn select_episode(&self, episode: Episode) {
        self.episode.post(Outcome::Success(episode));
    }

    pub fn stop_search(&self) {
        self.fanout.stop_all();
    }

    /// Cancel everything in flight. The session accepts no further work.
    pub fn shutdown(&self) {
        self.fanout.stop_all();
        self.result.shutdown();
        self.player.shutdown();
        self.action.shutdown();
    }
}

impl Drop for VodSession {
    fn drop(&mut self) {
        self.fanout.stop_all();
    }
}
