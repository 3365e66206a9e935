//! Domain types shared by the sessions, spiders and the CLI.

pub mod live;
pub mod m3u;
pub mod vod;

pub use live::{Catchup, Epg, EpgData, Group, Live, LiveChannel};
pub use vod::{Class, Episode, Flag, Site, SiteCatalog, SiteKind, Vod, VodResult};
