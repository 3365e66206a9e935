//! `vodpipe resolve` – run one URL through the extractor chain.

use anyhow::Result;
use std::collections::HashMap;
use vodpipe_core::source::PlayableReference;

use super::print_json;
use crate::cli::Host;

/// Parse `Name: value` pairs; entries without a colon are ignored.
pub(crate) fn parse_headers(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|h| h.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

pub async fn run_resolve(host: &Host, url: &str, headers: &[String]) -> Result<()> {
    let resolver = &host.services.resolver;
    match resolver.find(url) {
        Some(extractor) => tracing::info!(extractor = extractor.name(), "resolving {}", url),
        None => tracing::info!("no extractor for {}; passing through", url),
    }
    let reference = PlayableReference::new(url).with_headers(parse_headers(headers));
    let resolved = resolver.fetch(&reference).await?;
    print_json(&resolved)
}
