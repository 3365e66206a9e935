//! Built-in extractors.

mod engine;
mod push;
mod sniff;
mod thunder;
mod video;

pub use engine::{EngineExtractor, EngineListener, EngineProfile, StreamEngine};
pub use push::PushExtractor;
pub use sniff::SniffExtractor;
pub use thunder::ThunderExtractor;
pub use video::VideoExtractor;

/// Strip `scheme://` (any case) from `url`; `None` if it has another scheme.
fn strip_scheme<'a>(url: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = url.trim().split_once("://")?;
    head.eq_ignore_ascii_case(scheme).then_some(rest)
}
