pub mod config;
pub mod logging;

pub mod channel;
pub mod episode;
pub mod model;
pub mod net;
pub mod pool;
pub mod restart;
pub mod search;
pub mod session;
pub mod slot;
pub mod source;
pub mod spider;
