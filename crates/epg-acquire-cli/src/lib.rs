//! epg-acquire CLI: loads the captured session and channel lists, then
//! drives the schedule acquisition engine.

pub mod auth;
pub mod channels;
pub mod commands;
pub mod config;
pub mod csv;
pub mod inspect;

pub use auth::{load_auth_context, AuthOverrides};
pub use channels::load_channel_ids;
pub use config::{resolve_auth_context_path, resolve_out_dir, DEFAULT_BASE_URL};
pub use inspect::{summarize, DocumentSummary};
