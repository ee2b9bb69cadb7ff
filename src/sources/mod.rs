//! Media resolution: turning a user's query into something the sink can stream.
//!
//! Extraction is delegated to an external tool; the playback core only sees
//! the [`MediaResolver`] contract.

pub mod youtube;

use async_trait::async_trait;

use crate::{audio::track::ResolvedMedia, error::ResolutionError};

pub use youtube::YtDlpResolver;

/// Resolves a URL or free-text search into a playable stream plus metadata.
///
/// Implementations decide the policy (exact URL vs. first search result).
/// Calls are slow and network bound, so they must be truly async.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<ResolvedMedia, ResolutionError>;
}

/// Whether `query` should be treated as a direct locator instead of a search.
pub fn is_locator(query: &str) -> bool {
    url::Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
