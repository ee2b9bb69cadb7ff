use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_locator, MediaResolver};
use crate::{
    audio::track::{ResolvedMedia, StreamSource},
    error::ResolutionError,
};

/// Resolves queries by shelling out to yt-dlp.
///
/// URLs are extracted directly; anything else becomes `ytsearch1:<query>`.
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Subset of yt-dlp's `--dump-json` output that we use.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    /// Direct media URL of the selected format.
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    uploader_url: Option<String>,
    thumbnail: Option<String>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            rate_limiter: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Checks that the binary runs; used by `--health-check`.
    pub async fn verify(&self) -> Result<String, ResolutionError> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            return Err(ResolutionError::Extraction(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn target(query: &str) -> String {
        let query = query.trim();
        if is_locator(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    async fn extract(&self, query: &str) -> Result<ResolvedMedia, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Extraction(e.to_string()))?;

        let target = Self::target(query);
        info!("🔍 Resolviendo: {}", target);

        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "-f",
                "bestaudio/best",
                target.as_str(),
            ])
            // El timeout de `resolve` suelta este future; yt-dlp no debe sobrevivirlo
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para '{}': {}", query, error.trim());
            return Err(ResolutionError::Extraction(
                error.lines().last().unwrap_or("yt-dlp failed").to_string(),
            ));
        }

        parse_output(query, &String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedMedia, ResolutionError> {
        match tokio::time::timeout(self.timeout, self.extract(query)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Timeout resolviendo '{}'", query);
                Err(ResolutionError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

/// First usable entry of yt-dlp's one-JSON-object-per-line output.
fn parse_output(query: &str, stdout: &str) -> Result<ResolvedMedia, ResolutionError> {
    let info = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .ok_or_else(|| ResolutionError::NotFound(query.to_string()))?;

    let stream_url = info.url.ok_or_else(|| {
        ResolutionError::Extraction(format!("no playable format for `{}`", info.title))
    })?;

    let mut media = ResolvedMedia::new(info.title, StreamSource::new(stream_url));
    if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
        media = media.with_duration(Duration::from_secs_f64(duration));
    }
    if let Some(uploader) = info.uploader {
        media = media.with_uploader(uploader, info.uploader_url);
    }
    if let Some(url) = info.webpage_url {
        media = media.with_url(url);
    }
    if let Some(thumbnail) = info.thumbnail {
        media = media.with_thumbnail(thumbnail);
    }
    Ok(media)
}
