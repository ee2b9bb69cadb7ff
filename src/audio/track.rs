use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};
use std::time::Duration;

/// Opaque reference to something the sink can stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    locator: String,
}

impl StreamSource {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// What a resolver hands back: a stream plus display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub title: String,
    pub source: StreamSource,
    pub duration: Option<Duration>,
    pub uploader: Option<String>,
    pub uploader_url: Option<String>,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
}

impl ResolvedMedia {
    pub fn new(title: impl Into<String>, source: StreamSource) -> Self {
        Self {
            title: title.into(),
            source,
            duration: None,
            uploader: None,
            uploader_url: None,
            url: None,
            thumbnail: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_uploader(mut self, uploader: String, uploader_url: Option<String>) -> Self {
        self.uploader = Some(uploader);
        self.uploader_url = uploader_url;
        self
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

/// One resolved, playable unit of media plus who asked for it.
///
/// A track is immutable once built. It lives either in a guild's
/// [`PlaybackQueue`](super::queue::PlaybackQueue) or in that guild's
/// "current" slot, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    media: ResolvedMedia,
    requester: UserId,
    /// Text channel the request came from; announcements go there.
    channel_id: ChannelId,
    requested_at: DateTime<Utc>,
}

impl Track {
    pub fn new(media: ResolvedMedia, requester: UserId, channel_id: ChannelId) -> Self {
        Self {
            media,
            requester,
            channel_id,
            requested_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.media.title
    }

    pub fn source(&self) -> &StreamSource {
        &self.media.source
    }

    pub fn duration(&self) -> Option<Duration> {
        self.media.duration
    }

    pub fn uploader(&self) -> Option<&str> {
        self.media.uploader.as_deref()
    }

    pub fn uploader_url(&self) -> Option<&str> {
        self.media.uploader_url.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.media.url.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.media.thumbnail.as_deref()
    }

    pub fn requester(&self) -> UserId {
        self.requester
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }
}

#[cfg(test)]
pub(crate) fn sample(title: &str) -> Track {
    let media = ResolvedMedia::new(title, StreamSource::new(format!("https://cdn.test/{}", title)))
        .with_url(format!("https://video.test/{}", title));
    Track::new(media, UserId::new(1), ChannelId::new(10))
}
