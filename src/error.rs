//! Error types shared by the playback core and the command layer.
//!
//! Every variant of [`CommandError`] is something the invoking user sees as a
//! direct reply. Only [`CommandError::Internal`] hides its cause behind a
//! generic message; the cause goes to the log instead.

use thiserror::Error;

/// A query could not be turned into a playable resource.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no results for `{0}`")]
    NotFound(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("resolution took longer than {0}s")]
    Timeout(u64),

    #[error("could not run the extractor: {0}")]
    Io(#[from] std::io::Error),
}

/// An index outside the current bounds of a playback queue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("index {index} is out of range for a queue of {len} tracks")]
pub struct QueueIndexError {
    pub index: usize,
    pub len: usize,
}

/// Failures reported by the audio sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The voice connection went away; the session can't continue.
    #[error("voice connection lost")]
    ConnectionLost,

    #[error("could not connect to the voice channel: {0}")]
    Connect(String),

    /// A single stream failed; the connection itself is still usable.
    #[error("stream error: {0}")]
    Stream(String),
}

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command used outside of a server")]
    NotInGuild,

    #[error("caller is not in a voice channel")]
    NotInVoiceChannel,

    #[error("bot is connected to another voice channel")]
    AlreadyInOtherChannel,

    #[error("bot is not connected to a voice channel")]
    NotConnected,

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("nothing is paused")]
    NothingPaused,

    #[error("volume {0} is outside 0-100")]
    VolumeOutOfRange(i64),

    #[error("page {page} does not exist ({pages} pages)")]
    InvalidPage { page: i64, pages: usize },

    #[error("queue is empty")]
    QueueEmpty,

    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),

    /// The session was torn down while the command was in flight.
    #[error("playback session already ended")]
    SessionClosed,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    QueueIndex(#[from] QueueIndexError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    /// Text sent back to the user who invoked the command.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInGuild => "❌ This command can't be used in direct messages.".to_string(),
            Self::NotInVoiceChannel => "❌ You are not connected to any voice channel!".to_string(),
            Self::AlreadyInOtherChannel => "❌ I'm already in another voice channel.".to_string(),
            Self::NotConnected => "❌ I'm not connected to any voice channel!".to_string(),
            Self::NothingPlaying => "❌ Nothing is playing right now.".to_string(),
            Self::NothingPaused => "❌ Nothing is paused right now.".to_string(),
            Self::VolumeOutOfRange(_) => "❌ Volume must be between 0 and 100.".to_string(),
            Self::InvalidPage { page, pages } => {
                format!("❌ Page {} does not exist, the queue has {} page(s).", page, pages)
            }
            Self::QueueEmpty => "📭 The queue is empty.".to_string(),
            Self::MissingArgument(name) => format!("❌ Missing argument `{}`.", name),
            Self::SessionClosed => {
                "❌ Playback ended before your track was ready, use /play again.".to_string()
            }
            Self::Resolution(e) => {
                format!("❌ An error occurred while processing this request: {}", e)
            }
            Self::QueueIndex(e) => {
                format!("❌ There is no track #{} in the queue ({} queued).", e.index + 1, e.len)
            }
            Self::Sink(SinkError::Connect(_)) => {
                "❌ I couldn't connect to your voice channel.".to_string()
            }
            Self::Sink(_) | Self::Internal(_) => {
                "❌ An unexpected error occurred, please try again later.".to_string()
            }
        }
    }

    /// Whether the failure is a bug or outage rather than a user mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Sink(SinkError::ConnectionLost | SinkError::Stream(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = CommandError::from(anyhow::anyhow!("database exploded"));
        assert!(err.is_internal());
        assert!(!err.user_message().contains("database"));
    }

    #[test]
    fn queue_index_is_reported_one_based() {
        let err = CommandError::from(QueueIndexError { index: 4, len: 2 });
        assert!(!err.is_internal());
        assert!(err.user_message().contains("#5"));
    }

    #[test]
    fn resolution_errors_reach_the_user() {
        let err = CommandError::from(ResolutionError::NotFound("lofi".into()));
        assert!(err.user_message().contains("lofi"));
    }
}
