//! Maps user commands onto the playback core.
//!
//! Nothing here knows about Discord interactions: the handlers translate an
//! interaction into an [`Invocation`] plus a [`Command`], and render the
//! [`Reply`] back. That keeps every rule about who may do what testable.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    audio::{
        queue::QueuePage,
        registry::SessionRegistry,
        session::{GuildPlaybackSession, SessionSettings, TrackAnnouncer},
        sink::SinkConnector,
        track::Track,
    },
    error::CommandError,
    sources::MediaResolver,
};

pub const QUEUE_PAGE_SIZE: usize = 10;

/// Who invoked a command, and from where.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    /// `None` in direct messages.
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    pub text_channel: ChannelId,
    /// The caller's current voice channel, if any.
    pub voice_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    /// Also reached through `stop`.
    Leave,
    Play { query: String },
    Skip,
    Pause,
    Resume,
    Volume { percent: i64 },
    Queue { page: i64 },
    Remove { index: i64 },
    Now,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave => "leave",
            Command::Play { .. } => "play",
            Command::Skip => "skip",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Volume { .. } => "volume",
            Command::Queue { .. } => "queue",
            Command::Remove { .. } => "remove",
            Command::Now => "now",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Joined { channel_id: ChannelId },
    Left,
    Queued { track: Track, position: usize },
    Skipped { track: Arc<Track> },
    Paused,
    Resumed,
    VolumeSet { percent: i64 },
    QueuePage(QueuePage),
    Removed { track: Track },
    NowPlaying(Arc<Track>),
    NothingPlaying,
}

pub struct CommandFacade {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn MediaResolver>,
    connector: Arc<dyn SinkConnector>,
    announcer: Option<Arc<dyn TrackAnnouncer>>,
    settings: SessionSettings,
}

impl CommandFacade {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn MediaResolver>,
        connector: Arc<dyn SinkConnector>,
        announcer: Option<Arc<dyn TrackAnnouncer>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            resolver,
            connector,
            announcer,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn execute(&self, invocation: &Invocation, command: Command) -> Result<Reply, CommandError> {
        let guild_id = invocation.guild_id.ok_or(CommandError::NotInGuild)?;
        debug!("Ejecutando /{} en guild {}", command.name(), guild_id);

        match command {
            Command::Join => self.join(guild_id, invocation).await,
            Command::Leave => self.leave(guild_id).await,
            Command::Play { query } => self.play(guild_id, invocation, &query).await,
            Command::Skip => {
                let track = self.live_session(guild_id)?.skip()?;
                Ok(Reply::Skipped { track })
            }
            Command::Pause => {
                self.live_session(guild_id)?.pause()?;
                Ok(Reply::Paused)
            }
            Command::Resume => {
                self.live_session(guild_id)?.resume()?;
                Ok(Reply::Resumed)
            }
            Command::Volume { percent } => self.volume(guild_id, percent),
            Command::Queue { page } => self.queue(guild_id, page),
            Command::Remove { index } => self.remove(guild_id, index),
            Command::Now => Ok(self
                .registry
                .get(guild_id)
                .and_then(|session| session.current())
                .map(Reply::NowPlaying)
                .unwrap_or(Reply::NothingPlaying)),
        }
    }

    fn live_session(&self, guild_id: GuildId) -> Result<Arc<GuildPlaybackSession>, CommandError> {
        self.registry.get(guild_id).ok_or(CommandError::NotConnected)
    }

    fn session_for(&self, guild_id: GuildId) -> Arc<GuildPlaybackSession> {
        self.registry.get_or_create(guild_id, || {
            Arc::new(GuildPlaybackSession::new(
                guild_id,
                self.settings,
                Arc::downgrade(&self.registry),
                self.announcer.clone(),
            ))
        })
    }

    /// Connects (or moves) the guild's session to `channel_id`. A session
    /// that never managed to connect is dropped again so it can't linger.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<GuildPlaybackSession>, CommandError> {
        let session = self.session_for(guild_id);
        if let Err(e) = session.connect(self.connector.as_ref(), channel_id).await {
            if session.channel_id().is_none() {
                session.stop().await;
            }
            return Err(e);
        }
        Ok(session)
    }

    async fn join(&self, guild_id: GuildId, invocation: &Invocation) -> Result<Reply, CommandError> {
        let channel_id = invocation.voice_channel.ok_or(CommandError::NotInVoiceChannel)?;
        self.connect(guild_id, channel_id).await?;
        Ok(Reply::Joined { channel_id })
    }

    async fn leave(&self, guild_id: GuildId) -> Result<Reply, CommandError> {
        let session = self.live_session(guild_id)?;
        if session.channel_id().is_none() {
            return Err(CommandError::NotConnected);
        }
        session.stop().await;
        Ok(Reply::Left)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        invocation: &Invocation,
        query: &str,
    ) -> Result<Reply, CommandError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CommandError::MissingArgument("query"));
        }
        let channel_id = invocation.voice_channel.ok_or(CommandError::NotInVoiceChannel)?;

        let session = match self.registry.get(guild_id) {
            Some(session) => match session.channel_id() {
                Some(current) if current != channel_id => {
                    return Err(CommandError::AlreadyInOtherChannel)
                }
                Some(_) => session,
                None => self.connect(guild_id, channel_id).await?,
            },
            None => self.connect(guild_id, channel_id).await?,
        };

        // The session is pinned before resolving; if it is torn down in the
        // meantime the enqueue below fails instead of reviving anything.
        let media = self.resolver.resolve(query).await?;
        let track = Track::new(media, invocation.user_id, invocation.text_channel);
        let position = session.enqueue(track.clone())?;

        info!("🎶 '{}' en cola de guild {} (#{})", track.title(), guild_id, position + 1);
        Ok(Reply::Queued { track, position })
    }

    fn volume(&self, guild_id: GuildId, percent: i64) -> Result<Reply, CommandError> {
        if !(0..=100).contains(&percent) {
            return Err(CommandError::VolumeOutOfRange(percent));
        }
        let session = self.live_session(guild_id)?;
        if session.channel_id().is_none() {
            return Err(CommandError::NotConnected);
        }
        if session.current().is_none() {
            return Err(CommandError::NothingPlaying);
        }
        session.set_volume(percent as f32 / 100.0)?;
        Ok(Reply::VolumeSet { percent })
    }

    fn queue(&self, guild_id: GuildId, page: i64) -> Result<Reply, CommandError> {
        let Some(session) = self.registry.get(guild_id) else {
            return Ok(Reply::QueuePage(QueuePage {
                entries: Vec::new(),
                current_page: 1,
                total_pages: 1,
                total_items: 0,
            }));
        };

        let requested = usize::try_from(page).unwrap_or(0);
        let queue_page = session.queue_page(requested.max(1), QUEUE_PAGE_SIZE);
        if requested == 0 || (queue_page.total_items > 0 && requested > queue_page.total_pages) {
            return Err(CommandError::InvalidPage {
                page,
                pages: queue_page.total_pages,
            });
        }
        Ok(Reply::QueuePage(queue_page))
    }

    fn remove(&self, guild_id: GuildId, index: i64) -> Result<Reply, CommandError> {
        let session = self.registry.get(guild_id).ok_or(CommandError::QueueEmpty)?;
        let len = session.queue_len();
        if len == 0 {
            return Err(CommandError::QueueEmpty);
        }
        // 1-based from the user; anything below 1 can't exist.
        let index = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or(crate::error::QueueIndexError { index: 0, len })?;
        let track = session.remove_at(index)?;
        Ok(Reply::Removed { track })
    }
}
