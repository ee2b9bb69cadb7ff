//! Per-guild playback session.
//!
//! A session owns its queue, its sink connection and one playback loop task.
//! The loop is the only consumer of the queue; commands only enqueue and
//! poke at the current stream.
//!
//! ```text
//!  Idle ──connect──▶ ConnectedEmpty ◀──track ends / skip──┐
//!                        │                                 │
//!                        └──dequeue──▶ Playing ◀──▶ Paused ┘
//!
//!  any non-terminal ──stop / idle timeout / connection lost──▶ Disconnecting
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    queue::{Dequeued, PlaybackQueue, QueuePage},
    registry::SessionRegistry,
    sink::{AudioSink, SinkConnector, SinkEvent, SinkEventReceiver, SinkEventSender, StreamControl},
    track::Track,
};
use crate::error::{CommandError, QueueIndexError, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No sink connection yet.
    Idle,
    ConnectedEmpty,
    Playing,
    Paused,
    /// Terminal. The loop has exited; the session leaves the registry once
    /// its sink is released.
    Disconnecting,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self == SessionState::Disconnecting
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Stopped,
    IdleTimeout,
    ConnectionLost,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// How long the loop waits on an empty queue before leaving.
    pub idle_timeout: Duration,
    pub default_volume: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(180),
            default_volume: 0.5,
        }
    }
}

/// Told about every track the loop starts.
#[async_trait]
pub trait TrackAnnouncer: Send + Sync {
    async fn now_playing(&self, guild_id: GuildId, track: &Track) -> anyhow::Result<()>;
}

struct SessionInner {
    state: SessionState,
    current: Option<Arc<Track>>,
    stream: Option<Box<dyn StreamControl>>,
    sink: Option<Arc<dyn AudioSink>>,
    channel_id: Option<ChannelId>,
    volume: f32,
    /// Taken by the loop when the session connects.
    events_rx: Option<SinkEventReceiver>,
}

pub struct GuildPlaybackSession {
    guild_id: GuildId,
    queue: PlaybackQueue,
    inner: Mutex<SessionInner>,
    events_tx: SinkEventSender,
    /// Serializes connect/move so two joins can't race on the same guild.
    connect_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    /// Cancelled once teardown has let go of the voice connection.
    released: CancellationToken,
    /// The terminated session this one replaced, still releasing the guild's
    /// voice connection.
    predecessor: Mutex<Option<Arc<GuildPlaybackSession>>>,
    settings: SessionSettings,
    registry: Weak<SessionRegistry>,
    announcer: Option<Arc<dyn TrackAnnouncer>>,
}

impl GuildPlaybackSession {
    pub fn new(
        guild_id: GuildId,
        settings: SessionSettings,
        registry: Weak<SessionRegistry>,
        announcer: Option<Arc<dyn TrackAnnouncer>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            guild_id,
            queue: PlaybackQueue::new(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                current: None,
                stream: None,
                sink: None,
                channel_id: None,
                volume: settings.default_volume.clamp(0.0, 1.0),
                events_rx: Some(events_rx),
            }),
            events_tx,
            connect_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            released: CancellationToken::new(),
            predecessor: Mutex::new(None),
            settings,
            registry,
            announcer,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_live(&self) -> bool {
        !self.state().is_terminal()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.inner.lock().channel_id
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub fn current(&self) -> Option<Arc<Track>> {
        self.inner.lock().current.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_page(&self, page: usize, per_page: usize) -> QueuePage {
        self.queue.page(page, per_page)
    }

    /// The track the loop will start after the current one.
    pub fn up_next(&self) -> Option<Track> {
        self.queue.peek_range(0, 1).into_iter().next()
    }

    /// Resolves once teardown has disconnected the sink.
    pub async fn released(&self) {
        self.released.cancelled().await
    }

    /// Makes the first connect wait until `previous` has released the
    /// guild's voice connection.
    pub(crate) fn replaces(&self, previous: Arc<GuildPlaybackSession>) {
        *self.predecessor.lock() = Some(previous);
    }

    /// Connects the sink to `channel_id`, or moves it there if already
    /// connected. The first successful connect starts the playback loop.
    pub async fn connect(
        self: &Arc<Self>,
        connector: &dyn SinkConnector,
        channel_id: ChannelId,
    ) -> Result<(), CommandError> {
        let _guard = self.connect_lock.lock().await;

        let (state, sink, current_channel) = {
            let inner = self.inner.lock();
            (inner.state, inner.sink.clone(), inner.channel_id)
        };

        match state {
            SessionState::Disconnecting => Err(CommandError::SessionClosed),
            SessionState::Idle => {
                let previous = self.predecessor.lock().take();
                if let Some(previous) = previous {
                    debug!(
                        "Esperando a que la sesión anterior de guild {} libere la conexión",
                        self.guild_id
                    );
                    previous.released().await;
                }

                let sink = connector
                    .connect(self.guild_id, channel_id, self.events_tx.clone())
                    .await?;

                let events_rx = {
                    let mut inner = self.inner.lock();
                    if inner.state.is_terminal() {
                        None
                    } else {
                        inner.state = SessionState::ConnectedEmpty;
                        inner.sink = Some(sink.clone());
                        inner.channel_id = Some(channel_id);
                        inner.events_rx.take()
                    }
                };

                // Stopped while we were connecting.
                let Some(events_rx) = events_rx else {
                    sink.disconnect().await;
                    return Err(CommandError::SessionClosed);
                };

                info!("🎧 Sesión de reproducción iniciada en guild {}", self.guild_id);
                tokio::spawn(Arc::clone(self).drive(events_rx));
                Ok(())
            }
            _ if current_channel == Some(channel_id) => Ok(()),
            _ => {
                let sink = sink.ok_or(CommandError::NotConnected)?;
                sink.move_to(channel_id).await?;
                self.inner.lock().channel_id = Some(channel_id);
                info!("🔀 Movido al canal de voz {} en guild {}", channel_id, self.guild_id);
                Ok(())
            }
        }
    }

    /// Queues a track and returns its 0-based position in the queue.
    ///
    /// Fails once the session is torn down, so a resolution that finishes
    /// after `stop` is dropped instead of landing in a dead queue.
    pub fn enqueue(&self, track: Track) -> Result<usize, CommandError> {
        let inner = self.inner.lock();
        if inner.state.is_terminal() {
            debug!(
                "Descartando '{}': la sesión de guild {} ya terminó",
                track.title(),
                self.guild_id
            );
            return Err(CommandError::SessionClosed);
        }
        let title = track.title().to_string();
        let position = self.queue.enqueue(track);
        info!("➕ Agregado a la cola en guild {}: {}", self.guild_id, title);
        Ok(position)
    }

    pub fn remove_at(&self, index: usize) -> Result<Track, QueueIndexError> {
        let removed = self.queue.remove_at(index)?;
        info!("🗑️ Eliminado de la cola en guild {}: {}", self.guild_id, removed.title());
        Ok(removed)
    }

    /// Stops the current stream; the loop moves on as if it ended.
    pub fn skip(&self) -> Result<Arc<Track>, CommandError> {
        let inner = self.inner.lock();
        match (inner.state, &inner.stream, &inner.current) {
            (SessionState::Playing | SessionState::Paused, Some(stream), Some(current)) => {
                stream.stop()?;
                info!("⏭️ Saltando '{}' en guild {}", current.title(), self.guild_id);
                Ok(current.clone())
            }
            _ => Err(CommandError::NothingPlaying),
        }
    }

    pub fn pause(&self) -> Result<(), CommandError> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Playing {
            return Err(CommandError::NothingPlaying);
        }
        let stream = inner.stream.as_ref().ok_or(CommandError::NothingPlaying)?;
        stream.pause()?;
        inner.state = SessionState::Paused;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), CommandError> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Paused {
            return Err(CommandError::NothingPaused);
        }
        let stream = inner.stream.as_ref().ok_or(CommandError::NothingPaused)?;
        stream.resume()?;
        inner.state = SessionState::Playing;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    /// Clamps to `[0, 1]`. Applies to the live stream if there is one and to
    /// every track started afterwards.
    pub fn set_volume(&self, volume: f32) -> Result<f32, CommandError> {
        let volume = volume.clamp(0.0, 1.0);
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return Err(CommandError::SessionClosed);
        }
        if let Some(stream) = &inner.stream {
            stream.set_volume(volume)?;
        }
        inner.volume = volume;
        info!("🔊 Volumen ajustado a {}% en guild {}", (volume * 100.0).round(), self.guild_id);
        Ok(volume)
    }

    pub async fn stop(&self) -> bool {
        self.teardown(TeardownReason::Stopped).await
    }

    /// Reported by the gateway when the bot is dropped from voice.
    pub async fn connection_lost(&self) -> bool {
        self.teardown(TeardownReason::ConnectionLost).await
    }

    /// Someone dragged the bot into another channel; the connection itself
    /// follows on its own, only the bookkeeping needs updating.
    pub fn moved_externally(&self, channel_id: ChannelId) {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() || inner.channel_id.is_none() {
            return;
        }
        if inner.channel_id != Some(channel_id) {
            info!("🔀 Bot movido al canal {} en guild {}", channel_id, self.guild_id);
            inner.channel_id = Some(channel_id);
        }
    }

    pub(crate) async fn shutdown(&self) -> bool {
        self.teardown(TeardownReason::Shutdown).await
    }

    /// Moves to `Disconnecting` exactly once. Returns false if some other
    /// path already did.
    async fn teardown(&self, reason: TeardownReason) -> bool {
        let (sink, stream, dropped) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return false;
            }
            inner.state = SessionState::Disconnecting;
            inner.current = None;
            let dropped = self.queue.clear();
            (inner.sink.take(), inner.stream.take(), dropped)
        };

        self.cancel.cancel();

        if let Some(stream) = stream {
            if let Err(e) = stream.stop() {
                debug!("Stream ya detenido en guild {}: {}", self.guild_id, e);
            }
        }
        if let Some(sink) = sink {
            sink.disconnect().await;
        }

        // Songbird hands out one call per guild; a replacement may only join
        // after the old one is gone.
        self.released.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_session(self);
        }

        match reason {
            TeardownReason::ConnectionLost => warn!(
                "🔌 Sesión de guild {} cerrada por pérdida de conexión ({} en cola descartadas)",
                self.guild_id, dropped
            ),
            _ => info!(
                "⏹️ Sesión de guild {} cerrada ({:?}, {} en cola descartadas)",
                self.guild_id, reason, dropped
            ),
        }
        true
    }

    /// The playback loop. Runs until the session is torn down.
    async fn drive(self: Arc<Self>, mut events: SinkEventReceiver) {
        let mut ticket: u64 = 0;

        'session: loop {
            // Anything still buffered belongs to an earlier stream.
            while let Ok(event) = events.try_recv() {
                if event == SinkEvent::ConnectionLost {
                    self.teardown(TeardownReason::ConnectionLost).await;
                    break 'session;
                }
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break 'session,
                event = events.recv() => match event {
                    Some(SinkEvent::ConnectionLost) | None => {
                        self.teardown(TeardownReason::ConnectionLost).await;
                        break 'session;
                    }
                    Some(stale) => {
                        debug!("Evento obsoleto ignorado en guild {}: {:?}", self.guild_id, stale);
                        continue 'session;
                    }
                },
                next = self.queue.dequeue_blocking(self.settings.idle_timeout) => next,
            };

            let track = match next {
                Dequeued::Track(track) => track,
                Dequeued::TimedOut => {
                    info!(
                        "⏰ Sin canciones nuevas en {:?}, saliendo de guild {}",
                        self.settings.idle_timeout, self.guild_id
                    );
                    self.teardown(TeardownReason::IdleTimeout).await;
                    break 'session;
                }
            };

            ticket += 1;
            let (sink, volume) = {
                let inner = self.inner.lock();
                if inner.state.is_terminal() {
                    break 'session;
                }
                (inner.sink.clone(), inner.volume)
            };
            let Some(sink) = sink else {
                error!("Sesión de guild {} sin sink en el loop", self.guild_id);
                self.teardown(TeardownReason::ConnectionLost).await;
                break 'session;
            };

            let stream = match sink.play(&track, volume, ticket).await {
                Ok(stream) => stream,
                Err(SinkError::ConnectionLost) => {
                    self.teardown(TeardownReason::ConnectionLost).await;
                    break 'session;
                }
                Err(e) => {
                    warn!(
                        "❌ No se pudo reproducir '{}' en guild {}: {}",
                        track.title(),
                        self.guild_id,
                        e
                    );
                    continue 'session;
                }
            };

            let current = Arc::new(track);
            {
                let mut inner = self.inner.lock();
                if inner.state.is_terminal() {
                    // Torn down while the stream was starting.
                    let _ = stream.stop();
                    break 'session;
                }
                // Volume may have changed while the stream was starting.
                if inner.volume != volume {
                    let _ = stream.set_volume(inner.volume);
                }
                inner.current = Some(current.clone());
                inner.stream = Some(stream);
                inner.state = SessionState::Playing;
            }
            info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, current.title());

            if let Some(announcer) = &self.announcer {
                if let Err(e) = announcer.now_playing(self.guild_id, &current).await {
                    warn!("No se pudo anunciar la canción en guild {}: {:?}", self.guild_id, e);
                }
            }

            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'session,
                    event = events.recv() => match event {
                        Some(SinkEvent::TrackEnded { ticket: t }) if t == ticket => break,
                        Some(SinkEvent::TrackErrored { ticket: t, error }) if t == ticket => {
                            warn!(
                                "❌ Error de stream en '{}' (guild {}), pasando a la siguiente: {}",
                                current.title(),
                                self.guild_id,
                                error
                            );
                            break;
                        }
                        Some(SinkEvent::ConnectionLost) | None => {
                            self.teardown(TeardownReason::ConnectionLost).await;
                            break 'session;
                        }
                        Some(_) => continue,
                    },
                }
            }

            debug!("Track terminado en guild {}: {}", self.guild_id, current.title());
            if self.queue.is_empty() {
                debug!(
                    "Cola vacía en guild {}, esperando hasta {:?}",
                    self.guild_id, self.settings.idle_timeout
                );
            }
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                break 'session;
            }
            inner.current = None;
            inner.stream = None;
            inner.state = SessionState::ConnectedEmpty;
        }

        debug!("Loop de reproducción terminado en guild {}", self.guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        testing::{settle, FakeConnector},
        track::sample,
    };
    use pretty_assertions::assert_eq;

    fn guild() -> GuildId {
        GuildId::new(42)
    }

    fn voice() -> ChannelId {
        ChannelId::new(100)
    }

    async fn connected(
        settings: SessionSettings,
    ) -> (Arc<SessionRegistry>, Arc<GuildPlaybackSession>, Arc<FakeConnector>) {
        let registry = Arc::new(SessionRegistry::new());
        let connector = Arc::new(FakeConnector::default());
        let session = registry.get_or_create(guild(), || {
            Arc::new(GuildPlaybackSession::new(
                guild(),
                settings,
                Arc::downgrade(&registry),
                None,
            ))
        });
        session.connect(connector.as_ref(), voice()).await.unwrap();
        (registry, session, connector)
    }

    fn title_of(session: &GuildPlaybackSession) -> Option<String> {
        session.current().map(|t| t.title().to_string())
    }

    #[tokio::test]
    async fn new_session_is_idle_until_connected() {
        let registry = Arc::new(SessionRegistry::new());
        let session =
            GuildPlaybackSession::new(guild(), SessionSettings::default(), Arc::downgrade(&registry), None);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn first_track_starts_playing_at_session_volume() {
        let settings = SessionSettings {
            default_volume: 1.0,
            ..Default::default()
        };
        let (_registry, session, connector) = connected(settings).await;
        assert_eq!(session.state(), SessionState::ConnectedEmpty);

        session.set_volume(0.5).unwrap();
        session.enqueue(sample("a")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;

        let sink = connector.sink(guild());
        assert_eq!(sink.played(), vec!["a"]);
        assert_eq!(sink.last_volume(), Some(0.5));
        assert_eq!(title_of(&session).as_deref(), Some("a"));
        assert_eq!(session.queue_len(), 0);
    }

    #[tokio::test]
    async fn tracks_play_in_enqueue_order() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        for title in ["a", "b", "c"] {
            session.enqueue(sample(title)).unwrap();
        }
        let sink = connector.sink(guild());

        for expected in ["a", "b", "c"] {
            settle(|| title_of(&session).as_deref() == Some(expected)).await;
            sink.finish_current();
        }
        settle(|| session.state() == SessionState::ConnectedEmpty).await;

        assert_eq!(sink.played(), vec!["a", "b", "c"]);
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn up_next_is_the_queue_head() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        session.enqueue(sample("b")).unwrap();
        settle(|| title_of(&session).as_deref() == Some("a")).await;

        assert_eq!(session.up_next().map(|t| t.title().to_string()).as_deref(), Some("b"));

        connector.sink(guild()).finish_current();
        settle(|| title_of(&session).as_deref() == Some("b")).await;
        assert!(session.up_next().is_none());
    }

    #[tokio::test]
    async fn skip_moves_to_next_without_replaying() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        session.enqueue(sample("b")).unwrap();
        settle(|| title_of(&session).as_deref() == Some("a")).await;

        let skipped = session.skip().unwrap();
        assert_eq!(skipped.title(), "a");
        settle(|| title_of(&session).as_deref() == Some("b")).await;

        session.skip().unwrap();
        settle(|| session.state() == SessionState::ConnectedEmpty).await;

        assert_eq!(connector.sink(guild()).played(), vec!["a", "b"]);
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn skip_with_nothing_playing_is_rejected() {
        let (_registry, session, _connector) = connected(SessionSettings::default()).await;
        assert!(matches!(session.skip(), Err(CommandError::NothingPlaying)));
        assert_eq!(session.state(), SessionState::ConnectedEmpty);
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_the_stream() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;
        let sink = connector.sink(guild());

        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(sink.last_paused(), Some(true));
        assert!(matches!(session.pause(), Err(CommandError::NothingPlaying)));

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(sink.last_paused(), Some(false));
        assert!(matches!(session.resume(), Err(CommandError::NothingPaused)));
    }

    #[tokio::test]
    async fn volume_applies_to_live_stream_and_is_clamped() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;

        assert_eq!(session.set_volume(1.7).unwrap(), 1.0);
        assert_eq!(connector.sink(guild()).last_volume(), Some(1.0));
        assert_eq!(session.set_volume(0.25).unwrap(), 0.25);
        assert_eq!(connector.sink(guild()).last_volume(), Some(0.25));
    }

    #[tokio::test]
    async fn stream_error_skips_to_next_track() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("broken")).unwrap();
        session.enqueue(sample("fine")).unwrap();
        let sink = connector.sink(guild());
        settle(|| title_of(&session).as_deref() == Some("broken")).await;

        sink.fail_current("decoder gave up");
        settle(|| title_of(&session).as_deref() == Some("fine")).await;

        assert!(session.is_live());
    }

    #[tokio::test]
    async fn failed_start_does_not_kill_the_session() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        let sink = connector.sink(guild());
        sink.fail_next_play(SinkError::Stream("403 from cdn".into()));

        session.enqueue(sample("gone")).unwrap();
        session.enqueue(sample("next")).unwrap();
        settle(|| title_of(&session).as_deref() == Some("next")).await;

        assert_eq!(sink.played(), vec!["next"]);
    }

    #[tokio::test]
    async fn stale_end_events_are_ignored() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        session.enqueue(sample("b")).unwrap();
        let sink = connector.sink(guild());
        settle(|| title_of(&session).as_deref() == Some("a")).await;

        // Natural end and an explicit skip racing on the same stream.
        sink.finish_current();
        session.skip().ok();
        settle(|| title_of(&session).as_deref() == Some("b")).await;
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }

        assert_eq!(title_of(&session).as_deref(), Some("b"));
        assert_eq!(sink.played(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn stop_clears_queue_and_leaves_registry() {
        let (registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        session.enqueue(sample("b")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;

        assert!(session.stop().await);
        assert!(!session.stop().await);

        assert_eq!(session.state(), SessionState::Disconnecting);
        assert_eq!(session.queue_len(), 0);
        assert!(session.current().is_none());
        assert!(registry.get(guild()).is_none());
        assert_eq!(connector.sink(guild()).disconnects(), 1);
    }

    #[tokio::test]
    async fn enqueue_after_stop_is_discarded() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        session.stop().await;

        assert!(matches!(session.enqueue(sample("late")), Err(CommandError::SessionClosed)));
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        assert!(connector.sink(guild()).played().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_tears_down_exactly_once() {
        let settings = SessionSettings {
            idle_timeout: Duration::from_secs(180),
            ..Default::default()
        };
        let (registry, session, connector) = connected(settings).await;

        tokio::time::sleep(Duration::from_secs(179)).await;
        assert!(session.is_live());
        assert!(registry.get(guild()).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle(|| !session.is_live()).await;

        assert!(registry.get(guild()).is_none());
        assert_eq!(connector.sink(guild()).disconnects(), 1);
        assert!(!session.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_restarts_after_each_track() {
        let (registry, session, connector) = connected(SessionSettings::default()).await;

        tokio::time::sleep(Duration::from_secs(170)).await;
        session.enqueue(sample("a")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;
        connector.sink(guild()).finish_current();
        settle(|| session.state() == SessionState::ConnectedEmpty).await;

        tokio::time::sleep(Duration::from_secs(170)).await;
        assert!(registry.get(guild()).is_some());
    }

    #[tokio::test]
    async fn connection_loss_forces_teardown() {
        let (registry, session, connector) = connected(SessionSettings::default()).await;
        session.enqueue(sample("a")).unwrap();
        settle(|| session.state() == SessionState::Playing).await;

        connector.sink(guild()).drop_connection();
        settle(|| !session.is_live()).await;

        assert!(registry.get(guild()).is_none());
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn external_moves_update_the_channel() {
        let (_registry, session, _connector) = connected(SessionSettings::default()).await;

        session.moved_externally(ChannelId::new(300));
        assert_eq!(session.channel_id(), Some(ChannelId::new(300)));

        session.stop().await;
        session.moved_externally(ChannelId::new(400));
        assert_eq!(session.channel_id(), Some(ChannelId::new(300)));
    }

    #[tokio::test]
    async fn connect_moves_between_channels() {
        let (_registry, session, connector) = connected(SessionSettings::default()).await;
        let other = ChannelId::new(200);

        session.connect(connector.as_ref(), other).await.unwrap();

        assert_eq!(session.channel_id(), Some(other));
        assert_eq!(connector.sink(guild()).channel(), other);
        assert_eq!(connector.connections(), 1);
    }
}
