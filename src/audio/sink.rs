//! The audio sink: a live voice connection that consumes one stream at a time.
//!
//! The playback loop only talks to the traits in this module. The songbird
//! implementations at the bottom are what the bot wires in at runtime; tests
//! use the in-memory double from [`super::testing`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::Input,
    tracks::{Track as VoiceTrack, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::track::Track;
use crate::error::SinkError;

/// Notifications flowing from the sink back to a session's playback loop.
///
/// Track events carry the ticket the loop handed to [`AudioSink::play`], so
/// late events from an earlier stream can be told apart and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    TrackEnded { ticket: u64 },
    TrackErrored { ticket: u64, error: String },
    ConnectionLost,
}

pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// Control over one stream that is currently handed to the sink.
pub trait StreamControl: Send + Sync {
    fn pause(&self) -> Result<(), SinkError>;
    fn resume(&self) -> Result<(), SinkError>;
    /// Ends the stream; the sink reports it as a normal `TrackEnded`.
    fn stop(&self) -> Result<(), SinkError>;
    fn set_volume(&self, volume: f32) -> Result<(), SinkError>;
}

#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Starts streaming `track` at `volume`. Completion or failure arrives
    /// later as a [`SinkEvent`] tagged with `ticket`.
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        ticket: u64,
    ) -> Result<Box<dyn StreamControl>, SinkError>;

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), SinkError>;

    /// Releases the connection. Safe to call more than once.
    async fn disconnect(&self);
}

/// Opens sink connections. Connection-level events go to `events`.
#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: SinkEventSender,
    ) -> Result<Arc<dyn AudioSink>, SinkError>;
}

/// Connects through songbird and streams over HTTP.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { manager, http })
    }
}

#[async_trait]
impl SinkConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: SinkEventSender,
    ) -> Result<Arc<dyn AudioSink>, SinkError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| SinkError::Connect(e.to_string()))?;

        {
            let mut handler = call.lock().await;
            // A previous session for this guild may have left its notifier behind.
            handler.remove_all_global_events();
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DisconnectNotifier {
                    guild_id,
                    events: events.clone(),
                },
            );
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Arc::new(SongbirdSink {
            guild_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            events,
        }))
    }
}

pub struct SongbirdSink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    events: SinkEventSender,
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        ticket: u64,
    ) -> Result<Box<dyn StreamControl>, SinkError> {
        let request =
            songbird::input::HttpRequest::new(self.http.clone(), track.source().locator().to_string());
        // Volume is part of the track, so the first frames are already at level.
        let voice_track = VoiceTrack::from(Input::from(request)).volume(volume);

        let handle = {
            let mut handler = self.call.lock().await;
            if handler.current_channel().is_none() {
                return Err(SinkError::ConnectionLost);
            }
            handler.play(voice_track)
        };

        let stream = Box::new(SongbirdStream {
            handle: handle.clone(),
        });
        arm_stream(stream, || {
            handle
                .add_event(
                    Event::Track(TrackEvent::End),
                    TrackEndNotifier {
                        ticket,
                        events: self.events.clone(),
                    },
                )
                .map_err(control_error)?;
            handle
                .add_event(
                    Event::Track(TrackEvent::Error),
                    TrackErrorNotifier {
                        guild_id: self.guild_id,
                        ticket,
                        events: self.events.clone(),
                    },
                )
                .map_err(control_error)
        })
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), SinkError> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Connect(e.to_string()))
    }

    async fn disconnect(&self) {
        self.call.lock().await.stop();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Conexión de voz ya liberada en guild {}: {:?}", self.guild_id, e);
        }
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
    }
}

struct SongbirdStream {
    handle: TrackHandle,
}

impl StreamControl for SongbirdStream {
    fn pause(&self) -> Result<(), SinkError> {
        self.handle.pause().map_err(control_error)
    }

    fn resume(&self) -> Result<(), SinkError> {
        self.handle.play().map_err(control_error)
    }

    fn stop(&self) -> Result<(), SinkError> {
        self.handle.stop().map_err(control_error)
    }

    fn set_volume(&self, volume: f32) -> Result<(), SinkError> {
        self.handle.set_volume(volume).map_err(control_error)
    }
}

/// Hands out a freshly started stream once `arm` has wired its events up.
/// If that fails the stream is stopped instead of playing unobserved.
fn arm_stream(
    stream: Box<dyn StreamControl>,
    arm: impl FnOnce() -> Result<(), SinkError>,
) -> Result<Box<dyn StreamControl>, SinkError> {
    if let Err(e) = arm() {
        if let Err(stop_error) = stream.stop() {
            debug!("No se pudo detener el stream sin eventos: {}", stop_error);
        }
        return Err(e);
    }
    Ok(stream)
}

fn control_error(e: songbird::tracks::ControlError) -> SinkError {
    SinkError::Stream(e.to_string())
}

/// Fires for both natural completion and `stop()`.
struct TrackEndNotifier {
    ticket: u64,
    events: SinkEventSender,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        // The receiver is gone once the session is torn down.
        let _ = self.events.send(SinkEvent::TrackEnded {
            ticket: self.ticket,
        });
        None
    }
}

struct TrackErrorNotifier {
    guild_id: GuildId,
    ticket: u64,
    events: SinkEventSender,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = String::from("unknown stream error");
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error = format!("{:?}", state.playing);
            }
        }
        warn!("❌ Error en track para guild {}: {}", self.guild_id, error);

        let _ = self.events.send(SinkEvent::TrackErrored {
            ticket: self.ticket,
            error,
        });
        None
    }
}

struct DisconnectNotifier {
    guild_id: GuildId,
    events: SinkEventSender,
}

#[async_trait]
impl VoiceEventHandler for DisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            // No reason means we asked for it.
            if let Some(reason) = &data.reason {
                warn!(
                    "🔌 Conexión de voz perdida en guild {}: {:?}",
                    self.guild_id, reason
                );
                let _ = self.events.send(SinkEvent::ConnectionLost);
            }
        }
        None
    }
}
