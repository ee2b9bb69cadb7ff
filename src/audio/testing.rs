//! In-memory sink used by the session, registry and facade tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Notify;

use super::{
    sink::{AudioSink, SinkConnector, SinkEvent, SinkEventSender, StreamControl},
    track::Track,
};
use crate::error::SinkError;

#[derive(Debug, Default)]
struct StreamState {
    ticket: u64,
    title: String,
    volume: f32,
    paused: bool,
    stopped: bool,
}

/// Records everything the session asks the sink to do.
pub struct FakeSink {
    guild_id: GuildId,
    channel: Mutex<ChannelId>,
    events: SinkEventSender,
    streams: Mutex<Vec<Arc<Mutex<StreamState>>>>,
    disconnects: AtomicUsize,
    disconnect_gate: Mutex<Option<Arc<Notify>>>,
    fail_next_play: Mutex<Option<SinkError>>,
}

impl FakeSink {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel(&self) -> ChannelId {
        *self.channel.lock()
    }

    /// Titles in the order they were handed to `play`.
    pub fn played(&self) -> Vec<String> {
        self.streams
            .lock()
            .iter()
            .map(|s| s.lock().title.clone())
            .collect()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.streams.lock().last().map(|s| s.lock().volume)
    }

    pub fn last_paused(&self) -> Option<bool> {
        self.streams.lock().last().map(|s| s.lock().paused)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Ends the latest stream as if it reached its natural end.
    pub fn finish_current(&self) {
        if let Some(stream) = self.streams.lock().last() {
            let ticket = stream.lock().ticket;
            let _ = self.events.send(SinkEvent::TrackEnded { ticket });
        }
    }

    pub fn fail_current(&self, error: &str) {
        if let Some(stream) = self.streams.lock().last() {
            let ticket = stream.lock().ticket;
            let _ = self.events.send(SinkEvent::TrackErrored {
                ticket,
                error: error.to_string(),
            });
        }
    }

    pub fn drop_connection(&self) {
        let _ = self.events.send(SinkEvent::ConnectionLost);
    }

    /// Makes `disconnect` hang until the returned gate is notified.
    pub fn hold_disconnect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.disconnect_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn fail_next_play(&self, error: SinkError) {
        *self.fail_next_play.lock() = Some(error);
    }
}

struct FakeStream {
    state: Arc<Mutex<StreamState>>,
    events: SinkEventSender,
}

impl StreamControl for FakeStream {
    fn pause(&self) -> Result<(), SinkError> {
        self.state.lock().paused = true;
        Ok(())
    }

    fn resume(&self) -> Result<(), SinkError> {
        self.state.lock().paused = false;
        Ok(())
    }

    fn stop(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if !state.stopped {
            state.stopped = true;
            let _ = self.events.send(SinkEvent::TrackEnded {
                ticket: state.ticket,
            });
        }
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<(), SinkError> {
        self.state.lock().volume = volume;
        Ok(())
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(
        &self,
        track: &Track,
        volume: f32,
        ticket: u64,
    ) -> Result<Box<dyn StreamControl>, SinkError> {
        if let Some(error) = self.fail_next_play.lock().take() {
            return Err(error);
        }

        let state = Arc::new(Mutex::new(StreamState {
            ticket,
            title: track.title().to_string(),
            volume,
            ..Default::default()
        }));
        self.streams.lock().push(state.clone());

        Ok(Box::new(FakeStream {
            state,
            events: self.events.clone(),
        }))
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), SinkError> {
        *self.channel.lock() = channel_id;
        Ok(())
    }

    async fn disconnect(&self) {
        let gate = self.disconnect_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out [`FakeSink`]s and keeps them around for inspection.
#[derive(Default)]
pub struct FakeConnector {
    sinks: Mutex<Vec<Arc<FakeSink>>>,
    refuse: Mutex<bool>,
}

impl FakeConnector {
    pub fn refuse_connections(&self) {
        *self.refuse.lock() = true;
    }

    pub fn connections(&self) -> usize {
        self.sinks.lock().len()
    }

    /// Latest sink opened for `guild_id`.
    pub fn sink(&self, guild_id: GuildId) -> Arc<FakeSink> {
        self.sinks
            .lock()
            .iter()
            .rev()
            .find(|s| s.guild_id() == guild_id)
            .cloned()
            .expect("no sink was opened for this guild")
    }
}

#[async_trait]
impl SinkConnector for FakeConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: SinkEventSender,
    ) -> Result<Arc<dyn AudioSink>, SinkError> {
        if *self.refuse.lock() {
            return Err(SinkError::Connect("missing permissions".into()));
        }

        let sink = Arc::new(FakeSink {
            guild_id,
            channel: Mutex::new(channel_id),
            events,
            streams: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            disconnect_gate: Mutex::new(None),
            fail_next_play: Mutex::new(None),
        });
        self.sinks.lock().push(sink.clone());
        Ok(sink)
    }
}

/// Yields until `condition` holds, so spawned playback loops get to run.
pub async fn settle(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
