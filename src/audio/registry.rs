use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::GuildPlaybackSession;

/// Process-wide map from guild to its live playback session.
///
/// Backed by a sharded [`DashMap`], so commands for different guilds never
/// wait on each other. Both the command layer (create) and a session's own
/// playback loop (self-remove on teardown) mutate it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildPlaybackSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live session for `guild_id`, if any.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlaybackSession>> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|session| session.is_live())
    }

    /// Returns the live session or stores the one built by `on_create`.
    /// A session left behind in `Disconnecting` is replaced, and its
    /// replacement connects only after it has released the voice connection.
    pub fn get_or_create<F>(&self, guild_id: GuildId, on_create: F) -> Arc<GuildPlaybackSession>
    where
        F: FnOnce() -> Arc<GuildPlaybackSession>,
    {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) if entry.get().is_live() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                debug!("Reemplazando sesión terminada en guild {}", guild_id);
                let session = on_create();
                session.replaces(entry.insert(session.clone()));
                session
            }
            Entry::Vacant(entry) => {
                let session = on_create();
                entry.insert(session.clone());
                info!("🆕 Sesión creada para guild {}", guild_id);
                session
            }
        }
    }

    /// Idempotent; removing a missing guild is a no-op.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildPlaybackSession>> {
        self.sessions.remove(&guild_id).map(|(_, session)| session)
    }

    /// Removes `session` only if it is still the one stored for its guild,
    /// so a late teardown never evicts its replacement.
    pub fn remove_session(&self, session: &GuildPlaybackSession) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.guild_id(), |_, stored| {
                std::ptr::eq(Arc::as_ptr(stored), session)
            })
            .is_some();
        if removed {
            debug!("Sesión de guild {} eliminada del registro", session.guild_id());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stops every session; used on process shutdown.
    pub async fn shutdown_all(&self) -> usize {
        if self.is_empty() {
            info!("🧹 No hay sesiones activas que cerrar");
            return 0;
        }
        info!("🧹 Cerrando {} sesiones...", self.len());

        let sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let stopped = futures::future::join_all(sessions.iter().map(|s| s.shutdown()))
            .await
            .into_iter()
            .filter(|stopped| *stopped)
            .count();

        info!("🧹 {} sesiones cerradas", stopped);
        stopped
    }
}
