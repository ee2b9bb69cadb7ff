//! # Bot Module
//!
//! Discord front end for Open Music Bot.
//!
//! - [`commands`]: slash command definitions, registration and parsing
//! - [`facade`]: the command rules, independent of Discord types
//! - [`handlers`]: interaction in, facade call, rendered response out
//!
//! ## Architecture
//!
//! [`OpenMusicBot`] implements Serenity's [`EventHandler`]. It owns a
//! [`CommandFacade`] and forwards every interaction to it; voice state
//! updates about the bot itself are fed back into the guild's session.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
    http::Http,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod facade;
pub mod handlers;

use crate::{
    audio::{session::TrackAnnouncer, track::Track},
    config::Config,
    ui::{buttons, embeds},
};
use facade::CommandFacade;

/// Main Discord bot handler for Open Music Bot.
pub struct OpenMusicBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    facade: Arc<CommandFacade>,
}

impl OpenMusicBot {
    pub fn new(config: Arc<Config>, facade: Arc<CommandFacade>) -> Self {
        Self { config, facade }
    }

    pub fn facade(&self) -> &CommandFacade {
        &self.facade
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set, commands go to that guild only (propagate in
    /// about a second, useful for development); otherwise they are global.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                // Verificar que el bot esté en la guild
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for OpenMusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Errors are logged but don't crash the bot.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Only the bot's own voice state matters: a kick or channel deletion
    /// ends the session, a drag to another channel is recorded.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(session) = self.facade.registry().get(guild_id) else {
            return;
        };

        match new.channel_id {
            None if old.is_some() => {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                session.connection_lost().await;
            }
            Some(channel_id) => session.moved_externally(channel_id),
            None => {}
        }
    }
}

/// Posts the now-playing embed in the text channel the track was requested from.
pub struct DiscordAnnouncer {
    http: Arc<Http>,
}

impl DiscordAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TrackAnnouncer for DiscordAnnouncer {
    async fn now_playing(&self, guild_id: GuildId, track: &Track) -> Result<()> {
        let message = CreateMessage::new()
            .embed(embeds::create_now_playing_embed(track))
            .components(buttons::create_player_buttons(false));

        track
            .channel_id()
            .send_message(self.http.as_ref(), message)
            .await?;
        info!("📣 Anunciada '{}' en guild {}", track.title(), guild_id);
        Ok(())
    }
}
