use anyhow::Result;
use serenity::{
    builder::{
        CreateActionRow, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use super::{
    commands,
    facade::{Command, Invocation, Reply},
    OpenMusicBot,
};
use crate::{
    audio::session::SessionState,
    error::CommandError,
    ui::{buttons, embeds},
};

/// What a [`Reply`] or error looks like once rendered for Discord.
#[derive(Default)]
struct Response {
    content: Option<String>,
    embed: Option<CreateEmbed>,
    components: Vec<CreateActionRow>,
    ephemeral: bool,
}

impl Response {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    fn embed(embed: CreateEmbed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    fn message(self) -> CreateInteractionResponseMessage {
        let mut message = CreateInteractionResponseMessage::new()
            .ephemeral(self.ephemeral)
            .components(self.components);
        if let Some(content) = self.content {
            message = message.content(content);
        }
        if let Some(embed) = self.embed {
            message = message.embed(embed);
        }
        message
    }

    fn edit(self) -> EditInteractionResponse {
        let mut edit = EditInteractionResponse::new().components(self.components);
        if let Some(content) = self.content {
            edit = edit.content(content);
        }
        if let Some(embed) = self.embed {
            edit = edit.embed(embed);
        }
        edit
    }
}

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} usado por {} en guild {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    let parsed = commands::parse(
        &command.data.name,
        |name| string_option(&command, name),
        |name| integer_option(&command, name),
    );

    let parsed = match parsed {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            let response = Response {
                ephemeral: true,
                ..Response::text("❌ Comando no reconocido")
            };
            command
                .create_response(&ctx.http, CreateInteractionResponse::Message(response.message()))
                .await?;
            return Ok(());
        }
        Err(e) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(render_error(&e).message()),
                )
                .await?;
            return Ok(());
        }
    };

    let invocation = invocation(ctx, command.guild_id, command.user.id, command.channel_id);

    if matches!(parsed, Command::Play { .. }) {
        // Defer la respuesta ya que resolver puede tomar tiempo
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await?;

        let response = respond(bot, &invocation, parsed).await;
        command.edit_response(&ctx.http, response.edit()).await?;
        return Ok(());
    }

    let response = respond(bot, &invocation, parsed).await;
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response.message()))
        .await?;

    Ok(())
}

/// Maneja interacciones con componentes (botones)
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &OpenMusicBot,
) -> Result<()> {
    info!(
        "🔘 Botón {} presionado por {} en guild {:?}",
        component.data.custom_id, component.user.name, component.guild_id
    );

    let Some(parsed) = buttons::parse_button(&component.data.custom_id) else {
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    Response {
                        ephemeral: true,
                        ..Response::text("❌ Acción no reconocida")
                    }
                    .message(),
                ),
            )
            .await?;
        return Ok(());
    };

    let invocation = invocation(ctx, component.guild_id, component.user.id, component.channel_id);
    let paging = matches!(parsed, Command::Queue { .. });
    let response = respond(bot, &invocation, parsed).await;

    // Las páginas de la cola se editan en el mismo mensaje
    let response = if paging && !response.ephemeral {
        CreateInteractionResponse::UpdateMessage(response.message())
    } else {
        CreateInteractionResponse::Message(Response {
            ephemeral: true,
            ..response
        }
        .message())
    };
    component.create_response(&ctx.http, response).await?;

    Ok(())
}

async fn respond(bot: &OpenMusicBot, invocation: &Invocation, command: Command) -> Response {
    let name = command.name();
    match bot.facade().execute(invocation, command).await {
        Ok(reply) => render_reply(bot, invocation, reply),
        Err(e) => {
            if e.is_internal() {
                error!("❌ Error en /{} (guild {:?}): {:?}", name, invocation.guild_id, e);
            } else {
                warn!("/{} rechazado (guild {:?}): {}", name, invocation.guild_id, e);
            }
            render_error(&e)
        }
    }
}

fn render_reply(bot: &OpenMusicBot, invocation: &Invocation, reply: Reply) -> Response {
    match reply {
        Reply::Joined { channel_id } => Response::text(format!("🔊 Connected to <#{}>", channel_id)),
        Reply::Left => Response::text("👋 Stopped playback, cleared the queue and left"),
        Reply::Queued { track, position } => {
            Response::embed(embeds::create_track_queued_embed(&track, position))
        }
        Reply::Skipped { track } => Response::text(format!("⏭️ Skipped **{}**", track.title())),
        Reply::Paused => Response::text("⏸️ Paused"),
        Reply::Resumed => Response::text("▶️ Resumed"),
        Reply::VolumeSet { percent } => Response::text(format!("🔊 Volume set to {}%", percent)),
        Reply::QueuePage(page) => Response {
            components: buttons::create_navigation_buttons(page.current_page, page.total_pages),
            ..Response::embed(embeds::create_queue_embed(&page))
        },
        Reply::Removed { track } => {
            Response::text(format!("🗑️ Removed **{}** from the queue", track.title()))
        }
        Reply::NowPlaying(track) => {
            let session = invocation
                .guild_id
                .and_then(|guild_id| bot.facade().registry().get(guild_id));
            let paused = session
                .as_ref()
                .is_some_and(|session| session.state() == SessionState::Paused);

            let mut embed = embeds::create_now_playing_embed(&track);
            if let Some(session) = &session {
                embed = embed.field("🔊 Volume", embeds::format_volume(session.volume()), true);
                if let Some(next) = session.up_next() {
                    embed = embed.field("⏭️ Up next", next.title(), true);
                }
            }
            Response {
                components: buttons::create_player_buttons(paused),
                ..Response::embed(embed)
            }
        }
        Reply::NothingPlaying => Response {
            ephemeral: true,
            ..Response::text(CommandError::NothingPlaying.user_message())
        },
    }
}

fn render_error(error: &CommandError) -> Response {
    Response {
        ephemeral: true,
        ..Response::embed(embeds::create_error_embed(&error.user_message()))
    }
}

// Funciones auxiliares

fn invocation(
    ctx: &Context,
    guild_id: Option<GuildId>,
    user_id: UserId,
    text_channel: ChannelId,
) -> Invocation {
    Invocation {
        guild_id,
        user_id,
        text_channel,
        voice_channel: guild_id.and_then(|guild_id| get_user_voice_channel(ctx, guild_id, user_id)),
    }
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option(command: &CommandInteraction, name: &str) -> Option<String> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .map(str::to_string)
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}
