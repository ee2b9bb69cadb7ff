use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

use super::facade::Command;
use crate::error::CommandError;

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        stop_command(),
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        simple_command("unpause", "Resumes a paused track"),
        volume_command(),
        queue_command(),
        remove_command(),
        now_command(),
        simple_command("current", "Shows the track that is playing"),
        simple_command("playing", "Shows the track that is playing"),
    ]
}

/// Turns a slash command name plus its options into a [`Command`].
///
/// `stop` is an alias of `leave`, `unpause` of `resume`; `current` and
/// `playing` are aliases of `now`. Returns `Ok(None)` for names this bot does not own.
pub fn parse(
    name: &str,
    string_option: impl Fn(&str) -> Option<String>,
    integer_option: impl Fn(&str) -> Option<i64>,
) -> Result<Option<Command>, CommandError> {
    let command = match name {
        "join" => Command::Join,
        "leave" | "stop" => Command::Leave,
        "play" => Command::Play {
            query: string_option("query").ok_or(CommandError::MissingArgument("query"))?,
        },
        "skip" => Command::Skip,
        "pause" => Command::Pause,
        "resume" | "unpause" => Command::Resume,
        "volume" => Command::Volume {
            percent: integer_option("level").ok_or(CommandError::MissingArgument("level"))?,
        },
        "queue" => Command::Queue {
            page: integer_option("page").unwrap_or(1),
        },
        "remove" => Command::Remove {
            index: integer_option("index").ok_or(CommandError::MissingArgument("index"))?,
        },
        "now" | "current" | "playing" => Command::Now,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Joins (or moves to) your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Stops playback, clears the queue and leaves")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stops playback, clears the queue and leaves")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Queues a song from a URL or a search")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skips the current track")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pauses the current track")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Resumes a paused track")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Sets the playback volume")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume (0-100)")
                .required(true),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Shows the queue")
        .add_option(CreateCommandOption::new(
            CommandOptionType::Integer,
            "page",
            "Page number",
        ))
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Removes a track from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Position shown by /queue",
            )
            .required(true),
        )
}

fn now_command() -> CreateCommand {
    simple_command("now", "Shows the track that is playing")
}

fn simple_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name).description(description)
}
