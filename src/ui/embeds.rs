use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{queue::QueuePage, track::Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const NOW_PLAYING_GOLD: Colour = Colour::from_rgb(241, 196, 15);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Music Bot";

/// Announced when a track starts and returned by `/now`.
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now playing")
        .description(format!("```css\n{}\n```", track.title()))
        .color(colors::NOW_PLAYING_GOLD)
        .field("⏱️ Duration", format_duration(track.duration()), true)
        .field("👤 Requested by", format!("<@{}>", track.requester()), true)
        .field("🕒 Requested", requested_ago(track), true);

    if let Some(uploader) = track.uploader() {
        embed = embed.field("🎤 Uploader", link(uploader, track.uploader_url()), true);
    }
    if let Some(url) = track.url() {
        embed = embed.field("🔗 URL", link(url, Some(url)), false).url(url);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_track_queued_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Added to the queue")
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duration", format_duration(track.duration()), true)
        .field("📍 Position", format!("#{}", position + 1), true);

    if let Some(uploader) = track.uploader() {
        embed = embed.field("🎤 Uploader", link(uploader, track.uploader_url()), true);
    }
    if let Some(url) = track.url() {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    // Stamped with the request time, not the moment the reply is rendered.
    let requested = Timestamp::from_unix_timestamp(track.requested_at().timestamp())
        .unwrap_or_else(|_| Timestamp::now());

    embed
        .timestamp(requested)
        .footer(CreateEmbedFooter::new("🎵 Plays automatically when its turn comes"))
}

pub fn create_queue_embed(page: &QueuePage) -> CreateEmbed {
    if page.total_items == 0 {
        return CreateEmbed::default()
            .title("📋 Queue")
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    CreateEmbed::default()
        .title("📋 Queue")
        .description(format_queue_page(page))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(format!(
            "Viewing page {}/{}",
            page.current_page, page.total_pages
        )))
}

pub fn create_error_embed(description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("Error")
        .description(description)
        .color(colors::ERROR_RED)
}

/// Discord renders `<t:…:R>` as "5 minutes ago" in the reader's locale.
pub fn requested_ago(track: &Track) -> String {
    format!("<t:{}:R>", track.requested_at().timestamp())
}

pub fn format_volume(volume: f32) -> String {
    format!("{}%", (volume * 100.0).round() as i64)
}

pub fn format_queue_page(page: &QueuePage) -> String {
    let mut text = format!("**{} tracks:**\n\n", page.total_items);
    for (position, track) in &page.entries {
        let title = match track.url() {
            Some(url) => format!("[**{}**]({})", track.title(), url),
            None => format!("**{}**", track.title()),
        };
        text.push_str(&format!("`{}.` {}\n", position, title));
    }
    text
}

/// `3m 33s` style; live streams have no duration.
pub fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        // Drop sub-second noise before formatting.
        Some(d) => humantime::format_duration(Duration::from_secs(d.as_secs())).to_string(),
        None => "🔴 Live".to_string(),
    }
}

fn link(text: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{}]({})", text, url),
        None => text.to_string(),
    }
}
