use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::bot::facade::Command;

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE: &str = "music_pause";
    pub const RESUME: &str = "music_resume";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    /// Followed by the target page, e.g. `music_queue_page:2`.
    pub const QUEUE_PAGE_PREFIX: &str = "music_queue_page:";
}

/// Controls attached to the now-playing message.
pub fn create_player_buttons(is_paused: bool) -> Vec<CreateActionRow> {
    let toggle = if is_paused {
        CreateButton::new(button_ids::RESUME)
            .emoji('▶')
            .style(ButtonStyle::Primary)
    } else {
        CreateButton::new(button_ids::PAUSE)
            .emoji('⏸')
            .style(ButtonStyle::Primary)
    };

    vec![CreateActionRow::Buttons(vec![
        toggle,
        CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
    ])]
}

/// Previous/next buttons under a queue page. Empty when there is one page.
pub fn create_navigation_buttons(current_page: usize, total_pages: usize) -> Vec<CreateActionRow> {
    if total_pages <= 1 {
        return Vec::new();
    }

    let previous = CreateButton::new(format!(
        "{}{}",
        button_ids::QUEUE_PAGE_PREFIX,
        current_page.saturating_sub(1).max(1)
    ))
    .emoji('◀')
    .style(ButtonStyle::Secondary)
    .disabled(current_page <= 1);

    let indicator = CreateButton::new("music_queue_page_indicator")
        .label(format!("{}/{}", current_page, total_pages))
        .style(ButtonStyle::Secondary)
        .disabled(true);

    let next = CreateButton::new(format!(
        "{}{}",
        button_ids::QUEUE_PAGE_PREFIX,
        (current_page + 1).min(total_pages)
    ))
    .emoji('▶')
    .style(ButtonStyle::Secondary)
    .disabled(current_page >= total_pages);

    vec![CreateActionRow::Buttons(vec![previous, indicator, next])]
}

/// Maps a button press onto the command it stands for.
pub fn parse_button(custom_id: &str) -> Option<Command> {
    if let Some(page) = custom_id.strip_prefix(button_ids::QUEUE_PAGE_PREFIX) {
        return page.parse().ok().map(|page| Command::Queue { page });
    }

    match custom_id {
        button_ids::PAUSE => Some(Command::Pause),
        button_ids::RESUME => Some(Command::Resume),
        button_ids::SKIP => Some(Command::Skip),
        button_ids::STOP => Some(Command::Leave),
        _ => None,
    }
}
