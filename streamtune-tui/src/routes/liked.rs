use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, Paragraph},
};
use streamtune_core::{PlayerHandle, commands::AudioCommand, queue::QueueSource};

use crate::{
    router::{RouteAction, RouteHandler},
    routes::{catalog::track_items, playback::PlaybackRoute},
    state::AppState,
};

/// The custom queue of liked tracks
#[derive(Debug, Clone)]
pub struct LikedRoute;

impl RouteHandler for LikedRoute {
    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        draw_liked_panel(frame, area, state);
    }

    fn handle_input(
        &mut self,
        key: KeyCode,
        state: &mut AppState,
        handle: &PlayerHandle,
    ) -> anyhow::Result<RouteAction> {
        match key {
            KeyCode::Up => state.liked_prev(),
            KeyCode::Down => state.liked_next(),
            KeyCode::Enter => {
                if let Some(id) = state.liked_selected().map(|t| t.id) {
                    let command = if state.source() == QueueSource::Custom {
                        AudioCommand::SelectTrack(id)
                    } else {
                        AudioCommand::PlayFrom {
                            source: QueueSource::Custom,
                            id,
                        }
                    };
                    handle.send(command)?;
                }
            }
            KeyCode::Char('a') => handle.send(AudioCommand::ActivateCustomQueue)?,
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = state.liked_selected().map(|t| t.id) {
                    handle.send(AudioCommand::RemoveFromCustomQueue(id))?;
                }
            }
            KeyCode::Esc => return Ok(RouteAction::Replace(Box::new(PlaybackRoute))),
            _ => {}
        }
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Liked"
    }

    /// Start the cursor on the playing track when it is liked
    fn on_enter(&mut self, state: &mut AppState, _handle: &PlayerHandle) -> anyhow::Result<()> {
        let current = state.current_track.as_ref().map(|t| t.id);
        if let Some(pos) = current.and_then(|id| state.queue.custom.iter().position(|t| t.id == id)) {
            state.liked_list.select(Some(pos));
        }
        Ok(())
    }

    fn help_items(&self, _state: &AppState) -> Vec<(&str, &str)> {
        vec![("Enter", "Play"), ("A", "Play All"), ("D", "Unlike"), ("Esc", "Back")]
    }
}

pub fn draw_liked_panel(f: &mut Frame, area: Rect, state: &AppState) {
    let playing_here = state.source() == QueueSource::Custom;
    let title = format!(
        " ♥ Liked ({} tracks){} ",
        state.queue.custom.len(),
        if playing_here { " - playing" } else { "" }
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if state.queue.custom.is_empty() {
        let empty_msg = Paragraph::new("No liked tracks. Press F on a catalog track to like it.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty_msg, area);
        return;
    }

    let list = List::new(track_items(&state.queue.custom, state))
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut list_state = state.liked_list.clone();
    f.render_stateful_widget(list, area, &mut list_state);
}
