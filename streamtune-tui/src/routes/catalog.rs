use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use streamtune_core::{
    PlayerHandle,
    commands::AudioCommand,
    queue::QueueSource,
    track::Track,
};

use crate::{
    router::{RouteAction, RouteHandler},
    routes::playback::PlaybackRoute,
    state::AppState,
};

/// Every track the catalog returned, in catalog order
#[derive(Debug, Clone)]
pub struct CatalogRoute;

impl RouteHandler for CatalogRoute {
    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        draw_catalog_panel(frame, area, state);
    }

    fn handle_input(
        &mut self,
        key: KeyCode,
        state: &mut AppState,
        handle: &PlayerHandle,
    ) -> anyhow::Result<RouteAction> {
        match key {
            KeyCode::Up => state.catalog_prev(),
            KeyCode::Down => state.catalog_next(),
            KeyCode::Enter => {
                if let Some(id) = state.catalog_selected().map(|t| t.id) {
                    let command = if state.source() == QueueSource::Custom {
                        AudioCommand::PlayFrom {
                            source: QueueSource::Primary,
                            id,
                        }
                    } else {
                        AudioCommand::SelectTrack(id)
                    };
                    handle.send(command)?;
                }
            }
            KeyCode::Char('c') => handle.send(AudioCommand::ActivatePrimaryQueue)?,
            KeyCode::Char('f') => {
                if let Some(id) = state.catalog_selected().map(|t| t.id) {
                    let command = if state.is_liked(id) {
                        AudioCommand::RemoveFromCustomQueue(id)
                    } else {
                        AudioCommand::AddToCustomQueue(id)
                    };
                    handle.send(command)?;
                }
            }
            KeyCode::Char('r') => refresh(state, handle)?,
            KeyCode::Esc => return Ok(RouteAction::Replace(Box::new(PlaybackRoute))),
            _ => {}
        }
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Catalog"
    }

    /// Retry automatically when a previous fetch left nothing to show
    fn on_enter(&mut self, state: &mut AppState, handle: &PlayerHandle) -> anyhow::Result<()> {
        if state.queue.catalog.is_empty() && !state.catalog_loading {
            refresh(state, handle)?;
        }
        Ok(())
    }

    fn help_items(&self, state: &AppState) -> Vec<(&str, &str)> {
        let mut items = vec![("Enter", "Play"), ("F", "Like"), ("R", "Refresh")];
        if state.source() == QueueSource::Custom {
            items.push(("C", "Catalog Queue"));
        }
        items.push(("Esc", "Back"));
        items
    }
}

fn refresh(state: &mut AppState, handle: &PlayerHandle) -> anyhow::Result<()> {
    state.catalog_loading = true;
    state.status_message = "Fetching catalog...".to_string();
    handle.send(AudioCommand::FetchCatalog)
}

/// List rows with a like marker, the playing track highlighted
pub(crate) fn track_items<'a>(tracks: &'a [Track], state: &AppState) -> Vec<ListItem<'a>> {
    let current = state.current_track.as_ref().map(|t| t.id);
    tracks
        .iter()
        .map(|track| {
            let is_current = current == Some(track.id);
            let prefix = if is_current { "▶ " } else { "  " };
            let heart = if state.is_liked(track.id) { "♥ " } else { "  " };
            let style = if is_current {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(prefix, style),
                Span::styled(heart, Style::default().fg(Color::Red)),
                Span::styled(track.title.as_str(), style),
                Span::styled(
                    format!("  {}", track.artist),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect()
}

pub fn draw_catalog_panel(f: &mut Frame, area: Rect, state: &AppState) {
    let title = format!(" Catalog ({} tracks) ", state.queue.catalog.len());
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if state.queue.catalog.is_empty() {
        let message = if state.catalog_loading {
            "Fetching catalog..."
        } else {
            "Catalog is empty. Press R to fetch it again."
        };
        let empty_msg = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty_msg, area);
        return;
    }

    let list = List::new(track_items(&state.queue.catalog, state))
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    let mut list_state = state.catalog_list.clone();
    f.render_stateful_widget(list, area, &mut list_state);
}
