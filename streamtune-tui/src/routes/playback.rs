use ratatui::{
    Frame,
    crossterm::event::KeyCode,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use streamtune_core::{PlayerHandle, commands::AudioCommand, transport::TransportSnapshot};

use crate::{
    router::{RouteAction, RouteHandler},
    state::AppState,
};

const SEEK_STEP: f32 = 5.0;
const VOLUME_STEP: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct PlaybackRoute;

impl RouteHandler for PlaybackRoute {
    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        draw_playback_panel(frame, area, state);
    }

    fn handle_input(
        &mut self,
        key: KeyCode,
        state: &mut AppState,
        handle: &PlayerHandle,
    ) -> anyhow::Result<RouteAction> {
        match key {
            KeyCode::Up => {
                let volume = (state.transport.volume + VOLUME_STEP).min(1.0);
                handle.send(AudioCommand::SetVolume(volume))?;
            }
            KeyCode::Down => {
                let volume = (state.transport.volume - VOLUME_STEP).max(0.0);
                handle.send(AudioCommand::SetVolume(volume))?;
            }
            KeyCode::Right => {
                let new_pos = state.transport.position_seconds + SEEK_STEP;
                handle.send(AudioCommand::Seek(new_pos))?;
            }
            KeyCode::Left => {
                let new_pos = (state.transport.position_seconds - SEEK_STEP).max(0.0);
                handle.send(AudioCommand::Seek(new_pos))?;
            }
            KeyCode::Char('m') => {
                handle.send(AudioCommand::ToggleMute)?;
            }
            _ => {}
        }
        Ok(RouteAction::None)
    }

    fn name(&self) -> &str {
        "Playback"
    }

    fn help_items(&self, _state: &AppState) -> Vec<(&str, &str)> {
        vec![("←/→", "Seek"), ("↑/↓", "Volume"), ("M", "Mute")]
    }
}

/// Draw the playback panel
pub fn draw_playback_panel(f: &mut Frame, area: Rect, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Now playing info
            Constraint::Length(3), // Progress bar
            Constraint::Length(5), // Mode
            Constraint::Min(0),
        ])
        .split(area);

    draw_now_playing(f, chunks[0], state);
    draw_progress(f, chunks[1], &state.transport);
    draw_mode(f, chunks[2], state);
}

fn draw_now_playing(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title(" 🎵 Now Playing ")
        .borders(Borders::ALL)
        .border_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(track) = &state.current_track else {
        let text = Paragraph::new("Nothing selected").style(Style::default().fg(Color::DarkGray));
        f.render_widget(text, inner);
        return;
    };

    let marker = if state.is_liked(track.id) { "♥ " } else { "" };
    let activity = if state.transport.is_loading {
        Span::styled("Buffering...", Style::default().fg(Color::Yellow))
    } else if state.transport.is_playing {
        Span::styled("▶ Playing", Style::default().fg(Color::Green))
    } else {
        Span::styled("⏸ Paused", Style::default().fg(Color::DarkGray))
    };

    let text = vec![
        Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Red)),
            Span::styled(track.title.as_str(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![Span::styled(
            track.artist.as_str(),
            Style::default().fg(Color::Gray),
        )]),
        Line::from(activity),
    ];

    f.render_widget(Paragraph::new(text), inner);
}

/// Draw the progress bar
fn draw_progress(f: &mut Frame, area: Rect, transport: &TransportSnapshot) {
    let progress_pct = (transport.progress() * 100.0) as u16;
    let label = format!(
        "{} / {}",
        TransportSnapshot::format_time(transport.position_seconds),
        TransportSnapshot::format_time(transport.duration_seconds)
    );

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
        .percent(progress_pct.min(100))
        .label(label);

    f.render_widget(gauge, area);
}

fn draw_mode(f: &mut Frame, area: Rect, state: &AppState) {
    let mode = state.queue.mode;
    let on_off = |flag: bool| if flag { "On" } else { "Off" };
    let position = match state.queue.index {
        Some(i) => format!("{} of {}", i + 1, state.queue.active.len()),
        None => "-".to_string(),
    };
    let volume = if state.transport.is_muted {
        "muted".to_string()
    } else {
        format!("{:.0}%", state.transport.volume * 100.0)
    };

    let label = Style::default().fg(Color::DarkGray);
    let text = vec![
        Line::from(vec![
            Span::styled("Queue: ", label),
            Span::raw(format!("{} ({})", mode.source, position)),
        ]),
        Line::from(vec![
            Span::styled("Loop: ", label),
            Span::raw(on_off(mode.looping)),
            Span::styled("   Shuffle: ", label),
            Span::raw(on_off(mode.shuffle)),
        ]),
        Line::from(vec![Span::styled("Volume: ", label), Span::raw(volume)]),
    ];

    let paragraph =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Mode "));
    f.render_widget(paragraph, area);
}
