use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    router::{Router, tab_names},
    state::AppState,
};

/// Keys handled in `main` regardless of the route
const GLOBAL_KEYS: [(&str, &str); 6] = [
    ("Space", "Play/Pause"),
    ("N/P", "Next/Prev"),
    ("L", "Loop"),
    ("S", "Shuffle"),
    ("Tab", "Switch Tab"),
    ("Q", "Quit"),
];

/// Draw the TUI interface
pub fn draw(f: &mut Frame, state: &AppState, router: &Router) {
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([
            Constraint::Length(15), // Sidebar navigation
            Constraint::Min(40),    // Main content area
        ])
        .split(f.area());

    draw_sidebar(f, main_chunks[0], router);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Route content
            Constraint::Length(3), // Controls info
            Constraint::Length(3), // Status bar
        ])
        .split(main_chunks[1]);

    router.current().render(f, chunks[0], state);
    draw_controls(f, chunks[1], state, router);
    draw_status(f, chunks[2], state);
}

fn draw_sidebar(f: &mut Frame, area: Rect, router: &Router) {
    let block = Block::default()
        .title(" Navigation ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let current = router.current().name();
    let nav_text: Vec<Line> = tab_names()
        .iter()
        .map(|tab| {
            let is_active = *tab == current;
            let prefix = if is_active { "▶ " } else { "  " };
            let style = if is_active {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(format!("{}{}", prefix, tab), style))
        })
        .collect();

    f.render_widget(Paragraph::new(nav_text), inner);
}

/// Route keys first, then the global ones
fn draw_controls(f: &mut Frame, area: Rect, state: &AppState, router: &Router) {
    let route_items = router.current().help_items(state);
    let mut spans = Vec::new();
    for (key, label) in route_items.iter().chain(GLOBAL_KEYS.iter()) {
        let color = match *key {
            "Tab" => Color::Magenta,
            "Q" => Color::Red,
            _ => Color::Yellow,
        };
        spans.push(Span::styled(format!("[{}]", key), Style::default().fg(color)));
        spans.push(Span::raw(format!(" {}  ", label)));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Controls "));
    f.render_widget(paragraph, area);
}

fn draw_status(f: &mut Frame, area: Rect, state: &AppState) {
    let status_style = if state.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if state.transport.is_playing {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };

    let mode = state.queue.mode;
    let message = state
        .error_message
        .as_deref()
        .unwrap_or(&state.status_message);
    let volume = if state.transport.is_muted {
        "Vol: muted".to_string()
    } else {
        format!("Vol: {:3.0}%", state.transport.volume * 100.0)
    };
    let status_text = format!(
        "{}  |  {}  |  {}  |  🔁 {}  |  🔀 {}",
        message,
        volume,
        mode.source,
        if mode.looping { "On" } else { "Off" },
        if mode.shuffle { "On" } else { "Off" },
    );

    let paragraph = Paragraph::new(status_text)
        .style(status_style)
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    f.render_widget(paragraph, area);
}
