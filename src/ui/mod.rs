mod dashboard;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Dashboard
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  dashboard::draw_dashboard(frame, chunks[1], app);
  draw_status_bar(frame, chunks[2], app);
}

/// Draw the header bar with title, server, and shell state
fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let mut spans = vec![
    Span::styled(
      format!(" {} ", app.title()),
      Style::default().fg(Color::Cyan).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", app.server_url()),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];

  match app.shell() {
    Some(status) => {
      let (label, color) = if status.online {
        ("online", Color::Green)
      } else {
        ("offline", Color::Yellow)
      };
      spans.push(Span::styled(
        format!(" {} ", label),
        Style::default().fg(color).bold(),
      ));
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      spans.push(Span::styled(
        format!(" shell {}/{} ({}) ", status.cached, status.total, status.state),
        Style::default().fg(Color::White),
      ));
    }
    None => {
      spans.push(Span::styled(
        " probing... ",
        Style::default().fg(Color::DarkGray),
      ));
    }
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.error() {
    Some(msg) => (
      format!(" error: {}", msg),
      Style::default().fg(Color::Red),
    ),
    None => {
      let hint = " j/k:nav  p:present  a:absent  R:reset  r:refresh  q:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
