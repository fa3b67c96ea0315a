use crate::app::App;
use crate::planner::{Subject, UpcomingAssignment};
use chrono::NaiveDate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_dashboard(frame: &mut Frame, area: Rect, app: &App) {
  let columns = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
    .split(area);

  draw_subjects(
    frame,
    columns[0],
    app.subjects(),
    app.selected(),
    app.loading(),
  );
  draw_upcoming(frame, columns[1], app.upcoming(), app.today(), app.loading());
}

fn draw_subjects(
  frame: &mut Frame,
  area: Rect,
  subjects: &[Subject],
  selected: usize,
  loading: bool,
) {
  let title = if loading {
    " Subjects (loading...) ".to_string()
  } else {
    format!(" Subjects ({}) ", subjects.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if subjects.is_empty() && !loading {
    let paragraph = Paragraph::new("No subjects yet. Add one with: uniplanner subject add")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = subjects
    .iter()
    .map(|subject| {
      let pct = subject.attendance_percentage();
      let pct_color = if pct >= 75.0 {
        Color::Green
      } else if pct >= 50.0 {
        Color::Yellow
      } else {
        Color::Red
      };

      let professor = subject.professor.as_deref().unwrap_or("-");

      let line = Line::from(vec![
        Span::styled(
          format!("{:<8}", truncate(&subject.code, 8)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::raw(format!("{:<24}", truncate(&subject.name, 24))),
        Span::raw(" "),
        Span::styled(
          format!("{:<14}", truncate(professor, 14)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
          format!(
            "{:>5.1}% ({}/{})",
            pct, subject.attended, subject.total_classes
          ),
          Style::default().fg(pct_color),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

fn draw_upcoming(
  frame: &mut Frame,
  area: Rect,
  upcoming: &[UpcomingAssignment],
  today: NaiveDate,
  loading: bool,
) {
  let title = if loading {
    " Upcoming (loading...) ".to_string()
  } else {
    format!(" Upcoming ({}) ", upcoming.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if upcoming.is_empty() && !loading {
    let paragraph = Paragraph::new("Nothing due.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = upcoming
    .iter()
    .map(|entry| {
      let label = due_label(entry.assignment.due_date, today);
      let label_color = match (entry.assignment.due_date - today).num_days() {
        d if d <= 0 => Color::Red,
        1 => Color::Yellow,
        _ => Color::White,
      };

      let line = Line::from(vec![
        Span::styled(format!("{:<10}", label), Style::default().fg(label_color)),
        Span::raw(" "),
        Span::styled(
          format!("{:<8}", truncate(&entry.subject_code, 8)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::raw(truncate(&entry.assignment.title, 40)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items).block(block);

  frame.render_widget(list, area);
}

/// Human label for a due date relative to today
fn due_label(due: NaiveDate, today: NaiveDate) -> String {
  match (due - today).num_days() {
    d if d < 0 => "overdue".to_string(),
    0 => "today".to_string(),
    1 => "tomorrow".to_string(),
    d if d < 7 => format!("in {} days", d),
    _ => due.format("%b %d").to_string(),
  }
}

fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_respects_char_boundaries() {
    assert_eq!(truncate("Математический анализ", 24), "Математический анализ");
    assert_eq!(truncate("Математический анализ", 10), "Математ...");
    assert_eq!(truncate("Linear Algebra II", 10), "Linear ...");
    assert_eq!(truncate("short", 8), "short");
  }

  #[test]
  fn test_due_label_phrasing() {
    let today = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();

    assert_eq!(due_label(today, today), "today");
    assert_eq!(due_label(today.succ_opt().unwrap(), today), "tomorrow");
    assert_eq!(
      due_label(NaiveDate::from_ymd_opt(2025, 9, 4).unwrap(), today),
      "in 3 days"
    );
    assert_eq!(
      due_label(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(), today),
      "Sep 30"
    );
    assert_eq!(
      due_label(NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(), today),
      "overdue"
    );
  }
}
