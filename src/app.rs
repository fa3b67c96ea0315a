use crate::cache::SqliteStore;
use crate::config::Config;
use crate::event::{Event, EventHandler, ShellStatus};
use crate::net::{HttpFetcher, Request};
use crate::planner::{AttendanceAction, PlannerStore, Subject, UpcomingAssignment};
use crate::ui;
use crate::worker::{FetchSource, ShellWorker, PRECACHE_URLS};
use chrono::{Local, NaiveDate};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Main application state
pub struct App {
  /// Subjects shown in the left pane
  subjects: Vec<Subject>,

  /// Assignments due today or later, soonest first
  upcoming: Vec<UpcomingAssignment>,

  /// Latest shell probe result
  shell: Option<ShellStatus>,

  /// Selected subject row
  selected: usize,

  /// Whether a data load is in flight
  loading: bool,

  /// Last background error, shown in the status bar
  error: Option<String>,

  /// Date the upcoming filter is anchored to
  today: NaiveDate,

  /// Application configuration
  config: Config,

  /// Planner database
  planner: Arc<PlannerStore>,

  /// Worker serving app resources network-first
  worker: Arc<ShellWorker>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let planner = Arc::new(PlannerStore::open(config.data_dir.as_deref())?);
    let store = Arc::new(SqliteStore::open(config.data_dir.as_deref())?);
    let fetcher = Arc::new(HttpFetcher::new()?);
    let worker = Arc::new(ShellWorker::resume(config.origin()?, fetcher, store)?);
    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      subjects: Vec::new(),
      upcoming: Vec::new(),
      shell: None,
      selected: 0,
      loading: true,
      error: None,
      today: Local::now().date_naive(),
      config,
      planner,
      worker,
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial data load
    self.refresh();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event)?;
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn refresh(&mut self) {
    self.today = Local::now().date_naive();
    self.load_data();
    self.probe_shell();
  }

  fn load_data(&mut self) {
    self.loading = true;
    let planner = self.planner.clone();
    let today = self.today;
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let loaded = planner.subjects().and_then(|subjects| {
        let upcoming = planner.upcoming_assignments(today)?;
        Ok((subjects, upcoming))
      });

      match loaded {
        Ok((subjects, upcoming)) => {
          let _ = tx.send(Event::DataLoaded { subjects, upcoming });
        }
        Err(e) => {
          let _ = tx.send(Event::Error(e.to_string()));
        }
      }
    });
  }

  fn probe_shell(&self) {
    let worker = self.worker.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let online = matches!(
        worker.handle(Request::get("/")).await,
        Ok(outcome) if outcome.source == FetchSource::Network
      );

      let status = ShellStatus {
        state: worker.state(),
        cached: worker.cached_count().unwrap_or(0),
        total: PRECACHE_URLS.len(),
        online,
      };
      let _ = tx.send(Event::ShellChecked(status));
    });
  }

  fn handle_event(&mut self, event: Event) -> Result<()> {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::DataLoaded { subjects, upcoming } => {
        self.loading = false;
        if self.selected >= subjects.len() {
          self.selected = subjects.len().saturating_sub(1);
        }
        self.subjects = subjects;
        self.upcoming = upcoming;
      }
      Event::ShellChecked(status) => {
        self.shell = Some(status);
      }
      Event::Error(msg) => {
        self.loading = false;
        self.error = Some(msg);
      }
    }
    Ok(())
  }

  fn handle_key(&mut self, key: crossterm::event::KeyEvent) {
    // Any keypress dismisses a stale error
    self.error = None;

    match key.code {
      // Quit
      KeyCode::Char('q') => {
        self.should_quit = true;
      }
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),

      // Attendance on the selected subject
      KeyCode::Char('p') => self.mark_attendance(AttendanceAction::Present),
      KeyCode::Char('a') => self.mark_attendance(AttendanceAction::Absent),
      KeyCode::Char('R') => self.mark_attendance(AttendanceAction::Reset),

      // Reload planner data and re-probe the shell
      KeyCode::Char('r') => self.refresh(),

      _ => {}
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.subjects.len();
    if len > 0 {
      self.selected = (self.selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn mark_attendance(&mut self, action: AttendanceAction) {
    if let Some(subject) = self.subjects.get(self.selected) {
      match self.planner.update_attendance(subject.id, action) {
        Ok(updated) => self.subjects[self.selected] = updated,
        Err(e) => self.error = Some(e.to_string()),
      }
    }
  }

  // Accessors for UI rendering
  pub fn subjects(&self) -> &[Subject] {
    &self.subjects
  }

  pub fn upcoming(&self) -> &[UpcomingAssignment] {
    &self.upcoming
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn loading(&self) -> bool {
    self.loading
  }

  pub fn shell(&self) -> Option<&ShellStatus> {
    self.shell.as_ref()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn today(&self) -> NaiveDate {
    self.today
  }

  pub fn title(&self) -> String {
    self.config.display_title()
  }

  pub fn server_url(&self) -> &str {
    &self.config.server.url
  }
}
