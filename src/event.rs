use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::planner::{Subject, UpcomingAssignment};
use crate::worker::WorkerState;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Planner data finished loading
  DataLoaded {
    subjects: Vec<Subject>,
    upcoming: Vec<UpcomingAssignment>,
  },
  /// Shell probe came back
  ShellChecked(ShellStatus),
  /// A background task failed
  Error(String),
}

/// Connectivity and precache state shown in the dashboard header.
#[derive(Debug, Clone)]
pub struct ShellStatus {
  pub state: WorkerState,
  /// Entries currently in the shell bucket
  pub cached: usize,
  /// Length of the precache list
  pub total: usize,
  /// Whether the probe reached the live server
  pub online: bool,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn terminal event reader
    let input_tx = tx.clone();
    tokio::spawn(async move {
      loop {
        if event::poll(tick_rate).unwrap_or(false) {
          if let Ok(evt) = event::read() {
            match evt {
              CrosstermEvent::Key(key) => {
                if input_tx.send(Event::Key(key)).is_err() {
                  break;
                }
              }
              _ => {}
            }
          }
        } else {
          // Tick
          if input_tx.send(Event::Tick).is_err() {
            break;
          }
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender handle for background tasks to report through
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
