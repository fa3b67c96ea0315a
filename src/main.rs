mod app;
mod cache;
mod config;
mod event;
mod net;
mod planner;
mod ui;
mod worker;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cache::SqliteStore;
use crate::config::Config;
use crate::net::{HttpFetcher, Request};
use crate::planner::{AttendanceAction, PlannerStore};
use crate::worker::{FetchSource, ShellWorker};

#[derive(Parser, Debug)]
#[command(name = "uniplanner")]
#[command(about = "An offline-first terminal companion for UniPlanner")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/uniplanner/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// UniPlanner server origin, overriding the config file
  #[arg(short, long)]
  server: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch and cache the app shell for offline use
  Install,

  /// Fetch a URL through the worker, network-first with cache fallback
  Get {
    /// Path or absolute URL to fetch
    url: String,

    /// Write the response body to a file
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Manage subjects
  #[command(subcommand)]
  Subject(SubjectCommand),

  /// Manage assignments
  #[command(subcommand)]
  Assignment(AssignmentCommand),

  /// Record attendance for a subject
  Attend {
    /// Subject id
    id: i64,

    /// One of: present, absent, reset
    action: AttendanceAction,
  },
}

#[derive(Subcommand, Debug)]
enum SubjectCommand {
  /// Add a subject
  Add {
    /// Subject name
    name: String,

    /// Short code, e.g. CS301
    #[arg(short, long)]
    code: String,

    /// Professor teaching the subject
    #[arg(short, long)]
    professor: Option<String>,
  },

  /// List subjects with attendance
  Ls,

  /// Remove a subject and its assignments
  Rm {
    /// Subject id
    id: i64,
  },
}

#[derive(Subcommand, Debug)]
enum AssignmentCommand {
  /// Add an assignment
  Add {
    /// Assignment title
    title: String,

    /// Due date in %Y-%m-%d form
    #[arg(short, long)]
    due: NaiveDate,

    /// Subject id it belongs to
    #[arg(short, long)]
    subject: i64,
  },

  /// List assignments due today or later
  Ls {
    /// Include assignments already past due
    #[arg(long)]
    all: bool,
  },

  /// Remove an assignment
  Rm {
    /// Assignment id
    id: i64,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override server origin if specified on command line
  let config = if let Some(server) = args.server {
    Config {
      server: config::ServerConfig { url: server },
      ..config
    }
  } else {
    config
  };

  let interactive = args.command.is_none();
  let _guard = init_tracing(config.data_dir.as_deref(), interactive)?;

  match args.command {
    None => {
      let mut app = app::App::new(config)?;
      app.run().await?;
    }
    Some(command) => run_command(command, &config).await?,
  }

  Ok(())
}

/// Set up tracing. The dashboard owns the terminal, so interactive runs
/// log to a file instead of stderr.
fn init_tracing(
  data_dir: Option<&Path>,
  interactive: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("uniplanner=info"));

  if interactive {
    let dir = log_dir(data_dir)?;
    std::fs::create_dir_all(&dir)
      .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
      dir,
      "uniplanner.log",
    ));
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();
    Ok(Some(guard))
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    Ok(None)
  }
}

fn log_dir(data_dir: Option<&Path>) -> Result<PathBuf> {
  match data_dir {
    Some(dir) => Ok(dir.to_path_buf()),
    None => dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|p| p.join("uniplanner"))
      .ok_or_else(|| eyre!("Could not determine data directory")),
  }
}

fn build_worker(config: &Config) -> Result<ShellWorker> {
  let store = Arc::new(SqliteStore::open(config.data_dir.as_deref())?);
  let fetcher = Arc::new(HttpFetcher::new()?);
  ShellWorker::resume(config.origin()?, fetcher, store)
}

async fn run_command(command: Command, config: &Config) -> Result<()> {
  match command {
    Command::Install => {
      let mut worker = build_worker(config)?;
      worker.install().await?;
      worker.activate()?;
      println!(
        "Cached {} shell resources from {}",
        worker.cached_count()?,
        worker.origin()
      );
    }

    Command::Get { url, output } => {
      let worker = build_worker(config)?;
      let outcome = worker.handle(Request::get(url.as_str())).await?;

      let source = match outcome.source {
        FetchSource::Network => "network",
        FetchSource::Cache => "cache",
      };
      eprintln!(
        "{} {} ({} bytes, {}, {})",
        outcome.response.status,
        url,
        outcome.response.body.len(),
        outcome.response.header("content-type").unwrap_or("-"),
        source
      );

      // Body goes to stdout unless redirected to a file
      match output {
        Some(path) => {
          std::fs::write(&path, &outcome.response.body)
            .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
        }
        None => print!("{}", outcome.response.body_text()),
      }
    }

    Command::Subject(cmd) => {
      let planner = PlannerStore::open(config.data_dir.as_deref())?;
      match cmd {
        SubjectCommand::Add {
          name,
          code,
          professor,
        } => {
          let subject = planner.add_subject(&name, &code, professor.as_deref())?;
          println!("Added subject {} ({})", subject.id, subject.code);
        }
        SubjectCommand::Ls => {
          for subject in planner.subjects()? {
            let professor = subject.professor.as_deref().unwrap_or("-");
            println!(
              "{:>4}  {:<8} {:<28} {:<16} {:>5.1}% ({}/{})",
              subject.id,
              subject.code,
              subject.name,
              professor,
              subject.attendance_percentage(),
              subject.attended,
              subject.total_classes
            );
          }
        }
        SubjectCommand::Rm { id } => {
          if planner.delete_subject(id)? {
            println!("Removed subject {}", id);
          } else {
            println!("No subject with id {}", id);
          }
        }
      }
    }

    Command::Assignment(cmd) => {
      let planner = PlannerStore::open(config.data_dir.as_deref())?;
      match cmd {
        AssignmentCommand::Add {
          title,
          due,
          subject,
        } => {
          let assignment = planner.add_assignment(&title, due, subject)?;
          println!(
            "Added assignment {} due {} for subject {}",
            assignment.id, assignment.due_date, assignment.subject_id
          );
        }
        AssignmentCommand::Ls { all } => {
          let rows = if all {
            planner.assignments()?
          } else {
            planner.upcoming_assignments(Local::now().date_naive())?
          };
          for entry in rows {
            println!(
              "{:>4}  {}  {:<8} {:<28} {}",
              entry.assignment.id,
              entry.assignment.due_date,
              entry.subject_code,
              entry.subject_name,
              entry.assignment.title
            );
          }
        }
        AssignmentCommand::Rm { id } => {
          if planner.delete_assignment(id)? {
            println!("Removed assignment {}", id);
          } else {
            println!("No assignment with id {}", id);
          }
        }
      }
    }

    Command::Attend { id, action } => {
      let planner = PlannerStore::open(config.data_dir.as_deref())?;
      let subject = planner.update_attendance(id, action)?;
      println!(
        "{}: {}/{} attended ({:.1}%)",
        subject.code,
        subject.attended,
        subject.total_classes,
        subject.attendance_percentage()
      );
    }
  }

  Ok(())
}
