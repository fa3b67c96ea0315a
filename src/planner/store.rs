//! SQLite-backed store for planner data.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::{Assignment, AttendanceAction, Subject, UpcomingAssignment};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Store for subjects and assignments.
pub struct PlannerStore {
  conn: Mutex<Connection>,
}

impl PlannerStore {
  /// Open the planner database, creating it (and its directory) if needed.
  ///
  /// `data_dir` overrides the platform data directory when set.
  pub fn open(data_dir: Option<&Path>) -> Result<Self> {
    let path = Self::database_path(data_dir)?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open planner database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn database_path(data_dir: Option<&Path>) -> Result<PathBuf> {
    let base = match data_dir {
      Some(dir) => dir.to_path_buf(),
      None => dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
        .ok_or_else(|| eyre!("Could not determine data directory"))?
        .join("uniplanner"),
    };

    Ok(base.join("planner.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(PLANNER_SCHEMA)
      .map_err(|e| eyre!("Failed to run planner migrations: {}", e))?;

    Ok(())
  }

  // ==========================================================================
  // Subjects
  // ==========================================================================

  pub fn add_subject(&self, name: &str, code: &str, professor: Option<&str>) -> Result<Subject> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT INTO subjects (name, code, professor) VALUES (?, ?, ?)",
        params![name, code, professor],
      )
      .map_err(|e| eyre!("Failed to add subject: {}", e))?;

    let id = conn.last_insert_rowid();

    Ok(Subject {
      id,
      name: name.to_string(),
      code: code.to_string(),
      professor: professor.map(String::from),
      attended: 0,
      total_classes: 0,
    })
  }

  /// All subjects, in creation order.
  pub fn subjects(&self) -> Result<Vec<Subject>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT id, name, code, professor, attended, total_classes
         FROM subjects ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let subjects: Vec<Subject> = stmt
      .query_map([], subject_from_row)
      .map_err(|e| eyre!("Failed to query subjects: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(subjects)
  }

  pub fn subject(&self, id: i64) -> Result<Option<Subject>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT id, name, code, professor, attended, total_classes
         FROM subjects WHERE id = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    Ok(stmt.query_row(params![id], subject_from_row).ok())
  }

  /// Delete a subject and everything due for it.
  pub fn delete_subject(&self, id: i64) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM assignments WHERE subject_id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete subject assignments: {}", e))?;

    let removed = conn
      .execute("DELETE FROM subjects WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete subject: {}", e))?;

    Ok(removed > 0)
  }

  /// Apply an attendance action and return the updated subject.
  pub fn update_attendance(&self, subject_id: i64, action: AttendanceAction) -> Result<Subject> {
    {
      let conn = self
        .conn
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;

      let sql = match action {
        AttendanceAction::Present => {
          "UPDATE subjects SET attended = attended + 1, total_classes = total_classes + 1
           WHERE id = ?"
        }
        AttendanceAction::Absent => {
          "UPDATE subjects SET total_classes = total_classes + 1 WHERE id = ?"
        }
        AttendanceAction::Reset => {
          "UPDATE subjects SET attended = 0, total_classes = 0 WHERE id = ?"
        }
      };

      let updated = conn
        .execute(sql, params![subject_id])
        .map_err(|e| eyre!("Failed to update attendance: {}", e))?;

      if updated == 0 {
        return Err(eyre!("No subject with id {}", subject_id));
      }
    }

    self
      .subject(subject_id)?
      .ok_or_else(|| eyre!("No subject with id {}", subject_id))
  }

  // ==========================================================================
  // Assignments
  // ==========================================================================

  pub fn add_assignment(
    &self,
    title: &str,
    due_date: NaiveDate,
    subject_id: i64,
  ) -> Result<Assignment> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Reject dangling subject ids up front; SQLite will not
    let exists: Option<i64> = conn
      .prepare("SELECT 1 FROM subjects WHERE id = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?
      .query_row(params![subject_id], |row| row.get(0))
      .ok();
    if exists.is_none() {
      return Err(eyre!("No subject with id {}", subject_id));
    }

    conn
      .execute(
        "INSERT INTO assignments (title, due_date, subject_id) VALUES (?, ?, ?)",
        params![title, due_date.format(DATE_FORMAT).to_string(), subject_id],
      )
      .map_err(|e| eyre!("Failed to add assignment: {}", e))?;

    Ok(Assignment {
      id: conn.last_insert_rowid(),
      title: title.to_string(),
      due_date,
      subject_id,
    })
  }

  pub fn delete_assignment(&self, id: i64) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute("DELETE FROM assignments WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to delete assignment: {}", e))?;

    Ok(removed > 0)
  }

  /// Every assignment, joined with its subject, ordered by due date.
  pub fn assignments(&self) -> Result<Vec<UpcomingAssignment>> {
    self.assignments_where("", &[])
  }

  /// Assignments due on `today` or later, ordered by due date. This is the
  /// dashboard query.
  pub fn upcoming_assignments(&self, today: NaiveDate) -> Result<Vec<UpcomingAssignment>> {
    let today = today.format(DATE_FORMAT).to_string();
    self.assignments_where("WHERE a.due_date >= ?", &[&today])
  }

  fn assignments_where(
    &self,
    clause: &str,
    params: &[&dyn rusqlite::ToSql],
  ) -> Result<Vec<UpcomingAssignment>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let sql = format!(
      "SELECT a.id, a.title, a.due_date, a.subject_id, s.name, s.code
       FROM assignments a
       INNER JOIN subjects s ON s.id = a.subject_id
       {}
       ORDER BY a.due_date, a.id",
      clause
    );

    let mut stmt = conn
      .prepare(&sql)
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(i64, String, String, i64, String, String)> = stmt
      .query_map(params, |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query assignments: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut assignments = Vec::with_capacity(rows.len());
    for (id, title, due_date, subject_id, subject_name, subject_code) in rows {
      assignments.push(UpcomingAssignment {
        assignment: Assignment {
          id,
          title,
          due_date: parse_date(&due_date)?,
          subject_id,
        },
        subject_name,
        subject_code,
      });
    }

    Ok(assignments)
  }
}

/// Schema for planner tables.
const PLANNER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    code TEXT NOT NULL,
    professor TEXT,
    attended INTEGER NOT NULL DEFAULT 0,
    total_classes INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    due_date TEXT NOT NULL,
    subject_id INTEGER NOT NULL,
    FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_assignments_due ON assignments(due_date);
"#;

fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
  Ok(Subject {
    id: row.get(0)?,
    name: row.get(1)?,
    code: row.get(2)?,
    professor: row.get(3)?,
    attended: row.get(4)?,
    total_classes: row.get(5)?,
  })
}

/// Parse a date string from SQLite format.
fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| eyre!("Failed to parse date '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> PlannerStore {
    let conn = Connection::open_in_memory().unwrap();
    PlannerStore::from_connection(conn).unwrap()
  }

  fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
  }

  #[test]
  fn test_subject_round_trip() {
    let store = store();
    let created = store
      .add_subject("Operating Systems", "CS301", Some("Dr. Rao"))
      .unwrap();
    assert_eq!(created.attended, 0);
    assert_eq!(created.total_classes, 0);

    let subjects = store.subjects().unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0].name, "Operating Systems");
    assert_eq!(subjects[0].professor.as_deref(), Some("Dr. Rao"));

    let found = store.subject(created.id).unwrap().unwrap();
    assert_eq!(found.code, "CS301");
    assert!(store.subject(9999).unwrap().is_none());
  }

  #[test]
  fn test_attendance_actions() {
    let store = store();
    let subject = store.add_subject("Maths", "MA101", None).unwrap();

    let s = store
      .update_attendance(subject.id, AttendanceAction::Present)
      .unwrap();
    assert_eq!((s.attended, s.total_classes), (1, 1));

    let s = store
      .update_attendance(subject.id, AttendanceAction::Absent)
      .unwrap();
    assert_eq!((s.attended, s.total_classes), (1, 2));
    assert_eq!(s.attendance_percentage(), 50.0);

    let s = store
      .update_attendance(subject.id, AttendanceAction::Reset)
      .unwrap();
    assert_eq!((s.attended, s.total_classes), (0, 0));
    assert_eq!(s.attendance_percentage(), 100.0);
  }

  #[test]
  fn test_attendance_on_missing_subject_fails() {
    let store = store();
    assert!(store
      .update_attendance(42, AttendanceAction::Present)
      .is_err());
  }

  #[test]
  fn test_assignment_round_trip_and_join() {
    let store = store();
    let subject = store.add_subject("Databases", "CS305", None).unwrap();

    let a = store
      .add_assignment("ER diagram", date("2026-09-10"), subject.id)
      .unwrap();
    assert_eq!(a.due_date, date("2026-09-10"));
    assert_eq!(a.subject_id, subject.id);

    let all = store.assignments().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].subject_code, "CS305");
    assert_eq!(all[0].subject_name, "Databases");
    assert_eq!(all[0].assignment.title, "ER diagram");

    assert!(store.delete_assignment(a.id).unwrap());
    assert!(!store.delete_assignment(a.id).unwrap());
    assert!(store.assignments().unwrap().is_empty());
  }

  #[test]
  fn test_assignment_requires_existing_subject() {
    let store = store();
    assert!(store
      .add_assignment("orphan", date("2026-09-10"), 7)
      .is_err());
  }

  #[test]
  fn test_upcoming_filters_and_orders() {
    let store = store();
    let subject = store.add_subject("Networks", "CS402", None).unwrap();

    store
      .add_assignment("late lab", date("2026-08-01"), subject.id)
      .unwrap();
    store
      .add_assignment("quiz", date("2026-08-30"), subject.id)
      .unwrap();
    store
      .add_assignment("due today", date("2026-08-22"), subject.id)
      .unwrap();

    let upcoming = store.upcoming_assignments(date("2026-08-22")).unwrap();
    let titles: Vec<&str> = upcoming
      .iter()
      .map(|u| u.assignment.title.as_str())
      .collect();
    // Due today is included, the past one is not, and order is by due date
    assert_eq!(titles, vec!["due today", "quiz"]);
  }

  #[test]
  fn test_deleting_subject_removes_its_assignments() {
    let store = store();
    let keep = store.add_subject("Keep", "K1", None).unwrap();
    let drop = store.add_subject("Drop", "D1", None).unwrap();

    store
      .add_assignment("kept work", date("2026-09-01"), keep.id)
      .unwrap();
    store
      .add_assignment("dropped work", date("2026-09-02"), drop.id)
      .unwrap();

    assert!(store.delete_subject(drop.id).unwrap());
    assert!(!store.delete_subject(drop.id).unwrap());

    let all = store.assignments().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].assignment.title, "kept work");
  }
}
