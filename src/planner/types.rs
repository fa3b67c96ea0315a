//! Planner entity types.

use chrono::NaiveDate;

/// A course the student is enrolled in.
#[derive(Debug, Clone)]
pub struct Subject {
  pub id: i64,
  pub name: String,
  pub code: String,
  pub professor: Option<String>,
  /// Classes attended so far
  pub attended: i64,
  /// Classes held so far
  pub total_classes: i64,
}

impl Subject {
  /// Attendance as a percentage, rounded to one decimal place.
  ///
  /// No recorded classes counts as full attendance.
  pub fn attendance_percentage(&self) -> f64 {
    if self.total_classes == 0 {
      return 100.0;
    }
    let pct = (self.attended as f64 / self.total_classes as f64) * 100.0;
    (pct * 10.0).round() / 10.0
  }
}

/// A piece of work due for a subject.
#[derive(Debug, Clone)]
pub struct Assignment {
  pub id: i64,
  pub title: String,
  pub due_date: NaiveDate,
  pub subject_id: i64,
}

/// An assignment joined with its subject, as the dashboard lists them.
#[derive(Debug, Clone)]
pub struct UpcomingAssignment {
  pub assignment: Assignment,
  pub subject_name: String,
  pub subject_code: String,
}

/// How to adjust a subject's attendance counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceAction {
  /// One more class held, and it was attended
  Present,
  /// One more class held, missed
  Absent,
  /// Zero both counters
  Reset,
}

impl std::str::FromStr for AttendanceAction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "present" => Ok(Self::Present),
      "absent" => Ok(Self::Absent),
      "reset" => Ok(Self::Reset),
      _ => Err(format!(
        "unknown attendance action '{}' (expected present, absent, or reset)",
        s
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn subject(attended: i64, total: i64) -> Subject {
    Subject {
      id: 1,
      name: "Operating Systems".to_string(),
      code: "CS301".to_string(),
      professor: None,
      attended,
      total_classes: total,
    }
  }

  #[test]
  fn test_attendance_with_no_classes_is_full() {
    assert_eq!(subject(0, 0).attendance_percentage(), 100.0);
  }

  #[test]
  fn test_attendance_rounds_to_one_decimal() {
    assert_eq!(subject(2, 3).attendance_percentage(), 66.7);
    assert_eq!(subject(1, 3).attendance_percentage(), 33.3);
    assert_eq!(subject(3, 4).attendance_percentage(), 75.0);
    assert_eq!(subject(0, 5).attendance_percentage(), 0.0);
    assert_eq!(subject(5, 5).attendance_percentage(), 100.0);
  }

  #[test]
  fn test_attendance_action_parsing() {
    assert_eq!("present".parse::<AttendanceAction>(), Ok(AttendanceAction::Present));
    assert_eq!("absent".parse::<AttendanceAction>(), Ok(AttendanceAction::Absent));
    assert_eq!("reset".parse::<AttendanceAction>(), Ok(AttendanceAction::Reset));
    assert!("late".parse::<AttendanceAction>().is_err());
  }
}
