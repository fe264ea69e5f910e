use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{AttendanceSession, ClassRecord, ScoreDetail};

/// Present/total headcount for a resolved calendar cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceCount {
    pub present: u32,
    pub total: u32,
}

/// The session taken for a class on a date, if any. Older sessions were
/// written with only the class code, so both identifiers match.
pub fn find_session<'a>(
    sessions: &'a [AttendanceSession],
    class: &ClassRecord,
    date: NaiveDate,
) -> Option<&'a AttendanceSession> {
    sessions.iter().find(|session| {
        session.date == date
            && (session.class_id == class.id
                || (!class.code.is_empty() && session.class_code == class.code))
    })
}

/// Headcount for a class on a date. Without a session nobody is marked yet
/// and the denominator is the class roster size.
pub fn count_for_class_date(
    sessions: &[AttendanceSession],
    class: &ClassRecord,
    date: NaiveDate,
) -> AttendanceCount {
    match find_session(sessions, class, date) {
        Some(session) => count_for_session(session),
        None => AttendanceCount {
            present: 0,
            total: class.student_ids.len() as u32,
        },
    }
}

pub fn count_for_session(session: &AttendanceSession) -> AttendanceCount {
    AttendanceCount {
        present: session.records.iter().filter(|r| r.present).count() as u32,
        total: session.records.len() as u32,
    }
}

/// Every score on record for one student: graded in-session tests across all
/// sessions first, then the manually entered details kept on each attendance
/// record. Derived test entries carry a note naming the session they came
/// from.
pub fn scores_for_student(sessions: &[AttendanceSession], student_id: &str) -> Vec<ScoreDetail> {
    let mut scores = Vec::new();

    for session in sessions {
        let Some(record) = session.records.iter().find(|r| r.student_id == student_id) else {
            continue;
        };
        if let (Some(name), Some(score)) = (&record.test_name, record.test_score) {
            scores.push(ScoreDetail {
                name: name.clone(),
                score,
                date: session.date,
                note: format!(
                    "Từ buổi học: {} - {}",
                    session.class_name,
                    session.date.format("%d/%m/%Y")
                ),
            });
        }
    }
    for session in sessions {
        if let Some(record) = session.records.iter().find(|r| r.student_id == student_id) {
            scores.extend(record.score_details.iter().cloned());
        }
    }

    scores.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    scores
}

/// Completed sessions in a month, optionally restricted to one teacher.
/// Teacher matching accepts id or display name; legacy sessions carry one or
/// the other.
pub fn completed_sessions_in_month<'a>(
    sessions: &'a [AttendanceSession],
    month: u32,
    year: i32,
    teacher: Option<&str>,
) -> Vec<&'a AttendanceSession> {
    let mut matched: Vec<&AttendanceSession> = sessions
        .iter()
        .filter(|session| session.is_completed())
        .filter(|session| session.date.month() == month && session.date.year() == year)
        .filter(|session| match teacher {
            Some(wanted) => {
                let wanted = wanted.trim();
                session.teacher_id.trim() == wanted || session.teacher_name.trim() == wanted
            }
            None => true,
        })
        .collect();
    matched.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));
    matched
}
