use chrono::NaiveDateTime;
use icalendar::{Calendar, Component, Event, EventLike};

use crate::models::Occurrence;

/// Renders resolved occurrences as an iCalendar feed so the weekly schedule
/// and its makeups can be subscribed to from a calendar client.
#[derive(Clone)]
pub struct ScheduleExporter {
    calendar_name: String,
}

impl ScheduleExporter {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
        }
    }

    pub fn generate(&self, occurrences: &[Occurrence]) -> Vec<u8> {
        if occurrences.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);

        for occ in occurrences {
            let start = NaiveDateTime::new(occ.date, occ.start_time);
            let end = NaiveDateTime::new(occ.date, occ.end_time);

            let mut event = Event::new();
            let summary = if occ.is_custom_schedule {
                format!("{} (lịch bù)", occ.class_name)
            } else {
                occ.class_name.clone()
            };
            event.summary(&summary);
            event.starts(start);
            event.ends(end);
            if let Some(room) = &occ.room_id {
                event.location(room);
            }
            event.description(&format!(
                "Lớp: {}\nGiáo viên: {}",
                occ.class_code, occ.teacher_name
            ));
            event.uid(&format!(
                "{}-{}-{}-tuition-center",
                occ.date.format("%Y%m%d"),
                occ.start_time.format("%H%M"),
                occ.class_code.replace(' ', "-")
            ));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayOfWeek;
    use chrono::{NaiveDate, NaiveTime};

    fn occurrence(custom: bool) -> Occurrence {
        Occurrence {
            class_id: "c1".to_string(),
            class_code: "L10A".to_string(),
            class_name: "Toán 10A".to_string(),
            teacher_id: "gv1".to_string(),
            teacher_name: "Nguyễn Văn A".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            day_of_week: DayOfWeek::new(3).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            room_id: Some("Phòng 101".to_string()),
            note: None,
            schedule_id: custom.then(|| "o1".to_string()),
            is_custom_schedule: custom,
        }
    }

    #[test]
    fn test_generate_single_occurrence() {
        let exporter = ScheduleExporter::new("Lịch dạy");
        let bytes = exporter.generate(&[occurrence(false)]);
        let body = String::from_utf8(bytes).unwrap();
        assert!(body.contains("BEGIN:VEVENT"));
        assert!(body.contains("Toán 10A"));
        assert!(body.contains("20240312T140000"));
    }

    #[test]
    fn test_makeup_occurrence_is_marked() {
        let exporter = ScheduleExporter::new("Lịch dạy");
        let body = String::from_utf8(exporter.generate(&[occurrence(true)])).unwrap();
        assert!(body.contains("(lịch bù)"));
    }

    #[test]
    fn test_generate_empty() {
        let exporter = ScheduleExporter::new("Lịch dạy");
        assert!(exporter.generate(&[]).is_empty());
    }
}
