use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Day-of-week numbering used throughout the datasheet: Monday = 2 .. Sunday = 8.
/// This is the numbering the legacy records were written with, so it is kept
/// as-is on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "u8", into = "u8")]
#[schema(value_type = u8)]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub fn new(value: u8) -> Option<Self> {
        (2..=8).contains(&value).then_some(Self(value))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        // number_from_monday: Mon=1..Sun=7, shifted so Sunday lands on 8.
        Self(date.weekday().number_from_monday() as u8 + 1)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            2 => "Thứ 2",
            3 => "Thứ 3",
            4 => "Thứ 4",
            5 => "Thứ 5",
            6 => "Thứ 6",
            7 => "Thứ 7",
            _ => "Chủ nhật",
        }
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("day of week must be 2-8, got {value}"))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(value: DayOfWeek) -> Self {
        value.0
    }
}

/// `HH:MM` (de)serialization for `NaiveTime`, the format the datasheet stores
/// all class times in. Zero-padded, so lexicographic order equals time order.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(D::Error::custom)
    }
}

/// A weekly-repeating slot in a class's base schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecurringSlot {
    #[serde(rename = "Thứ")]
    pub day_of_week: DayOfWeek,
    #[serde(rename = "Giờ bắt đầu", with = "hhmm")]
    #[schema(value_type = String, example = "14:00")]
    pub start_time: NaiveTime,
    #[serde(rename = "Giờ kết thúc", with = "hhmm")]
    #[schema(value_type = String, example = "15:30")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Mã lớp", default)]
    pub code: String,
    #[serde(rename = "Tên lớp", default)]
    pub name: String,
    #[serde(rename = "Khối", default)]
    pub grade: String,
    #[serde(rename = "Môn học", default)]
    pub subject: String,
    #[serde(rename = "Teacher ID", default)]
    pub teacher_id: String,
    #[serde(rename = "Giáo viên chủ nhiệm", default)]
    pub teacher_name: String,
    #[serde(rename = "Phòng học", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(rename = "Trạng thái", default)]
    pub status: String,
    #[serde(rename = "Student IDs", default)]
    pub student_ids: Vec<String>,
    #[serde(rename = "Lịch học", default)]
    pub schedule: Vec<RecurringSlot>,
    #[serde(rename = "Học phí mỗi buổi", default, skip_serializing_if = "Option::is_none")]
    pub fee_per_session: Option<i64>,
}

impl ClassRecord {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// A date-specific exception to a class's recurring schedule. Without
/// `replaced_date`/`replaced_day_of_week` it is a pure addition; with them it
/// also suppresses the recurring occurrence it was moved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimetableOverride {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Class ID")]
    pub class_id: String,
    #[serde(rename = "Mã lớp", default)]
    pub class_code: String,
    #[serde(rename = "Tên lớp", default)]
    pub class_name: String,
    #[serde(rename = "Ngày")]
    #[schema(value_type = String, format = "date", example = "2024-03-14")]
    pub date: NaiveDate,
    #[serde(rename = "Thứ")]
    pub day_of_week: DayOfWeek,
    #[serde(rename = "Giờ bắt đầu", with = "hhmm")]
    #[schema(value_type = String, example = "14:00")]
    pub start_time: NaiveTime,
    #[serde(rename = "Giờ kết thúc", with = "hhmm")]
    #[schema(value_type = String, example = "15:30")]
    pub end_time: NaiveTime,
    #[serde(rename = "Phòng học", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(rename = "Ghi chú", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "Thay thế ngày", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub replaced_date: Option<NaiveDate>,
    #[serde(rename = "Thay thế thứ", default, skip_serializing_if = "Option::is_none")]
    pub replaced_day_of_week: Option<DayOfWeek>,
}

/// A duty shift at the front desk. Recurring when `date` is absent, a
/// date-specific makeup when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StaffShift {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Tên", default)]
    pub name: String,
    #[serde(rename = "Thứ")]
    pub day_of_week: DayOfWeek,
    #[serde(rename = "Giờ bắt đầu", with = "hhmm")]
    #[schema(value_type = String, example = "08:00")]
    pub start_time: NaiveTime,
    #[serde(rename = "Giờ kết thúc", with = "hhmm")]
    #[schema(value_type = String, example = "12:00")]
    pub end_time: NaiveTime,
    #[serde(rename = "Ghi chú", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "Ngày", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Thay thế ngày", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub replaced_date: Option<NaiveDate>,
    #[serde(rename = "Thay thế thứ", default, skip_serializing_if = "Option::is_none")]
    pub replaced_day_of_week: Option<DayOfWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Room {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Tên phòng")]
    pub name: String,
    #[serde(rename = "Địa điểm", default)]
    pub location: String,
    #[serde(rename = "Sức chứa", default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Student {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Họ và tên", default)]
    pub full_name: String,
    #[serde(rename = "Mã học sinh", default)]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Teacher {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Họ và tên", default)]
    pub full_name: String,
    #[serde(rename = "Mã giáo viên", default)]
    pub code: String,
    #[serde(rename = "Biên chế", default, skip_serializing_if = "Option::is_none")]
    pub contract_type: Option<String>,
    #[serde(rename = "Lương theo buổi", default)]
    pub salary_per_session: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Course {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Khối", default)]
    pub grade: String,
    #[serde(rename = "Môn học", default)]
    pub subject: String,
    #[serde(rename = "Giá", default)]
    pub price: i64,
}

/// One manually entered score on a student's attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreDetail {
    #[serde(rename = "Tên điểm")]
    pub name: String,
    #[serde(rename = "Điểm")]
    pub score: f64,
    #[serde(rename = "Ngày")]
    #[schema(value_type = String, format = "date", example = "2024-03-12")]
    pub date: NaiveDate,
    #[serde(rename = "Ghi chú", default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[serde(rename = "Student ID", default)]
    pub student_id: String,
    #[serde(rename = "Có mặt", default)]
    pub present: bool,
    #[serde(rename = "Vắng có phép", default)]
    pub excused: bool,
    #[serde(rename = "Ghi chú", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// In-session test, graded on the spot.
    #[serde(rename = "Bài kiểm tra", default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(rename = "Điểm kiểm tra", default, skip_serializing_if = "Option::is_none")]
    pub test_score: Option<f64>,
    #[serde(rename = "Chi tiết điểm", default, skip_serializing_if = "Vec::is_empty")]
    pub score_details: Vec<ScoreDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSession {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Class ID")]
    pub class_id: String,
    #[serde(rename = "Mã lớp", default)]
    pub class_code: String,
    #[serde(rename = "Tên lớp", default)]
    pub class_name: String,
    #[serde(rename = "Ngày")]
    #[schema(value_type = String, format = "date", example = "2024-03-12")]
    pub date: NaiveDate,
    #[serde(rename = "Giờ bắt đầu", with = "hhmm")]
    #[schema(value_type = String, example = "14:00")]
    pub start_time: NaiveTime,
    #[serde(rename = "Giờ kết thúc", with = "hhmm")]
    #[schema(value_type = String, example = "15:30")]
    pub end_time: NaiveTime,
    #[serde(rename = "Teacher ID", default)]
    pub teacher_id: String,
    #[serde(rename = "Giáo viên", default)]
    pub teacher_name: String,
    #[serde(rename = "Trạng thái", default)]
    pub status: String,
    #[serde(rename = "Phụ cấp di chuyển", default)]
    pub travel_allowance: i64,
    #[serde(
        rename = "Điểm danh",
        default,
        deserialize_with = "record_list::deserialize"
    )]
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceSession {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Attendance record lists come in two legacy shapes: a plain array, or a map
/// keyed by arbitrary ids whose values are the records. Both deserialize to a
/// `Vec`; serialization always writes the array shape.
pub mod record_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer};

    use super::AttendanceRecord;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Shape {
        List(Vec<AttendanceRecord>),
        Keyed(BTreeMap<String, AttendanceRecord>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<AttendanceRecord>, D::Error> {
        Ok(match Shape::deserialize(deserializer)? {
            Shape::List(records) => records,
            Shape::Keyed(map) => map.into_values().collect(),
        })
    }
}

/// A document uploaded for a class, served from the CDN.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassDocument {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "Class ID")]
    pub class_id: String,
    #[serde(rename = "Tên tệp", default)]
    pub file_name: String,
    #[serde(rename = "Đường dẫn", default)]
    pub storage_path: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "Ngày tải lên")]
    #[schema(value_type = String, format = "date")]
    pub uploaded_on: NaiveDate,
}

/// Saved billing state for a `(student, month, year)` invoice. Paid records
/// are immutable snapshots; unpaid ones only carry adjustments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub discount: i64,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub final_amount: i64,
    /// Per-session price corrections keyed by session id.
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub session_prices: std::collections::HashMap<String, i64>,
}

/// Saved payroll state for a `(teacher, month, year)` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub salary_per_session: i64,
    #[serde(default)]
    pub total_salary: i64,
    #[serde(default)]
    pub total_allowance: i64,
    #[serde(default)]
    pub total_hours: u32,
    #[serde(default)]
    pub total_minutes: u32,
}

/// One resolved (class, date, time) instance on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub class_id: String,
    pub class_code: String,
    pub class_name: String,
    pub teacher_id: String,
    pub teacher_name: String,
    #[schema(value_type = String, format = "date", example = "2024-03-14")]
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "14:00")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "15:30")]
    pub end_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Id of the override backing this occurrence, when it is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    pub is_custom_schedule: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_from_date() {
        // 2024-03-12 is a Tuesday, 2024-03-17 a Sunday.
        let tue = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        let sun = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(DayOfWeek::from_date(tue).value(), 3);
        assert_eq!(DayOfWeek::from_date(sun).value(), 8);
    }

    #[test]
    fn test_day_of_week_bounds() {
        assert!(DayOfWeek::new(1).is_none());
        assert!(DayOfWeek::new(2).is_some());
        assert!(DayOfWeek::new(8).is_some());
        assert!(DayOfWeek::new(9).is_none());
    }

    #[test]
    fn test_recurring_slot_wire_format() {
        let slot = RecurringSlot {
            day_of_week: DayOfWeek::new(3).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["Thứ"], 3);
        assert_eq!(json["Giờ bắt đầu"], "14:00");
        assert_eq!(json["Giờ kết thúc"], "15:30");

        let back: RecurringSlot = serde_json::from_value(json).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn test_override_optional_replacement_fields() {
        let json = serde_json::json!({
            "Class ID": "c1",
            "Ngày": "2024-03-14",
            "Thứ": 5,
            "Giờ bắt đầu": "14:00",
            "Giờ kết thúc": "15:30",
        });
        let entry: TimetableOverride = serde_json::from_value(json).unwrap();
        assert!(entry.replaced_date.is_none());
        assert!(entry.replaced_day_of_week.is_none());

        let out = serde_json::to_value(&entry).unwrap();
        assert!(out.get("Thay thế ngày").is_none());
    }

    fn session_json(records: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "Class ID": "c1",
            "Ngày": "2024-03-12",
            "Giờ bắt đầu": "14:00",
            "Giờ kết thúc": "15:30",
            "Điểm danh": records,
        })
    }

    #[test]
    fn test_session_records_array_shape() {
        let json = session_json(serde_json::json!([
            {"Student ID": "hs1", "Có mặt": true},
            {"Student ID": "hs2", "Vắng có phép": true},
        ]));
        let session: AttendanceSession = serde_json::from_value(json).unwrap();
        assert_eq!(session.records.len(), 2);
        assert_eq!(session.records[0].student_id, "hs1");
    }

    #[test]
    fn test_session_records_map_shape() {
        // Legacy sessions keyed records by arbitrary ids instead of an array.
        let json = session_json(serde_json::json!({
            "0": {"Student ID": "hs1", "Có mặt": true},
            "k-xyz": {"Student ID": "hs2", "Vắng có phép": true},
        }));
        let session: AttendanceSession = serde_json::from_value(json).unwrap();
        assert_eq!(session.records.len(), 2);
        assert!(session.records.iter().any(|r| r.student_id == "hs1" && r.present));
        assert!(session.records.iter().any(|r| r.student_id == "hs2" && r.excused));

        // Writing back always emits the array shape.
        let out = serde_json::to_value(&session).unwrap();
        assert!(out["Điểm danh"].is_array());
    }

    #[test]
    fn test_score_detail_wire_format() {
        let json = serde_json::json!({
            "Student ID": "hs1",
            "Có mặt": true,
            "Bài kiểm tra": "15 phút",
            "Điểm kiểm tra": 8.5,
            "Chi tiết điểm": [
                {"Tên điểm": "Miệng", "Điểm": 9.0, "Ngày": "2024-03-05", "Ghi chú": ""},
            ],
        });
        let record: AttendanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.test_name.as_deref(), Some("15 phút"));
        assert_eq!(record.test_score, Some(8.5));
        assert_eq!(record.score_details.len(), 1);
        assert_eq!(record.score_details[0].name, "Miệng");

        // Records without scores keep a lean wire shape.
        let bare = AttendanceRecord {
            student_id: "hs1".to_string(),
            present: true,
            ..Default::default()
        };
        let out = serde_json::to_value(&bare).unwrap();
        assert!(out.get("Chi tiết điểm").is_none());
        assert!(out.get("Bài kiểm tra").is_none());
    }

    #[test]
    fn test_invalid_day_of_week_rejected() {
        let json = serde_json::json!({
            "Thứ": 1,
            "Giờ bắt đầu": "14:00",
            "Giờ kết thúc": "15:30",
        });
        assert!(serde_json::from_value::<RecurringSlot>(json).is_err());
    }
}
