use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::{ClassRecord, DayOfWeek, Occurrence, StaffShift, TimetableOverride};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("no recurring slot matches the occurrence being changed")]
    SlotNotFound,
    #[error("override not found: {0}")]
    OverrideNotFound(String),
    #[error("no occurrence for class {class_id} on {date}")]
    OccurrenceNotFound { class_id: String, date: NaiveDate },
}

/// Whether a change applies to the recurring pattern or to a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Scope {
    #[serde(rename = "allWeeks")]
    AllWeeks,
    #[serde(rename = "thisDateOnly")]
    ThisDateOnly,
}

/// Dedup key for overrides: at most one per (class, date, weekday).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideKey {
    pub class_id: String,
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
}

impl From<&TimetableOverride> for OverrideKey {
    fn from(entry: &TimetableOverride) -> Self {
        Self {
            class_id: entry.class_id.clone(),
            date: entry.date,
            day_of_week: entry.day_of_week,
        }
    }
}

pub type OverrideMap = HashMap<OverrideKey, TimetableOverride>;

/// Builds the keyed override index. The store hands entries back in no
/// particular order, so sort by id first; the highest id wins on key
/// collisions regardless of input order.
pub fn index_overrides<I>(entries: I) -> OverrideMap
where
    I: IntoIterator<Item = TimetableOverride>,
{
    let mut entries: Vec<TimetableOverride> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
        .into_iter()
        .map(|entry| (OverrideKey::from(&entry), entry))
        .collect()
}

fn recurring_occurrence(class: &ClassRecord, slot: &crate::models::RecurringSlot, date: NaiveDate) -> Occurrence {
    Occurrence {
        class_id: class.id.clone(),
        class_code: class.code.clone(),
        class_name: class.name.clone(),
        teacher_id: class.teacher_id.clone(),
        teacher_name: class.teacher_name.clone(),
        date,
        day_of_week: slot.day_of_week,
        start_time: slot.start_time,
        end_time: slot.end_time,
        room_id: class.room_id.clone(),
        note: None,
        schedule_id: None,
        is_custom_schedule: false,
    }
}

fn override_occurrence(class: &ClassRecord, entry: &TimetableOverride) -> Occurrence {
    Occurrence {
        class_id: class.id.clone(),
        class_code: class.code.clone(),
        class_name: class.name.clone(),
        teacher_id: class.teacher_id.clone(),
        teacher_name: class.teacher_name.clone(),
        date: entry.date,
        day_of_week: entry.day_of_week,
        start_time: entry.start_time,
        end_time: entry.end_time,
        room_id: entry.room_id.clone().or_else(|| class.room_id.clone()),
        note: entry.note.clone(),
        schedule_id: Some(entry.id.clone()),
        is_custom_schedule: true,
    }
}

/// True when some override relocated this class's `date` occurrence elsewhere.
fn is_date_relocated(overrides: &OverrideMap, class_id: &str, date: NaiveDate, dow: DayOfWeek) -> bool {
    overrides.values().any(|entry| {
        entry.class_id == class_id
            && entry.replaced_date == Some(date)
            && entry.replaced_day_of_week == Some(dow)
    })
}

/// Resolves the effective occurrences for one calendar date.
///
/// Per class, exactly one of three branches applies:
/// an override keyed to (class, date, weekday) yields a single custom
/// occurrence; a relocated-away recurring slot yields nothing; otherwise the
/// base schedule's slots for the weekday are emitted. A class therefore never
/// produces both an override occurrence and its recurring slot on one date.
pub fn resolve_occurrences_for_date(
    date: NaiveDate,
    classes: &[ClassRecord],
    overrides: &OverrideMap,
) -> Vec<Occurrence> {
    let dow = DayOfWeek::from_date(date);
    let mut occurrences = Vec::new();

    for class in classes.iter().filter(|c| c.is_active()) {
        let key = OverrideKey {
            class_id: class.id.clone(),
            date,
            day_of_week: dow,
        };

        if let Some(entry) = overrides.get(&key) {
            occurrences.push(override_occurrence(class, entry));
            continue;
        }

        if is_date_relocated(overrides, &class.id, date, dow) {
            continue;
        }

        for slot in class.schedule.iter().filter(|s| s.day_of_week == dow) {
            occurrences.push(recurring_occurrence(class, slot, date));
        }
    }

    occurrences.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.class_code.cmp(&b.class_code))
    });
    occurrences
}

/// Resolves a Monday-anchored week, day by day.
pub fn resolve_week(
    monday: NaiveDate,
    classes: &[ClassRecord],
    overrides: &OverrideMap,
) -> Vec<Occurrence> {
    (0..7)
        .filter_map(|offset| monday.checked_add_days(chrono::Days::new(offset)))
        .flat_map(|date| resolve_occurrences_for_date(date, classes, overrides))
        .collect()
}

/// The writes a schedule change wants applied to the store. The resolver does
/// no I/O itself; callers persist the plan and surface failures without
/// rolling back the in-memory view.
#[derive(Debug, Clone, Default)]
pub struct ChangePlan {
    pub updated_class: Option<ClassRecord>,
    pub upserted_override: Option<TimetableOverride>,
    pub deleted_override_ids: Vec<String>,
}

/// Moves an occurrence to `target_date`.
///
/// `AllWeeks` rewrites the matching recurring slot's weekday and purges every
/// override of the class still referencing the old weekday, either directly or
/// through its replacement anchor; stale suppressions would otherwise point at
/// a weekday the base schedule no longer uses. `ThisDateOnly` upserts an
/// override for the target date. When the occurrence being moved is itself an
/// override, the chain collapses: the new entry keeps the *original*
/// `replaced_date`/`replaced_day_of_week`, not the intermediate date.
pub fn move_occurrence(
    class: &ClassRecord,
    overrides: &OverrideMap,
    occurrence: &Occurrence,
    target_date: NaiveDate,
    scope: Scope,
) -> Result<ChangePlan, ScheduleError> {
    match scope {
        Scope::AllWeeks => move_all_weeks(class, overrides, occurrence, target_date),
        Scope::ThisDateOnly => Ok(move_this_date_only(class, overrides, occurrence, target_date)),
    }
}

fn move_all_weeks(
    class: &ClassRecord,
    overrides: &OverrideMap,
    occurrence: &Occurrence,
    target_date: NaiveDate,
) -> Result<ChangePlan, ScheduleError> {
    let old_day = occurrence.day_of_week;
    let new_day = DayOfWeek::from_date(target_date);

    let mut updated = class.clone();
    let mut matched = false;
    for slot in updated.schedule.iter_mut() {
        if slot.day_of_week == old_day
            && slot.start_time == occurrence.start_time
            && slot.end_time == occurrence.end_time
        {
            slot.day_of_week = new_day;
            matched = true;
        }
    }
    if !matched {
        return Err(ScheduleError::SlotNotFound);
    }

    let deleted = stale_override_ids(overrides, &class.id, old_day);

    Ok(ChangePlan {
        updated_class: Some(updated),
        upserted_override: None,
        deleted_override_ids: deleted,
    })
}

fn move_this_date_only(
    class: &ClassRecord,
    overrides: &OverrideMap,
    occurrence: &Occurrence,
    target_date: NaiveDate,
) -> ChangePlan {
    let mut entry = TimetableOverride {
        id: String::new(),
        class_id: class.id.clone(),
        class_code: class.code.clone(),
        class_name: class.name.clone(),
        date: target_date,
        day_of_week: DayOfWeek::from_date(target_date),
        start_time: occurrence.start_time,
        end_time: occurrence.end_time,
        room_id: occurrence.room_id.clone().or_else(|| class.room_id.clone()),
        note: occurrence.note.clone(),
        replaced_date: None,
        replaced_day_of_week: None,
    };

    let mut deleted = Vec::new();
    if occurrence.is_custom_schedule {
        // Moving an override again: keep the first suppression anchor and
        // retire the intermediate entry.
        if let Some(schedule_id) = &occurrence.schedule_id {
            if let Some(existing) = overrides.values().find(|o| &o.id == schedule_id) {
                entry.replaced_date = existing.replaced_date;
                entry.replaced_day_of_week = existing.replaced_day_of_week;
            }
            deleted.push(schedule_id.clone());
        }
    } else {
        entry.replaced_date = Some(occurrence.date);
        entry.replaced_day_of_week = Some(occurrence.day_of_week);
    }

    ChangePlan {
        updated_class: None,
        upserted_override: Some(entry),
        deleted_override_ids: deleted,
    }
}

/// Changes an occurrence's time range.
///
/// `AllWeeks` triple-matches the recurring slot on (weekday, start, end) and
/// replaces its times, then deletes the class's overrides on that weekday.
/// `ThisDateOnly` upserts an override for the occurrence's own date, keeping
/// the existing entry's identity and replacement anchor when editing one.
pub fn edit_occurrence_time(
    class: &ClassRecord,
    overrides: &OverrideMap,
    occurrence: &Occurrence,
    new_start: NaiveTime,
    new_end: NaiveTime,
    new_room: Option<String>,
    new_note: Option<String>,
    scope: Scope,
) -> Result<ChangePlan, ScheduleError> {
    match scope {
        Scope::AllWeeks => {
            let dow = occurrence.day_of_week;
            let mut updated = class.clone();
            let mut matched = false;
            for slot in updated.schedule.iter_mut() {
                if slot.day_of_week == dow
                    && slot.start_time == occurrence.start_time
                    && slot.end_time == occurrence.end_time
                {
                    slot.start_time = new_start;
                    slot.end_time = new_end;
                    matched = true;
                }
            }
            if !matched {
                return Err(ScheduleError::SlotNotFound);
            }
            if let Some(room) = new_room {
                updated.room_id = Some(room);
            }

            Ok(ChangePlan {
                updated_class: Some(updated),
                upserted_override: None,
                deleted_override_ids: stale_override_ids(overrides, &class.id, dow),
            })
        }
        Scope::ThisDateOnly => {
            let dow = DayOfWeek::from_date(occurrence.date);
            let mut entry = TimetableOverride {
                id: occurrence.schedule_id.clone().unwrap_or_default(),
                class_id: class.id.clone(),
                class_code: class.code.clone(),
                class_name: class.name.clone(),
                date: occurrence.date,
                day_of_week: dow,
                start_time: new_start,
                end_time: new_end,
                room_id: new_room.or_else(|| occurrence.room_id.clone()),
                note: new_note,
                replaced_date: None,
                replaced_day_of_week: None,
            };
            if let Some(schedule_id) = &occurrence.schedule_id {
                if let Some(existing) = overrides.values().find(|o| &o.id == schedule_id) {
                    entry.replaced_date = existing.replaced_date;
                    entry.replaced_day_of_week = existing.replaced_day_of_week;
                }
            }

            Ok(ChangePlan {
                updated_class: None,
                upserted_override: Some(entry),
                deleted_override_ids: Vec::new(),
            })
        }
    }
}

/// Overrides orphaned by a recurring-pattern change on `day`: entries placed
/// on that weekday plus entries whose suppression anchor points at it.
fn stale_override_ids(overrides: &OverrideMap, class_id: &str, day: DayOfWeek) -> Vec<String> {
    let mut ids: Vec<String> = overrides
        .values()
        .filter(|entry| {
            entry.class_id == class_id
                && (entry.day_of_week == day || entry.replaced_day_of_week == Some(day))
        })
        .map(|entry| entry.id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Resolves the duty shifts visible on one date.
///
/// A dated makeup shift on `date` shows and hides the recurring shift with the
/// same (weekday, start, end) signature; a makeup that replaced this date
/// hides the recurring shift it was moved away from. Other recurring shifts
/// for the weekday pass through.
pub fn resolve_staff_shifts_for_date(date: NaiveDate, shifts: &[StaffShift]) -> Vec<StaffShift> {
    let dow = DayOfWeek::from_date(date);
    let mut resolved = Vec::new();
    let mut suppressed: std::collections::HashSet<(DayOfWeek, NaiveTime, NaiveTime)> =
        std::collections::HashSet::new();

    for shift in shifts {
        if shift.date == Some(date) {
            resolved.push(shift.clone());
            suppressed.insert((shift.day_of_week, shift.start_time, shift.end_time));
        }
        if shift.replaced_date == Some(date) && shift.replaced_day_of_week == Some(dow) {
            suppressed.insert((dow, shift.start_time, shift.end_time));
        }
    }

    for shift in shifts {
        if shift.date.is_none()
            && shift.day_of_week == dow
            && !suppressed.contains(&(dow, shift.start_time, shift.end_time))
        {
            resolved.push(shift.clone());
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecurringSlot;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn class_with_slot(id: &str, dow: u8, start: NaiveTime, end: NaiveTime) -> ClassRecord {
        ClassRecord {
            id: id.to_string(),
            code: format!("L-{id}"),
            name: format!("Lớp {id}"),
            grade: "10".to_string(),
            subject: "Toán".to_string(),
            teacher_id: "gv1".to_string(),
            teacher_name: "Nguyễn Văn A".to_string(),
            room_id: Some("r1".to_string()),
            status: "active".to_string(),
            student_ids: vec!["hs1".to_string()],
            schedule: vec![RecurringSlot {
                day_of_week: DayOfWeek::new(dow).unwrap(),
                start_time: start,
                end_time: end,
            }],
            fee_per_session: Some(100_000),
        }
    }

    fn override_entry(
        id: &str,
        class_id: &str,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        replaced: Option<NaiveDate>,
    ) -> TimetableOverride {
        TimetableOverride {
            id: id.to_string(),
            class_id: class_id.to_string(),
            class_code: format!("L-{class_id}"),
            class_name: format!("Lớp {class_id}"),
            date,
            day_of_week: DayOfWeek::from_date(date),
            start_time: start,
            end_time: end,
            room_id: None,
            note: None,
            replaced_date: replaced,
            replaced_day_of_week: replaced.map(DayOfWeek::from_date),
        }
    }

    #[test]
    fn test_resolve_recurring_slot() {
        // Tue 14:00-15:30, resolving Tuesday 2024-03-12.
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let occs = resolve_occurrences_for_date(d(2024, 3, 12), &[class], &OverrideMap::new());
        assert_eq!(occs.len(), 1);
        assert!(!occs[0].is_custom_schedule);
        assert_eq!(occs[0].start_time, t(14, 0));
        assert_eq!(occs[0].day_of_week.value(), 3);
    }

    #[test]
    fn test_index_overrides_highest_id_wins_regardless_of_order() {
        let older = override_entry("o1", "c1", d(2024, 3, 12), t(14, 0), t(15, 30), None);
        let newer = override_entry("o2", "c1", d(2024, 3, 12), t(16, 0), t(17, 30), None);

        let forward = index_overrides([older.clone(), newer.clone()]);
        let backward = index_overrides([newer.clone(), older.clone()]);

        let key = OverrideKey::from(&newer);
        assert_eq!(forward[&key].id, "o2");
        assert_eq!(backward[&key].id, "o2");
    }

    #[test]
    fn test_resolve_inactive_class_skipped() {
        let mut class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        class.status = "archived".to_string();
        let occs = resolve_occurrences_for_date(d(2024, 3, 12), &[class], &OverrideMap::new());
        assert!(occs.is_empty());
    }

    #[test]
    fn test_override_replaces_recurring_same_date() {
        // Override keyed to the same Tuesday wins and the recurring slot is
        // not emitted alongside it.
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = index_overrides([override_entry(
            "o1",
            "c1",
            d(2024, 3, 12),
            t(16, 0),
            t(17, 30),
            None,
        )]);
        let occs = resolve_occurrences_for_date(d(2024, 3, 12), &[class], &overrides);
        assert_eq!(occs.len(), 1);
        assert!(occs[0].is_custom_schedule);
        assert_eq!(occs[0].start_time, t(16, 0));
        assert_eq!(occs[0].schedule_id.as_deref(), Some("o1"));
    }

    #[test]
    fn test_relocated_date_emits_nothing() {
        // Base Tue 14:00-15:30; moved to Thursday 2024-03-14 replacing
        // Tuesday 2024-03-12. Tuesday resolves empty, Thursday resolves the
        // custom occurrence.
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = index_overrides([override_entry(
            "o1",
            "c1",
            d(2024, 3, 14),
            t(14, 0),
            t(15, 30),
            Some(d(2024, 3, 12)),
        )]);

        let tuesday = resolve_occurrences_for_date(d(2024, 3, 12), std::slice::from_ref(&class), &overrides);
        assert!(tuesday.is_empty());

        let thursday = resolve_occurrences_for_date(d(2024, 3, 14), &[class], &overrides);
        assert_eq!(thursday.len(), 1);
        assert!(thursday[0].is_custom_schedule);
    }

    #[test]
    fn test_addition_override_does_not_suppress_other_weekdays() {
        // A pure addition on Thursday leaves the Tuesday recurring slot alone.
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = index_overrides([override_entry(
            "o1",
            "c1",
            d(2024, 3, 14),
            t(9, 0),
            t(10, 0),
            None,
        )]);
        let tuesday = resolve_occurrences_for_date(d(2024, 3, 12), &[class], &overrides);
        assert_eq!(tuesday.len(), 1);
        assert!(!tuesday[0].is_custom_schedule);
    }

    #[test]
    fn test_at_most_one_occurrence_per_class_and_date() {
        // Even with both an override on the date and a recurring slot, only
        // the override is emitted.
        let class = class_with_slot("c1", 5, t(14, 0), t(15, 30));
        let overrides = index_overrides([override_entry(
            "o1",
            "c1",
            d(2024, 3, 14),
            t(14, 0),
            t(15, 30),
            Some(d(2024, 3, 12)),
        )]);
        let occs = resolve_occurrences_for_date(d(2024, 3, 14), &[class], &overrides);
        assert_eq!(occs.len(), 1);
        assert!(occs[0].is_custom_schedule);
    }

    #[test]
    fn test_index_overrides_dedupes_on_key() {
        let a = override_entry("o1", "c1", d(2024, 3, 14), t(9, 0), t(10, 0), None);
        let b = override_entry("o2", "c1", d(2024, 3, 14), t(11, 0), t(12, 0), None);
        let map = index_overrides([a, b]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.values().next().unwrap().id, "o2");
    }

    #[test]
    fn test_move_this_date_only_sets_replacement_anchor() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = OverrideMap::new();
        let occ = resolve_occurrences_for_date(d(2024, 3, 12), std::slice::from_ref(&class), &overrides)
            .remove(0);

        let plan = move_occurrence(&class, &overrides, &occ, d(2024, 3, 14), Scope::ThisDateOnly)
            .unwrap();
        let entry = plan.upserted_override.unwrap();
        assert_eq!(entry.date, d(2024, 3, 14));
        assert_eq!(entry.day_of_week.value(), 5);
        assert_eq!(entry.replaced_date, Some(d(2024, 3, 12)));
        assert_eq!(entry.replaced_day_of_week.map(|d| d.value()), Some(3));
        assert!(plan.updated_class.is_none());
        assert!(plan.deleted_override_ids.is_empty());
    }

    #[test]
    fn test_chained_moves_keep_original_anchor() {
        // Tue -> Thu, then Thu -> Fri: the Friday entry must still suppress
        // the original Tuesday, not Thursday.
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = OverrideMap::new();
        let occ = resolve_occurrences_for_date(d(2024, 3, 12), std::slice::from_ref(&class), &overrides)
            .remove(0);

        let first = move_occurrence(&class, &overrides, &occ, d(2024, 3, 14), Scope::ThisDateOnly)
            .unwrap();
        let mut thu_entry = first.upserted_override.unwrap();
        thu_entry.id = "o1".to_string();
        let overrides = index_overrides([thu_entry]);

        let thu_occ = resolve_occurrences_for_date(d(2024, 3, 14), std::slice::from_ref(&class), &overrides)
            .remove(0);
        assert!(thu_occ.is_custom_schedule);

        let second = move_occurrence(&class, &overrides, &thu_occ, d(2024, 3, 15), Scope::ThisDateOnly)
            .unwrap();
        let fri_entry = second.upserted_override.unwrap();
        assert_eq!(fri_entry.replaced_date, Some(d(2024, 3, 12)));
        assert_eq!(fri_entry.replaced_day_of_week.map(|d| d.value()), Some(3));
        assert_eq!(second.deleted_override_ids, vec!["o1".to_string()]);
    }

    #[test]
    fn test_move_all_weeks_rewrites_slot_and_purges_overrides() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = index_overrides([
            override_entry("o1", "c1", d(2024, 3, 12), t(16, 0), t(17, 0), None),
            override_entry("o2", "c1", d(2024, 3, 14), t(14, 0), t(15, 30), Some(d(2024, 3, 12))),
        ]);
        let occ = Occurrence {
            class_id: "c1".to_string(),
            class_code: "L-c1".to_string(),
            class_name: "Lớp c1".to_string(),
            teacher_id: "gv1".to_string(),
            teacher_name: "Nguyễn Văn A".to_string(),
            date: d(2024, 3, 12),
            day_of_week: DayOfWeek::new(3).unwrap(),
            start_time: t(14, 0),
            end_time: t(15, 30),
            room_id: None,
            note: None,
            schedule_id: None,
            is_custom_schedule: false,
        };

        let plan = move_occurrence(&class, &overrides, &occ, d(2024, 3, 15), Scope::AllWeeks)
            .unwrap();
        let updated = plan.updated_class.unwrap();
        assert_eq!(updated.schedule[0].day_of_week.value(), 6);
        // Both overrides referenced the old Tuesday, directly or via anchor.
        let mut deleted = plan.deleted_override_ids.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["o1".to_string(), "o2".to_string()]);

        // Resolving the old weekday with the plan applied finds nothing.
        let remaining: OverrideMap = OverrideMap::new();
        let occs = resolve_occurrences_for_date(d(2024, 3, 12), &[updated], &remaining);
        assert!(occs.is_empty());
    }

    #[test]
    fn test_move_all_weeks_without_matching_slot() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let occ = Occurrence {
            start_time: t(8, 0),
            end_time: t(9, 0),
            ..resolve_occurrences_for_date(d(2024, 3, 12), std::slice::from_ref(&class), &OverrideMap::new())
                .remove(0)
        };
        let err = move_occurrence(&class, &OverrideMap::new(), &occ, d(2024, 3, 15), Scope::AllWeeks)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::SlotNotFound));
    }

    #[test]
    fn test_edit_all_weeks_triple_match() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides =
            index_overrides([override_entry("o1", "c1", d(2024, 3, 12), t(9, 0), t(10, 0), None)]);
        let occ = resolve_occurrences_for_date(d(2024, 3, 19), std::slice::from_ref(&class), &OverrideMap::new())
            .remove(0);

        let plan = edit_occurrence_time(
            &class,
            &overrides,
            &occ,
            t(15, 0),
            t(16, 30),
            None,
            None,
            Scope::AllWeeks,
        )
        .unwrap();
        let updated = plan.updated_class.unwrap();
        assert_eq!(updated.schedule[0].start_time, t(15, 0));
        assert_eq!(updated.schedule[0].end_time, t(16, 30));
        assert_eq!(plan.deleted_override_ids, vec!["o1".to_string()]);
    }

    #[test]
    fn test_edit_this_date_only_preserves_identity_and_anchor() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let overrides = index_overrides([override_entry(
            "o1",
            "c1",
            d(2024, 3, 14),
            t(14, 0),
            t(15, 30),
            Some(d(2024, 3, 12)),
        )]);
        let occ = resolve_occurrences_for_date(d(2024, 3, 14), std::slice::from_ref(&class), &overrides)
            .remove(0);

        let plan = edit_occurrence_time(
            &class,
            &overrides,
            &occ,
            t(16, 0),
            t(17, 30),
            Some("r2".to_string()),
            Some("đổi giờ".to_string()),
            Scope::ThisDateOnly,
        )
        .unwrap();
        let entry = plan.upserted_override.unwrap();
        assert_eq!(entry.id, "o1");
        assert_eq!(entry.start_time, t(16, 0));
        assert_eq!(entry.replaced_date, Some(d(2024, 3, 12)));
        assert_eq!(entry.room_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_staff_shift_base_key_suppression() {
        let base = StaffShift {
            id: "s1".to_string(),
            name: "Nhân viên trực trung tâm".to_string(),
            day_of_week: DayOfWeek::new(3).unwrap(),
            start_time: t(8, 0),
            end_time: t(12, 0),
            note: None,
            date: None,
            replaced_date: None,
            replaced_day_of_week: None,
        };
        let mut other = base.clone();
        other.id = "s2".to_string();
        other.start_time = t(13, 0);
        other.end_time = t(17, 0);
        let makeup = StaffShift {
            id: "s3".to_string(),
            name: base.name.clone(),
            day_of_week: DayOfWeek::new(5).unwrap(),
            start_time: t(8, 0),
            end_time: t(12, 0),
            note: None,
            date: Some(d(2024, 3, 14)),
            replaced_date: Some(d(2024, 3, 12)),
            replaced_day_of_week: Some(DayOfWeek::new(3).unwrap()),
        };
        let shifts = vec![base, other, makeup];

        // Tuesday: the 8-12 base shift was moved away, 13-17 stays.
        let tue = resolve_staff_shifts_for_date(d(2024, 3, 12), &shifts);
        assert_eq!(tue.len(), 1);
        assert_eq!(tue[0].id, "s2");

        // Thursday: only the makeup shows.
        let thu = resolve_staff_shifts_for_date(d(2024, 3, 14), &shifts);
        assert_eq!(thu.len(), 1);
        assert_eq!(thu[0].id, "s3");
    }

    #[test]
    fn test_resolve_week_spans_seven_days() {
        let class = class_with_slot("c1", 3, t(14, 0), t(15, 30));
        let mut sunday_class = class_with_slot("c2", 8, t(9, 0), t(10, 0));
        sunday_class.schedule[0].day_of_week = DayOfWeek::new(8).unwrap();

        let occs = resolve_week(d(2024, 3, 11), &[class, sunday_class], &OverrideMap::new());
        assert_eq!(occs.len(), 2);
        assert_eq!(occs[0].date, d(2024, 3, 12));
        assert_eq!(occs[1].date, d(2024, 3, 17));
    }
}
