use std::collections::HashMap;

use chrono::Datelike;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::models::{
    AttendanceSession, ClassRecord, Course, InvoiceStatus, SalaryStatus, Student, Teacher,
    TimetableOverride,
};

/// Billing key: `{subject_id}-{month}-{year}`, month 1-12.
pub fn billing_key(subject_id: &str, month: u32, year: i32) -> String {
    format!("{subject_id}-{month}-{year}")
}

/// A student's computed invoice for one month. Recomputed from attendance on
/// every request except when the saved status says paid, which freezes the
/// stored snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentInvoice {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_code: String,
    pub month: u32,
    pub year: i32,
    pub total_sessions: u32,
    pub total_amount: i64,
    pub discount: i64,
    pub final_amount: i64,
    pub status: String,
    pub session_ids: Vec<String>,
}

/// A teacher's computed payroll record for one month.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPayroll {
    pub id: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub teacher_code: String,
    pub contract_type: String,
    pub month: u32,
    pub year: i32,
    pub total_sessions: u32,
    pub salary_per_session: i64,
    pub total_salary: i64,
    pub total_allowance: i64,
    pub total_hours: u32,
    pub total_minutes: u32,
    pub status: String,
    pub session_ids: Vec<String>,
}

/// Price per session for a class: the matching course's price first, then the
/// class's own fee. Zero means "do not bill".
fn price_per_session(class: Option<&ClassRecord>, courses: &[Course]) -> i64 {
    let Some(class) = class else { return 0 };
    let course_price = courses
        .iter()
        .find(|c| c.grade == class.grade && c.subject == class.subject)
        .map(|c| c.price)
        .filter(|p| *p > 0);
    course_price.or(class.fee_per_session).unwrap_or(0)
}

fn saved_status(statuses: &HashMap<String, InvoiceStatus>, key: &str) -> (String, i64) {
    match statuses.get(key) {
        Some(saved) => {
            let status = if saved.status == "paid" { "paid" } else { "unpaid" };
            (status.to_string(), saved.discount)
        }
        None => ("unpaid".to_string(), 0),
    }
}

fn session_price(
    statuses: &HashMap<String, InvoiceStatus>,
    key: &str,
    session_id: &str,
    default: i64,
) -> i64 {
    statuses
        .get(key)
        .and_then(|s| s.session_prices.get(session_id).copied())
        .unwrap_or(default)
}

/// Computes all student invoices for a month.
///
/// A session bills a student when their attendance record is present or an
/// excused absence. Timetable overrides in the month whose class/date has no
/// attendance session bill every enrolled student once, the makeup having
/// happened without a roll call. Paid invoices come verbatim from the saved
/// snapshot and are never recomputed.
pub fn compute_student_invoices(
    month: u32,
    year: i32,
    sessions: &[AttendanceSession],
    students: &[Student],
    classes: &[ClassRecord],
    courses: &[Course],
    overrides: &[TimetableOverride],
    statuses: &HashMap<String, InvoiceStatus>,
) -> Vec<StudentInvoice> {
    let mut invoices: HashMap<String, StudentInvoice> = HashMap::new();

    // Paid snapshots first; they shadow any recomputation below.
    for (key, saved) in statuses {
        if saved.status != "paid" {
            continue;
        }
        let Some((student_id, key_month, key_year)) = parse_billing_key(key) else {
            continue;
        };
        if key_month != month || key_year != year {
            continue;
        }
        let student = students.iter().find(|s| s.id == student_id);
        invoices.insert(
            key.clone(),
            StudentInvoice {
                id: key.clone(),
                student_id: student_id.to_string(),
                student_name: student.map(|s| s.full_name.clone()).unwrap_or_default(),
                student_code: student.map(|s| s.code.clone()).unwrap_or_default(),
                month,
                year,
                total_sessions: saved.total_sessions,
                total_amount: saved.total_amount,
                discount: saved.discount,
                final_amount: if saved.final_amount != 0 {
                    saved.final_amount
                } else {
                    saved.total_amount - saved.discount
                },
                status: "paid".to_string(),
                session_ids: Vec::new(),
            },
        );
    }

    for session in sessions {
        if session.date.month() != month || session.date.year() != year {
            continue;
        }

        for record in &session.records {
            if record.student_id.is_empty() {
                continue;
            }
            if !record.present && !record.excused {
                continue;
            }

            let key = billing_key(&record.student_id, month, year);
            if invoices.get(&key).is_some_and(|i| i.status == "paid") {
                continue;
            }

            let Some(student) = students.iter().find(|s| s.id == record.student_id) else {
                warn!(student_id = %record.student_id, session_id = %session.id, "attendance record for unknown student");
                continue;
            };
            let class = classes.iter().find(|c| c.id == session.class_id);
            let price = price_per_session(class, courses);
            if price == 0 {
                warn!(student_id = %record.student_id, class_id = %session.class_id, "no price configured, skipping session");
                continue;
            }

            let invoice = invoices.entry(key.clone()).or_insert_with(|| {
                let (status, discount) = saved_status(statuses, &key);
                StudentInvoice {
                    id: key.clone(),
                    student_id: student.id.clone(),
                    student_name: student.full_name.clone(),
                    student_code: student.code.clone(),
                    month,
                    year,
                    total_sessions: 0,
                    total_amount: 0,
                    discount,
                    final_amount: 0,
                    status,
                    session_ids: Vec::new(),
                }
            });
            invoice.total_sessions += 1;
            invoice.total_amount += session_price(statuses, &key, &session.id, price);
            invoice.session_ids.push(session.id.clone());
        }
    }

    // Makeup occurrences without a roll call still bill the whole class.
    for entry in overrides {
        if entry.date.month() != month || entry.date.year() != year {
            continue;
        }
        let has_session = sessions
            .iter()
            .any(|s| s.class_id == entry.class_id && s.date == entry.date);
        if has_session {
            continue;
        }
        let Some(class) = classes.iter().find(|c| c.id == entry.class_id) else {
            warn!(class_id = %entry.class_id, override_id = %entry.id, "override references unknown class");
            continue;
        };
        let price = price_per_session(Some(class), courses);
        if price == 0 || class.student_ids.is_empty() {
            continue;
        }

        let pseudo_id = format!("timetable-{}", entry.id);
        for student_id in &class.student_ids {
            let key = billing_key(student_id, month, year);
            if invoices.get(&key).is_some_and(|i| i.status == "paid") {
                continue;
            }
            let Some(student) = students.iter().find(|s| &s.id == student_id) else {
                continue;
            };
            let invoice = invoices.entry(key.clone()).or_insert_with(|| {
                let (status, discount) = saved_status(statuses, &key);
                StudentInvoice {
                    id: key.clone(),
                    student_id: student.id.clone(),
                    student_name: student.full_name.clone(),
                    student_code: student.code.clone(),
                    month,
                    year,
                    total_sessions: 0,
                    total_amount: 0,
                    discount,
                    final_amount: 0,
                    status,
                    session_ids: Vec::new(),
                }
            });
            if invoice.session_ids.iter().any(|id| id == &pseudo_id) {
                continue;
            }
            invoice.total_sessions += 1;
            invoice.total_amount += session_price(statuses, &key, &pseudo_id, price);
            invoice.session_ids.push(pseudo_id.clone());
        }
    }

    let mut result: Vec<StudentInvoice> = invoices.into_values().collect();
    for invoice in &mut result {
        if invoice.status != "paid" {
            invoice.final_amount = (invoice.total_amount - invoice.discount).max(0);
        }
    }
    result.sort_by(|a, b| a.student_code.cmp(&b.student_code).then(a.id.cmp(&b.id)));
    result
}

/// Computes all teacher payroll records for a month: session count times the
/// teacher's per-session rate, travel allowances summed, taught time
/// accumulated in minutes and normalized to hours + minutes. Paid records are
/// frozen snapshots.
pub fn compute_teacher_payroll(
    month: u32,
    year: i32,
    sessions: &[AttendanceSession],
    teachers: &[Teacher],
    statuses: &HashMap<String, SalaryStatus>,
) -> Vec<TeacherPayroll> {
    let mut payrolls: HashMap<String, TeacherPayroll> = HashMap::new();

    for (key, saved) in statuses {
        if saved.status != "paid" {
            continue;
        }
        let Some((teacher_id, key_month, key_year)) = parse_billing_key(key) else {
            continue;
        };
        if key_month != month || key_year != year {
            continue;
        }
        let teacher = teachers.iter().find(|t| t.id == teacher_id);
        payrolls.insert(
            key.clone(),
            TeacherPayroll {
                id: key.clone(),
                teacher_id: teacher_id.to_string(),
                teacher_name: teacher.map(|t| t.full_name.clone()).unwrap_or_default(),
                teacher_code: teacher.map(|t| t.code.clone()).unwrap_or_default(),
                contract_type: teacher
                    .and_then(|t| t.contract_type.clone())
                    .unwrap_or_else(|| "Chưa phân loại".to_string()),
                month,
                year,
                total_sessions: saved.total_sessions,
                salary_per_session: saved.salary_per_session,
                total_salary: saved.total_salary,
                total_allowance: saved.total_allowance,
                total_hours: saved.total_hours,
                total_minutes: saved.total_minutes,
                status: "paid".to_string(),
                session_ids: Vec::new(),
            },
        );
    }

    let mut minutes: HashMap<String, i64> = HashMap::new();

    for session in sessions {
        if session.date.month() != month || session.date.year() != year {
            continue;
        }
        if session.teacher_id.is_empty() {
            continue;
        }
        let key = billing_key(&session.teacher_id, month, year);
        if payrolls.get(&key).is_some_and(|p| p.status == "paid") {
            continue;
        }
        let Some(teacher) = teachers.iter().find(|t| t.id == session.teacher_id) else {
            warn!(teacher_id = %session.teacher_id, session_id = %session.id, "session for unknown teacher");
            continue;
        };

        let payroll = payrolls.entry(key.clone()).or_insert_with(|| {
            let status = statuses
                .get(&key)
                .map(|s| s.status.clone())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "unpaid".to_string());
            TeacherPayroll {
                id: key.clone(),
                teacher_id: teacher.id.clone(),
                teacher_name: teacher.full_name.clone(),
                teacher_code: teacher.code.clone(),
                contract_type: teacher
                    .contract_type
                    .clone()
                    .unwrap_or_else(|| "Chưa phân loại".to_string()),
                month,
                year,
                total_sessions: 0,
                salary_per_session: teacher.salary_per_session,
                total_salary: 0,
                total_allowance: 0,
                total_hours: 0,
                total_minutes: 0,
                status,
                session_ids: Vec::new(),
            }
        });
        payroll.total_sessions += 1;
        payroll.total_salary += teacher.salary_per_session;
        payroll.total_allowance += session.travel_allowance;
        payroll.session_ids.push(session.id.clone());

        let duration = (session.end_time - session.start_time).num_minutes().max(0);
        *minutes.entry(key).or_default() += duration;
    }

    for payroll in payrolls.values_mut() {
        if payroll.status != "paid" {
            let total = minutes.get(&payroll.id).copied().unwrap_or(0);
            payroll.total_hours = (total / 60) as u32;
            payroll.total_minutes = (total % 60) as u32;
        }
    }

    let mut result: Vec<TeacherPayroll> = payrolls.into_values().collect();
    result.sort_by(|a, b| a.teacher_code.cmp(&b.teacher_code).then(a.id.cmp(&b.id)));
    result
}

/// Splits `{subject_id}-{month}-{year}` from the right, since subject ids may
/// themselves contain dashes.
fn parse_billing_key(key: &str) -> Option<(&str, u32, i32)> {
    let (rest, year) = key.rsplit_once('-')?;
    let (subject_id, month) = rest.rsplit_once('-')?;
    Some((subject_id, month.parse().ok()?, year.parse().ok()?))
}
