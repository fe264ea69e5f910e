use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::attendance::AttendanceCount;
use crate::handlers::{
    ChangeResponse, CreateSessionRequest, DaySchedule, EditRequest, MoveRequest, OccurrenceCount,
    UpdateInvoiceStatusRequest, UpdateSalaryStatusRequest, UpdateScoresRequest,
};
use crate::invoices::{StudentInvoice, TeacherPayroll};
use crate::layout::PositionedOccurrence;
use crate::models::{
    AttendanceRecord, AttendanceSession, ClassDocument, ClassRecord, Course, DayOfWeek,
    InvoiceStatus, Occurrence, RecurringSlot, Room, SalaryStatus, ScoreDetail, StaffShift, Student,
    Teacher, TimetableOverride,
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "query_token",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::get_schedule,
        crate::handlers::get_schedule_ical,
        crate::handlers::move_schedule,
        crate::handlers::edit_schedule,
        crate::handlers::delete_override,
        crate::handlers::list_rooms,
        crate::handlers::create_room,
        crate::handlers::update_room,
        crate::handlers::delete_room,
        crate::handlers::attendance_counts,
        crate::handlers::list_sessions,
        crate::handlers::create_session,
        crate::handlers::delete_session,
        crate::handlers::get_student_scores,
        crate::handlers::update_session_scores,
        crate::handlers::get_invoices,
        crate::handlers::update_invoice_status,
        crate::handlers::get_payroll,
        crate::handlers::update_salary_status,
        crate::handlers::upload_document,
        crate::handlers::list_documents,
        crate::handlers::delete_document
    ),
    components(schemas(
        DayOfWeek,
        RecurringSlot,
        ClassRecord,
        TimetableOverride,
        StaffShift,
        Room,
        Student,
        Teacher,
        Course,
        AttendanceRecord,
        ScoreDetail,
        AttendanceSession,
        ClassDocument,
        InvoiceStatus,
        SalaryStatus,
        Occurrence,
        PositionedOccurrence,
        DaySchedule,
        MoveRequest,
        EditRequest,
        ChangeResponse,
        CreateSessionRequest,
        UpdateScoresRequest,
        AttendanceCount,
        OccurrenceCount,
        UpdateInvoiceStatusRequest,
        UpdateSalaryStatusRequest,
        StudentInvoice,
        TeacherPayroll
    )),
    tags(
        (name = "meta", description = "Service metadata and health probes"),
        (name = "schedule", description = "Weekly schedule resolution, moves and edits"),
        (name = "rooms", description = "Room management"),
        (name = "attendance", description = "Attendance session management"),
        (name = "billing", description = "Monthly invoices and payroll"),
        (name = "documents", description = "Class document storage")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;
