use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Asia::Ho_Chi_Minh;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    AppState,
    attendance::{
        AttendanceCount, completed_sessions_in_month, count_for_class_date, find_session,
        scores_for_student,
    },
    auth::verify_token,
    error::ApiError,
    invoices::{
        StudentInvoice, TeacherPayroll, billing_key, compute_student_invoices,
        compute_teacher_payroll,
    },
    layout::{PositionedOccurrence, assign_columns},
    models::{
        AttendanceRecord, AttendanceSession, ClassDocument, DayOfWeek, InvoiceStatus, Occurrence,
        Room, SalaryStatus, ScoreDetail, StaffShift, hhmm, record_list,
    },
    schedule::{
        ChangePlan, ScheduleError, Scope, edit_occurrence_time, index_overrides, move_occurrence,
        resolve_occurrences_for_date, resolve_staff_shifts_for_date,
    },
    storage::document_path,
    validation::{validate_month, validate_monday, validate_time_range, validate_weeks},
};

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    #[serde(default = "default_weeks")]
    pub weeks: u8,
    pub start: Option<NaiveDate>,
    pub token: Option<String>,
}

fn default_weeks() -> u8 {
    1
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: u32,
    pub year: i32,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub month: u32,
    pub year: i32,
    pub teacher: Option<String>,
    pub token: Option<String>,
}

fn check_auth(
    state: &AppState,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    token: Option<&str>,
) -> Result<(), ApiError> {
    verify_token(&state.settings, auth.map(|TypedHeader(a)| a), token)
}

/// Monday of the current week in the center's timezone.
fn current_monday() -> NaiveDate {
    let today = Utc::now().with_timezone(&Ho_Chi_Minh).date_naive();
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

#[utoipa::path(get, path = "/", tag = "meta")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Tuition Center API",
        "endpoints": {
            "/schedule": "Resolved weekly schedule as JSON",
            "/schedule.ical": "Resolved schedule as an iCal file",
            "/rooms": "Room management",
            "/attendance/sessions": "Attendance sessions",
            "/invoices": "Student invoices per month",
            "/payroll": "Teacher payroll per month",
            "/documents": "Class document uploads"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "meta")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "meta")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// One resolved calendar day: positioned class occurrences plus the duty
/// shifts visible on that date.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub occurrences: Vec<PositionedOccurrence>,
    pub staff_shifts: Vec<StaffShift>,
}

fn resolve_days(state: &AppState, monday: NaiveDate, weeks: u8) -> Vec<DaySchedule> {
    let classes = state.store.classes().list();
    let overrides = index_overrides(state.store.overrides().list());
    let shifts = state.store.staff_shifts().list();

    (0..(weeks as i64 * 7))
        .map(|offset| monday + Duration::days(offset))
        .map(|date| DaySchedule {
            date,
            day_of_week: DayOfWeek::from_date(date),
            occurrences: assign_columns(&resolve_occurrences_for_date(date, &classes, &overrides)),
            staff_shifts: resolve_staff_shifts_for_date(date, &shifts),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/schedule",
    params(
        ("weeks" = u8, Query, description = "Number of weeks (1-6)"),
        ("start" = Option<String>, Query, description = "Week start date, must be a Monday (defaults to the current week)"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Resolved schedule per day", body = [DaySchedule]),
        (status = 400, description = "Invalid weeks or start date"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let weeks = validate_weeks(query.weeks)?;
    let monday = match query.start {
        Some(start) => validate_monday(start)?,
        None => current_monday(),
    };
    Ok(Json(resolve_days(&state, monday, weeks)))
}

#[utoipa::path(
    get,
    path = "/schedule.ical",
    params(
        ("weeks" = u8, Query, description = "Number of weeks (1-6)"),
        ("start" = Option<String>, Query, description = "Week start date, must be a Monday"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "No occurrences in the requested range")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn get_schedule_ical(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let weeks = validate_weeks(query.weeks)?;
    let monday = match query.start {
        Some(start) => validate_monday(start)?,
        None => current_monday(),
    };

    let occurrences: Vec<Occurrence> = resolve_days(&state, monday, weeks)
        .into_iter()
        .flat_map(|day| day.occurrences)
        .map(|p| p.occurrence)
        .collect();
    if occurrences.is_empty() {
        return Err(ApiError::NotFound("No occurrences found".into()));
    }

    let body = state.exporter.generate(&occurrences);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=tuition_schedule.ics",
            ),
        ],
        body,
    ))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub class_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub target_date: NaiveDate,
    pub scope: Scope,
    /// Pin to a specific occurrence when the class has several slots that day.
    pub schedule_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    pub message: String,
    pub deleted_overrides: usize,
}

/// The occurrence a change request points at, resolved from current state.
fn find_occurrence(
    state: &AppState,
    class_id: &str,
    date: NaiveDate,
    schedule_id: Option<&str>,
) -> Result<(crate::models::ClassRecord, crate::schedule::OverrideMap, Occurrence), ApiError> {
    let classes = state.store.classes().list();
    let class = classes
        .iter()
        .find(|c| c.id == class_id)
        .cloned()
        .ok_or_else(|| ScheduleError::ClassNotFound(class_id.to_string()))?;
    let overrides = index_overrides(state.store.overrides().list());

    let occurrence = resolve_occurrences_for_date(date, &classes, &overrides)
        .into_iter()
        .filter(|o| o.class_id == class_id)
        .find(|o| match schedule_id {
            Some(id) => o.schedule_id.as_deref() == Some(id),
            None => true,
        })
        .ok_or_else(|| ScheduleError::OccurrenceNotFound {
            class_id: class_id.to_string(),
            date,
        })?;

    Ok((class, overrides, occurrence))
}

fn apply_plan(state: &AppState, plan: ChangePlan) -> usize {
    if let Some(class) = plan.updated_class {
        let id = class.id.clone();
        state.store.classes().set(&id, class);
    }
    let deleted = plan.deleted_override_ids.len();
    for id in &plan.deleted_override_ids {
        state.store.overrides().remove(id);
    }
    if let Some(entry) = plan.upserted_override {
        if entry.id.is_empty() {
            state.store.overrides().push(entry);
        } else {
            let id = entry.id.clone();
            state.store.overrides().set(&id, entry);
        }
    }
    deleted
}

#[utoipa::path(
    post,
    path = "/schedule/move",
    request_body = MoveRequest,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "Occurrence moved", body = ChangeResponse),
        (status = 400, description = "No matching recurring slot"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Class or occurrence not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn move_schedule(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;

    if request.target_date == request.date {
        return Ok(Json(ChangeResponse {
            message: "Target date equals source date, nothing to do".to_string(),
            deleted_overrides: 0,
        }));
    }

    let (class, overrides, occurrence) = find_occurrence(
        &state,
        &request.class_id,
        request.date,
        request.schedule_id.as_deref(),
    )?;
    let plan = move_occurrence(&class, &overrides, &occurrence, request.target_date, request.scope)?;
    let deleted = apply_plan(&state, plan);

    let message = match request.scope {
        Scope::AllWeeks => format!(
            "Moved {} from {} to {} for all weeks",
            class.code,
            occurrence.day_of_week.name(),
            DayOfWeek::from_date(request.target_date).name()
        ),
        Scope::ThisDateOnly => format!(
            "Moved {} from {} to {}",
            class.code, request.date, request.target_date
        ),
    };
    Ok(Json(ChangeResponse {
        message,
        deleted_overrides: deleted,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub class_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "15:00")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "16:30")]
    pub end_time: NaiveTime,
    pub room_id: Option<String>,
    pub note: Option<String>,
    pub scope: Scope,
    pub schedule_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/schedule/edit",
    request_body = EditRequest,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "Occurrence times changed", body = ChangeResponse),
        (status = 400, description = "Invalid time range or no matching slot"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Class or occurrence not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn edit_schedule(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<EditRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    validate_time_range(request.start_time, request.end_time)?;

    let (class, overrides, occurrence) = find_occurrence(
        &state,
        &request.class_id,
        request.date,
        request.schedule_id.as_deref(),
    )?;
    let plan = edit_occurrence_time(
        &class,
        &overrides,
        &occurrence,
        request.start_time,
        request.end_time,
        request.room_id,
        request.note,
        request.scope,
    )?;
    let deleted = apply_plan(&state, plan);

    Ok(Json(ChangeResponse {
        message: format!("Updated times for {} on {}", class.code, request.date),
        deleted_overrides: deleted,
    }))
}

#[utoipa::path(
    delete,
    path = "/schedule/overrides/{id}",
    params(
        ("id" = String, Path, description = "Override id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Override removed, recurring pattern restored"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Override not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn delete_override(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    if !state.store.overrides().remove(&id) {
        return Err(ScheduleError::OverrideNotFound(id).into());
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[utoipa::path(
    get,
    path = "/rooms",
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "All rooms", body = [Room]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "rooms"
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let mut rooms = state.store.rooms().list();
    rooms.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(rooms))
}

#[utoipa::path(
    post,
    path = "/rooms",
    request_body = Room,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "rooms"
)]
pub async fn create_room(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(room): Json<Room>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    if room.name.trim().is_empty() {
        return Err(ApiError::BadRequest("room name is required".into()));
    }
    let stored = state.store.rooms().push(room);
    Ok((StatusCode::CREATED, Json(stored)))
}

#[utoipa::path(
    put,
    path = "/rooms/{id}",
    request_body = Room,
    params(
        ("id" = String, Path, description = "Room id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Room updated", body = Room),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Room not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "rooms"
)]
pub async fn update_room(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
    Json(room): Json<Room>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    if state.store.rooms().get(&id).is_none() {
        return Err(ApiError::NotFound(format!("room not found: {id}")));
    }
    let stored = state.store.rooms().set(&id, room);
    Ok(Json(stored))
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    params(
        ("id" = String, Path, description = "Room id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Room deleted"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Room not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "rooms"
)]
pub async fn delete_room(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    if !state.store.rooms().remove(&id) {
        return Err(ApiError::NotFound(format!("room not found: {id}")));
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[utoipa::path(
    get,
    path = "/attendance/sessions",
    params(
        ("month" = u32, Query, description = "Month (1-12)"),
        ("year" = i32, Query, description = "Year"),
        ("teacher" = Option<String>, Query, description = "Restrict to one teacher (id or name)"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Completed sessions in the month", body = [AttendanceSession]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let month = validate_month(query.month)?;
    let sessions = state.store.sessions().list();
    let matched: Vec<AttendanceSession> =
        completed_sessions_in_month(&sessions, month, query.year, query.teacher.as_deref())
            .into_iter()
            .cloned()
            .collect();
    Ok(Json(matched))
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub date: NaiveDate,
    pub token: Option<String>,
}

/// Headcount for one resolved occurrence on the requested date.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceCount {
    pub class_id: String,
    pub class_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(flatten)]
    pub count: AttendanceCount,
}

#[utoipa::path(
    get,
    path = "/attendance/counts",
    params(
        ("date" = String, Query, description = "Calendar date"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Present/total per occurrence on the date", body = [OccurrenceCount]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn attendance_counts(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;

    let classes = state.store.classes().list();
    let overrides = index_overrides(state.store.overrides().list());
    let sessions = state.store.sessions().list();

    let counts: Vec<OccurrenceCount> = resolve_occurrences_for_date(query.date, &classes, &overrides)
        .into_iter()
        .filter_map(|occurrence| {
            let class = classes.iter().find(|c| c.id == occurrence.class_id)?;
            Some(OccurrenceCount {
                class_id: occurrence.class_id.clone(),
                class_code: occurrence.class_code.clone(),
                schedule_id: occurrence.schedule_id.clone(),
                count: count_for_class_date(&sessions, class, query.date),
            })
        })
        .collect();
    Ok(Json(counts))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub class_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "14:00")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "15:30")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub travel_allowance: i64,
    #[serde(default, deserialize_with = "record_list::deserialize")]
    pub records: Vec<AttendanceRecord>,
}

#[utoipa::path(
    post,
    path = "/attendance/sessions",
    request_body = CreateSessionRequest,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "Session created or replaced", body = AttendanceSession),
        (status = 400, description = "Invalid time range"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn create_session(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    validate_time_range(request.start_time, request.end_time)?;

    let class = state
        .store
        .classes()
        .get(&request.class_id)
        .ok_or_else(|| ApiError::NotFound(format!("class not found: {}", request.class_id)))?;

    let session = AttendanceSession {
        id: String::new(),
        class_id: class.id.clone(),
        class_code: class.code.clone(),
        class_name: class.name.clone(),
        date: request.date,
        start_time: request.start_time,
        end_time: request.end_time,
        teacher_id: class.teacher_id.clone(),
        teacher_name: class.teacher_name.clone(),
        status: request.status.unwrap_or_else(|| "completed".to_string()),
        travel_allowance: request.travel_allowance,
        records: request.records,
    };

    // One session per class per date; taking attendance again replaces it.
    let sessions = state.store.sessions().list();
    let stored = match find_session(&sessions, &class, request.date) {
        Some(existing) => {
            let id = existing.id.clone();
            state.store.sessions().set(&id, session)
        }
        None => state.store.sessions().push(session),
    };
    Ok(Json(stored))
}

#[utoipa::path(
    delete,
    path = "/attendance/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Deletion outcome; deleting a missing session is a no-op"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let deleted = state.store.sessions().remove(&id);
    if !deleted {
        warn!(session_id = %id, "delete requested for a session that does not exist");
    }
    Ok(Json(serde_json::json!({"deleted": deleted})))
}

#[derive(Debug, Deserialize)]
pub struct StudentScoresQuery {
    pub student_id: String,
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/attendance/scores",
    params(
        ("student_id" = String, Query, description = "Student id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Test and manual scores for the student, oldest first", body = [ScoreDetail]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn get_student_scores(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<StudentScoresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let sessions = state.store.sessions().list();
    Ok(Json(scores_for_student(&sessions, &query.student_id)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScoresRequest {
    pub student_id: String,
    pub scores: Vec<ScoreDetail>,
}

#[utoipa::path(
    put,
    path = "/attendance/sessions/{id}/scores",
    request_body = UpdateScoresRequest,
    params(
        ("id" = String, Path, description = "Session id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Updated session", body = AttendanceSession),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Session or student record not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "attendance"
)]
pub async fn update_session_scores(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
    Json(request): Json<UpdateScoresRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;

    let mut session = state
        .store
        .sessions()
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {id}")))?;
    let record = session
        .records
        .iter_mut()
        .find(|r| r.student_id == request.student_id)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "student {} has no record in session {id}",
                request.student_id
            ))
        })?;

    // The client sends the full list; an empty one clears the scores.
    record.score_details = request.scores;
    Ok(Json(state.store.sessions().set(&id, session)))
}

#[utoipa::path(
    get,
    path = "/invoices",
    params(
        ("month" = u32, Query, description = "Month (1-12)"),
        ("year" = i32, Query, description = "Year"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Student invoices for the month", body = [StudentInvoice]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "billing"
)]
pub async fn get_invoices(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let month = validate_month(query.month)?;
    let invoices = compute_student_invoices(
        month,
        query.year,
        &state.store.sessions().list(),
        &state.store.students().list(),
        &state.store.classes().list(),
        &state.store.courses().list(),
        &state.store.overrides().list(),
        &state.store.invoice_statuses(),
    );
    Ok(Json(invoices))
}

#[utoipa::path(
    get,
    path = "/payroll",
    params(
        ("month" = u32, Query, description = "Month (1-12)"),
        ("year" = i32, Query, description = "Year"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Teacher payroll records for the month", body = [TeacherPayroll]),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "billing"
)]
pub async fn get_payroll(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let month = validate_month(query.month)?;
    let payroll = compute_teacher_payroll(
        month,
        query.year,
        &state.store.sessions().list(),
        &state.store.teachers().list(),
        &state.store.salary_statuses(),
    );
    Ok(Json(payroll))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceStatusRequest {
    pub student_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(flatten)]
    pub status: InvoiceStatus,
}

#[utoipa::path(
    put,
    path = "/invoices/status",
    request_body = UpdateInvoiceStatusRequest,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "Saved billing state for the (student, month, year) key"),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "billing"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<UpdateInvoiceStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let month = validate_month(request.month)?;
    let key = billing_key(&request.student_id, month, request.year);
    state.store.set_invoice_status(&key, request.status);
    Ok(Json(serde_json::json!({"saved": true})))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalaryStatusRequest {
    pub teacher_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(flatten)]
    pub status: SalaryStatus,
}

#[utoipa::path(
    put,
    path = "/payroll/status",
    request_body = UpdateSalaryStatusRequest,
    params(("token" = Option<String>, Query, description = "Authentication token")),
    responses(
        (status = 200, description = "Saved payroll state for the (teacher, month, year) key"),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "billing"
)]
pub async fn update_salary_status(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Json(request): Json<UpdateSalaryStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let month = validate_month(request.month)?;
    let key = billing_key(&request.teacher_id, month, request.year);
    state.store.set_salary_status(&key, request.status);
    Ok(Json(serde_json::json!({"saved": true})))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub class_id: String,
    pub file_name: String,
    pub token: Option<String>,
}

#[utoipa::path(
    post,
    path = "/documents",
    params(
        ("class_id" = String, Query, description = "Class the document belongs to"),
        ("file_name" = String, Query, description = "Original file name"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Document uploaded", body = ClassDocument),
        (status = 400, description = "Empty body or missing file name"),
        (status = 401, description = "Invalid authentication token"),
        (status = 500, description = "Storage upload failed")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "documents"
)]
pub async fn upload_document(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    if query.file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("file_name is required".into()));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is empty".into()));
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let path = document_path(&query.class_id, &query.file_name);
    let url = state
        .storage
        .upload(body.to_vec(), &path, content_type)
        .await?;

    let document = state.store.documents().push(ClassDocument {
        id: String::new(),
        class_id: query.class_id,
        file_name: query.file_name,
        storage_path: path,
        url: url.to_string(),
        uploaded_on: Utc::now().with_timezone(&Ho_Chi_Minh).date_naive(),
    });
    Ok((StatusCode::CREATED, Json(document)))
}

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub class_id: Option<String>,
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/documents",
    params(
        ("class_id" = Option<String>, Query, description = "Restrict to one class"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Uploaded documents", body = [ClassDocument]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "documents"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<DocumentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let mut documents = state.store.documents().list();
    if let Some(class_id) = &query.class_id {
        documents.retain(|d| &d.class_id == class_id);
    }
    documents.sort_by(|a, b| a.uploaded_on.cmp(&b.uploaded_on).then(a.file_name.cmp(&b.file_name)));
    Ok(Json(documents))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(
        ("id" = String, Path, description = "Document id"),
        ("token" = Option<String>, Query, description = "Authentication token")
    ),
    responses(
        (status = 200, description = "Document removed; cdnDeleted reports the blob deletion outcome"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Document not found")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<AuthQuery>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    check_auth(&state, auth, query.token.as_deref())?;
    let document = state
        .store
        .documents()
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("document not found: {id}")))?;

    // The record goes regardless; a dangling blob is preferable to a record
    // pointing at a blob we failed to verify.
    let cdn_deleted = state.storage.delete(&document.storage_path).await;
    state.store.documents().remove(&id);
    Ok(Json(serde_json::json!({"deleted": true, "cdnDeleted": cdn_deleted})))
}
