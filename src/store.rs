use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AttendanceSession, ClassDocument, ClassRecord, Course, InvoiceStatus, Room, SalaryStatus,
    StaffShift, Student, Teacher, TimetableOverride,
};

/// Top-level datasheet collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Classes,
    TimetableOverrides,
    StaffShifts,
    Rooms,
    AttendanceSessions,
    Students,
    Teachers,
    Courses,
    Documents,
    InvoiceStatuses,
    SalaryStatuses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upserted,
    Removed,
}

/// Pushed to subscribers after every committed write. Carries the id only;
/// subscribers re-read the collection for current state.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: String,
}

/// A live subscription to one collection. Dropping it unsubscribes.
pub struct Subscription {
    collection: Collection,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next change in the subscribed collection. `None` once the store is
    /// gone or the subscriber lagged past the channel capacity.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.collection == self.collection => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscription lagged, continuing from current position");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub trait Record: Clone {
    const COLLECTION: Collection;
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

macro_rules! impl_record {
    ($type:ty, $collection:expr) => {
        impl Record for $type {
            const COLLECTION: Collection = $collection;
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

impl_record!(ClassRecord, Collection::Classes);
impl_record!(TimetableOverride, Collection::TimetableOverrides);
impl_record!(StaffShift, Collection::StaffShifts);
impl_record!(Room, Collection::Rooms);
impl_record!(AttendanceSession, Collection::AttendanceSessions);
impl_record!(Student, Collection::Students);
impl_record!(Teacher, Collection::Teachers);
impl_record!(Course, Collection::Courses);
impl_record!(ClassDocument, Collection::Documents);

struct Table<T> {
    rows: RwLock<HashMap<String, T>>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

/// Typed handle to one collection. All writes are last-write-wins and
/// broadcast a change event; there is no conflict detection.
pub struct TableRef<'a, T: Record> {
    table: &'a Table<T>,
    events: &'a broadcast::Sender<ChangeEvent>,
}

impl<T: Record> TableRef<'_, T> {
    pub fn list(&self) -> Vec<T> {
        self.table
            .rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.table
            .rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Inserts with a server-generated id, returning the stored record.
    pub fn push(&self, mut record: T) -> T {
        let id = Uuid::new_v4().to_string();
        record.set_id(id.clone());
        self.table
            .rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), record.clone());
        self.publish(ChangeKind::Upserted, id);
        record
    }

    pub fn set(&self, id: &str, mut record: T) -> T {
        record.set_id(id.to_string());
        self.table
            .rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), record.clone());
        self.publish(ChangeKind::Upserted, id.to_string());
        record
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .table
            .rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some();
        if removed {
            self.publish(ChangeKind::Removed, id.to_string());
        }
        removed
    }

    fn publish(&self, kind: ChangeKind, id: String) {
        // Nobody listening is fine; writes are fire-and-forget.
        let _ = self.events.send(ChangeEvent {
            collection: T::COLLECTION,
            kind,
            id,
        });
    }
}

/// In-memory document store backing the API. Collections are independent
/// keyed maps; billing statuses are keyed by their composite
/// `{subject}-{month}-{year}` key rather than a generated id.
pub struct Datasheet {
    classes: Table<ClassRecord>,
    overrides: Table<TimetableOverride>,
    staff_shifts: Table<StaffShift>,
    rooms: Table<Room>,
    sessions: Table<AttendanceSession>,
    students: Table<Student>,
    teachers: Table<Teacher>,
    courses: Table<Course>,
    documents: Table<ClassDocument>,
    invoice_statuses: RwLock<HashMap<String, InvoiceStatus>>,
    salary_statuses: RwLock<HashMap<String, SalaryStatus>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Default for Datasheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Datasheet {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            classes: Table::new(),
            overrides: Table::new(),
            staff_shifts: Table::new(),
            rooms: Table::new(),
            sessions: Table::new(),
            students: Table::new(),
            teachers: Table::new(),
            courses: Table::new(),
            documents: Table::new(),
            invoice_statuses: RwLock::new(HashMap::new()),
            salary_statuses: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self, collection: Collection) -> Subscription {
        Subscription {
            collection,
            receiver: self.events.subscribe(),
        }
    }

    pub fn classes(&self) -> TableRef<'_, ClassRecord> {
        self.table_ref(&self.classes)
    }

    pub fn overrides(&self) -> TableRef<'_, TimetableOverride> {
        self.table_ref(&self.overrides)
    }

    pub fn staff_shifts(&self) -> TableRef<'_, StaffShift> {
        self.table_ref(&self.staff_shifts)
    }

    pub fn rooms(&self) -> TableRef<'_, Room> {
        self.table_ref(&self.rooms)
    }

    pub fn sessions(&self) -> TableRef<'_, AttendanceSession> {
        self.table_ref(&self.sessions)
    }

    pub fn students(&self) -> TableRef<'_, Student> {
        self.table_ref(&self.students)
    }

    pub fn teachers(&self) -> TableRef<'_, Teacher> {
        self.table_ref(&self.teachers)
    }

    pub fn courses(&self) -> TableRef<'_, Course> {
        self.table_ref(&self.courses)
    }

    pub fn documents(&self) -> TableRef<'_, ClassDocument> {
        self.table_ref(&self.documents)
    }

    fn table_ref<'a, T: Record>(&'a self, table: &'a Table<T>) -> TableRef<'a, T> {
        TableRef {
            table,
            events: &self.events,
        }
    }

    pub fn invoice_statuses(&self) -> HashMap<String, InvoiceStatus> {
        self.invoice_statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_invoice_status(&self, key: &str, status: InvoiceStatus) {
        self.invoice_statuses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), status);
        let _ = self.events.send(ChangeEvent {
            collection: Collection::InvoiceStatuses,
            kind: ChangeKind::Upserted,
            id: key.to_string(),
        });
    }

    pub fn salary_statuses(&self) -> HashMap<String, SalaryStatus> {
        self.salary_statuses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_salary_status(&self, key: &str, status: SalaryStatus) {
        self.salary_statuses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), status);
        let _ = self.events.send(ChangeEvent {
            collection: Collection::SalaryStatuses,
            kind: ChangeKind::Upserted,
            id: key.to_string(),
        });
    }
}
