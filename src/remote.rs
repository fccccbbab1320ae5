use std::fmt;

use crate::store::{
    AttendanceRecord, AttendanceStatus, Snapshot, Subject, SubjectCounters, TimetableEntry,
    UserProfile,
};

/// Failure surface of the remote collaborator. Anything that comes back as
/// an error here leaves the local mirror untouched; the handler layer maps
/// the variants onto wire error codes.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The mutation target does not exist remotely.
    NotFound(String),
    /// The backend refused the request (bad credentials, duplicate email, ...).
    Rejected(String),
    /// The presented credential is no longer valid. Ends the session.
    StaleSession,
    /// Transport or backend failure; carries the server message when one exists.
    Unavailable(String),
}

impl RemoteError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Rejected(_) => "remote_rejected",
            Self::StaleSession => "stale_session",
            Self::Unavailable(_) => "remote_failed",
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{what} not found"),
            Self::Rejected(message) => f.write_str(message),
            Self::StaleSession => f.write_str("session expired; sign in again"),
            Self::Unavailable(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug, Clone)]
pub struct RegisterDraft {
    pub name: String,
    pub email: String,
    pub password: String,
    pub college: Option<String>,
}

/// Confirmed login: the credential to present on every later call. The
/// profile itself arrives with the bulk fetch that follows.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct SubjectDraft {
    pub name: String,
    pub total_lectures: u32,
    pub attended_lectures: u32,
    pub minimum_attendance: f64,
    pub color: String,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub total_lectures: Option<u32>,
    pub attended_lectures: Option<u32>,
    pub minimum_attendance: Option<f64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub day: String,
    pub subject_id: String,
    pub subject_name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub day: Option<String>,
    /// Paired: a new subject reference always arrives with its resolved name.
    pub subject: Option<(String, String)>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceDraft {
    pub date: String,
    pub subject_id: String,
    pub subject_name: String,
    pub status: AttendanceStatus,
}

/// What a confirmed attendance mark carries back: the record itself and,
/// when the marking moved the counters, the refreshed subject numbers.
#[derive(Debug, Clone)]
pub struct MarkOutcome {
    pub record: AttendanceRecord,
    pub subject: Option<SubjectCounters>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub college: Option<String>,
    pub semester_start: Option<String>,
    pub semester_end: Option<String>,
    /// Outer None: leave as is. Some(None): clear the college-reported
    /// override. Some(Some(v)): set it.
    pub current_overall_attendance: Option<Option<f64>>,
    pub overall_minimum_attendance: Option<f64>,
}

/// The remote source of truth. Every mutation accepts a partial intent and
/// returns the full confirmed entity; the caller applies only what comes
/// back. All calls carry the session credential except the account ones
/// that establish it.
pub trait RemoteBackend {
    fn register(&mut self, draft: &RegisterDraft) -> Result<(), RemoteError>;
    fn login(&mut self, email: &str, password: &str) -> Result<LoginGrant, RemoteError>;
    fn restore(&mut self, token: &str) -> Result<UserProfile, RemoteError>;
    fn logout(&mut self, token: &str) -> Result<(), RemoteError>;

    /// Bulk fetch of profile + subjects + timetable + attendance.
    fn fetch_all(&mut self, token: &str) -> Result<Snapshot, RemoteError>;

    fn create_subject(&mut self, token: &str, draft: &SubjectDraft)
        -> Result<Subject, RemoteError>;
    fn update_subject(
        &mut self,
        token: &str,
        id: &str,
        patch: &SubjectPatch,
    ) -> Result<Subject, RemoteError>;
    fn delete_subject(&mut self, token: &str, id: &str) -> Result<(), RemoteError>;

    fn create_entry(&mut self, token: &str, draft: &EntryDraft)
        -> Result<TimetableEntry, RemoteError>;
    fn update_entry(
        &mut self,
        token: &str,
        id: &str,
        patch: &EntryPatch,
    ) -> Result<TimetableEntry, RemoteError>;
    fn delete_entry(&mut self, token: &str, id: &str) -> Result<(), RemoteError>;

    fn mark_attendance(
        &mut self,
        token: &str,
        draft: &AttendanceDraft,
    ) -> Result<MarkOutcome, RemoteError>;

    fn update_profile(
        &mut self,
        token: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, RemoteError>;
}
