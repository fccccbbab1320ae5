use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub total_lectures: u32,
    pub attended_lectures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absent_lectures: Option<u32>,
    pub minimum_attendance: f64,
    pub color: String,
}

impl Subject {
    // The mirror never holds attended > total, even if a confirmed entity
    // arrives malformed.
    fn clamped(mut self) -> Self {
        if self.attended_lectures > self.total_lectures {
            self.attended_lectures = self.total_lectures;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: String,
    pub day: String,
    pub subject_id: String,
    pub subject_name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub date: String,
    pub subject_id: String,
    pub subject_name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semester_end: Option<String>,
    // Kept nullable on the wire: an explicit null means "use the computed
    // average", a number is the college-reported figure that supersedes it.
    pub current_overall_attendance: Option<f64>,
    pub overall_minimum_attendance: f64,
}

/// Counter block the backend returns alongside a confirmed attendance mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCounters {
    pub subject_id: String,
    pub total_lectures: u32,
    pub attended_lectures: u32,
    pub absent_lectures: u32,
}

/// One bulk fetch worth of server truth: profile plus all three collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub profile: UserProfile,
    pub subjects: Vec<Subject>,
    pub timetable: Vec<TimetableEntry>,
    pub attendance: Vec<AttendanceRecord>,
}

/// Authoritative local mirror of the remote collections.
///
/// Mutations only ever apply entities the backend has already confirmed;
/// nothing here is speculative. Every applied mutation bumps `generation`,
/// which responses echo so callers can discard results that raced a later
/// mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore {
    profile: UserProfile,
    subjects: Vec<Subject>,
    timetable: Vec<TimetableEntry>,
    attendance: Vec<AttendanceRecord>,
    generation: u64,
}

impl EntityStore {
    pub fn from_snapshot(snap: Snapshot) -> Self {
        Self {
            profile: snap.profile,
            subjects: snap.subjects.into_iter().map(Subject::clamped).collect(),
            timetable: snap.timetable,
            attendance: snap.attendance,
            generation: 0,
        }
    }

    /// Wholesale replacement of all four collections (session refresh).
    pub fn replace_all(&mut self, snap: Snapshot) {
        self.profile = snap.profile;
        self.subjects = snap.subjects.into_iter().map(Subject::clamped).collect();
        self.timetable = snap.timetable;
        self.attendance = snap.attendance;
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn timetable(&self) -> &[TimetableEntry] {
        &self.timetable
    }

    pub fn attendance(&self) -> &[AttendanceRecord] {
        &self.attendance
    }

    pub fn subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn entry(&self, id: &str) -> Option<&TimetableEntry> {
        self.timetable.iter().find(|e| e.id == id)
    }

    pub fn attendance_for_date(&self, date: &str) -> Vec<&AttendanceRecord> {
        self.attendance.iter().filter(|r| r.date == date).collect()
    }

    pub fn apply_profile(&mut self, profile: UserProfile) {
        self.profile = profile;
        self.generation += 1;
    }

    pub fn apply_subject_created(&mut self, subject: Subject) {
        self.subjects.push(subject.clamped());
        self.generation += 1;
    }

    /// Replaces the matching subject wholesale with the confirmed entity.
    /// Returns false (store untouched) when the id is unknown.
    pub fn apply_subject_updated(&mut self, subject: Subject) -> bool {
        let Some(slot) = self.subjects.iter_mut().find(|s| s.id == subject.id) else {
            return false;
        };
        *slot = subject.clamped();
        self.generation += 1;
        true
    }

    /// Removes the subject and everything that references it. The cascade and
    /// the removal happen inside this one call; no observer sees an orphaned
    /// timetable entry or attendance record.
    pub fn apply_subject_deleted(&mut self, id: &str) -> bool {
        let before = self.subjects.len();
        self.subjects.retain(|s| s.id != id);
        if self.subjects.len() == before {
            return false;
        }
        self.timetable.retain(|e| e.subject_id != id);
        self.attendance.retain(|r| r.subject_id != id);
        self.generation += 1;
        true
    }

    pub fn apply_entry_created(&mut self, entry: TimetableEntry) {
        self.timetable.push(entry);
        self.generation += 1;
    }

    pub fn apply_entry_updated(&mut self, entry: TimetableEntry) -> bool {
        let Some(slot) = self.timetable.iter_mut().find(|e| e.id == entry.id) else {
            return false;
        };
        *slot = entry;
        self.generation += 1;
        true
    }

    pub fn apply_entry_deleted(&mut self, id: &str) -> bool {
        let before = self.timetable.len();
        self.timetable.retain(|e| e.id != id);
        if self.timetable.len() == before {
            return false;
        }
        self.generation += 1;
        true
    }

    /// Applies a confirmed attendance mark: upsert by (date, subjectId), then
    /// merge the refreshed counters into the matching subject. Both pieces of
    /// server-returned data land in this one call, so callers observe the
    /// mark and the counter change as a single transition.
    pub fn apply_attendance_marked(
        &mut self,
        record: AttendanceRecord,
        counters: Option<SubjectCounters>,
    ) {
        match self
            .attendance
            .iter_mut()
            .find(|r| r.date == record.date && r.subject_id == record.subject_id)
        {
            Some(slot) => *slot = record,
            None => self.attendance.push(record),
        }
        if let Some(c) = counters {
            if let Some(subject) = self.subjects.iter_mut().find(|s| s.id == c.subject_id) {
                subject.total_lectures = c.total_lectures;
                subject.attended_lectures = c.attended_lectures.min(c.total_lectures);
                subject.absent_lectures = Some(c.absent_lectures);
            }
        }
        self.generation += 1;
    }
}
