use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::remote::{
    AttendanceDraft, EntryDraft, EntryPatch, LoginGrant, MarkOutcome, ProfilePatch, RegisterDraft,
    RemoteBackend, RemoteError, SubjectDraft, SubjectPatch,
};
use crate::store::{
    AttendanceRecord, AttendanceStatus, Snapshot, Subject, SubjectCounters, TimetableEntry,
    UserProfile,
};

/// Reference implementation of the remote collaborator: a sqlite file that
/// plays the backend's part. It assigns identities, owns the
/// attendance-marking counter transition, and cascades subject deletes.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join("bunkd.sqlite3"))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                name TEXT NOT NULL,
                college TEXT,
                semester_start TEXT,
                semester_end TEXT,
                current_overall_attendance REAL,
                overall_minimum_attendance REAL NOT NULL DEFAULT 75
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions(
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS subjects(
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                total_lectures INTEGER NOT NULL,
                attended_lectures INTEGER NOT NULL,
                minimum_attendance REAL NOT NULL,
                color TEXT NOT NULL,
                sort_order INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_subjects_user ON subjects(user_id, sort_order)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS timetable_entries(
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                day TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id),
                FOREIGN KEY(subject_id) REFERENCES subjects(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_timetable_user ON timetable_entries(user_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS attendance_records(
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                status TEXT NOT NULL,
                UNIQUE(user_id, date, subject_id),
                FOREIGN KEY(user_id) REFERENCES users(id),
                FOREIGN KEY(subject_id) REFERENCES subjects(id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_attendance_user ON attendance_records(user_id, date)",
            [],
        )?;

        Ok(Self { conn })
    }

    fn user_for_token(&self, token: &str) -> Result<String, RemoteError> {
        self.conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?",
                [token],
                |r| r.get::<_, String>(0),
            )
            .optional()
            .map_err(db_err)?
            .ok_or(RemoteError::StaleSession)
    }

    fn load_profile(&self, user_id: &str) -> Result<UserProfile, RemoteError> {
        self.conn
            .query_row(
                "SELECT name, email, college, semester_start, semester_end,
                        current_overall_attendance, overall_minimum_attendance
                 FROM users WHERE id = ?",
                [user_id],
                |r| {
                    Ok(UserProfile {
                        name: r.get(0)?,
                        email: r.get(1)?,
                        college: r.get(2)?,
                        semester_start: r.get(3)?,
                        semester_end: r.get(4)?,
                        current_overall_attendance: r.get(5)?,
                        overall_minimum_attendance: r.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| RemoteError::NotFound("account".to_string()))
    }

    fn load_subject(&self, user_id: &str, id: &str) -> Result<Option<Subject>, RemoteError> {
        self.conn
            .query_row(
                "SELECT id, name, total_lectures, attended_lectures, minimum_attendance, color
                 FROM subjects WHERE user_id = ? AND id = ?",
                (user_id, id),
                subject_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>, RemoteError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, total_lectures, attended_lectures, minimum_attendance, color
                 FROM subjects WHERE user_id = ? ORDER BY sort_order",
            )
            .map_err(db_err)?;
        stmt.query_map([user_id], subject_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)
    }

    fn list_entries(&self, user_id: &str) -> Result<Vec<TimetableEntry>, RemoteError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, day, subject_id, subject_name, start_time, end_time
                 FROM timetable_entries WHERE user_id = ? ORDER BY day, start_time",
            )
            .map_err(db_err)?;
        stmt.query_map([user_id], entry_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)
    }

    fn list_attendance(&self, user_id: &str) -> Result<Vec<AttendanceRecord>, RemoteError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, date, subject_id, subject_name, status
                 FROM attendance_records WHERE user_id = ? ORDER BY date, subject_name",
            )
            .map_err(db_err)?;
        stmt.query_map([user_id], record_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> RemoteError {
    RemoteError::Unavailable(e.to_string())
}

fn subject_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    let total = r.get::<_, i64>(2)?.max(0) as u32;
    let attended = r.get::<_, i64>(3)?.max(0) as u32;
    Ok(Subject {
        id: r.get(0)?,
        name: r.get(1)?,
        total_lectures: total,
        attended_lectures: attended,
        absent_lectures: Some(total.saturating_sub(attended)),
        minimum_attendance: r.get(4)?,
        color: r.get(5)?,
    })
}

fn entry_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<TimetableEntry> {
    Ok(TimetableEntry {
        id: r.get(0)?,
        day: r.get(1)?,
        subject_id: r.get(2)?,
        subject_name: r.get(3)?,
        start_time: r.get(4)?,
        end_time: r.get(5)?,
    })
}

fn record_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let raw: String = r.get(4)?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        date: r.get(1)?,
        subject_id: r.get(2)?,
        subject_name: r.get(3)?,
        status: AttendanceStatus::parse(&raw).unwrap_or(AttendanceStatus::Absent),
    })
}

impl RemoteBackend for SqliteBackend {
    fn register(&mut self, draft: &RegisterDraft) -> Result<(), RemoteError> {
        let taken: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM users WHERE email = ?", [&draft.email], |r| {
                r.get(0)
            })
            .optional()
            .map_err(db_err)?;
        if taken.is_some() {
            return Err(RemoteError::Rejected(
                "an account with this email already exists".to_string(),
            ));
        }

        let user_id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO users(id, email, password, name, college) VALUES(?, ?, ?, ?, ?)",
                (
                    &user_id,
                    &draft.email,
                    &draft.password,
                    &draft.name,
                    &draft.college,
                ),
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn login(&mut self, email: &str, password: &str) -> Result<LoginGrant, RemoteError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, password FROM users WHERE email = ?",
                [email],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;
        let Some((user_id, stored)) = row else {
            return Err(RemoteError::Rejected("invalid email or password".to_string()));
        };
        if stored != password {
            return Err(RemoteError::Rejected("invalid email or password".to_string()));
        }

        let token = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO sessions(token, user_id) VALUES(?, ?)",
                (&token, &user_id),
            )
            .map_err(db_err)?;
        Ok(LoginGrant { token })
    }

    fn restore(&mut self, token: &str) -> Result<UserProfile, RemoteError> {
        let user_id = self.user_for_token(token)?;
        self.load_profile(&user_id)
    }

    fn logout(&mut self, token: &str) -> Result<(), RemoteError> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?", [token])
            .map_err(db_err)?;
        Ok(())
    }

    fn fetch_all(&mut self, token: &str) -> Result<Snapshot, RemoteError> {
        let user_id = self.user_for_token(token)?;
        Ok(Snapshot {
            profile: self.load_profile(&user_id)?,
            subjects: self.list_subjects(&user_id)?,
            timetable: self.list_entries(&user_id)?,
            attendance: self.list_attendance(&user_id)?,
        })
    }

    fn create_subject(
        &mut self,
        token: &str,
        draft: &SubjectDraft,
    ) -> Result<Subject, RemoteError> {
        let user_id = self.user_for_token(token)?;
        if draft.attended_lectures > draft.total_lectures {
            return Err(RemoteError::Rejected(
                "attended lectures cannot exceed total lectures".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let next_order: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM subjects WHERE user_id = ?",
                [&user_id],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        self.conn
            .execute(
                "INSERT INTO subjects(id, user_id, name, total_lectures, attended_lectures,
                                      minimum_attendance, color, sort_order)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &user_id,
                    &draft.name,
                    i64::from(draft.total_lectures),
                    i64::from(draft.attended_lectures),
                    draft.minimum_attendance,
                    &draft.color,
                    next_order,
                ),
            )
            .map_err(db_err)?;

        self.load_subject(&user_id, &id)?
            .ok_or_else(|| RemoteError::NotFound("subject".to_string()))
    }

    fn update_subject(
        &mut self,
        token: &str,
        id: &str,
        patch: &SubjectPatch,
    ) -> Result<Subject, RemoteError> {
        let user_id = self.user_for_token(token)?;
        let Some(existing) = self.load_subject(&user_id, id)? else {
            return Err(RemoteError::NotFound("subject".to_string()));
        };

        let name = patch.name.clone().unwrap_or(existing.name);
        let total = patch.total_lectures.unwrap_or(existing.total_lectures);
        let attended = patch.attended_lectures.unwrap_or(existing.attended_lectures);
        let minimum = patch.minimum_attendance.unwrap_or(existing.minimum_attendance);
        let color = patch.color.clone().unwrap_or(existing.color);
        if attended > total {
            return Err(RemoteError::Rejected(
                "attended lectures cannot exceed total lectures".to_string(),
            ));
        }

        self.conn
            .execute(
                "UPDATE subjects
                 SET name = ?, total_lectures = ?, attended_lectures = ?,
                     minimum_attendance = ?, color = ?
                 WHERE user_id = ? AND id = ?",
                (
                    &name,
                    i64::from(total),
                    i64::from(attended),
                    minimum,
                    &color,
                    &user_id,
                    id,
                ),
            )
            .map_err(db_err)?;
        // Keep the denormalized name on timetable entries in step.
        if patch.name.is_some() {
            self.conn
                .execute(
                    "UPDATE timetable_entries SET subject_name = ? WHERE user_id = ? AND subject_id = ?",
                    (&name, &user_id, id),
                )
                .map_err(db_err)?;
        }

        self.load_subject(&user_id, id)?
            .ok_or_else(|| RemoteError::NotFound("subject".to_string()))
    }

    fn delete_subject(&mut self, token: &str, id: &str) -> Result<(), RemoteError> {
        let user_id = self.user_for_token(token)?;
        if self.load_subject(&user_id, id)?.is_none() {
            return Err(RemoteError::NotFound("subject".to_string()));
        }

        // Delete in dependency order (no ON DELETE CASCADE), one transaction.
        let tx = self.conn.unchecked_transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM attendance_records WHERE user_id = ? AND subject_id = ?",
            (&user_id, id),
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM timetable_entries WHERE user_id = ? AND subject_id = ?",
            (&user_id, id),
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM subjects WHERE user_id = ? AND id = ?",
            (&user_id, id),
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn create_entry(
        &mut self,
        token: &str,
        draft: &EntryDraft,
    ) -> Result<TimetableEntry, RemoteError> {
        let user_id = self.user_for_token(token)?;
        if self.load_subject(&user_id, &draft.subject_id)?.is_none() {
            return Err(RemoteError::NotFound("subject".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO timetable_entries(id, user_id, day, subject_id, subject_name,
                                               start_time, end_time)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &user_id,
                    &draft.day,
                    &draft.subject_id,
                    &draft.subject_name,
                    &draft.start_time,
                    &draft.end_time,
                ),
            )
            .map_err(db_err)?;

        Ok(TimetableEntry {
            id,
            day: draft.day.clone(),
            subject_id: draft.subject_id.clone(),
            subject_name: draft.subject_name.clone(),
            start_time: draft.start_time.clone(),
            end_time: draft.end_time.clone(),
        })
    }

    fn update_entry(
        &mut self,
        token: &str,
        id: &str,
        patch: &EntryPatch,
    ) -> Result<TimetableEntry, RemoteError> {
        let user_id = self.user_for_token(token)?;
        let existing = self
            .conn
            .query_row(
                "SELECT id, day, subject_id, subject_name, start_time, end_time
                 FROM timetable_entries WHERE user_id = ? AND id = ?",
                (&user_id, id),
                entry_from_row,
            )
            .optional()
            .map_err(db_err)?;
        let Some(existing) = existing else {
            return Err(RemoteError::NotFound("timetable entry".to_string()));
        };

        let day = patch.day.clone().unwrap_or(existing.day);
        let (subject_id, subject_name) = patch
            .subject
            .clone()
            .unwrap_or((existing.subject_id, existing.subject_name));
        let start_time = patch.start_time.clone().unwrap_or(existing.start_time);
        let end_time = patch.end_time.clone().unwrap_or(existing.end_time);
        if self.load_subject(&user_id, &subject_id)?.is_none() {
            return Err(RemoteError::NotFound("subject".to_string()));
        }

        self.conn
            .execute(
                "UPDATE timetable_entries
                 SET day = ?, subject_id = ?, subject_name = ?, start_time = ?, end_time = ?
                 WHERE user_id = ? AND id = ?",
                (
                    &day,
                    &subject_id,
                    &subject_name,
                    &start_time,
                    &end_time,
                    &user_id,
                    id,
                ),
            )
            .map_err(db_err)?;

        Ok(TimetableEntry {
            id: id.to_string(),
            day,
            subject_id,
            subject_name,
            start_time,
            end_time,
        })
    }

    fn delete_entry(&mut self, token: &str, id: &str) -> Result<(), RemoteError> {
        let user_id = self.user_for_token(token)?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM timetable_entries WHERE user_id = ? AND id = ?",
                (&user_id, id),
            )
            .map_err(db_err)?;
        if removed == 0 {
            return Err(RemoteError::NotFound("timetable entry".to_string()));
        }
        Ok(())
    }

    fn mark_attendance(
        &mut self,
        token: &str,
        draft: &AttendanceDraft,
    ) -> Result<MarkOutcome, RemoteError> {
        let user_id = self.user_for_token(token)?;
        let Some(subject) = self.load_subject(&user_id, &draft.subject_id)? else {
            return Err(RemoteError::NotFound("subject".to_string()));
        };

        let existing: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, status FROM attendance_records
                 WHERE user_id = ? AND date = ? AND subject_id = ?",
                (&user_id, &draft.date, &draft.subject_id),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(db_err)?;

        let mut total = subject.total_lectures;
        let mut attended = subject.attended_lectures;
        let record_id;

        // The mark and the counter transition commit together.
        let tx = self.conn.unchecked_transaction().map_err(db_err)?;
        match existing {
            Some((id, old_status)) => {
                // Re-marking the same slot only ever flips the attended count.
                record_id = id;
                let was_present = old_status == "present";
                let is_present = draft.status == AttendanceStatus::Present;
                if !was_present && is_present {
                    attended += 1;
                } else if was_present && !is_present {
                    attended = attended.saturating_sub(1);
                }
                tx.execute(
                    "UPDATE attendance_records SET status = ?, subject_name = ? WHERE id = ?",
                    (draft.status.as_str(), &draft.subject_name, &record_id),
                )
                .map_err(db_err)?;
            }
            None => {
                record_id = Uuid::new_v4().to_string();
                total += 1;
                if draft.status == AttendanceStatus::Present {
                    attended += 1;
                }
                tx.execute(
                    "INSERT INTO attendance_records(id, user_id, date, subject_id, subject_name, status)
                     VALUES(?, ?, ?, ?, ?, ?)",
                    (
                        &record_id,
                        &user_id,
                        &draft.date,
                        &draft.subject_id,
                        &draft.subject_name,
                        draft.status.as_str(),
                    ),
                )
                .map_err(db_err)?;
            }
        }
        tx.execute(
            "UPDATE subjects SET total_lectures = ?, attended_lectures = ?
             WHERE user_id = ? AND id = ?",
            (
                i64::from(total),
                i64::from(attended),
                &user_id,
                &draft.subject_id,
            ),
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        Ok(MarkOutcome {
            record: AttendanceRecord {
                id: record_id,
                date: draft.date.clone(),
                subject_id: draft.subject_id.clone(),
                subject_name: draft.subject_name.clone(),
                status: draft.status,
            },
            subject: Some(SubjectCounters {
                subject_id: draft.subject_id.clone(),
                total_lectures: total,
                attended_lectures: attended,
                absent_lectures: total.saturating_sub(attended),
            }),
        })
    }

    fn update_profile(
        &mut self,
        token: &str,
        patch: &ProfilePatch,
    ) -> Result<UserProfile, RemoteError> {
        let user_id = self.user_for_token(token)?;
        let existing = self.load_profile(&user_id)?;

        let name = patch.name.clone().unwrap_or(existing.name);
        let college = patch.college.clone().or(existing.college);
        let semester_start = patch.semester_start.clone().or(existing.semester_start);
        let semester_end = patch.semester_end.clone().or(existing.semester_end);
        let override_pct = match patch.current_overall_attendance {
            Some(value) => value,
            None => existing.current_overall_attendance,
        };
        let minimum = patch
            .overall_minimum_attendance
            .unwrap_or(existing.overall_minimum_attendance);

        self.conn
            .execute(
                "UPDATE users
                 SET name = ?, college = ?, semester_start = ?, semester_end = ?,
                     current_overall_attendance = ?, overall_minimum_attendance = ?
                 WHERE id = ?",
                (
                    &name,
                    &college,
                    &semester_start,
                    &semester_end,
                    override_pct,
                    minimum,
                    &user_id,
                ),
            )
            .map_err(db_err)?;

        self.load_profile(&user_id)
    }
}
