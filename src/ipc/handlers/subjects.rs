use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::remote_failure;
use crate::ipc::types::{AppState, Request, SessionState};
use crate::remote::{SubjectDraft, SubjectPatch};

const DEFAULT_COLOR: &str = "#8B5CF6";
const DEFAULT_MINIMUM: f64 = 75.0;

struct HandlerErr {
    code: &'static str,
    message: String,
}

impl HandlerErr {
    fn bad(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }
}

fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad(format!("missing {key}")))
}

fn opt_u32(params: &serde_json::Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(n) = v.as_u64() else {
        return Err(HandlerErr::bad(format!(
            "{key} must be a non-negative integer"
        )));
    };
    u32::try_from(n)
        .map(Some)
        .map_err(|_| HandlerErr::bad(format!("{key} is out of range")))
}

fn opt_pct(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(n) = v.as_f64() else {
        return Err(HandlerErr::bad(format!("{key} must be a number")));
    };
    if !(0.0..=100.0).contains(&n) {
        return Err(HandlerErr::bad(format!("{key} must be between 0 and 100")));
    }
    Ok(Some(n))
}

fn parse_draft(params: &serde_json::Value) -> Result<SubjectDraft, HandlerErr> {
    let name = required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad("name must not be empty"));
    }
    let total_lectures = opt_u32(params, "totalLectures")?.unwrap_or(0);
    let attended_lectures = opt_u32(params, "attendedLectures")?.unwrap_or(0);
    if attended_lectures > total_lectures {
        return Err(HandlerErr::bad(
            "attendedLectures cannot exceed totalLectures",
        ));
    }
    let minimum_attendance = opt_pct(params, "minimumAttendance")?.unwrap_or(DEFAULT_MINIMUM);
    let color = params
        .get("color")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_COLOR)
        .to_string();
    Ok(SubjectDraft {
        name,
        total_lectures,
        attended_lectures,
        minimum_attendance,
        color,
    })
}

fn parse_patch(params: &serde_json::Value) -> Result<SubjectPatch, HandlerErr> {
    let name = match params.get("name").and_then(|v| v.as_str()) {
        Some(v) if v.trim().is_empty() => return Err(HandlerErr::bad("name must not be empty")),
        Some(v) => Some(v.trim().to_string()),
        None => None,
    };
    Ok(SubjectPatch {
        name,
        total_lectures: opt_u32(params, "totalLectures")?,
        attended_lectures: opt_u32(params, "attendedLectures")?,
        minimum_attendance: opt_pct(params, "minimumAttendance")?,
        color: params
            .get("color")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string()),
    })
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Mirrors not being signed in as an empty dashboard, not an error.
    let SessionState::Ready { store, .. } = &state.session else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    ok(
        &req.id,
        json!({ "subjects": store.subjects(), "generation": store.generation() }),
    )
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    // Malformed drafts never reach the backend.
    let draft = match parse_draft(&req.params) {
        Ok(d) => d,
        Err(e) => return e.response(&req.id),
    };

    match backend.create_subject(token, &draft) {
        Ok(subject) => {
            store.apply_subject_created(subject.clone());
            ok(
                &req.id,
                json!({
                    "subject": subject,
                    "subjects": store.subjects(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let subject_id = match required_str(&req.params, "subjectId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let patch = match parse_patch(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let Some(existing) = store.subject(&subject_id) else {
        return err(&req.id, "not_found", "subject not found", None);
    };
    // Validate the merged result, not the patch in isolation.
    let merged_total = patch.total_lectures.unwrap_or(existing.total_lectures);
    let merged_attended = patch
        .attended_lectures
        .unwrap_or(existing.attended_lectures);
    if merged_attended > merged_total {
        return HandlerErr::bad("attendedLectures cannot exceed totalLectures").response(&req.id);
    }

    match backend.update_subject(token, &subject_id, &patch) {
        Ok(subject) => {
            if !store.apply_subject_updated(subject.clone()) {
                return err(&req.id, "not_found", "subject not found", None);
            }
            ok(
                &req.id,
                json!({
                    "subject": subject,
                    "subjects": store.subjects(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let subject_id = match required_str(&req.params, "subjectId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if store.subject(&subject_id).is_none() {
        return err(&req.id, "not_found", "subject not found", None);
    }

    match backend.delete_subject(token, &subject_id) {
        Ok(()) => {
            store.apply_subject_deleted(&subject_id);
            // The cascade touches three collections; return them all.
            ok(
                &req.id,
                json!({
                    "subjects": store.subjects(),
                    "timetable": store.timetable(),
                    "attendance": store.attendance(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
