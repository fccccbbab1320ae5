use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{remote_failure, valid_date};
use crate::ipc::types::{AppState, Request, SessionState};
use crate::remote::AttendanceDraft;
use crate::store::AttendanceStatus;

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    ok(
        &req.id,
        json!({ "attendance": store.attendance(), "generation": store.generation() }),
    )
}

fn handle_attendance_for_date(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing date", None),
    };
    if !valid_date(&date) {
        return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
    }
    ok(
        &req.id,
        json!({ "date": date, "records": store.attendance_for_date(&date) }),
    )
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing date", None),
    };
    if !valid_date(&date) {
        return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
    }
    let status = match req
        .params
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(AttendanceStatus::parse)
    {
        Some(v) => v,
        None => {
            return err(
                &req.id,
                "bad_params",
                "status must be 'present' or 'absent'",
                None,
            )
        }
    };
    let Some(subject) = store.subject(&subject_id) else {
        return err(&req.id, "not_found", "subject not found", None);
    };

    let draft = AttendanceDraft {
        date,
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        status,
    };
    match backend.mark_attendance(token, &draft) {
        Ok(outcome) => {
            let record = outcome.record.clone();
            // Record upsert and counter merge land as one transition.
            store.apply_attendance_marked(outcome.record, outcome.subject);
            ok(
                &req.id,
                json!({
                    "record": record,
                    "attendance": store.attendance(),
                    "subjects": store.subjects(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.forDate" => Some(handle_attendance_for_date(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        _ => None,
    }
}
