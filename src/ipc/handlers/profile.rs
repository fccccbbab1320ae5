use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{remote_failure, valid_date};
use crate::ipc::types::{AppState, Request, SessionState};
use crate::remote::ProfilePatch;

fn handle_profile_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    ok(&req.id, json!({ "profile": store.profile() }))
}

fn parse_patch(params: &serde_json::Value) -> Result<ProfilePatch, String> {
    let name = match params.get("name").and_then(|v| v.as_str()) {
        Some(v) if v.trim().is_empty() => return Err("name must not be empty".to_string()),
        Some(v) => Some(v.trim().to_string()),
        None => None,
    };
    let college = params
        .get("college")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string());

    let mut dates = [None, None];
    for (slot, key) in dates.iter_mut().zip(["semesterStart", "semesterEnd"]) {
        if let Some(raw) = params.get(key).and_then(|v| v.as_str()) {
            if !valid_date(raw) {
                return Err(format!("{key} must be YYYY-MM-DD"));
            }
            *slot = Some(raw.to_string());
        }
    }
    let [semester_start, semester_end] = dates;

    // An explicit null clears the college-reported override; absence leaves
    // it alone.
    let current_overall_attendance = match params.get("currentOverallAttendance") {
        None => None,
        Some(v) if v.is_null() => Some(None),
        Some(v) => {
            let Some(n) = v.as_f64() else {
                return Err("currentOverallAttendance must be a number or null".to_string());
            };
            if !(0.0..=100.0).contains(&n) {
                return Err("currentOverallAttendance must be between 0 and 100".to_string());
            }
            Some(Some(n))
        }
    };

    let overall_minimum_attendance = match params.get("overallMinimumAttendance") {
        None => None,
        Some(v) => {
            let Some(n) = v.as_f64() else {
                return Err("overallMinimumAttendance must be a number".to_string());
            };
            if !(0.0..=100.0).contains(&n) {
                return Err("overallMinimumAttendance must be between 0 and 100".to_string());
            }
            Some(n)
        }
    };

    Ok(ProfilePatch {
        name,
        college,
        semester_start,
        semester_end,
        current_overall_attendance,
        overall_minimum_attendance,
    })
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let patch = match parse_patch(&req.params) {
        Ok(p) => p,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };

    match backend.update_profile(token, &patch) {
        Ok(profile) => {
            store.apply_profile(profile);
            ok(
                &req.id,
                json!({ "profile": store.profile(), "generation": store.generation() }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profile.get" => Some(handle_profile_get(state, req)),
        "profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
