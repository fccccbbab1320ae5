use chrono::{Datelike, NaiveDate, Weekday};
use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{remote_failure, valid_day, valid_time};
use crate::ipc::types::{AppState, Request, SessionState};
use crate::remote::{EntryDraft, EntryPatch};
use crate::store::TimetableEntry;

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn handle_timetable_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    ok(
        &req.id,
        json!({ "timetable": store.timetable(), "generation": store.generation() }),
    )
}

fn handle_timetable_today(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let day = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => weekday_name(date.weekday()),
            Err(_) => return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None),
        },
        None => weekday_name(chrono::Local::now().date_naive().weekday()),
    };

    let mut entries: Vec<&TimetableEntry> = store
        .timetable()
        .iter()
        .filter(|e| e.day == day)
        .collect();
    entries.sort_by(|a, b| a.start_time.cmp(&b.start_time));

    ok(&req.id, json!({ "day": day, "entries": entries }))
}

fn handle_timetable_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let day = match req.params.get("day").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing day", None),
    };
    if !valid_day(&day) {
        return err(
            &req.id,
            "bad_params",
            "day must be a full day name (Monday..Sunday)",
            None,
        );
    }
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let start_time = match req.params.get("startTime").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing startTime", None),
    };
    let end_time = match req.params.get("endTime").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing endTime", None),
    };
    if !valid_time(&start_time) || !valid_time(&end_time) {
        return err(&req.id, "bad_params", "times must be zero-padded HH:MM", None);
    }
    if start_time >= end_time {
        return err(&req.id, "bad_params", "startTime must come before endTime", None);
    }

    // The entry carries the subject name as loaded right now; the backend
    // stores it denormalized.
    let Some(subject) = store.subject(&subject_id) else {
        return err(&req.id, "not_found", "subject not found", None);
    };
    let draft = EntryDraft {
        day,
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        start_time,
        end_time,
    };

    match backend.create_entry(token, &draft) {
        Ok(entry) => {
            store.apply_entry_created(entry.clone());
            ok(
                &req.id,
                json!({
                    "entry": entry,
                    "timetable": store.timetable(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

fn handle_timetable_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let entry_id = match req.params.get("entryId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing entryId", None),
    };
    let Some(existing) = store.entry(&entry_id) else {
        return err(&req.id, "not_found", "timetable entry not found", None);
    };

    let day = req
        .params
        .get("day")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    if let Some(day) = &day {
        if !valid_day(day) {
            return err(
                &req.id,
                "bad_params",
                "day must be a full day name (Monday..Sunday)",
                None,
            );
        }
    }
    let start_time = req
        .params
        .get("startTime")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    let end_time = req
        .params
        .get("endTime")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    for time in [&start_time, &end_time].into_iter().flatten() {
        if !valid_time(time) {
            return err(&req.id, "bad_params", "times must be zero-padded HH:MM", None);
        }
    }
    // Validate the merged slot, not just the changed side.
    let merged_start = start_time.as_deref().unwrap_or(&existing.start_time);
    let merged_end = end_time.as_deref().unwrap_or(&existing.end_time);
    if merged_start >= merged_end {
        return err(&req.id, "bad_params", "startTime must come before endTime", None);
    }

    let subject = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(id) => {
            let Some(subject) = store.subject(id) else {
                return err(&req.id, "not_found", "subject not found", None);
            };
            Some((subject.id.clone(), subject.name.clone()))
        }
        None => None,
    };

    let patch = EntryPatch {
        day,
        subject,
        start_time,
        end_time,
    };
    match backend.update_entry(token, &entry_id, &patch) {
        Ok(entry) => {
            if !store.apply_entry_updated(entry.clone()) {
                return err(&req.id, "not_found", "timetable entry not found", None);
            }
            ok(
                &req.id,
                json!({
                    "entry": entry,
                    "timetable": store.timetable(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

fn handle_timetable_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let entry_id = match req.params.get("entryId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing entryId", None),
    };
    if store.entry(&entry_id).is_none() {
        return err(&req.id, "not_found", "timetable entry not found", None);
    }

    match backend.delete_entry(token, &entry_id) {
        Ok(()) => {
            store.apply_entry_deleted(&entry_id);
            ok(
                &req.id,
                json!({
                    "timetable": store.timetable(),
                    "generation": store.generation(),
                }),
            )
        }
        Err(e) => remote_failure(state, &req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timetable.list" => Some(handle_timetable_list(state, req)),
        "timetable.today" => Some(handle_timetable_today(state, req)),
        "timetable.create" => Some(handle_timetable_create(state, req)),
        "timetable.update" => Some(handle_timetable_update(state, req)),
        "timetable.delete" => Some(handle_timetable_delete(state, req)),
        _ => None,
    }
}
