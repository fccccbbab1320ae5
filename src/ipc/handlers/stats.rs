use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::valid_date;
use crate::ipc::types::{AppState, Request, SessionState};
use crate::store::AttendanceStatus;

fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) => {
            if !valid_date(v) {
                return err(&req.id, "bad_params", "date must be YYYY-MM-DD", None);
            }
            v.to_string()
        }
        None => chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
    };

    let subjects = store.subjects();
    let profile = store.profile();
    let computed = calc::computed_overall(subjects);
    let overall = calc::overall_attendance(profile, subjects);
    let band = calc::status_band(overall, profile.overall_minimum_attendance);
    let total_safe_bunks = subjects.iter().fold(0u32, |acc, s| {
        acc.saturating_add(calc::safe_bunks(
            s.attended_lectures,
            s.total_lectures,
            s.minimum_attendance,
        ))
    });
    let day_records = store.attendance_for_date(&date);
    let present = day_records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Present)
        .count();

    ok(
        &req.id,
        json!({
            "date": date,
            "totalSubjects": subjects.len(),
            "computedOverall": computed,
            "overallAttendance": overall,
            "overallMinimum": profile.overall_minimum_attendance,
            "band": band,
            "totalSafeBunks": total_safe_bunks,
            "todayMarked": day_records.len(),
            "todayPresent": present,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.overview" => Some(handle_overview(state, req)),
        _ => None,
    }
}
