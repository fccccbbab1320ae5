use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, SessionState};
use crate::remote::RemoteError;
use crate::store::EntityStore;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn valid_day(raw: &str) -> bool {
    DAY_NAMES.contains(&raw)
}

pub fn valid_date(raw: &str) -> bool {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Zero-padded 24-hour "HH:MM". The format is what makes lexicographic
/// time comparison valid, so the padding is checked, not just parseability.
pub fn valid_time(raw: &str) -> bool {
    raw.len() == 5
        && raw.as_bytes()[2] == b':'
        && chrono::NaiveTime::parse_from_str(raw, "%H:%M").is_ok()
}

/// Maps a remote failure onto the wire envelope. A stale credential also
/// ends the session: the mirror is torn down with it and the caller has to
/// sign in again. Everything else leaves local state exactly as it was.
pub fn remote_failure(state: &mut AppState, id: &str, e: RemoteError) -> serde_json::Value {
    let message = e.to_string();
    let code = e.code();
    if matches!(e, RemoteError::StaleSession) {
        state.session = SessionState::Unauthenticated;
    }
    err(id, code, message, None)
}

/// Full mirror payload: all four collections plus the staleness token.
pub fn state_payload(store: &EntityStore) -> serde_json::Value {
    json!({
        "profile": store.profile(),
        "subjects": store.subjects(),
        "timetable": store.timetable(),
        "attendance": store.attendance(),
        "generation": store.generation(),
    })
}
