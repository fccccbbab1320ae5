use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, SessionState};

fn handle_predict(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let Some(subject) = store.subject(subject_id) else {
        return err(&req.id, "not_found", "subject not found", None);
    };
    ok(&req.id, json!({ "prediction": calc::predict(subject) }))
}

fn handle_predict_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    ok(
        &req.id,
        json!({ "predictions": calc::predict_all(store.subjects()) }),
    )
}

fn handle_simulate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { store, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let bunks = match req.params.get("bunks").and_then(|v| v.as_u64()) {
        Some(n) => match u32::try_from(n) {
            Ok(v) => v,
            Err(_) => return err(&req.id, "bad_params", "bunks is out of range", None),
        },
        None => return err(&req.id, "bad_params", "missing bunks", None),
    };
    let Some(subject) = store.subject(subject_id) else {
        return err(&req.id, "not_found", "subject not found", None);
    };
    ok(
        &req.id,
        json!({ "simulation": calc::simulate(subject, bunks) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "predictor.predict" => Some(handle_predict(state, req)),
        "predictor.predictAll" => Some(handle_predict_all(state, req)),
        "predictor.simulate" => Some(handle_simulate(state, req)),
        _ => None,
    }
}
