use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{remote_failure, state_payload};
use crate::ipc::types::{AppState, Request, SessionState};
use crate::remote::{RegisterDraft, RemoteError};
use crate::store::EntityStore;

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) if v.contains('@') => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing or malformed email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing password", None),
    };
    let college = req
        .params
        .get("college")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string());

    let draft = RegisterDraft {
        name,
        email,
        password,
        college,
    };
    match backend.register(&draft) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => remote_failure(state, &req.id, e),
    }
}

/// Shared tail of login and restore: the credential is accepted, now bulk
/// fetch everything and either enter Ready or fall back to Unauthenticated
/// with the credential dropped.
fn enter_session(state: &mut AppState, req_id: &str, token: String) -> serde_json::Value {
    state.session = SessionState::Restoring;
    let Some(backend) = state.backend.as_deref_mut() else {
        state.session = SessionState::Unauthenticated;
        return err(req_id, "no_backend", "open a backend first", None);
    };

    match backend.fetch_all(&token) {
        Ok(snapshot) => {
            let store = EntityStore::from_snapshot(snapshot);
            // The caller keeps the credential for later restores.
            let mut payload = state_payload(&store);
            payload["token"] = serde_json::Value::String(token.clone());
            state.session = SessionState::Ready { token, store };
            ok(req_id, payload)
        }
        Err(e) => {
            // A half-restored session is worthless; drop the credential too.
            let _ = backend.logout(&token);
            state.session = SessionState::Unauthenticated;
            err(req_id, e.code(), e.to_string(), None)
        }
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };

    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    match backend.login(&email, &password) {
        Ok(grant) => enter_session(state, &req.id, grant.token),
        Err(e) => remote_failure(state, &req.id, e),
    }
}

fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };

    let token = match req.params.get("token").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing token", None),
    };

    match backend.restore(&token) {
        Ok(_profile) => enter_session(state, &req.id, token),
        Err(e) => {
            state.session = SessionState::Unauthenticated;
            err(&req.id, e.code(), e.to_string(), None)
        }
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let SessionState::Ready { token, .. } = &state.session else {
        return err(&req.id, "not_authenticated", "no session to sign out", None);
    };
    let token = token.clone();

    // Local sign-out is unconditional; a failed remote call does not keep
    // the mirror alive.
    if let Some(backend) = state.backend.as_deref_mut() {
        let _ = backend.logout(&token);
    }
    state.session = SessionState::Unauthenticated;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(backend) = state.backend.as_deref_mut() else {
        return err(&req.id, "no_backend", "open a backend first", None);
    };
    let SessionState::Ready { token, store } = &mut state.session else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };

    match backend.fetch_all(token) {
        Ok(snapshot) => {
            store.replace_all(snapshot);
            ok(&req.id, state_payload(store))
        }
        Err(e @ RemoteError::StaleSession) => remote_failure(state, &req.id, e),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signup" => Some(handle_signup(state, req)),
        "session.login" => Some(handle_login(state, req)),
        "session.restore" => Some(handle_restore(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.refresh" => Some(handle_refresh(state, req)),
        _ => None,
    }
}
