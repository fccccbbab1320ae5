use std::path::PathBuf;

use serde_json::json;

use crate::db::SqliteBackend;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backendOpen": state.backend.is_some(),
            "session": state.session.name(),
        }),
    )
}

fn handle_backend_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match SqliteBackend::open(&path) {
        Ok(backend) => {
            // An already-open session keeps its mirror; a credential minted
            // against another backend surfaces stale_session on first use.
            state.backend = Some(Box::new(backend));
            ok(&req.id, json!({ "path": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "backend.open" => Some(handle_backend_open(state, req)),
        _ => None,
    }
}
