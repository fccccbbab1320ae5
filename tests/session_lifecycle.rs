use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_bunkd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn bunkd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    code: &str,
) {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(value["ok"], json!(false), "{} unexpectedly ok", method);
    assert_eq!(value["error"]["code"], json!(code), "{}: {}", method, value);
}

#[test]
fn signup_login_refresh_logout_restore() {
    let workspace = temp_dir("bunkd-session");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Nothing works before a backend is open.
    request_err(
        &mut stdin,
        &mut reader,
        "0",
        "session.login",
        json!({ "email": "asha@example.edu", "password": "pw" }),
        "no_backend",
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "backend.open",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.signup",
        json!({ "name": "Asha", "email": "asha@example.edu", "password": "pw", "college": "IIT-B" }),
    );

    // Duplicate signup is refused by the backend.
    request_err(
        &mut stdin,
        &mut reader,
        "3",
        "session.signup",
        json!({ "name": "Asha", "email": "asha@example.edu", "password": "pw" }),
        "remote_rejected",
    );
    request_err(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "email": "asha@example.edu", "password": "wrong" }),
        "remote_rejected",
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.login",
        json!({ "email": "asha@example.edu", "password": "pw" }),
    );
    let token = login["token"].as_str().expect("token").to_string();
    assert_eq!(login["profile"]["name"], json!("Asha"));
    assert_eq!(login["profile"]["college"], json!("IIT-B"));
    assert_eq!(login["subjects"], json!([]));
    assert_eq!(login["timetable"], json!([]));
    assert_eq!(login["attendance"], json!([]));

    let health = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));
    assert_eq!(health["session"], json!("ready"));

    request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "subjects.create",
        json!({ "name": "Signals", "totalLectures": 40, "attendedLectures": 30 }),
    );

    // Refresh replaces all four collections wholesale and is safe to repeat.
    let first = request_ok(&mut stdin, &mut reader, "8", "session.refresh", json!({}));
    let second = request_ok(&mut stdin, &mut reader, "9", "session.refresh", json!({}));
    assert_eq!(first["subjects"], second["subjects"]);
    assert_eq!(first["profile"], second["profile"]);
    assert_eq!(
        first["subjects"][0]["name"],
        json!("Signals"),
        "refresh lost the created subject"
    );

    request_ok(&mut stdin, &mut reader, "10", "session.logout", json!({}));
    let health = request_ok(&mut stdin, &mut reader, "11", "health", json!({}));
    assert_eq!(health["session"], json!("unauthenticated"));
    request_err(
        &mut stdin,
        &mut reader,
        "12",
        "timetable.list",
        json!({}),
        "not_authenticated",
    );

    // Logout revoked the credential; restoring with it fails.
    request_err(
        &mut stdin,
        &mut reader,
        "13",
        "session.restore",
        json!({ "token": token }),
        "stale_session",
    );

    let _ = child.kill();
}

#[test]
fn restore_resumes_a_session_in_a_fresh_process() {
    let workspace = temp_dir("bunkd-restore");

    let token = {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "backend.open",
            json!({ "path": workspace.to_string_lossy() }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "session.signup",
            json!({ "name": "Asha", "email": "asha@example.edu", "password": "pw" }),
        );
        let login = request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "session.login",
            json!({ "email": "asha@example.edu", "password": "pw" }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "subjects.create",
            json!({ "name": "Optics", "totalLectures": 20, "attendedLectures": 18 }),
        );
        drop(stdin);
        let _ = child.wait();
        login["token"].as_str().expect("token").to_string()
    };

    // Same stored credential, brand-new process: the bulk fetch rebuilds the
    // whole mirror.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backend.open",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "session.restore",
        json!({ "token": token }),
    );
    assert_eq!(restored["subjects"][0]["name"], json!("Optics"));
    assert_eq!(restored["subjects"][0]["attendedLectures"], json!(18));

    request_err(
        &mut stdin,
        &mut reader,
        "7",
        "session.restore",
        json!({ "token": "not-a-token" }),
        "stale_session",
    );

    let _ = child.kill();
}
