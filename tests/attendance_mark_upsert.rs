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

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn remarking_a_day_replaces_the_record_and_moves_counters_once() {
    let workspace = temp_dir("bunkd-mark");
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
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "email": "asha@example.edu", "password": "pw" }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "subjects.create",
        json!({ "name": "Signals", "totalLectures": 40, "attendedLectures": 30 }),
    );
    let subject_id = created["subject"]["id"].as_str().expect("id").to_string();

    // First mark of the day adds one lecture to both counters.
    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({ "subjectId": subject_id, "date": "2025-03-10", "status": "present" }),
    );
    assert_eq!(marked["record"]["status"], json!("present"));
    assert_eq!(marked["attendance"].as_array().expect("attendance").len(), 1);
    let subject = &marked["subjects"][0];
    assert_eq!(subject["totalLectures"], json!(41));
    assert_eq!(subject["attendedLectures"], json!(31));
    assert_eq!(subject["absentLectures"], json!(10));

    // Re-marking the same (date, subject) replaces the record in place and
    // only flips the attended count.
    let remarked = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({ "subjectId": subject_id, "date": "2025-03-10", "status": "absent" }),
    );
    let records = remarked["attendance"].as_array().expect("attendance");
    assert_eq!(records.len(), 1, "duplicate record for the same day");
    assert_eq!(records[0]["status"], json!("absent"));
    assert_eq!(
        records[0]["id"], marked["record"]["id"],
        "record identity changed on re-mark"
    );
    let subject = &remarked["subjects"][0];
    assert_eq!(subject["totalLectures"], json!(41));
    assert_eq!(subject["attendedLectures"], json!(30));
    assert_eq!(subject["absentLectures"], json!(11));

    // A different day is a separate record.
    let next_day = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.mark",
        json!({ "subjectId": subject_id, "date": "2025-03-11", "status": "present" }),
    );
    assert_eq!(next_day["attendance"].as_array().expect("attendance").len(), 2);

    // forDate sees exactly the one record for the re-marked day.
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.forDate",
        json!({ "date": "2025-03-10" }),
    );
    let day_records = day["records"].as_array().expect("records");
    assert_eq!(day_records.len(), 1);
    assert_eq!(day_records[0]["status"], json!("absent"));

    let _ = child.kill();
}
