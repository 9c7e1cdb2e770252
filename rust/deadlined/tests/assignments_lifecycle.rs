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
    let exe = env!("CARGO_BIN_EXE_deadlined");
    let mut child = Command::new(exe)
        .env("DEADLINE_BCRYPT_COST", "4")
        .env_remove("DEADLINE_WORKSPACE")
        .env_remove("DEADLINE_URGENT_WINDOW_HOURS")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn deadlined");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    session: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
        "session": session,
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
    session: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, session, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    session: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, session, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

fn login(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    username: &str,
) -> String {
    request_ok(
        stdin,
        reader,
        &format!("{}-register", id),
        "auth.register",
        None,
        json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "pw",
        }),
    );
    let res = request_ok(
        stdin,
        reader,
        &format!("{}-login", id),
        "auth.login",
        None,
        json!({ "username": username, "password": "pw" }),
    );
    res.get("session")
        .and_then(|v| v.as_str())
        .expect("session token")
        .to_string()
}

fn code(error: &serde_json::Value) -> Option<&str> {
    error.get("code").and_then(|v| v.as_str())
}

#[test]
fn assignment_create_update_delete_roundtrip() {
    let workspace = temp_dir("deadline-assignment-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        None,
        json!({ "path": workspace.to_string_lossy() }),
    );
    let owner = login(&mut stdin, &mut reader, "o", "olga");
    let student = login(&mut stdin, &mut reader, "s", "sam");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        Some(&owner),
        json!({ "name": "Math" }),
    );
    let class_id = created.get("classId").and_then(|v| v.as_i64()).expect("classId");
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.join",
        Some(&student),
        json!({ "classId": class_id }),
    );

    let bad_date = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        Some(&owner),
        json!({ "classId": class_id, "title": "Sheet", "dueDate": "next tuesday" }),
    );
    assert_eq!(code(&bad_date), Some("bad_params"));
    assert_eq!(
        bad_date.pointer("/details/field").and_then(|v| v.as_str()),
        Some("dueDate")
    );

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.create",
        Some(&owner),
        json!({
            "classId": class_id,
            "title": "Sheet 1",
            "description": "Odd problems",
            "dueDate": "2030-03-10 09:30",
        }),
    );
    let assignment_id = res.get("assignmentId").and_then(|v| v.as_i64()).expect("assignmentId");
    let a = &res["assignment"];
    assert_eq!(a.get("dueDate").and_then(|v| v.as_str()), Some("2030-03-10T09:30:00.000Z"));
    assert_eq!(a.get("reminderHours").and_then(|v| v.as_i64()), Some(24));
    assert_eq!(a.get("description").and_then(|v| v.as_str()), Some("Odd problems"));

    let seen = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.get",
        Some(&student),
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(seen.pointer("/assignment/title").and_then(|v| v.as_str()), Some("Sheet 1"));

    let member_edit = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.update",
        Some(&student),
        json!({ "assignmentId": assignment_id, "title": "Mine now" }),
    );
    assert_eq!(code(&member_edit), Some("forbidden"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.update",
        Some(&owner),
        json!({
            "assignmentId": assignment_id,
            "title": "Sheet 1 (revised)",
            "description": null,
            "reminderHours": 6,
        }),
    );
    let u = &updated["assignment"];
    assert_eq!(u.get("title").and_then(|v| v.as_str()), Some("Sheet 1 (revised)"));
    assert_eq!(u.get("description"), Some(&serde_json::Value::Null));
    assert_eq!(u.get("reminderHours").and_then(|v| v.as_i64()), Some(6));
    assert_eq!(u.get("dueDate").and_then(|v| v.as_str()), Some("2030-03-10T09:30:00.000Z"));

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "submissions.submit",
        Some(&student),
        json!({ "assignmentId": assignment_id, "content": "1, 3, 5" }),
    );

    let member_delete = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "assignments.delete",
        Some(&student),
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(code(&member_delete), Some("forbidden"));

    request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "assignments.delete",
        Some(&owner),
        json!({ "assignmentId": assignment_id }),
    );
    let gone = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "submissions.mine",
        Some(&student),
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(code(&gone), Some("not_found"));
    assert_eq!(
        gone.pointer("/details/entity").and_then(|v| v.as_str()),
        Some("assignment")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn deleting_a_class_removes_its_assignments_everywhere() {
    let workspace = temp_dir("deadline-class-cascade");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        None,
        json!({ "path": workspace.to_string_lossy() }),
    );
    let owner = login(&mut stdin, &mut reader, "o", "olga");
    let student = login(&mut stdin, &mut reader, "s", "sam");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        Some(&owner),
        json!({ "name": "Drama" }),
    );
    let class_id = created.get("classId").and_then(|v| v.as_i64()).expect("classId");
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.join",
        Some(&student),
        json!({ "classId": class_id }),
    );
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.create",
        Some(&owner),
        json!({ "classId": class_id, "title": "Monologue", "dueDate": "2030-06-01T12:00:00Z" }),
    );
    let assignment_id = res.get("assignmentId").and_then(|v| v.as_i64()).expect("assignmentId");
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "submissions.submit",
        Some(&student),
        json!({ "assignmentId": assignment_id, "content": "To be" }),
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.delete",
        Some(&owner),
        json!({ "classId": class_id }),
    );

    let timeline = request_ok(&mut stdin, &mut reader, "6", "assignments.timeline", Some(&student), json!({}));
    assert_eq!(
        timeline.get("assignments").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    let missing = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.get",
        Some(&owner),
        json!({ "assignmentId": assignment_id }),
    );
    assert_eq!(code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
}
