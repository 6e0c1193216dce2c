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
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}


fn scores(values: [u32; 6]) -> serde_json::Value {
    json!({
        "Mathematics": values[0],
        "Science": values[1],
        "English": values[2],
        "Social Studies": values[3],
        "Hindi": values[4],
        "Computer": values[5]
    })
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    roll_no: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({ "name": name, "rollNo": roll_no, "className": "Class 10", "section": "A" }),
    );
    created["student"]["id"]
        .as_str()
        .expect("student id")
        .to_string()
}

#[test]
fn upsert_replaces_the_record_for_the_same_student_and_exam() {
    let workspace = temp_dir("schoold-marks-upsert");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = create_student(&mut stdin, &mut reader, "2", "Ravi Kumar", "101");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.upsert",
        json!({
            "studentId": student_id,
            "examType": "Mid Term",
            "scores": scores([95, 90, 85, 88, 92, 85])
        }),
    );
    assert_eq!(first["outcome"], json!("created"));
    let record = &first["record"];
    assert_eq!(record["studentKey"], json!("101"));
    assert_eq!(record["studentName"], json!("Ravi Kumar"));
    assert_eq!(record["className"], json!("Class 10"));
    assert_eq!(record["examType"], json!("Mid Term"));
    assert_eq!(record["total"], json!(535));
    assert_eq!(record["percentage"].as_f64(), Some(89.17));
    assert_eq!(record["grade"]["label"], json!("A"));
    assert_eq!(record["grade"]["tier"], json!("grade-A"));
    assert_eq!(record["subjectScores"]["Social Studies"], json!(88));

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.upsert",
        json!({
            "studentId": student_id,
            "examType": "half yearly",
            "scores": scores([100, 100, 100, 100, 100, 100])
        }),
    );
    assert_eq!(second["outcome"], json!("updated"));
    assert_eq!(second["record"]["total"], json!(600));
    assert_eq!(second["record"]["grade"]["label"], json!("A+"));

    let other_exam = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "marks.upsert",
        json!({
            "studentId": student_id,
            "examType": "Final",
            "scores": scores([30, 30, 30, 30, 30, 30])
        }),
    );
    assert_eq!(other_exam["outcome"], json!("created"));
    assert_eq!(other_exam["record"]["grade"]["label"], json!("F"));

    let listed = request_ok(&mut stdin, &mut reader, "6", "marks.list", json!({}));
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["examType"], json!("Mid Term"));
    assert_eq!(records[0]["total"], json!(600));
    assert_eq!(records[1]["examType"], json!("Final"));

    let by_student = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "marks.byStudent",
        json!({ "studentKey": "101" }),
    );
    assert_eq!(by_student["records"].as_array().map(|v| v.len()), Some(2));

    let none = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "marks.byStudent",
        json!({ "studentKey": "999" }),
    );
    assert_eq!(none["records"], json!([]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn invalid_submissions_are_rejected_without_touching_the_store() {
    let workspace = temp_dir("schoold-marks-invalid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = create_student(&mut stdin, &mut reader, "2", "Nila", "7");

    let mut missing = scores([50, 50, 50, 50, 50, 50]);
    missing.as_object_mut().expect("object").remove("Computer");
    let res = request(
        &mut stdin,
        &mut reader,
        "3",
        "marks.upsert",
        json!({ "studentId": student_id, "examType": "Final", "scores": missing }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert_eq!(res["error"]["details"]["field"], json!("Computer"));

    let res = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.upsert",
        json!({
            "studentId": student_id,
            "examType": "Final",
            "scores": scores([101, 50, 50, 50, 50, 50])
        }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert_eq!(res["error"]["details"]["field"], json!("Mathematics"));

    let mut fractional = scores([50, 50, 50, 50, 50, 50]);
    fractional["Science"] = json!(85.5);
    let res = request(
        &mut stdin,
        &mut reader,
        "5",
        "marks.upsert",
        json!({ "studentId": student_id, "examType": "Final", "scores": fractional }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert_eq!(res["error"]["details"]["subject"], json!("Science"));

    let mut negative = scores([50, 50, 50, 50, 50, 50]);
    negative["Hindi"] = json!(-1);
    let res = request(
        &mut stdin,
        &mut reader,
        "6",
        "marks.upsert",
        json!({ "studentId": student_id, "examType": "Final", "scores": negative }),
    );
    assert_eq!(error_code(&res), "bad_params");

    let mut extra = scores([50, 50, 50, 50, 50, 50]);
    extra["Art"] = json!(50);
    let res = request(
        &mut stdin,
        &mut reader,
        "7",
        "marks.upsert",
        json!({ "studentId": student_id, "examType": "Final", "scores": extra }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert_eq!(res["error"]["details"]["subject"], json!("Art"));

    let res = request(
        &mut stdin,
        &mut reader,
        "8",
        "marks.upsert",
        json!({
            "studentId": student_id,
            "examType": "Quiz",
            "scores": scores([50, 50, 50, 50, 50, 50])
        }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert!(res["error"]["details"]["allowed"]
        .as_array()
        .expect("allowed exam types")
        .contains(&json!("Unit Test 1")));

    let res = request(
        &mut stdin,
        &mut reader,
        "9",
        "marks.upsert",
        json!({
            "studentId": "no-such-student",
            "examType": "Final",
            "scores": scores([50, 50, 50, 50, 50, 50])
        }),
    );
    assert_eq!(error_code(&res), "not_found");

    // Two spellings of one subject fold to the same key.
    let mut doubled = scores([50, 50, 50, 90, 50, 50]);
    doubled["social_studies"] = json!(10);
    let res = request(
        &mut stdin,
        &mut reader,
        "10",
        "marks.upsert",
        json!({ "studentId": student_id, "examType": "Final", "scores": doubled }),
    );
    assert_eq!(error_code(&res), "bad_params");
    assert_eq!(res["error"]["details"]["subject"], json!("Social Studies"));

    let listed = request_ok(&mut stdin, &mut reader, "11", "marks.list", json!({}));
    assert_eq!(listed["records"], json!([]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn delete_removes_only_the_matching_record() {
    let workspace = temp_dir("schoold-marks-delete");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student_id = create_student(&mut stdin, &mut reader, "2", "Asha", "12");
    for (i, exam) in ["Unit Test 1", "Unit Test 2"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("up-{}", i),
            "marks.upsert",
            json!({
                "studentId": student_id,
                "examType": exam,
                "scores": scores([60, 60, 60, 60, 60, 60])
            }),
        );
    }

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "marks.delete",
        json!({ "studentKey": "12", "examType": "Unit Test 1" }),
    );
    assert_eq!(removed["removed"], json!(true));

    let gone = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.get",
        json!({ "studentKey": "12", "examType": "Unit Test 1" }),
    );
    assert_eq!(error_code(&gone), "not_found");

    let kept = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "marks.get",
        json!({ "studentKey": "12", "examType": "UT2" }),
    );
    assert_eq!(kept["record"]["examType"], json!("Unit Test 2"));

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "marks.delete",
        json!({ "studentKey": "12", "examType": "Unit Test 1" }),
    );
    assert_eq!(again["removed"], json!(false));

    let blank_key = request(
        &mut stdin,
        &mut reader,
        "7",
        "marks.delete",
        json!({ "studentKey": "   ", "examType": "Final" }),
    );
    assert_eq!(error_code(&blank_key), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grade_of_follows_the_threshold_table() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let cases = [
        (90.0, "A+", "grade-A-plus"),
        (89.99, "A", "grade-A"),
        (70.0, "B+", "grade-B-plus"),
        (60.0, "B", "grade-B"),
        (50.0, "C", "grade-C"),
        (40.0, "D", "grade-D"),
        (39.99, "F", "grade-F"),
    ];
    for (i, (pct, label, tier)) in cases.iter().enumerate() {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grade.of",
            json!({ "percentage": pct }),
        );
        assert_eq!(res["grade"]["label"], json!(label), "pct {}", pct);
        assert_eq!(res["grade"]["tier"], json!(tier), "pct {}", pct);
    }
    let missing = request(&mut stdin, &mut reader, "m", "grade.of", json!({}));
    assert_eq!(error_code(&missing), "bad_params");

    drop(stdin);
    let _ = child.wait();
}
