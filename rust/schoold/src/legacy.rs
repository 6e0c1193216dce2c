//! Import of the original site's browser local storage. The dump is a JSON
//! object keyed like the browser's storage (`students`, `faculty`,
//! `marksRecords`); each value is the array itself or the string the browser
//! kept it as.

use crate::faculty::{FacultyId, FacultyMember};
use crate::marks::{ExamType, MarksCandidate, MarksRecord, StudentKey, Subject, MAX_SCORE};
use crate::roster::new_id;
use crate::students::{Student, StudentId};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub collection: &'static str,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedBrowserStorage {
    pub students: Vec<Student>,
    pub faculty: Vec<FacultyMember>,
    pub marks: Vec<MarksRecord>,
    pub skipped: Vec<SkippedEntry>,
}

pub fn parse_browser_storage_file(path: &Path) -> anyhow::Result<ParsedBrowserStorage> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    let root: Value = serde_json::from_str(&text).context("storage dump is not valid JSON")?;
    parse_browser_storage(&root)
}

pub fn parse_browser_storage(root: &Value) -> anyhow::Result<ParsedBrowserStorage> {
    let Some(obj) = root.as_object() else {
        anyhow::bail!("storage dump must be a JSON object");
    };
    let mut out = ParsedBrowserStorage::default();

    for (index, raw) in collection(obj.get("students"), "students")?.iter().enumerate() {
        match parse_student(raw) {
            Ok(s) => {
                if out.students.iter().any(|o| o.roll_no == s.roll_no) {
                    out.skip("students", index, format!("duplicate roll number {}", s.roll_no));
                } else {
                    out.students.push(s);
                }
            }
            Err(reason) => out.skip("students", index, reason),
        }
    }

    for (index, raw) in collection(obj.get("faculty"), "faculty")?.iter().enumerate() {
        match parse_faculty(raw) {
            Ok(f) => out.faculty.push(f),
            Err(reason) => out.skip("faculty", index, reason),
        }
    }

    for (index, raw) in collection(obj.get("marksRecords"), "marksRecords")?
        .iter()
        .enumerate()
    {
        match parse_marks_record(raw) {
            Ok(r) => out.marks.push(r),
            Err(reason) => out.skip("marksRecords", index, reason),
        }
    }

    // Ids must stay unique once they become canonical keys.
    let mut seen = HashSet::new();
    for s in &mut out.students {
        if !seen.insert(s.id.clone()) {
            s.id = StudentId::new(&new_id());
        }
    }
    let mut seen = HashSet::new();
    for f in &mut out.faculty {
        if !seen.insert(f.id.clone()) {
            f.id = FacultyId::new(&new_id());
        }
    }

    Ok(out)
}

impl ParsedBrowserStorage {
    fn skip(&mut self, collection: &'static str, index: usize, reason: String) {
        tracing::warn!(collection, index, %reason, "skipping browser storage entry");
        self.skipped.push(SkippedEntry {
            collection,
            index,
            reason,
        });
    }
}

fn collection(raw: Option<&Value>, key: &str) -> anyhow::Result<Vec<Value>> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(s)) => {
            let parsed: Value = serde_json::from_str(s)
                .with_context(|| format!("{key} holds a string that is not JSON"))?;
            match parsed {
                Value::Array(items) => Ok(items),
                Value::Null => Ok(Vec::new()),
                _ => anyhow::bail!("{key} must be an array"),
            }
        }
        Some(_) => anyhow::bail!("{key} must be an array"),
    }
}

/// Reads a field as text. The browser app sometimes stored ids as numbers.
fn text(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn non_empty(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    let v = text(obj, key);
    if v.is_empty() {
        Err(format!("missing {key}"))
    } else {
        Ok(v)
    }
}

fn parse_student(raw: &Value) -> Result<Student, String> {
    let obj = raw.as_object().ok_or("entry is not an object")?;
    let id = match text(obj, "id") {
        v if v.is_empty() => new_id(),
        v => v,
    };
    Ok(Student {
        id: StudentId::new(&id),
        name: non_empty(obj, "name")?,
        roll_no: non_empty(obj, "rollNo")?,
        class_name: non_empty(obj, "class")?,
        section: text(obj, "section"),
        father_name: text(obj, "fatherName"),
        phone: text(obj, "phone"),
    })
}

fn parse_faculty(raw: &Value) -> Result<FacultyMember, String> {
    let obj = raw.as_object().ok_or("entry is not an object")?;
    let id = match text(obj, "id") {
        v if v.is_empty() => new_id(),
        v => v,
    };
    Ok(FacultyMember {
        id: FacultyId::new(&id),
        name: non_empty(obj, "name")?,
        role: non_empty(obj, "role")?,
        qualification: text(obj, "qualification"),
        experience: text(obj, "experience"),
        avatar: text(obj, "avatar"),
    })
}

/// Whole numbers in 0..=MAX_SCORE. `"85"` and `85.0` are accepted, `85.5`,
/// `""` and `150` are not.
fn score_value(raw: &Value) -> Result<u32, String> {
    let whole = match raw {
        Value::Number(n) => match n.as_u64() {
            Some(v) => Some(v),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64),
        },
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    let v = whole.ok_or("score is not a whole number")?;
    if v > u64::from(MAX_SCORE) {
        return Err(format!("score {v} is outside 0..={MAX_SCORE}"));
    }
    u32::try_from(v).map_err(|_| format!("score {v} is outside 0..={MAX_SCORE}"))
}

fn parse_marks_record(raw: &Value) -> Result<MarksRecord, String> {
    let obj = raw.as_object().ok_or("entry is not an object")?;
    // The browser app stored the roll number under `studentId`.
    let student_key = StudentKey::new(&text(obj, "studentId")).map_err(|e| e.to_string())?;
    let exam_raw = non_empty(obj, "examType")?;
    let exam_type =
        ExamType::parse(&exam_raw).ok_or_else(|| format!("unknown exam type {exam_raw}"))?;

    let marks = obj
        .get("marks")
        .and_then(|v| v.as_object())
        .ok_or("missing marks")?;
    let mut scores = BTreeMap::new();
    for (name, value) in marks {
        let subject = Subject::parse(name).ok_or_else(|| format!("unknown subject {name}"))?;
        let score = score_value(value).map_err(|reason| format!("{name}: {reason}"))?;
        if scores.insert(subject, score).is_some() {
            return Err(format!("{name}: subject given more than once"));
        }
    }

    let candidate = MarksCandidate {
        student_key,
        student_name: text(obj, "studentName"),
        class_name: text(obj, "class"),
        exam_type,
        scores,
    };
    MarksRecord::with_recorded_at(candidate, text(obj, "date")).map_err(|e| e.to_string())
}
