use crate::db;
use crate::grade::{grade_of, Grade};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MAX_SCORE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subject {
    Mathematics,
    Science,
    English,
    #[serde(rename = "Social Studies")]
    SocialStudies,
    Hindi,
    Computer,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Mathematics,
        Subject::Science,
        Subject::English,
        Subject::SocialStudies,
        Subject::Hindi,
        Subject::Computer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Science => "Science",
            Subject::English => "English",
            Subject::SocialStudies => "Social Studies",
            Subject::Hindi => "Hindi",
            Subject::Computer => "Computer",
        }
    }

    /// Case-insensitive; spaces and underscores are ignored so
    /// `socialStudies`, `social_studies` and `Social Studies` all match.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Subject::ALL.into_iter().find(|s| {
            s.as_str().replace(' ', "").to_ascii_lowercase() == folded
        })
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "Unit Test 1")]
    UnitTest1,
    #[serde(rename = "Unit Test 2")]
    UnitTest2,
    #[serde(rename = "Mid Term")]
    MidTerm,
    Final,
}

impl ExamType {
    pub const ALL: [ExamType; 4] = [
        ExamType::UnitTest1,
        ExamType::UnitTest2,
        ExamType::MidTerm,
        ExamType::Final,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::UnitTest1 => "Unit Test 1",
            ExamType::UnitTest2 => "Unit Test 2",
            ExamType::MidTerm => "Mid Term",
            ExamType::Final => "Final",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "unittest1" | "ut1" => Some(ExamType::UnitTest1),
            "unittest2" | "ut2" => Some(ExamType::UnitTest2),
            "midterm" | "halfyearly" => Some(ExamType::MidTerm),
            "final" | "finalexam" | "annual" => Some(ExamType::Final),
            _ => None,
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roll number used to join marks to a student. Distinct from the roster's
/// internal id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentKey(String);

impl StudentKey {
    pub fn new(raw: &str) -> Result<Self, MarksError> {
        let t = raw.trim();
        if t.is_empty() {
            return Err(MarksError::validation("studentKey", "student key must not be empty"));
        }
        Ok(Self(t.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MarksError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("failed to persist marks: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl MarksError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        MarksError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MarksError::Validation { .. } => "bad_params",
            MarksError::Storage(_) => "db_update_failed",
        }
    }
}

/// Everything a submission supplies. Derived fields are not part of it.
#[derive(Debug, Clone)]
pub struct MarksCandidate {
    pub student_key: StudentKey,
    pub student_name: String,
    pub class_name: String,
    pub exam_type: ExamType,
    pub scores: BTreeMap<Subject, u32>,
}

impl MarksCandidate {
    pub fn validate(&self) -> Result<(), MarksError> {
        for subject in Subject::ALL {
            match self.scores.get(&subject) {
                None => {
                    return Err(MarksError::validation(
                        subject.as_str(),
                        "missing subject score",
                    ))
                }
                Some(v) if *v > MAX_SCORE => {
                    return Err(MarksError::validation(
                        subject.as_str(),
                        format!("score {v} is outside 0..={MAX_SCORE}"),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredRecord")]
pub struct MarksRecord {
    student_key: StudentKey,
    student_name: String,
    class_name: String,
    exam_type: ExamType,
    subject_scores: BTreeMap<Subject, u32>,
    total: u32,
    percentage: f64,
    grade: Grade,
    recorded_at: String,
}

/// On-disk shape. Derived fields present in the payload are ignored and
/// recomputed so they cannot drift from the scores. Scores are range-checked;
/// a missing subject is tolerated and surfaces later as a data-integrity error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    student_key: StudentKey,
    student_name: String,
    class_name: String,
    exam_type: ExamType,
    subject_scores: BTreeMap<Subject, u32>,
    recorded_at: String,
}

impl TryFrom<StoredRecord> for MarksRecord {
    type Error = MarksError;

    fn try_from(s: StoredRecord) -> Result<Self, Self::Error> {
        if let Some((subject, v)) = s.subject_scores.iter().find(|(_, v)| **v > MAX_SCORE) {
            return Err(MarksError::validation(
                subject.as_str(),
                format!("stored score {v} is outside 0..={MAX_SCORE}"),
            ));
        }
        Ok(MarksRecord::derive(
            s.student_key,
            s.student_name,
            s.class_name,
            s.exam_type,
            s.subject_scores,
            s.recorded_at,
        ))
    }
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl MarksRecord {
    /// Builds a record from a validated candidate, stamping the capture time.
    pub fn new(candidate: MarksCandidate) -> Result<Self, MarksError> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        Self::with_recorded_at(candidate, recorded_at)
    }

    pub fn with_recorded_at(candidate: MarksCandidate, recorded_at: String) -> Result<Self, MarksError> {
        candidate.validate()?;
        Ok(Self::derive(
            candidate.student_key,
            candidate.student_name,
            candidate.class_name,
            candidate.exam_type,
            candidate.scores,
            recorded_at,
        ))
    }

    fn derive(
        student_key: StudentKey,
        student_name: String,
        class_name: String,
        exam_type: ExamType,
        subject_scores: BTreeMap<Subject, u32>,
        recorded_at: String,
    ) -> Self {
        let total: u32 = subject_scores.values().sum();
        let max_total = f64::from(MAX_SCORE) * Subject::ALL.len() as f64;
        let percentage = round_2_decimals(f64::from(total) / max_total * 100.0);
        MarksRecord {
            student_key,
            student_name,
            class_name,
            exam_type,
            subject_scores,
            total,
            percentage,
            grade: grade_of(percentage),
            recorded_at,
        }
    }

    pub fn student_key(&self) -> &StudentKey {
        &self.student_key
    }
    pub fn student_name(&self) -> &str {
        &self.student_name
    }
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
    pub fn exam_type(&self) -> ExamType {
        self.exam_type
    }
    pub fn subject_scores(&self) -> &BTreeMap<Subject, u32> {
        &self.subject_scores
    }
    pub fn score(&self, subject: Subject) -> Option<u32> {
        self.subject_scores.get(&subject).copied()
    }
    pub fn total(&self) -> u32 {
        self.total
    }
    pub fn percentage(&self) -> f64 {
        self.percentage
    }
    pub fn grade(&self) -> Grade {
        self.grade
    }
    pub fn recorded_at(&self) -> &str {
        &self.recorded_at
    }

    pub fn matches(&self, key: &StudentKey, exam_type: ExamType) -> bool {
        self.student_key == *key && self.exam_type == exam_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Ordered marks collection mirrored to the `marksRecords` snapshot.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<MarksRecord>,
}

impl RecordStore {
    pub fn open(conn: &Connection) -> anyhow::Result<Self> {
        let records: Vec<MarksRecord> = db::snapshot_load(conn, db::MARKS_KEY)?;
        tracing::debug!(count = records.len(), "loaded marks snapshot");
        Ok(Self { records })
    }

    /// Unpersisted store over an incoming collection (import). Later
    /// duplicates of a key win, keeping the position of the first occurrence.
    pub(crate) fn with_records(incoming: Vec<MarksRecord>) -> Self {
        let mut records: Vec<MarksRecord> = Vec::with_capacity(incoming.len());
        for record in incoming {
            match records
                .iter()
                .position(|r| r.matches(&record.student_key, record.exam_type))
            {
                Some(i) => records[i] = record,
                None => records.push(record),
            }
        }
        Self { records }
    }

    pub fn upsert(
        &mut self,
        conn: &Connection,
        candidate: MarksCandidate,
    ) -> Result<(UpsertOutcome, &MarksRecord), MarksError> {
        let record = MarksRecord::new(candidate)?;
        self.upsert_record(conn, record)
    }

    fn upsert_record(
        &mut self,
        conn: &Connection,
        record: MarksRecord,
    ) -> Result<(UpsertOutcome, &MarksRecord), MarksError> {
        let existing = self
            .records
            .iter()
            .position(|r| r.matches(&record.student_key, record.exam_type));

        let (outcome, idx, previous) = match existing {
            Some(i) => {
                let prev = std::mem::replace(&mut self.records[i], record);
                (UpsertOutcome::Updated, i, Some(prev))
            }
            None => {
                self.records.push(record);
                (UpsertOutcome::Created, self.records.len() - 1, None)
            }
        };

        if let Err(e) = self.persist(conn) {
            match previous {
                Some(prev) => self.records[idx] = prev,
                None => {
                    self.records.pop();
                }
            }
            return Err(e.into());
        }

        let stored = &self.records[idx];
        tracing::info!(
            student_key = %stored.student_key,
            exam_type = %stored.exam_type,
            ?outcome,
            "marks upserted"
        );
        Ok((outcome, stored))
    }

    /// Removes the record for the key. Returns whether one existed.
    pub fn delete(
        &mut self,
        conn: &Connection,
        key: &StudentKey,
        exam_type: ExamType,
    ) -> Result<bool, MarksError> {
        let Some(idx) = self.records.iter().position(|r| r.matches(key, exam_type)) else {
            return Ok(false);
        };
        let removed = self.records.remove(idx);
        if let Err(e) = self.persist(conn) {
            self.records.insert(idx, removed);
            return Err(e.into());
        }
        tracing::info!(student_key = %key, exam_type = %exam_type, "marks deleted");
        Ok(true)
    }

    pub fn all(&self) -> &[MarksRecord] {
        &self.records
    }

    pub fn find_by_student(&self, key: &StudentKey) -> Vec<&MarksRecord> {
        self.records
            .iter()
            .filter(|r| r.student_key == *key)
            .collect()
    }

    pub fn find_one(&self, key: &StudentKey, exam_type: ExamType) -> Option<&MarksRecord> {
        self.records.iter().find(|r| r.matches(key, exam_type))
    }

    fn persist(&self, conn: &Connection) -> anyhow::Result<()> {
        db::snapshot_save(conn, db::MARKS_KEY, &self.records).map_err(|e| {
            tracing::warn!(error = %e, "marks snapshot write failed");
            e
        })
    }
}

#[cfg(test)]
pub(crate) fn test_candidate(key: &str, exam_type: ExamType, each: u32) -> MarksCandidate {
    MarksCandidate {
        student_key: StudentKey::new(key).expect("student key"),
        student_name: format!("Student {key}"),
        class_name: "10".to_string(),
        exam_type,
        scores: Subject::ALL.into_iter().map(|s| (s, each)).collect(),
    }
}
