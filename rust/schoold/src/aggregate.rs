use crate::marks::{ExamType, MarksRecord, StudentKey, Subject};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const PASS_PERCENTAGE: f64 = 40.0;
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AggregateError {
    #[error("record {student_key}/{exam_type} has no score for {subject}")]
    MissingSubject {
        student_key: StudentKey,
        exam_type: ExamType,
        subject: Subject,
    },
}

impl AggregateError {
    pub fn code(&self) -> &'static str {
        "data_integrity"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStatistics {
    /// Zero means "no data"; the other fields are then all zero as well.
    pub record_count: usize,
    pub unique_student_count: usize,
    pub mean_percentage: f64,
    pub max_total: u32,
    /// Fraction in 0..=1.
    pub pass_rate: f64,
}

impl CohortStatistics {
    pub const EMPTY: CohortStatistics = CohortStatistics {
        record_count: 0,
        unique_student_count: 0,
        mean_percentage: 0.0,
        max_total: 0,
        pass_rate: 0.0,
    };
}

pub fn cohort_statistics(records: &[MarksRecord]) -> CohortStatistics {
    if records.is_empty() {
        return CohortStatistics::EMPTY;
    }
    let n = records.len() as f64;
    let unique: HashSet<&StudentKey> = records.iter().map(|r| r.student_key()).collect();
    // Mean of the stored (rounded) percentages, not of raw totals.
    let sum_pct: f64 = records.iter().map(|r| r.percentage()).sum();
    let max_total = records.iter().map(|r| r.total()).max().unwrap_or(0);
    let passed = records
        .iter()
        .filter(|r| r.percentage() >= PASS_PERCENTAGE)
        .count();

    CohortStatistics {
        record_count: records.len(),
        unique_student_count: unique.len(),
        mean_percentage: sum_pct / n,
        max_total,
        pass_rate: passed as f64 / n,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatistics {
    pub subject: Subject,
    pub mean: f64,
    pub max: u32,
    pub min: u32,
}

/// `None` for an empty cohort. Every record must carry the subject.
pub fn subject_statistics(
    records: &[MarksRecord],
    subject: Subject,
) -> Result<Option<SubjectStatistics>, AggregateError> {
    if records.is_empty() {
        return Ok(None);
    }
    let mut sum = 0_u64;
    let mut max = u32::MIN;
    let mut min = u32::MAX;
    for r in records {
        let Some(score) = r.score(subject) else {
            return Err(AggregateError::MissingSubject {
                student_key: r.student_key().clone(),
                exam_type: r.exam_type(),
                subject,
            });
        };
        sum += u64::from(score);
        max = max.max(score);
        min = min.min(score);
    }
    Ok(Some(SubjectStatistics {
        subject,
        mean: sum as f64 / records.len() as f64,
        max,
        min,
    }))
}

pub fn all_subject_statistics(
    records: &[MarksRecord],
) -> Result<Vec<SubjectStatistics>, AggregateError> {
    let mut out = Vec::with_capacity(Subject::ALL.len());
    for subject in Subject::ALL {
        if let Some(stats) = subject_statistics(records, subject)? {
            out.push(stats);
        }
    }
    Ok(out)
}

/// Best single exam per student by total, highest first. Ties keep whichever
/// record was seen first, and equal totals keep first-seen student order.
pub fn top_performers(records: &[MarksRecord], n: usize) -> Vec<&MarksRecord> {
    let mut order: Vec<&StudentKey> = Vec::new();
    let mut best: HashMap<&StudentKey, &MarksRecord> = HashMap::new();
    for r in records {
        let current_total = best.get(r.student_key()).map(|c| c.total());
        match current_total {
            Some(t) if r.total() <= t => {}
            Some(_) => {
                best.insert(r.student_key(), r);
            }
            None => {
                order.push(r.student_key());
                best.insert(r.student_key(), r);
            }
        }
    }

    let mut ranked: Vec<&MarksRecord> = order.iter().filter_map(|k| best.get(*k).copied()).collect();
    ranked.sort_by(|a, b| b.total().cmp(&a.total()));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub exam_type: ExamType,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnalytics<'a> {
    pub student_key: &'a StudentKey,
    pub exam_count: usize,
    pub mean_percentage: f64,
    pub best: &'a MarksRecord,
    /// Last in store order; recorded dates are not used for ordering.
    pub latest: &'a MarksRecord,
    /// `None` when no exam carries a score for the subject.
    pub subject_means: BTreeMap<Subject, Option<f64>>,
    pub trend: Vec<TrendPoint>,
}

/// Analytics over one student's records, in store order. `None` when the
/// student has no records.
pub fn student_analytics<'a>(records: &[&'a MarksRecord]) -> Option<StudentAnalytics<'a>> {
    let (first, _) = records.split_first()?;
    let latest = *records.last()?;

    let mut best: &MarksRecord = first;
    for r in records.iter().skip(1) {
        if r.percentage() > best.percentage() {
            best = r;
        }
    }

    let n = records.len() as f64;
    let mean_percentage = records.iter().map(|r| r.percentage()).sum::<f64>() / n;

    let mut subject_means = BTreeMap::new();
    for subject in Subject::ALL {
        let scores: Vec<u32> = records.iter().filter_map(|r| r.score(subject)).collect();
        let mean = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|v| f64::from(*v)).sum::<f64>() / scores.len() as f64)
        };
        subject_means.insert(subject, mean);
    }

    let trend = records
        .iter()
        .map(|r| TrendPoint {
            exam_type: r.exam_type(),
            percentage: r.percentage(),
        })
        .collect();

    Some(StudentAnalytics {
        student_key: first.student_key(),
        exam_count: records.len(),
        mean_percentage,
        best,
        latest,
        subject_means,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::{test_candidate, MarksCandidate, MarksRecord};

    fn record(key: &str, exam: ExamType, scores: [u32; 6]) -> MarksRecord {
        let mut c: MarksCandidate = test_candidate(key, exam, 0);
        for (subject, v) in Subject::ALL.into_iter().zip(scores) {
            c.scores.insert(subject, v);
        }
        MarksRecord::new(c).expect("record")
    }

    fn record_with_total(key: &str, exam: ExamType, total: u32) -> MarksRecord {
        let base = total / 6;
        let mut scores = [base; 6];
        scores[0] += total - base * 6;
        record(key, exam, scores)
    }

    #[test]
    fn empty_cohort_is_zero_state() {
        let stats = cohort_statistics(&[]);
        assert_eq!(stats, CohortStatistics::EMPTY);
        assert!(!stats.mean_percentage.is_nan());
        assert!(!stats.pass_rate.is_nan());
    }

    #[test]
    fn cohort_example_three_students() {
        let records = vec![
            record_with_total("1", ExamType::Final, 540),
            record_with_total("2", ExamType::Final, 480),
            record_with_total("3", ExamType::Final, 600),
        ];
        let stats = cohort_statistics(&records);
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.unique_student_count, 3);
        assert_eq!(stats.max_total, 600);
        assert_eq!(stats.pass_rate, 1.0);
        assert!((stats.mean_percentage - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pass_rate_counts_records_not_students() {
        let records = vec![
            record_with_total("1", ExamType::UnitTest1, 240),
            record_with_total("1", ExamType::UnitTest2, 239),
            record_with_total("2", ExamType::UnitTest1, 100),
            record_with_total("2", ExamType::UnitTest2, 500),
        ];
        let stats = cohort_statistics(&records);
        assert_eq!(stats.unique_student_count, 2);
        assert_eq!(stats.pass_rate, 0.5);
    }

    #[test]
    fn subject_statistics_over_cohort() {
        let records = vec![
            record("1", ExamType::Final, [90, 50, 50, 50, 50, 50]),
            record("2", ExamType::Final, [60, 50, 50, 50, 50, 50]),
            record("3", ExamType::Final, [75, 50, 50, 50, 50, 50]),
        ];
        let stats = subject_statistics(&records, Subject::Mathematics)
            .expect("stats")
            .expect("non-empty");
        assert_eq!(stats.max, 90);
        assert_eq!(stats.min, 60);
        assert!((stats.mean - 75.0).abs() < 1e-9);
        assert_eq!(subject_statistics(&[], Subject::Hindi), Ok(None));
        assert_eq!(all_subject_statistics(&records).expect("all").len(), 6);
    }

    #[test]
    fn subject_statistics_fails_on_missing_subject() {
        let raw = serde_json::json!({
            "studentKey": "R7",
            "studentName": "X",
            "className": "9",
            "examType": "Mid Term",
            "subjectScores": { "Mathematics": 80 },
            "recordedAt": "x"
        });
        let broken: MarksRecord = serde_json::from_value(raw).expect("load partial record");
        let records = vec![record("1", ExamType::Final, [50; 6]), broken];
        let err = subject_statistics(&records, Subject::Science).expect_err("missing subject");
        assert_eq!(err.code(), "data_integrity");
        assert!(err.to_string().contains("R7"));
        assert!(subject_statistics(&records, Subject::Mathematics).is_ok());
    }

    #[test]
    fn top_performers_keeps_best_exam_per_student() {
        let records = vec![
            record_with_total("A", ExamType::UnitTest1, 500),
            record_with_total("B", ExamType::UnitTest1, 520),
            record_with_total("A", ExamType::Final, 550),
        ];
        let top = top_performers(&records, DEFAULT_TOP_N);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].student_key().as_str(), "A");
        assert_eq!(top[0].total(), 550);
        assert_eq!(top[1].student_key().as_str(), "B");
    }

    #[test]
    fn top_performers_ties_are_stable_and_truncated() {
        let records = vec![
            record_with_total("A", ExamType::UnitTest1, 300),
            record_with_total("A", ExamType::UnitTest2, 300),
            record_with_total("B", ExamType::UnitTest1, 300),
            record_with_total("C", ExamType::UnitTest1, 100),
        ];
        let top = top_performers(&records, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].student_key().as_str(), "A");
        assert_eq!(top[0].exam_type(), ExamType::UnitTest1);
        assert_eq!(top[1].student_key().as_str(), "B");
    }

    #[test]
    fn student_analytics_uses_store_order_for_latest() {
        let a = record("S", ExamType::Final, [90; 6]);
        let b = record("S", ExamType::UnitTest1, [60; 6]);
        let c = record("S", ExamType::MidTerm, [90; 6]);
        let view = student_analytics(&[&a, &b, &c]).expect("analytics");
        assert_eq!(view.exam_count, 3);
        assert_eq!(view.best.exam_type(), ExamType::Final);
        assert_eq!(view.latest.exam_type(), ExamType::MidTerm);
        assert!((view.mean_percentage - 80.0).abs() < 1e-9);
        assert_eq!(view.subject_means[&Subject::Hindi], Some(80.0));
        assert_eq!(view.trend.len(), 3);
        assert!(student_analytics(&[]).is_none());
    }

    #[test]
    fn student_analytics_reports_unavailable_subjects() {
        let raw = serde_json::json!({
            "studentKey": "S",
            "studentName": "X",
            "className": "9",
            "examType": "Final",
            "subjectScores": { "Mathematics": 70 },
            "recordedAt": "x"
        });
        let partial: MarksRecord = serde_json::from_value(raw).expect("partial record");
        let view = student_analytics(&[&partial]).expect("analytics");
        assert_eq!(view.subject_means[&Subject::Mathematics], Some(70.0));
        assert_eq!(view.subject_means[&Subject::Computer], None);
    }
}
