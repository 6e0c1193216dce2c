use crate::grade::Grade;
use crate::marks::{ExamType, MarksRecord, StudentKey, Subject, MAX_SCORE};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSheetRow {
    pub subject: Subject,
    pub max_marks: u32,
    /// `None` only for a malformed stored record.
    pub obtained: Option<u32>,
    pub percentage: Option<f64>,
}

/// Printable mark sheet data for one exam.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSheetModel {
    pub student_key: StudentKey,
    pub student_name: String,
    pub class_name: String,
    pub exam_type: ExamType,
    pub recorded_at: String,
    pub rows: Vec<MarkSheetRow>,
    pub total: u32,
    pub max_total: u32,
    pub percentage: f64,
    pub grade: Grade,
}

pub fn mark_sheet(record: &MarksRecord) -> MarkSheetModel {
    let rows = Subject::ALL
        .into_iter()
        .map(|subject| {
            let obtained = record.score(subject);
            MarkSheetRow {
                subject,
                max_marks: MAX_SCORE,
                obtained,
                percentage: obtained.map(|v| 100.0 * f64::from(v) / f64::from(MAX_SCORE)),
            }
        })
        .collect();

    MarkSheetModel {
        student_key: record.student_key().clone(),
        student_name: record.student_name().to_string(),
        class_name: record.class_name().to_string(),
        exam_type: record.exam_type(),
        recorded_at: record.recorded_at().to_string(),
        rows,
        total: record.total(),
        max_total: MAX_SCORE * Subject::ALL.len() as u32,
        percentage: record.percentage(),
        grade: record.grade(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::test_candidate;

    #[test]
    fn mark_sheet_lists_every_subject_in_order() {
        let record = MarksRecord::new(test_candidate("R5", ExamType::Final, 45)).expect("record");
        let sheet = mark_sheet(&record);
        assert_eq!(sheet.rows.len(), 6);
        assert_eq!(sheet.rows[3].subject, Subject::SocialStudies);
        assert_eq!(sheet.rows[0].obtained, Some(45));
        assert_eq!(sheet.rows[0].percentage, Some(45.0));
        assert_eq!(sheet.total, 270);
        assert_eq!(sheet.max_total, 600);
        assert_eq!(sheet.grade, Grade::D);

        let v = serde_json::to_value(&sheet).expect("serialize");
        assert_eq!(v["examType"], "Final");
        assert_eq!(v["rows"][3]["subject"], "Social Studies");
        assert_eq!(v["grade"]["label"], "D");
    }
}
