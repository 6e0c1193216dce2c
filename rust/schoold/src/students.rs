use crate::db;
use crate::marks::StudentKey;
use crate::roster::{new_id, required, RosterError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub roll_no: String,
    pub class_name: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub father_name: String,
    #[serde(default)]
    pub phone: String,
}

impl Student {
    /// Join key for marks records.
    pub fn student_key(&self) -> Result<StudentKey, crate::marks::MarksError> {
        StudentKey::new(&self.roll_no)
    }
}

/// Form fields for create/update. Updates re-supply every field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub father_name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentSort {
    Name,
    RollNo,
    Class,
}

impl StudentSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "name" => Some(StudentSort::Name),
            "rollNo" => Some(StudentSort::RollNo),
            "class" => Some(StudentSort::Class),
            _ => None,
        }
    }

    fn compare(self, a: &Student, b: &Student) -> Ordering {
        match self {
            StudentSort::Name => fold_cmp(&a.name, &b.name),
            StudentSort::RollNo => fold_cmp(&a.roll_no, &b.roll_no),
            StudentSort::Class => class_number(&a.class_name).cmp(&class_number(&b.class_name)),
        }
    }
}

fn fold_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// First run of digits in a class name ("Class 10-B" -> 10); 0 when none.
fn class_number(class_name: &str) -> u64 {
    let digits: String = class_name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct StudentRoster {
    students: Vec<Student>,
}

impl StudentRoster {
    pub fn open(conn: &Connection) -> anyhow::Result<Self> {
        let students: Vec<Student> = db::snapshot_load(conn, db::STUDENTS_KEY)?;
        tracing::debug!(count = students.len(), "loaded students snapshot");
        Ok(Self { students })
    }

    /// Unpersisted roster over an already validated collection.
    pub(crate) fn with_students(students: Vec<Student>) -> Self {
        Self { students }
    }

    pub fn all(&self) -> &[Student] {
        &self.students
    }

    pub fn find(&self, id: &StudentId) -> Option<&Student> {
        self.students.iter().find(|s| s.id == *id)
    }

    /// Case-insensitive substring match on name or roll number.
    pub fn search(&self, term: &str) -> Vec<&Student> {
        let needle = term.trim().to_lowercase();
        self.students
            .iter()
            .filter(|s| {
                needle.is_empty()
                    || s.name.to_lowercase().contains(&needle)
                    || s.roll_no.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn sorted(items: &mut [&Student], by: StudentSort) {
        items.sort_by(|a, b| by.compare(a, b));
    }

    /// Student portal login: exact roll number or name, ignoring case.
    pub fn lookup_login(&self, username: &str) -> Option<&Student> {
        let u = username.trim().to_lowercase();
        if u.is_empty() {
            return None;
        }
        self.students
            .iter()
            .find(|s| s.roll_no.to_lowercase() == u || s.name.to_lowercase() == u)
    }

    pub fn create(&mut self, conn: &Connection, draft: StudentDraft) -> Result<&Student, RosterError> {
        let student = self.build(StudentId::new(&new_id()), draft)?;
        self.students.push(student);
        if let Err(e) = self.persist(conn) {
            self.students.pop();
            return Err(e.into());
        }
        let created = &self.students[self.students.len() - 1];
        tracing::info!(student_id = created.id.as_str(), "student created");
        Ok(created)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        id: &StudentId,
        draft: StudentDraft,
    ) -> Result<&Student, RosterError> {
        let Some(idx) = self.students.iter().position(|s| s.id == *id) else {
            return Err(RosterError::NotFound("student"));
        };
        let student = self.build(id.clone(), draft)?;
        let previous = std::mem::replace(&mut self.students[idx], student);
        if let Err(e) = self.persist(conn) {
            self.students[idx] = previous;
            return Err(e.into());
        }
        tracing::info!(student_id = id.as_str(), "student updated");
        Ok(&self.students[idx])
    }

    pub fn delete(&mut self, conn: &Connection, id: &StudentId) -> Result<Student, RosterError> {
        let Some(idx) = self.students.iter().position(|s| s.id == *id) else {
            return Err(RosterError::NotFound("student"));
        };
        let removed = self.students.remove(idx);
        if let Err(e) = self.persist(conn) {
            self.students.insert(idx, removed);
            return Err(e.into());
        }
        tracing::info!(student_id = id.as_str(), "student deleted");
        Ok(removed)
    }

    /// Reorders the stored roster itself, not just a view of it.
    pub fn sort_in_place(&mut self, conn: &Connection, by: StudentSort) -> Result<(), RosterError> {
        let previous = self.students.clone();
        self.students.sort_by(|a, b| by.compare(a, b));
        if let Err(e) = self.persist(conn) {
            self.students = previous;
            return Err(e.into());
        }
        Ok(())
    }

    fn build(&self, id: StudentId, draft: StudentDraft) -> Result<Student, RosterError> {
        let name = required("name", &draft.name)?;
        let roll_no = required("rollNo", &draft.roll_no)?;
        let class_name = required("className", &draft.class_name)?;
        if self
            .students
            .iter()
            .any(|s| s.id != id && s.roll_no == roll_no)
        {
            return Err(RosterError::validation(
                "rollNo",
                format!("roll number {roll_no} is already assigned"),
            ));
        }
        Ok(Student {
            id,
            name,
            roll_no,
            class_name,
            section: draft.section.trim().to_string(),
            father_name: draft.father_name.trim().to_string(),
            phone: draft.phone.trim().to_string(),
        })
    }

    fn persist(&self, conn: &Connection) -> anyhow::Result<()> {
        db::snapshot_save(conn, db::STUDENTS_KEY, &self.students)
    }
}
