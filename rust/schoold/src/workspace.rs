use crate::db;
use crate::faculty::{FacultyMember, FacultyRoster};
use crate::marks::{MarksRecord, RecordStore};
use crate::students::{Student, StudentRoster};
use anyhow::Context;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// An open workspace: the database plus the three collections loaded from it.
pub struct Workspace {
    pub path: PathBuf,
    pub conn: Connection,
    pub students: StudentRoster,
    pub faculty: FacultyRoster,
    pub marks: RecordStore,
}

/// A full replacement set, as produced by a browser import or a bundle.
#[derive(Debug, Default)]
pub struct Collections {
    pub students: Vec<Student>,
    pub faculty: Vec<FacultyMember>,
    pub marks: Vec<MarksRecord>,
}

impl Workspace {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(path)?;
        let students = StudentRoster::open(&conn).context("failed to load students")?;
        let faculty = FacultyRoster::open(&conn).context("failed to load faculty")?;
        let marks = RecordStore::open(&conn).context("failed to load marks")?;
        tracing::info!(
            workspace = %path.to_string_lossy(),
            students = students.all().len(),
            faculty = faculty.all().len(),
            marks = marks.all().len(),
            "workspace opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            conn,
            students,
            faculty,
            marks,
        })
    }

    /// Replaces all three collections. The snapshots are written in one
    /// transaction and memory is only swapped once it commits, so a failure
    /// leaves both the database and the loaded collections untouched.
    pub fn replace_collections(&mut self, incoming: Collections) -> anyhow::Result<()> {
        let students = StudentRoster::with_students(incoming.students);
        let faculty = FacultyRoster::with_members(incoming.faculty);
        let marks = RecordStore::with_records(incoming.marks);

        let payloads = [
            (db::STUDENTS_KEY, db::snapshot_payload(db::STUDENTS_KEY, students.all())?),
            (db::FACULTY_KEY, db::snapshot_payload(db::FACULTY_KEY, faculty.all())?),
            (db::MARKS_KEY, db::snapshot_payload(db::MARKS_KEY, marks.all())?),
        ];
        db::snapshot_save_many(&self.conn, &payloads).map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "collection replace rolled back");
            e
        })?;

        tracing::info!(
            students = students.all().len(),
            faculty = faculty.all().len(),
            marks = marks.all().len(),
            "collections replaced"
        );
        self.students = students;
        self.faculty = faculty;
        self.marks = marks;
        Ok(())
    }
}
