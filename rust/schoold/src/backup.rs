//! Workspace bundles: a zip holding each collection as a JSON entry plus a
//! manifest with a SHA-256 and row count per entry. Import decodes every
//! entry into the domain types before anything is replaced.

use crate::faculty::FacultyMember;
use crate::marks::MarksRecord;
use crate::students::Student;
use crate::workspace::Collections;
use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT_V1: &str = "schoold-bundle-v1";
const MANIFEST_ENTRY: &str = "manifest.json";
const STUDENTS_ENTRY: &str = "data/students.json";
const FACULTY_ENTRY: &str = "data/faculty.json";
const MARKS_ENTRY: &str = "data/marksRecords.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    app_version: String,
    exported_at: String,
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    path: String,
    sha256: String,
    count: usize,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn encode_entry<T: Serialize>(path: &str, items: &[T]) -> anyhow::Result<(ManifestEntry, Vec<u8>)> {
    let bytes = serde_json::to_vec_pretty(items)
        .with_context(|| format!("failed to serialize {path}"))?;
    let entry = ManifestEntry {
        path: path.to_string(),
        sha256: sha256_hex(&bytes),
        count: items.len(),
    };
    Ok((entry, bytes))
}

pub fn export_bundle(
    out_path: &Path,
    students: &[Student],
    faculty: &[FacultyMember],
    marks: &[MarksRecord],
) -> anyhow::Result<ExportSummary> {
    let data = [
        encode_entry(STUDENTS_ENTRY, students)?,
        encode_entry(FACULTY_ENTRY, faculty)?,
        encode_entry(MARKS_ENTRY, marks)?,
    ];

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::with_capacity(data.len());
    for (entry, bytes) in data {
        zip.start_file(entry.path.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry.path))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write entry {}", entry.path))?;
        entries.push(entry);
    }

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        entries,
    };
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: manifest.entries.len() + 1,
    })
}

/// Reads and verifies a bundle. Nothing is written; the caller swaps the
/// returned collections in.
pub fn read_bundle(in_path: &Path) -> anyhow::Result<Collections> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let manifest_bytes = read_entry(&mut archive, MANIFEST_ENTRY)?;
    let manifest: Manifest =
        serde_json::from_slice(&manifest_bytes).context("manifest.json is invalid")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", manifest.format));
    }

    let students: Vec<Student> = decode_entry(&mut archive, &manifest, STUDENTS_ENTRY)?;
    let faculty: Vec<FacultyMember> = decode_entry(&mut archive, &manifest, FACULTY_ENTRY)?;
    let marks: Vec<MarksRecord> = decode_entry(&mut archive, &manifest, MARKS_ENTRY)?;

    check_unique(&students, &faculty, &marks)?;

    Ok(Collections {
        students,
        faculty,
        marks,
    })
}

/// Ids, roll numbers and marks keys must each be unique, as they are in a
/// live workspace.
fn check_unique(
    students: &[Student],
    faculty: &[FacultyMember],
    marks: &[MarksRecord],
) -> anyhow::Result<()> {
    let mut ids = HashSet::new();
    let mut rolls = HashSet::new();
    for s in students {
        if !ids.insert(s.id.as_str()) {
            return Err(anyhow!("duplicate student id {}", s.id.as_str()));
        }
        if !rolls.insert(s.roll_no.as_str()) {
            return Err(anyhow!("duplicate roll number {}", s.roll_no));
        }
    }
    let mut ids = HashSet::new();
    for f in faculty {
        if !ids.insert(f.id.as_str()) {
            return Err(anyhow!("duplicate faculty id {}", f.id.as_str()));
        }
    }
    let mut keys = HashSet::new();
    for r in marks {
        if !keys.insert((r.student_key().as_str(), r.exam_type())) {
            return Err(anyhow!(
                "duplicate marks record for {} / {}",
                r.student_key(),
                r.exam_type()
            ));
        }
    }
    Ok(())
}

fn read_entry(archive: &mut ZipArchive<File>, path: &str) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    archive
        .by_name(path)
        .with_context(|| format!("bundle missing {path}"))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {path}"))?;
    Ok(bytes)
}

fn decode_entry<T: DeserializeOwned>(
    archive: &mut ZipArchive<File>,
    manifest: &Manifest,
    path: &str,
) -> anyhow::Result<Vec<T>> {
    let expected = manifest
        .entries
        .iter()
        .find(|e| e.path == path)
        .ok_or_else(|| anyhow!("manifest has no entry for {path}"))?;
    let bytes = read_entry(archive, path)?;
    let actual = sha256_hex(&bytes);
    if actual != expected.sha256.to_ascii_lowercase() {
        return Err(anyhow!(
            "{path} checksum mismatch: manifest {}, bundle {actual}",
            expected.sha256
        ));
    }
    let items: Vec<T> =
        serde_json::from_slice(&bytes).with_context(|| format!("{path} is invalid"))?;
    if items.len() != expected.count {
        return Err(anyhow!(
            "{path} holds {} rows, manifest says {}",
            items.len(),
            expected.count
        ));
    }
    Ok(items)
}
