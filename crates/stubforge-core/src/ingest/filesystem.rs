//! Upload classification, content hashing and directory batch loading.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{ForgeError, ForgeResult, Parsed};
use crate::ingest::classes::parse_class_diagram;
use crate::ingest::matrix::parse_matrix;
use crate::ingest::sequence::parse_sequence_diagram;
use crate::models::{ClassModel, SequenceDiagramModel, SystemFunction, UploadKind, UploadedFile};

const MATRIX_EXTENSION: &str = "csv";
const DIAGRAM_EXTENSION: &str = "xml";

/// Elements only a sequence-diagram export contains.
const SEQUENCE_MARKERS: &[&str] = &["<InteractionLifeLine", "<Interaction ", "<InteractionActor"];

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", ".stubforge"];

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Reject a file whose extension does not fit the expected upload kind.
pub fn require_extension(file_name: &str, kind: UploadKind) -> ForgeResult<()> {
    let expected = match kind {
        UploadKind::Matrix => MATRIX_EXTENSION,
        UploadKind::SequenceDiagram | UploadKind::ClassDiagram => DIAGRAM_EXTENSION,
    };
    match extension_of(file_name) {
        Some(ext) if ext == expected => Ok(()),
        _ => Err(ForgeError::InvalidFormat(format!(
            "{file_name}: expected a .{expected} file"
        ))),
    }
}

/// Guess what an upload is from its extension and, for XML, its content.
pub fn detect_upload_kind(file_name: &str, text: &str) -> Option<UploadKind> {
    match extension_of(file_name)?.as_str() {
        MATRIX_EXTENSION => Some(UploadKind::Matrix),
        DIAGRAM_EXTENSION => {
            if SEQUENCE_MARKERS.iter().any(|m| text.contains(m)) {
                Some(UploadKind::SequenceDiagram)
            } else {
                Some(UploadKind::ClassDiagram)
            }
        }
        _ => None,
    }
}

pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

pub fn upload_record(file_name: &str, kind: UploadKind, text: &str) -> UploadedFile {
    UploadedFile {
        name: file_name.to_string(),
        kind,
        content_hash: content_hash(text),
        size_bytes: text.len() as i64,
    }
}

// ---------------------------------------------------------------------------
// Parsing one upload
// ---------------------------------------------------------------------------

/// The parsed payload of one upload, by kind.
#[derive(Clone, Debug)]
pub enum ParsedUpload {
    Matrix(Parsed<Vec<SystemFunction>>),
    SequenceDiagram(Parsed<SequenceDiagramModel>),
    ClassDiagram(Parsed<Vec<ClassModel>>),
}

impl ParsedUpload {
    pub fn kind(&self) -> UploadKind {
        match self {
            ParsedUpload::Matrix(_) => UploadKind::Matrix,
            ParsedUpload::SequenceDiagram(_) => UploadKind::SequenceDiagram,
            ParsedUpload::ClassDiagram(_) => UploadKind::ClassDiagram,
        }
    }
}

/// Parse `text` as an upload of `kind`.
pub fn parse_as(kind: UploadKind, file_name: &str, text: &str) -> ForgeResult<ParsedUpload> {
    require_extension(file_name, kind)?;
    Ok(match kind {
        UploadKind::Matrix => ParsedUpload::Matrix(parse_matrix(text)?),
        UploadKind::SequenceDiagram => {
            ParsedUpload::SequenceDiagram(parse_sequence_diagram(text, file_name)?)
        }
        UploadKind::ClassDiagram => ParsedUpload::ClassDiagram(parse_class_diagram(text)?),
    })
}

/// A file read from disk and parsed according to its detected kind.
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub outcome: ForgeResult<(UploadedFile, ParsedUpload)>,
}

fn load_worker(path: &Path) -> LoadedFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());
    let outcome = std::fs::read_to_string(path)
        .map_err(ForgeError::from)
        .and_then(|text| {
            let kind = detect_upload_kind(&file_name, &text).ok_or_else(|| {
                ForgeError::InvalidFormat(format!("{file_name}: not a .csv or .xml upload"))
            })?;
            let parsed = parse_as(kind, &file_name, &text)?;
            Ok((upload_record(&file_name, kind, &text), parsed))
        });
    LoadedFile {
        path: path.to_path_buf(),
        file_name,
        outcome,
    }
}

pub fn load_file(path: &Path) -> LoadedFile {
    load_worker(path)
}

// ---------------------------------------------------------------------------
// Directory batches
// ---------------------------------------------------------------------------

/// Candidate uploads under `dir`, sorted by path.
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| IMPLICIT_IGNORED_DIRS.contains(&name))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to read directory entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .is_some_and(|e| e == MATRIX_EXTENSION || e == DIAGRAM_EXTENSION)
        })
        .collect();
    files.sort();
    files
}

/// Read and parse `paths`, on the rayon pool when `parallel` is set.
/// Results keep the order of `paths`.
pub fn parallel_load(paths: &[PathBuf], parallel: bool) -> Vec<LoadedFile> {
    if paths.is_empty() {
        return vec![];
    }
    if !parallel {
        return paths.iter().map(|p| load_worker(p)).collect();
    }

    match rayon::ThreadPoolBuilder::new().build() {
        Ok(pool) => pool.install(|| paths.par_iter().map(|p| load_worker(p)).collect()),
        Err(e) => {
            debug!("Falling back to sequential load: {e}");
            paths.iter().map(|p| load_worker(p)).collect()
        }
    }
}
