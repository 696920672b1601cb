//! Stateful façade a UI shell drives.
//!
//! A [`Workspace`] owns every top-level collection, merges parsed uploads
//! into them, keeps class/function links current and writes each touched
//! collection back to its [`StateStore`] as JSON. All writes happen on the
//! caller's thread; only directory parsing fans out to rayon.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::linker::link_related_functions;
use crate::config::ForgeConfig;
use crate::errors::{Diagnostic, DiagnosticKind, ForgeError, ForgeResult};
use crate::ingest::classes::dedupe_classes;
use crate::ingest::filesystem::{load_file, parallel_load, parse_as, scan_directory, upload_record, LoadedFile, ParsedUpload};
use crate::ingest::sequence::diagram_name_from_file;
use crate::models::{
    ClassModel, GeneratedArtifact, GenerationSession, SequenceDiagramModel, SystemFunction, UploadKind,
    UploadedFile,
};
use crate::store::state::{load_json, save_json, StateStore};
use crate::synth::generator::generate_artifacts;
use crate::synth::literals::LiteralGenerator;
use crate::synth::render::{ArtifactRenderer, JavaRenderer};

pub const UPLOADS_KEY: &str = "uploadedFiles";
pub const FUNCTIONS_KEY: &str = "systemFunctions";
pub const DIAGRAMS_KEY: &str = "sequenceDiagrams";
pub const CLASSES_KEY: &str = "classes";
pub const ARTIFACTS_KEY: &str = "generatedArtifacts";
pub const SESSIONS_KEY: &str = "generationSessions";
pub const STEP_KEY: &str = "currentStep";

const ALL_KEYS: &[&str] = &[
    UPLOADS_KEY,
    FUNCTIONS_KEY,
    DIAGRAMS_KEY,
    CLASSES_KEY,
    ARTIFACTS_KEY,
    SESSIONS_KEY,
    STEP_KEY,
];

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-facing outcome message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    fn from_diagnostic(file_name: &str, diagnostic: &Diagnostic) -> Self {
        let message = format!("{file_name}: {}", diagnostic.message);
        match diagnostic.kind {
            DiagnosticKind::DuplicateClass => Self::info(message),
            _ => Self::warning(message),
        }
    }

    /// Notice for an upload rejected before anything was merged.
    fn rejected(file_name: &str, error: &ForgeError) -> Self {
        match error {
            ForgeError::ColumnsNotFound(_) => {
                Self::warning(format!("{file_name}: no functions loaded. {error}"))
            }
            _ => Self::error(format!("{file_name} was not loaded: {error}")),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Every collection the workspace persists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub uploaded_files: Vec<UploadedFile>,
    pub functions: Vec<SystemFunction>,
    pub diagrams: Vec<SequenceDiagramModel>,
    pub classes: Vec<ClassModel>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub sessions: Vec<GenerationSession>,
    pub current_step: u32,
}

pub struct Workspace<S: StateStore> {
    store: S,
    config: ForgeConfig,
    state: WorkspaceState,
}

impl<S: StateStore> Workspace<S> {
    /// Restore every collection from `store`. Missing keys start empty; a
    /// collection that no longer decodes starts empty with a warning.
    pub fn open(store: S, config: ForgeConfig) -> ForgeResult<(Self, Vec<Notice>)> {
        let mut notices = Vec::new();
        let state = WorkspaceState {
            uploaded_files: restore(&store, &config, UPLOADS_KEY, &mut notices)?,
            functions: restore(&store, &config, FUNCTIONS_KEY, &mut notices)?,
            diagrams: restore(&store, &config, DIAGRAMS_KEY, &mut notices)?,
            classes: restore(&store, &config, CLASSES_KEY, &mut notices)?,
            artifacts: restore(&store, &config, ARTIFACTS_KEY, &mut notices)?,
            sessions: restore(&store, &config, SESSIONS_KEY, &mut notices)?,
            current_step: restore(&store, &config, STEP_KEY, &mut notices)?,
        };
        info!(
            "Opened workspace {}: {} functions, {} diagrams, {} classes, {} sessions",
            config.namespace,
            state.functions.len(),
            state.diagrams.len(),
            state.classes.len(),
            state.sessions.len()
        );
        Ok((Self { store, config, state }, notices))
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist<T: Serialize + ?Sized>(&self, collection: &str, value: &T) -> ForgeResult<()> {
        save_json(&self.store, &self.config.state_key(collection), value)
    }

    fn persist_all(&self, collections: &[&str]) -> ForgeResult<()> {
        for &collection in collections {
            match collection {
                UPLOADS_KEY => self.persist(collection, &self.state.uploaded_files)?,
                FUNCTIONS_KEY => self.persist(collection, &self.state.functions)?,
                DIAGRAMS_KEY => self.persist(collection, &self.state.diagrams)?,
                CLASSES_KEY => self.persist(collection, &self.state.classes)?,
                ARTIFACTS_KEY => self.persist(collection, &self.state.artifacts)?,
                SESSIONS_KEY => self.persist(collection, &self.state.sessions)?,
                STEP_KEY => self.persist(collection, &self.state.current_step)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn persist_notice(&self, collections: &[&str]) -> Option<Notice> {
        self.persist_all(collections).err().map(|e| {
            warn!("Failed to persist workspace state: {e}");
            Notice::error(format!("changes could not be saved: {e}"))
        })
    }

    fn relink(&mut self) -> usize {
        link_related_functions(
            &mut self.state.classes,
            &self.state.functions,
            &self.state.diagrams,
            self.config.match_policy,
        )
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    pub fn ingest_matrix(&mut self, file_name: &str, text: &str) -> Vec<Notice> {
        self.ingest_text(UploadKind::Matrix, file_name, text)
    }

    pub fn ingest_sequence_diagram(&mut self, file_name: &str, text: &str) -> Vec<Notice> {
        self.ingest_text(UploadKind::SequenceDiagram, file_name, text)
    }

    pub fn ingest_class_diagram(&mut self, file_name: &str, text: &str) -> Vec<Notice> {
        self.ingest_text(UploadKind::ClassDiagram, file_name, text)
    }

    fn ingest_text(&mut self, kind: UploadKind, file_name: &str, text: &str) -> Vec<Notice> {
        match parse_as(kind, file_name, text) {
            Ok(parsed) => self.merge_upload(upload_record(file_name, kind, text), parsed),
            Err(e) => {
                warn!("Rejected {file_name}: {e}");
                vec![Notice::rejected(file_name, &e)]
            }
        }
    }

    /// Read, detect and ingest one file from disk.
    pub fn ingest_file(&mut self, path: &Path) -> Vec<Notice> {
        let loaded = load_file(path);
        self.merge_loaded(loaded)
    }

    /// Ingest every `.csv`/`.xml` file under `dir`. Files are parsed in
    /// parallel when configured and merged one by one in path order.
    pub fn ingest_directory(&mut self, dir: &Path) -> Vec<Notice> {
        let paths = scan_directory(dir);
        if paths.is_empty() {
            return vec![Notice::warning(format!(
                "{} contains no .csv or .xml files",
                dir.display()
            ))];
        }
        let loaded = parallel_load(&paths, self.config.parallel_ingest);
        let mut notices = Vec::new();
        for file in loaded {
            notices.extend(self.merge_loaded(file));
        }
        notices
    }

    fn merge_loaded(&mut self, loaded: LoadedFile) -> Vec<Notice> {
        match loaded.outcome {
            Ok((record, parsed)) => self.merge_upload(record, parsed),
            Err(e) => {
                warn!("Rejected {}: {e}", loaded.path.display());
                vec![Notice::rejected(&loaded.file_name, &e)]
            }
        }
    }

    fn merge_upload(&mut self, record: UploadedFile, parsed: ParsedUpload) -> Vec<Notice> {
        let file_name = record.name.clone();
        let mut notices = Vec::new();
        let touched = match parsed {
            ParsedUpload::Matrix(parsed) => {
                notices.extend(parsed.diagnostics.iter().map(|d| Notice::from_diagnostic(&file_name, d)));
                let count = parsed.value.len();
                self.merge_functions(parsed.value);
                notices.push(Notice::info(format!("{file_name}: loaded {count} system function(s)")));
                FUNCTIONS_KEY
            }
            ParsedUpload::SequenceDiagram(parsed) => {
                notices.extend(parsed.diagnostics.iter().map(|d| Notice::from_diagnostic(&file_name, d)));
                let diagram = parsed.value;
                notices.push(Notice::info(format!(
                    "{file_name}: loaded diagram {} ({} participants, {} messages)",
                    diagram.name,
                    diagram.objects.len(),
                    diagram.messages.len()
                )));
                self.merge_diagram(diagram);
                DIAGRAMS_KEY
            }
            ParsedUpload::ClassDiagram(parsed) => {
                notices.extend(parsed.diagnostics.iter().map(|d| Notice::from_diagnostic(&file_name, d)));
                let count = parsed.value.len();
                let mut merge_diagnostics = Vec::new();
                let existing = std::mem::take(&mut self.state.classes);
                self.state.classes = dedupe_classes(existing.into_iter().chain(parsed.value), &mut merge_diagnostics);
                notices.extend(merge_diagnostics.iter().map(|d| Notice::from_diagnostic(&file_name, d)));
                notices.push(Notice::info(format!("{file_name}: loaded {count} class(es)")));
                CLASSES_KEY
            }
        };

        match self.state.uploaded_files.iter_mut().find(|f| f.name == record.name) {
            Some(slot) => *slot = record,
            None => self.state.uploaded_files.push(record),
        }
        let links = self.relink();
        info!("Merged {file_name}; {links} class/function link(s)");

        notices.extend(self.persist_notice(&[UPLOADS_KEY, touched, CLASSES_KEY]));
        notices
    }

    fn merge_functions(&mut self, incoming: Vec<SystemFunction>) {
        for function in incoming {
            match self.state.functions.iter_mut().find(|f| f.id == function.id) {
                Some(existing) => {
                    if existing.name.trim().is_empty() {
                        existing.name = function.name;
                    }
                    existing.merge_diagram_names(function.sequence_diagram_names);
                }
                None => self.state.functions.push(function),
            }
        }
    }

    /// A diagram replaces any loaded diagram of the same name.
    fn merge_diagram(&mut self, diagram: SequenceDiagramModel) {
        match self.state.diagrams.iter_mut().find(|d| d.name == diagram.name) {
            Some(slot) => *slot = diagram,
            None => self.state.diagrams.push(diagram),
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Drop the diagram called `name` and the upload record it came from.
    /// Returns false when no such diagram is loaded.
    pub fn remove_diagram(&mut self, name: &str) -> ForgeResult<bool> {
        let before = self.state.diagrams.len();
        self.state.diagrams.retain(|d| d.name != name);
        if self.state.diagrams.len() == before {
            return Ok(false);
        }
        self.state.uploaded_files.retain(|f| {
            f.kind != UploadKind::SequenceDiagram || diagram_name_from_file(&f.name) != name
        });
        self.relink();
        self.persist_all(&[DIAGRAMS_KEY, UPLOADS_KEY, CLASSES_KEY])?;
        info!("Removed diagram {name}");
        Ok(true)
    }

    pub fn set_step(&mut self, step: u32) -> ForgeResult<()> {
        self.state.current_step = step;
        self.persist(STEP_KEY, &step)
    }

    /// Forget every generation session and its artifacts.
    pub fn clear_sessions(&mut self) -> ForgeResult<()> {
        self.state.sessions.clear();
        self.state.artifacts.clear();
        self.persist_all(&[SESSIONS_KEY, ARTIFACTS_KEY])
    }

    /// Replace the whole state with an empty one and drop every stored key
    /// in a single store operation.
    pub fn reset(&mut self) -> ForgeResult<()> {
        let keys: Vec<String> = ALL_KEYS.iter().map(|c| self.config.state_key(c)).collect();
        self.store.clear_all(&keys)?;
        self.state = WorkspaceState::default();
        info!("Reset workspace {}", self.config.namespace);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate with the bundled Java renderer.
    pub fn generate(&mut self, selected: &[String]) -> Result<GenerationSession, Notice> {
        let renderer = JavaRenderer::new(self.config.java_package.clone());
        self.generate_with(selected, &renderer)
    }

    /// Run one generation and record its session. Nothing is recorded when
    /// rendering or saving fails.
    pub fn generate_with(
        &mut self,
        selected: &[String],
        renderer: &dyn ArtifactRenderer,
    ) -> Result<GenerationSession, Notice> {
        let mut literals = LiteralGenerator::from_seed_option(self.config.seed);
        let session = generate_artifacts(
            selected,
            &self.state.classes,
            &self.state.diagrams,
            renderer,
            &mut literals,
            self.config.match_policy,
        )
        .map_err(|e| {
            warn!("Generation failed: {e}");
            Notice::error(format!("Generation failed: {e}"))
        })?;

        let mut artifacts = self.state.artifacts.clone();
        artifacts.extend(session.artifacts.iter().cloned());
        let mut sessions = self.state.sessions.clone();
        sessions.push(session.clone());

        self.persist(ARTIFACTS_KEY, &artifacts)
            .and_then(|_| self.persist(SESSIONS_KEY, &sessions))
            .map_err(|e| {
                warn!("Failed to persist generation session: {e}");
                if let Err(rollback) = self.persist_all(&[ARTIFACTS_KEY, SESSIONS_KEY]) {
                    warn!("Failed to restore saved generation state: {rollback}");
                }
                Notice::error(format!("Generation results could not be saved: {e}"))
            })?;

        self.state.artifacts = artifacts;
        self.state.sessions = sessions;
        Ok(session)
    }
}

/// Decode one stored collection; undecodable values fall back to empty.
fn restore<T, S>(store: &S, config: &ForgeConfig, collection: &str, notices: &mut Vec<Notice>) -> ForgeResult<T>
where
    T: serde::de::DeserializeOwned + Default,
    S: StateStore,
{
    match load_json(store, &config.state_key(collection)) {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(ForgeError::Json(e)) => {
            warn!("Discarding unreadable {collection}: {e}");
            notices.push(Notice::warning(format!(
                "saved {collection} could not be read and were discarded"
            )));
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}
