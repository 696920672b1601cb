//! One generation run: call graph → plan → rendered artifacts → session.
//!
//! A run either produces a complete [`GenerationSession`] or an error; no
//! partially rendered batch escapes.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::analysis::callgraph::build_call_graph;
use crate::analysis::matcher::MatchPolicy;
use crate::errors::{ForgeError, ForgeResult};
use crate::models::{ArtifactKind, ClassModel, GeneratedArtifact, GenerationSession, SequenceDiagramModel};
use crate::synth::literals::LiteralGenerator;
use crate::synth::render::{java_identifier, ArtifactRenderer};
use crate::synth::resolver::{lookup_class, resolve_targets, service_class_model, SynthesisTarget};

pub const SUMMARY_FILE_NAME: &str = "GenerationSummary.txt";

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Trimmed, non-empty, first-occurrence-ordered selection.
fn normalize_selection(selected: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selected
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn session_id(timestamp: i64, selected: &[String]) -> String {
    format!("session_{timestamp}_{:08x}", crc32fast::hash(selected.join("\n").as_bytes()))
}

/// Accumulates artifacts for one run, skipping file names already emitted.
struct Batch {
    session_id: String,
    emitted: HashSet<String>,
    artifacts: Vec<GeneratedArtifact>,
}

impl Batch {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            emitted: HashSet::new(),
            artifacts: Vec::new(),
        }
    }

    fn claim(&mut self, file_name: &str) -> bool {
        self.emitted.insert(file_name.to_string())
    }

    fn push(&mut self, file_name: String, file_content: String, kind: ArtifactKind, related_class_name: &str) {
        self.artifacts.push(GeneratedArtifact {
            id: format!("{}_{}", self.session_id, self.artifacts.len()),
            file_name,
            file_content,
            kind,
            related_class_name: related_class_name.to_string(),
        });
    }
}

fn render_stub_target(
    target: &SynthesisTarget,
    catalog: &[ClassModel],
    renderer: &dyn ArtifactRenderer,
    literals: &mut LiteralGenerator,
    batch: &mut Batch,
) -> ForgeResult<()> {
    let modeled = lookup_class(&target.class_name, catalog).filter(|_| target.modeled);
    let class_name = modeled.map_or(target.class_name.as_str(), |c| c.name.as_str());
    let file_name = format!("{}Stub.java", java_identifier(class_name));
    if !batch.claim(&file_name) {
        debug!("{file_name} already generated in this run");
        return Ok(());
    }
    let content = match modeled {
        Some(class) => renderer.render_stub(class, literals)?,
        None => renderer.render_service_stub(&service_class_model(class_name), literals)?,
    };
    batch.push(file_name, content, ArtifactKind::Stub, class_name);
    Ok(())
}

fn render_driver_target(
    target: &SynthesisTarget,
    catalog: &[ClassModel],
    renderer: &dyn ArtifactRenderer,
    literals: &mut LiteralGenerator,
    batch: &mut Batch,
) -> ForgeResult<()> {
    let modeled = lookup_class(&target.class_name, catalog);
    let class_name = modeled.map_or(target.class_name.as_str(), |c| c.name.as_str());
    let file_name = format!("{}Driver.java", java_identifier(class_name));
    if !batch.claim(&file_name) {
        debug!("{file_name} already generated in this run");
        return Ok(());
    }
    let content = match modeled.filter(|c| !c.methods.is_empty()) {
        Some(class) => renderer.render_driver(class, &target.for_class, literals)?,
        None => renderer.render_fallback_driver(class_name, &target.for_class)?,
    };
    batch.push(file_name, content, ArtifactKind::Driver, class_name);
    Ok(())
}

/// Generate the stubs and drivers `selected` needs.
///
/// The call graph is rebuilt from `diagrams` on every call. When no target
/// remains the session holds a single summary artifact instead.
pub fn generate_artifacts(
    selected: &[String],
    catalog: &[ClassModel],
    diagrams: &[SequenceDiagramModel],
    renderer: &dyn ArtifactRenderer,
    literals: &mut LiteralGenerator,
    policy: MatchPolicy,
) -> ForgeResult<GenerationSession> {
    let selected = normalize_selection(selected);
    if selected.is_empty() {
        return Err(ForgeError::Generation("no classes selected for testing".to_string()));
    }

    let graph = build_call_graph(diagrams, &selected, policy);
    let plan = resolve_targets(&selected, &graph, catalog);
    let timestamp = now_millis();
    let mut batch = Batch::new(session_id(timestamp, &selected));

    for target in &plan.stubs {
        render_stub_target(target, catalog, renderer, literals, &mut batch)?;
    }
    for target in &plan.drivers {
        render_driver_target(target, catalog, renderer, literals, &mut batch)?;
    }
    if batch.artifacts.is_empty() {
        let summary = renderer.render_summary(&selected)?;
        batch.claim(SUMMARY_FILE_NAME);
        batch.push(SUMMARY_FILE_NAME.to_string(), summary, ArtifactKind::Summary, &selected.join(", "));
    }

    info!(
        "Generated {} artifact(s) for {} ({} stub target(s), {} driver target(s))",
        batch.artifacts.len(),
        selected.join(", "),
        plan.stubs.len(),
        plan.drivers.len()
    );
    Ok(GenerationSession {
        id: batch.session_id,
        selected_classes: selected,
        artifacts: batch.artifacts,
        timestamp,
    })
}
