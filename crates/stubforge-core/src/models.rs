//! Shared typed models used across ingestion, analysis, synthesis and storage.
//!
//! Every model serializes to camelCase JSON so persisted collections keep the
//! same shape the UI shell reads back.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sentinels and defaults
// ---------------------------------------------------------------------------

/// Participant type of a human/external actor lifeline.
pub const ACTOR_TYPE: &str = "ACTOR";

/// Participant type of an inline interaction occurrence (REF box).
pub const REF_TYPE: &str = "REF";

/// Participant type when the export did not resolve a backing class.
pub const UNKNOWN_TYPE: &str = "unknown";

pub const DEFAULT_PACKAGE: &str = "default";
pub const DEFAULT_RETURN_TYPE: &str = "void";
pub const DEFAULT_PARAMETER_TYPE: &str = "Object";

/// Stable short id derived from a CRC32 of `value`.
pub fn stable_id(prefix: &str, value: &str) -> String {
    format!("{prefix}_{:08x}", crc32fast::hash(value.as_bytes()))
}

// ---------------------------------------------------------------------------
// 1. SystemFunction
// ---------------------------------------------------------------------------

/// One function row of the requirements traceability matrix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFunction {
    pub id: String,
    pub name: String,
    pub sequence_diagram_names: Vec<String>,
}

impl SystemFunction {
    /// Union `names` into the diagram list, keeping first-seen order.
    pub fn merge_diagram_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.sequence_diagram_names.contains(&name) {
                self.sequence_diagram_names.push(name);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Class catalog
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterModel {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ParameterModel {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodModel {
    pub id: String,
    pub name: String,
    pub return_type: String,
    pub visibility: String,
    pub parameters: Vec<ParameterModel>,
}

impl MethodModel {
    /// A public method with no parameters returning `return_type`.
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: stable_id("op", &name),
            name,
            return_type: return_type.into(),
            visibility: "public".to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, type_name: &str) -> Self {
        self.parameters.push(ParameterModel::new(name, type_name));
        self
    }

    /// Merge key: `name(type, type, ...)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.type_name.as_str())
            .collect();
        format!("{}({})", self.name, types.join(", "))
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.trim().is_empty() || self.return_type.trim() == DEFAULT_RETURN_TYPE
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassModel {
    pub id: String,
    pub name: String,
    pub package_name: String,
    pub methods: Vec<MethodModel>,
    #[serde(default)]
    pub related_function_ids: BTreeSet<String>,
}

impl ClassModel {
    pub fn new(name: impl Into<String>, package_name: impl Into<String>) -> Self {
        let name = name.into();
        let package_name = package_name.into();
        Self {
            id: stable_id("cls", &format!("{package_name}.{name}")),
            name,
            package_name,
            methods: Vec::new(),
            related_function_ids: BTreeSet::new(),
        }
    }

    pub fn with_method(mut self, method: MethodModel) -> Self {
        self.methods.push(method);
        self
    }

    /// Deduplication identity.
    pub fn identity(&self) -> (&str, &str) {
        (self.package_name.as_str(), self.name.as_str())
    }

    pub fn has_default_package(&self) -> bool {
        self.package_name.is_empty() || self.package_name == DEFAULT_PACKAGE
    }
}

// ---------------------------------------------------------------------------
// 3. Sequence diagrams
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantModel {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ParticipantModel {
    pub fn is_actor(&self) -> bool {
        self.type_name == ACTOR_TYPE
    }

    pub fn is_ref(&self) -> bool {
        self.type_name == REF_TYPE
    }

    /// True when this participant may appear as a call-graph endpoint.
    pub fn is_class_backed(&self) -> bool {
        is_graph_type(&self.type_name)
    }
}

/// True for participant types that name a real class.
pub fn is_graph_type(type_name: &str) -> bool {
    let trimmed = type_name.trim();
    !trimmed.is_empty()
        && trimmed != ACTOR_TYPE
        && trimmed != REF_TYPE
        && trimmed != UNKNOWN_TYPE
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageModel {
    pub id: String,
    pub from: String,
    pub to: String,
    pub name: String,
    /// Declared vendor type (`create`, `synchCall`, `message`, ...).
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Where a reference was read from inside its diagram.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum ReferenceAnchor {
    /// An inline occurrence box, by participant id.
    Occurrence { participant_id: String },
    /// A message carrying a transition-from-operation link, by message id.
    Transition { message_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceModel {
    pub id: String,
    pub name: String,
    pub diagram_name: Option<String>,
    #[serde(default)]
    pub anchor: Option<ReferenceAnchor>,
}

impl ReferenceModel {
    /// Label used to resolve the target: the resolved name when present,
    /// otherwise the raw box label.
    pub fn target_label(&self) -> &str {
        match self.diagram_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDiagramModel {
    pub id: String,
    pub name: String,
    pub objects: Vec<ParticipantModel>,
    pub messages: Vec<MessageModel>,
    pub references: Vec<ReferenceModel>,
}

impl SequenceDiagramModel {
    pub fn participant(&self, id: &str) -> Option<&ParticipantModel> {
        self.objects.iter().find(|p| p.id == id)
    }

    /// Distinct class-backed participant types, in first-seen order.
    pub fn participant_types(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for participant in &self.objects {
            if participant.is_class_backed() && !seen.contains(&participant.type_name.as_str()) {
                seen.push(participant.type_name.as_str());
            }
        }
        seen
    }
}

// ---------------------------------------------------------------------------
// 4. Generated output
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Stub,
    Driver,
    Summary,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Stub => "stub",
            ArtifactKind::Driver => "driver",
            ArtifactKind::Summary => "summary",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
    pub id: String,
    pub file_name: String,
    pub file_content: String,
    pub kind: ArtifactKind,
    pub related_class_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
    pub id: String,
    pub selected_classes: Vec<String>,
    pub artifacts: Vec<GeneratedArtifact>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl GenerationSession {
    pub fn artifacts_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &GeneratedArtifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.file_name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// 5. Uploads
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadKind {
    Matrix,
    SequenceDiagram,
    ClassDiagram,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub kind: UploadKind,
    pub content_hash: String,
    pub size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_diagram_names_dedupes() {
        let mut function = SystemFunction {
            id: "FR1".into(),
            name: "Deposit".into(),
            sequence_diagram_names: vec!["A".into()],
        };
        function.merge_diagram_names(["B", "A", "C"]);
        assert_eq!(function.sequence_diagram_names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_method_signature() {
        let method = MethodModel::new("transfer", "boolean")
            .with_parameter("from", "Account")
            .with_parameter("amount", "double");
        assert_eq!(method.signature(), "transfer(Account, double)");
        assert!(!method.returns_void());
        assert!(MethodModel::new("reset", "void").returns_void());
    }

    #[test]
    fn test_graph_type_sentinels() {
        assert!(is_graph_type("AccountService"));
        assert!(!is_graph_type(ACTOR_TYPE));
        assert!(!is_graph_type(REF_TYPE));
        assert!(!is_graph_type(UNKNOWN_TYPE));
        assert!(!is_graph_type("  "));
    }

    #[test]
    fn test_reference_target_label_prefers_resolved_name() {
        let mut reference = ReferenceModel {
            id: "ref_0".into(),
            name: "ref Validate".into(),
            diagram_name: Some("Validate".into()),
            anchor: None,
        };
        assert_eq!(reference.target_label(), "Validate");
        reference.diagram_name = None;
        assert_eq!(reference.target_label(), "ref Validate");
    }

    #[test]
    fn test_participant_json_uses_type_key() {
        let participant = ParticipantModel {
            id: "lifeline_0".into(),
            name: "teller".into(),
            type_name: "Teller".into(),
        };
        let json = serde_json::to_value(&participant).unwrap();
        assert_eq!(json["type"], "Teller");
        let back: ParticipantModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, participant);
    }

    #[test]
    fn test_stable_id_deterministic() {
        assert_eq!(stable_id("sd", "Deposit"), stable_id("sd", "Deposit"));
        assert_ne!(stable_id("sd", "Deposit"), stable_id("sd", "Withdraw"));
        assert!(stable_id("cls", "x").starts_with("cls_"));
    }
}
