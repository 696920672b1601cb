//! Sequence-diagram ingestion from vendor "simple structure" XML exports.
//!
//! Produces a [`SequenceDiagramModel`]: participants (lifelines, actors, REF
//! occurrences), the messages between them, and the references REF boxes and
//! operation transitions point at. Structural problems (wrong root marker, no
//! frame, no interaction) are fatal for the file; everything else degrades
//! into [`Diagnostic`]s.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::analysis::matcher::{labels_match, strip_reference_prefix};
use crate::errors::{Diagnostic, DiagnosticKind, ForgeError, ForgeResult, Parsed};
use crate::ingest::xml::{parse_vendor_document, ModelIndex, NameTable, XmlElement};
use crate::models::{
    stable_id, MessageModel, ParticipantModel, ReferenceAnchor, ReferenceModel,
    SequenceDiagramModel, ACTOR_TYPE, REF_TYPE, UNKNOWN_TYPE,
};

// ---------------------------------------------------------------------------
// Vendor tags
// ---------------------------------------------------------------------------

const LIFELINE_TAG: &str = "InteractionLifeLine";
const ACTOR_TAG: &str = "InteractionActor";
const OCCURRENCE_TAG: &str = "InteractionOccurrence";
const RELATIONSHIP_CONTAINER_TAG: &str = "ModelRelationshipContainer";

/// Prefix of references synthesized from operation transitions.
pub const SYNTHETIC_REFERENCE_PREFIX: &str = "REF_";

/// Lookup tables shared by every step of one parse call.
struct ParseContext<'a> {
    index: ModelIndex<'a>,
    operations: NameTable,
    data_types: NameTable,
    diagrams: Option<&'a XmlElement>,
}

/// A participant together with the model definition it came from.
struct ParticipantSource<'a> {
    participant: ParticipantModel,
    model_id: Option<&'a str>,
    definition: &'a XmlElement,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Diagram name from an uploaded file name: directory and extension stripped.
pub fn diagram_name_from_file(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// The frame shape's model definition, else the first frame definition.
fn locate_root_frame<'a>(models: &'a XmlElement, ctx: &ParseContext<'a>) -> Option<&'a XmlElement> {
    if let Some(diagrams) = ctx.diagrams {
        for shape in diagrams.descendants() {
            if shape.name != "Frame" {
                continue;
            }
            if let Some(frame) = shape.attr("Model").and_then(|id| ctx.index.get(id)) {
                if frame.name == "Frame" {
                    return Some(frame);
                }
            }
        }
    }
    models.definitions("Frame").into_iter().next()
}

fn locate_interaction<'a>(frame: &'a XmlElement, models: &'a XmlElement) -> Option<&'a XmlElement> {
    frame
        .definitions("Interaction")
        .into_iter()
        .next()
        .or_else(|| models.definitions("Interaction").into_iter().next())
}

/// Definitions of `tag` the diagram actually draws: the targets of its shapes
/// when it has any, otherwise every definition under `scope`.
fn participant_definitions<'a>(
    tag: &str,
    scope: &'a XmlElement,
    ctx: &ParseContext<'a>,
) -> Vec<&'a XmlElement> {
    if let Some(diagrams) = ctx.diagrams {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut drawn = Vec::new();
        for shape in diagrams.descendants() {
            if shape.name != tag {
                continue;
            }
            let Some(definition) = shape.attr("Model").and_then(|id| ctx.index.get(id)) else {
                continue;
            };
            if definition.name != tag {
                continue;
            }
            if let Some(id) = definition.id() {
                if seen.insert(id) {
                    drawn.push(definition);
                }
            }
        }
        if !drawn.is_empty() {
            return drawn;
        }
    }
    scope.definitions(tag)
}

/// Backing class of a lifeline via its `BaseClassifier` link.
fn lifeline_type(lifeline: &XmlElement, ctx: &ParseContext<'_>) -> String {
    if let Some(name) = lifeline
        .attr("BaseClassifier")
        .and_then(|id| ctx.data_types.get(id))
    {
        return name.to_string();
    }
    if let Some(classifier) = lifeline.child("BaseClassifier") {
        for reference in &classifier.children {
            if let Some(name) = ctx.data_types.resolve_reference(reference) {
                if !name.trim().is_empty() {
                    return name.trim().to_string();
                }
            }
        }
    }
    UNKNOWN_TYPE.to_string()
}

/// Operation named by a transition-from-operation link.
fn transit_operation(element: &XmlElement, ctx: &ParseContext<'_>) -> Option<String> {
    if let Some(name) = element
        .attr("TransitFromOperation")
        .and_then(|id| ctx.operations.get(id))
    {
        return Some(name.to_string());
    }
    let link = element.child("TransitFromOperation")?;
    if let Some(name) = link.display_name() {
        return Some(name.to_string());
    }
    link.children
        .iter()
        .find_map(|op| ctx.operations.resolve_reference(op))
}

/// Name of the interaction a REF occurrence covers.
fn covered_interaction(element: &XmlElement, ctx: &ParseContext<'_>) -> Option<String> {
    let link = element.child("CoveredInteraction")?;
    link.children.iter().find_map(|target| {
        target
            .idref()
            .and_then(|id| ctx.index.get(id))
            .and_then(|def| def.display_name())
            .or_else(|| target.display_name())
            .map(str::to_string)
    })
}

/// Name of the operation a message is bound to, if any.
fn bound_operation(message: &XmlElement, ctx: &ParseContext<'_>) -> Option<String> {
    let call = message.child("ActionType")?.child("ActionTypeCall")?;
    if let Some(name) = call.attr("Operation").and_then(|id| ctx.operations.get(id)) {
        return Some(name.to_string());
    }
    call.children
        .iter()
        .filter(|c| c.name == "Operation")
        .find_map(|op| ctx.operations.resolve_reference(op))
}

fn declared_message_type(message: &XmlElement) -> String {
    if let Some(declared) = message.attr("Type") {
        return declared.to_string();
    }
    let action = message
        .child("ActionType")
        .and_then(|a| a.first_child_element())
        .map(|a| a.name.as_str());
    match action {
        Some("ActionTypeCall") => "synchCall".to_string(),
        Some("ActionTypeCreate") => "create".to_string(),
        Some("ActionTypeReturn") => "return".to_string(),
        _ => "message".to_string(),
    }
}

/// `op` with the argument list of `original`, when it had one.
fn bound_display_name(operation: &str, original: &str) -> String {
    match original.find('(') {
        Some(start) if original.trim_end().ends_with(')') => {
            format!("{operation}{}", original[start..].trim_end())
        }
        _ => operation.to_string(),
    }
}

/// Message definitions held by relationship containers.
fn relationship_messages(models: &XmlElement) -> Vec<&XmlElement> {
    let mut messages = Vec::new();
    let mut found_container = false;
    for container in models.descendants() {
        if container.name != RELATIONSHIP_CONTAINER_TAG {
            continue;
        }
        found_container = true;
        messages.extend(
            container
                .model_children()
                .into_iter()
                .filter(|c| c.name == "Message" && c.is_definition()),
        );
    }
    if !found_container {
        debug!("No relationship container found; scanning all message definitions");
        return models.definitions("Message");
    }
    messages
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

fn collect_participants<'a>(scope: &'a XmlElement, ctx: &ParseContext<'a>) -> Vec<ParticipantSource<'a>> {
    let mut sources = Vec::new();

    for (ordinal, lifeline) in participant_definitions(LIFELINE_TAG, scope, ctx)
        .into_iter()
        .enumerate()
    {
        let type_name = lifeline_type(lifeline, ctx);
        let name = lifeline
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| type_name.clone());
        sources.push(ParticipantSource {
            participant: ParticipantModel {
                id: format!("lifeline_{ordinal}"),
                name,
                type_name,
            },
            model_id: lifeline.id(),
            definition: lifeline,
        });
    }

    for (ordinal, actor) in participant_definitions(ACTOR_TAG, scope, ctx)
        .into_iter()
        .enumerate()
    {
        sources.push(ParticipantSource {
            participant: ParticipantModel {
                id: format!("actor_{ordinal}"),
                name: actor.display_name().unwrap_or("Actor").to_string(),
                type_name: ACTOR_TYPE.to_string(),
            },
            model_id: actor.id(),
            definition: actor,
        });
    }

    for (ordinal, occurrence) in participant_definitions(OCCURRENCE_TAG, scope, ctx)
        .into_iter()
        .enumerate()
    {
        sources.push(ParticipantSource {
            participant: ParticipantModel {
                id: format!("ref_box_{ordinal}"),
                name: occurrence.display_name().unwrap_or("ref").to_string(),
                type_name: REF_TYPE.to_string(),
            },
            model_id: occurrence.id(),
            definition: occurrence,
        });
    }

    sources
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Parse one sequence-diagram export.
///
/// # Errors
///
/// `InvalidFormat`/`Xml` for documents that are not well-formed vendor
/// exports, `Structure` when no root frame or interaction can be found.
pub fn parse_sequence_diagram(
    text: &str,
    file_name: &str,
) -> ForgeResult<Parsed<SequenceDiagramModel>> {
    let root = parse_vendor_document(text)?;
    let name = diagram_name_from_file(file_name);

    let models = root
        .child("Models")
        .ok_or_else(|| ForgeError::Structure(format!("{file_name}: export has no <Models> section")))?;
    let ctx = ParseContext {
        index: ModelIndex::build(models),
        operations: NameTable::operations(&root),
        data_types: NameTable::data_types(&root),
        diagrams: root.child("Diagrams"),
    };

    let frame = locate_root_frame(models, &ctx).ok_or_else(|| {
        ForgeError::Structure(format!("{file_name}: no root interaction frame"))
    })?;
    let interaction = locate_interaction(frame, models).ok_or_else(|| {
        ForgeError::Structure(format!("{file_name}: no interaction element"))
    })?;

    // Participants normally live under the interaction; some exports hoist
    // them next to the frame instead.
    let scope = if [LIFELINE_TAG, ACTOR_TAG, OCCURRENCE_TAG]
        .iter()
        .any(|tag| !interaction.definitions(tag).is_empty())
    {
        interaction
    } else {
        models
    };

    let mut diagnostics = Vec::new();
    let sources = collect_participants(scope, &ctx);
    let by_model_id: HashMap<&str, &str> = sources
        .iter()
        .filter_map(|s| s.model_id.map(|m| (m, s.participant.id.as_str())))
        .collect();

    // -- Messages -----------------------------------------------------------
    let message_elements = relationship_messages(models);
    let mut messages: Vec<MessageModel> = Vec::new();
    let mut recorded_ids: Vec<Option<String>> = Vec::with_capacity(message_elements.len());

    for element in &message_elements {
        let from = element
            .attr("EndRelationshipFromMetaModelElement")
            .or_else(|| element.attr("From"))
            .and_then(|id| by_model_id.get(id));
        let to = element
            .attr("EndRelationshipToMetaModelElement")
            .or_else(|| element.attr("To"))
            .and_then(|id| by_model_id.get(id));

        let (Some(from), Some(to)) = (from, to) else {
            let label = element.display_name().unwrap_or("<unnamed>");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DanglingMessage,
                format!("{name}: message {label:?} has an endpoint outside this diagram; dropped"),
            ));
            recorded_ids.push(None);
            continue;
        };

        let original = element.display_name().unwrap_or("").to_string();
        let display = match bound_operation(element, &ctx) {
            Some(operation) => bound_display_name(&operation, &original),
            None => original,
        };

        let id = format!("msg_{}", messages.len());
        recorded_ids.push(Some(id.clone()));
        messages.push(MessageModel {
            id,
            from: from.to_string(),
            to: to.to_string(),
            name: display,
            message_type: declared_message_type(element),
        });
    }

    // -- References ---------------------------------------------------------
    let transitions: Vec<(String, Option<String>)> = message_elements
        .iter()
        .zip(recorded_ids.iter())
        .filter_map(|(element, id)| transit_operation(element, &ctx).map(|op| (op, id.clone())))
        .collect();

    let mut references: Vec<ReferenceModel> = Vec::new();
    for source in sources.iter().filter(|s| s.participant.is_ref()) {
        let label = source.participant.name.as_str();
        let linked = transit_operation(source.definition, &ctx)
            .or_else(|| covered_interaction(source.definition, &ctx))
            .or_else(|| {
                transitions
                    .iter()
                    .find(|(op, _)| labels_match(op, label))
                    .map(|(op, _)| op.clone())
            });

        // An unlinked box still names its target through its own label.
        let target = linked.or_else(|| {
            let normalized = strip_reference_prefix(label);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnresolvedReference,
                format!("{name}: REF box {label:?} is not linked; assuming diagram {normalized:?}"),
            ));
            (!normalized.is_empty()).then_some(normalized)
        });
        references.push(ReferenceModel {
            id: format!("ref_{}", references.len()),
            name: label.to_string(),
            diagram_name: target,
            anchor: Some(ReferenceAnchor::Occurrence {
                participant_id: source.participant.id.clone(),
            }),
        });
    }

    // Transitions the export never drew as an occurrence box.
    for (operation, message_id) in &transitions {
        let captured = references.iter().any(|r| {
            r.diagram_name
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(operation))
        });
        if captured {
            continue;
        }
        references.push(ReferenceModel {
            id: format!("ref_{}", references.len()),
            name: format!("{SYNTHETIC_REFERENCE_PREFIX}{operation}"),
            diagram_name: Some(operation.clone()),
            anchor: message_id.as_ref().map(|id| ReferenceAnchor::Transition {
                message_id: id.clone(),
            }),
        });
    }

    let objects: Vec<ParticipantModel> = sources.into_iter().map(|s| s.participant).collect();

    if objects.is_empty() {
        warn!("Sequence diagram {name} has no participants");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::EmptyResult,
            format!("{name}: no participants found"),
        ));
    }
    if messages.is_empty() {
        warn!("Sequence diagram {name} has no messages");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::EmptyResult,
            format!("{name}: no messages found"),
        ));
    }

    debug!(
        "Parsed sequence diagram {name}: {} participants, {} messages, {} references",
        objects.len(),
        messages.len(),
        references.len()
    );

    Ok(Parsed::new(
        SequenceDiagramModel {
            id: stable_id("sd", &name),
            name,
            objects,
            messages,
            references,
        },
        diagnostics,
    ))
}
