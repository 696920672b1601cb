//! Class-level call graph derived from sequence diagrams.
//!
//! Every call-classified message contributes a `from.type → to.type` edge.
//! REF entries are followed into the diagram they name; when no loaded
//! diagram matches, the label is treated as an unmodeled operation and mapped
//! onto a synthetic service class that its callers depend on.

use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tracing::debug;

use crate::analysis::classifier::is_call;
use crate::analysis::matcher::{expand_camel_case, find_diagram, strip_reference_prefix, MatchPolicy};
use crate::models::{is_graph_type, ReferenceAnchor, ReferenceModel, SequenceDiagramModel};

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Caller type name → callee type names, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: IndexMap<String, IndexSet<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `caller → callee`. Self-edges and endpoints that are not real
    /// classes (actors, REF boxes, unresolved lifelines) are rejected.
    pub fn add_edge(&mut self, caller: &str, callee: &str) -> bool {
        let (caller, callee) = (caller.trim(), callee.trim());
        if caller == callee || !is_graph_type(caller) || !is_graph_type(callee) {
            return false;
        }
        self.edges
            .entry(caller.to_string())
            .or_default()
            .insert(callee.to_string())
    }

    pub fn callees(&self, caller: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(caller)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn callers_of<'a>(&'a self, callee: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |(_, callees)| callees.contains(callee))
            .map(|(caller, _)| caller.as_str())
    }

    pub fn contains_edge(&self, caller: &str, callee: &str) -> bool {
        self.edges
            .get(caller)
            .is_some_and(|callees| callees.contains(callee))
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().flat_map(|(caller, callees)| {
            callees
                .iter()
                .map(move |callee| (caller.as_str(), callee.as_str()))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Synthetic service classes
// ---------------------------------------------------------------------------

static SERVICE_FAMILIES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)deposit|withdraw|transfer|process", "TransactionService"),
        (r"(?i)insert|update|save", "DataService"),
        (r"(?i)transform|convert", "TransformService"),
        (r"(?i)validate|check", "ValidationService"),
        (r"(?i)calculate|compute", "CalculationService"),
    ]
    .into_iter()
    .map(|(pattern, service)| (Regex::new(pattern).unwrap(), service))
    .collect()
});

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

const SERVICE_SUFFIX: &str = "Service";
const FALLBACK_SERVICE: &str = "ExternalService";

/// Synthetic class standing in for an unmodeled operation label.
pub fn service_class_name(label: &str) -> String {
    let label = strip_reference_prefix(label);
    if let Some((_, service)) = SERVICE_FAMILIES.iter().find(|(re, _)| re.is_match(&label)) {
        return (*service).to_string();
    }

    let expanded = expand_camel_case(&label);
    let pascal: String = NON_WORD_RE
        .split(&expanded)
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    let pascal = pascal.trim_start_matches(|c: char| c.is_ascii_digit()).to_string();

    if pascal.is_empty() {
        FALLBACK_SERVICE.to_string()
    } else if pascal.ends_with(SERVICE_SUFFIX) {
        pascal
    } else {
        format!("{pascal}{SERVICE_SUFFIX}")
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a fresh [`CallGraph`] for one generation run.
pub struct CallGraphBuilder<'a> {
    diagrams: &'a [SequenceDiagramModel],
    classes_under_test: &'a [String],
    policy: MatchPolicy,
}

impl<'a> CallGraphBuilder<'a> {
    pub fn new(diagrams: &'a [SequenceDiagramModel], classes_under_test: &'a [String]) -> Self {
        Self {
            diagrams,
            classes_under_test,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Walk every diagram once, following resolvable REF entries through an
    /// explicit worklist. `visited` holds diagram names and guarantees
    /// termination on reference cycles.
    pub fn build(&self) -> CallGraph {
        let mut graph = CallGraph::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for root in self.diagrams {
            let mut pending: Vec<&SequenceDiagramModel> = vec![root];
            while let Some(diagram) = pending.pop() {
                if !visited.insert(diagram.name.as_str()) {
                    continue;
                }
                self.record_messages(diagram, &mut graph);

                let mut followed = Vec::new();
                for reference in &diagram.references {
                    match self.resolve_reference(reference) {
                        Some(target) => followed.push(target),
                        None => self.record_external(diagram, reference, &mut graph),
                    }
                }
                pending.extend(followed.into_iter().rev());
            }
        }

        debug!(
            "Built call graph: {} edges from {} diagrams",
            graph.edge_count(),
            visited.len()
        );
        graph
    }

    fn record_messages(&self, diagram: &SequenceDiagramModel, graph: &mut CallGraph) {
        for message in &diagram.messages {
            let (Some(from), Some(to)) = (diagram.participant(&message.from), diagram.participant(&message.to)) else {
                continue;
            };
            if is_call(&message.message_type, &message.name) {
                graph.add_edge(&from.type_name, &to.type_name);
            }
        }
    }

    fn resolve_reference(&self, reference: &ReferenceModel) -> Option<&'a SequenceDiagramModel> {
        let target = reference.target_label();
        find_diagram(target, self.diagrams, self.policy)
            .or_else(|| {
                (target != reference.name)
                    .then(|| find_diagram(&reference.name, self.diagrams, self.policy))
                    .flatten()
            })
            .map(|(diagram, strength)| {
                debug!("Reference {:?} resolved to diagram {} ({strength:?})", reference.name, diagram.name);
                diagram
            })
    }

    /// Classes known to call through `reference` inside `diagram`.
    fn callers_through(diagram: &SequenceDiagramModel, reference: &ReferenceModel) -> IndexSet<String> {
        let mut callers = IndexSet::new();
        match &reference.anchor {
            Some(ReferenceAnchor::Occurrence { participant_id }) => {
                for message in diagram.messages.iter().filter(|m| &m.to == participant_id) {
                    if !is_call(&message.message_type, &message.name) {
                        continue;
                    }
                    if let Some(sender) = diagram.participant(&message.from) {
                        if sender.is_class_backed() {
                            callers.insert(sender.type_name.clone());
                        }
                    }
                }
            }
            Some(ReferenceAnchor::Transition { message_id }) => {
                let sender = diagram
                    .messages
                    .iter()
                    .find(|m| &m.id == message_id)
                    .and_then(|m| diagram.participant(&m.from));
                if let Some(sender) = sender.filter(|s| s.is_class_backed()) {
                    callers.insert(sender.type_name.clone());
                }
            }
            None => {}
        }
        callers
    }

    fn record_external(&self, diagram: &SequenceDiagramModel, reference: &ReferenceModel, graph: &mut CallGraph) {
        let service = service_class_name(reference.target_label());
        let mut callers = Self::callers_through(diagram, reference);
        if callers.is_empty() {
            callers.extend(self.classes_under_test.iter().cloned());
        }
        debug!(
            "Reference {:?} in {} is unmodeled; {} caller(s) depend on {service}",
            reference.name,
            diagram.name,
            callers.len()
        );
        for caller in &callers {
            graph.add_edge(caller, &service);
        }
    }
}

/// Convenience wrapper over [`CallGraphBuilder`].
pub fn build_call_graph(
    diagrams: &[SequenceDiagramModel],
    classes_under_test: &[String],
    policy: MatchPolicy,
) -> CallGraph {
    CallGraphBuilder::new(diagrams, classes_under_test)
        .with_policy(policy)
        .build()
}
