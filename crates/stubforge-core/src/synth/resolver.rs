//! Stub/driver target selection.
//!
//! For each class under test, callees outside the selection become stub
//! targets and callers outside the selection become driver targets. Targets
//! are unique per kind; the first class under test that needs one owns it.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::analysis::callgraph::CallGraph;
use crate::analysis::matcher::{find_class, MatchPolicy};
use crate::models::{ClassModel, MethodModel, DEFAULT_PACKAGE};

/// Class lookups for synthesis never accept anything looser than this.
const CLASS_LOOKUP_POLICY: MatchPolicy = MatchPolicy::CaseInsensitive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Stub,
    Driver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisTarget {
    pub class_name: String,
    pub kind: TargetKind,
    /// Class under test that needed this target.
    pub for_class: String,
    /// Whether the class catalog defines `class_name`.
    pub modeled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationPlan {
    pub stubs: Vec<SynthesisTarget>,
    pub drivers: Vec<SynthesisTarget>,
}

impl GenerationPlan {
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty() && self.drivers.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &SynthesisTarget> {
        self.stubs.iter().chain(self.drivers.iter())
    }
}

/// Catalog entry for `name`: exact match first, then case-insensitive.
pub fn lookup_class<'a>(name: &str, catalog: &'a [ClassModel]) -> Option<&'a ClassModel> {
    catalog
        .iter()
        .find(|c| c.name == name)
        .or_else(|| find_class(name, catalog, CLASS_LOOKUP_POLICY).map(|(class, _)| class))
}

/// Decide which stubs and drivers a selection needs.
pub fn resolve_targets(selected: &[String], graph: &CallGraph, catalog: &[ClassModel]) -> GenerationPlan {
    let under_test: HashSet<&str> = selected.iter().map(|s| s.trim()).collect();
    let mut stubs: IndexMap<String, SynthesisTarget> = IndexMap::new();
    let mut drivers: IndexMap<String, SynthesisTarget> = IndexMap::new();

    for cut in selected.iter().map(|s| s.trim()) {
        for callee in graph.callees(cut) {
            if under_test.contains(callee) || stubs.contains_key(callee) {
                continue;
            }
            stubs.insert(
                callee.to_string(),
                SynthesisTarget {
                    class_name: callee.to_string(),
                    kind: TargetKind::Stub,
                    for_class: cut.to_string(),
                    modeled: lookup_class(callee, catalog).is_some(),
                },
            );
        }
        for caller in graph.callers_of(cut) {
            if under_test.contains(caller) || drivers.contains_key(caller) {
                continue;
            }
            drivers.insert(
                caller.to_string(),
                SynthesisTarget {
                    class_name: caller.to_string(),
                    kind: TargetKind::Driver,
                    for_class: cut.to_string(),
                    modeled: lookup_class(caller, catalog).is_some(),
                },
            );
        }
    }

    GenerationPlan {
        stubs: stubs.into_values().collect(),
        drivers: drivers.into_values().collect(),
    }
}

// ---------------------------------------------------------------------------
// Service stubs
// ---------------------------------------------------------------------------

/// Canned method set for a synthetic service class, chosen by name.
pub fn canned_service_methods(service_name: &str) -> Vec<MethodModel> {
    if service_name.contains("Transaction") {
        vec![
            MethodModel::new("processTransaction", "boolean").with_parameter("amount", "double"),
            MethodModel::new("getBalance", "double").with_parameter("accountId", "long"),
            MethodModel::new("recordTransaction", "void").with_parameter("details", "String"),
        ]
    } else if service_name.contains("Data") {
        vec![
            MethodModel::new("save", "boolean").with_parameter("entity", "Object"),
            MethodModel::new("findById", "Object").with_parameter("id", "long"),
            MethodModel::new("update", "boolean").with_parameter("entity", "Object"),
            MethodModel::new("delete", "boolean").with_parameter("id", "long"),
        ]
    } else if service_name.contains("Transform") {
        vec![
            MethodModel::new("transform", "Object").with_parameter("input", "Object"),
            MethodModel::new("convert", "String").with_parameter("input", "Object"),
        ]
    } else if service_name.contains("Validation") {
        vec![
            MethodModel::new("validate", "boolean").with_parameter("input", "Object"),
            MethodModel::new("isValid", "boolean").with_parameter("input", "Object"),
        ]
    } else if service_name.contains("Calculation") {
        vec![
            MethodModel::new("calculate", "double").with_parameter("value", "double"),
            MethodModel::new("compute", "double").with_parameter("value", "double"),
        ]
    } else {
        vec![MethodModel::new("execute", "Object").with_parameter("request", "Object")]
    }
}

/// Stand-in class model for a stub target missing from the catalog.
pub fn service_class_model(service_name: &str) -> ClassModel {
    let mut class = ClassModel::new(service_name, DEFAULT_PACKAGE);
    class.methods = canned_service_methods(service_name);
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> CallGraph {
        let mut graph = CallGraph::new();
        for (caller, callee) in edges {
            graph.add_edge(caller, callee);
        }
        graph
    }

    fn names(targets: &[SynthesisTarget]) -> Vec<&str> {
        targets.iter().map(|t| t.class_name.as_str()).collect()
    }

    fn selection(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_stubs_and_drivers_for_selection() {
        let graph = graph(&[
            ("Teller", "AccountService"),
            ("AccountService", "Ledger"),
            ("AccountService", "TransactionService"),
            ("Atm", "AccountService"),
        ]);
        let catalog = vec![ClassModel::new("Ledger", "bank"), ClassModel::new("Teller", "bank")];
        let plan = resolve_targets(&selection(&["AccountService"]), &graph, &catalog);

        assert_eq!(names(&plan.stubs), vec!["Ledger", "TransactionService"]);
        assert!(plan.stubs[0].modeled);
        assert!(!plan.stubs[1].modeled);
        assert_eq!(names(&plan.drivers), vec!["Teller", "Atm"]);
        assert!(plan.drivers[0].modeled);
        assert_eq!(plan.drivers[1].for_class, "AccountService");
    }

    #[test]
    fn test_selected_classes_never_targets() {
        let graph = graph(&[("Teller", "AccountService")]);
        let plan = resolve_targets(&selection(&["Teller", "AccountService"]), &graph, &[]);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_shared_target_owned_by_first_class() {
        let graph = graph(&[("Teller", "Ledger"), ("Vault", "Ledger")]);
        let plan = resolve_targets(&selection(&["Teller", "Vault"]), &graph, &[]);
        assert_eq!(plan.stubs.len(), 1);
        assert_eq!(plan.stubs[0].for_class, "Teller");
    }

    #[test]
    fn test_resolution_is_stable() {
        let graph = graph(&[("A", "B"), ("C", "A"), ("A", "D")]);
        let sel = selection(&["A"]);
        assert_eq!(resolve_targets(&sel, &graph, &[]), resolve_targets(&sel, &graph, &[]));
    }

    #[test]
    fn test_lookup_class_case_insensitive_only() {
        let catalog = vec![ClassModel::new("AccountService", "bank")];
        assert!(lookup_class("AccountService", &catalog).is_some());
        assert!(lookup_class("accountservice", &catalog).is_some());
        assert!(lookup_class("Account", &catalog).is_none());
    }

    #[test]
    fn test_canned_service_methods() {
        let method_names = |service: &str| {
            canned_service_methods(service)
                .into_iter()
                .map(|m| m.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(
            method_names("TransactionService"),
            vec!["processTransaction", "getBalance", "recordTransaction"]
        );
        assert_eq!(method_names("DataService"), vec!["save", "findById", "update", "delete"]);
        assert_eq!(method_names("TransformService"), vec!["transform", "convert"]);
        assert_eq!(method_names("ValidationService"), vec!["validate", "isValid"]);
        assert_eq!(method_names("CalculationService"), vec!["calculate", "compute"]);
        assert_eq!(method_names("FraudScreeningService"), vec!["execute"]);
        assert_eq!(service_class_model("DataService").methods.len(), 4);
    }
}
