//! Function → diagram → participant-type cross-referencing.

use std::collections::BTreeSet;

use tracing::debug;

use crate::analysis::matcher::{find_diagram, MatchPolicy};
use crate::models::{ClassModel, SequenceDiagramModel, SystemFunction};

/// Recompute `related_function_ids` on every class: a class is related to a
/// function when it backs a participant of one of the function's diagrams.
/// Returns the number of (class, function) links made.
pub fn link_related_functions(
    classes: &mut [ClassModel],
    functions: &[SystemFunction],
    diagrams: &[SequenceDiagramModel],
    policy: MatchPolicy,
) -> usize {
    for class in classes.iter_mut() {
        class.related_function_ids = BTreeSet::new();
    }

    let mut links = 0;
    for function in functions {
        for diagram_name in &function.sequence_diagram_names {
            let Some((diagram, _)) = find_diagram(diagram_name, diagrams, policy) else {
                debug!(
                    "Function {} names diagram {diagram_name:?}, which is not loaded",
                    function.id
                );
                continue;
            };
            for type_name in diagram.participant_types() {
                for class in classes
                    .iter_mut()
                    .filter(|c| c.name.eq_ignore_ascii_case(type_name))
                {
                    if class.related_function_ids.insert(function.id.clone()) {
                        links += 1;
                    }
                }
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DiagramBuilder;

    fn function(id: &str, diagrams: &[&str]) -> SystemFunction {
        SystemFunction {
            id: id.to_string(),
            name: id.to_string(),
            sequence_diagram_names: diagrams.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_links_participant_classes() {
        let diagrams = vec![
            DiagramBuilder::new("DepositSequence")
                .actor("c")
                .lifeline("t", "Teller")
                .lifeline("a", "accountservice")
                .build(),
            DiagramBuilder::new("Audit Trail").lifeline("l", "Ledger").build(),
        ];
        let mut classes = vec![
            ClassModel::new("Teller", "bank"),
            ClassModel::new("AccountService", "bank"),
            ClassModel::new("Ledger", "bank"),
        ];
        classes[2].related_function_ids.insert("STALE".to_string());

        let functions = vec![
            function("FR1", &["deposit sequence"]),
            function("FR2", &["DepositSequence", "ref Audit Trail", "Missing"]),
        ];
        let links = link_related_functions(&mut classes, &functions, &diagrams, MatchPolicy::Fuzzy);

        assert_eq!(links, 5);
        let ids = |i: usize| classes[i].related_function_ids.iter().cloned().collect::<Vec<_>>();
        assert_eq!(ids(0), vec!["FR1", "FR2"]);
        assert_eq!(ids(1), vec!["FR1", "FR2"]);
        assert_eq!(ids(2), vec!["FR2"]);
    }

    #[test]
    fn test_exact_policy_skips_loose_names() {
        let diagrams = vec![DiagramBuilder::new("DepositSequence").lifeline("t", "Teller").build()];
        let mut classes = vec![ClassModel::new("Teller", "bank")];
        let functions = vec![function("FR1", &["deposit sequence"])];
        let links = link_related_functions(&mut classes, &functions, &diagrams, MatchPolicy::Exact);
        assert_eq!(links, 0);
        assert!(classes[0].related_function_ids.is_empty());
    }
}
