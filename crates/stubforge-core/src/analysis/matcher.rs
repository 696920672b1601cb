//! Free-text name resolution against diagram and class collections.
//!
//! Resolution is cascading, strongest evidence first: exact key match on any
//! variant > case-insensitive equality > substring containment (either way) >
//! whitespace/punctuation-normalized containment. The first level that yields
//! a candidate wins.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

use crate::models::{ClassModel, SequenceDiagramModel};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How strong the evidence behind a match was, strongest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchStrength {
    Exact,
    CaseInsensitive,
    Substring,
    Normalized,
}

/// Weakest match strength a caller is willing to accept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MatchPolicy {
    Exact,
    CaseInsensitive,
    Substring,
    #[default]
    Fuzzy,
}

impl MatchPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "exact" => Some(MatchPolicy::Exact),
            "case" | "case-insensitive" | "case_insensitive" => Some(MatchPolicy::CaseInsensitive),
            "substring" => Some(MatchPolicy::Substring),
            "fuzzy" | "normalized" => Some(MatchPolicy::Fuzzy),
            _ => None,
        }
    }

    pub fn weakest(&self) -> MatchStrength {
        match self {
            MatchPolicy::Exact => MatchStrength::Exact,
            MatchPolicy::CaseInsensitive => MatchStrength::CaseInsensitive,
            MatchPolicy::Substring => MatchStrength::Substring,
            MatchPolicy::Fuzzy => MatchStrength::Normalized,
        }
    }

    pub fn allows(&self, strength: MatchStrength) -> bool {
        strength <= self.weakest()
    }
}

/// A resolved key and the strength of the evidence for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameMatch {
    pub index: usize,
    pub strength: MatchStrength,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once via LazyLock)
// ---------------------------------------------------------------------------

static REFERENCE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:ref|sd|seq|sequence|diagram)(?:\b|_)[\s:_\-]*").unwrap()
});

static CAMEL_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

static ACRONYM_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\-]+").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Shortest variant allowed to take part in containment checks.
const MIN_CONTAINMENT_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Variant generation
// ---------------------------------------------------------------------------

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").to_string()
}

/// Drop a leading `ref` / `sd` / `seq` / `sequence` / `diagram` token.
pub fn strip_reference_prefix(label: &str) -> String {
    let stripped = REFERENCE_PREFIX_RE.replace(label, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        label.trim().to_string()
    } else {
        stripped.to_string()
    }
}

/// `processDepositHTTPFlow` → `process Deposit HTTP Flow`.
pub fn expand_camel_case(value: &str) -> String {
    let step = ACRONYM_BOUNDARY_RE.replace_all(value, "$1 $2");
    let step = CAMEL_BOUNDARY_RE.replace_all(&step, "$1 $2");
    collapse_whitespace(&step)
}

fn separators_to_spaces(value: &str) -> String {
    collapse_whitespace(&SEPARATOR_RE.replace_all(value, " "))
}

fn capitalize_words(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumerics only, for punctuation-insensitive comparison.
pub fn normalize_tokens(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Candidate spellings of a free-text label, most literal first.
pub fn name_variants(label: &str) -> Vec<String> {
    let verbatim = label.trim();
    if verbatim.is_empty() {
        return Vec::new();
    }

    let mut base: IndexSet<String> = IndexSet::new();
    base.insert(verbatim.to_string());
    let stripped = strip_reference_prefix(verbatim);
    base.insert(stripped.clone());

    for seed in [verbatim.to_string(), stripped] {
        let camel = expand_camel_case(&seed);
        let spaced = separators_to_spaces(&seed);
        let both = separators_to_spaces(&camel);
        for form in [camel, spaced, both] {
            base.insert(capitalize_words(&form));
            base.insert(form);
        }
    }

    let mut variants: IndexSet<String> = IndexSet::new();
    for form in &base {
        variants.insert(form.clone());
    }
    for form in &base {
        if !form.to_lowercase().ends_with("diagram") {
            variants.insert(format!("{form}Diagram"));
            variants.insert(format!("{form} Diagram"));
        }
    }
    let lowered: Vec<String> = variants.iter().map(|v| v.to_lowercase()).collect();
    variants.extend(lowered);

    variants.into_iter().filter(|v| !v.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn contains_either_way(a: &str, b: &str) -> bool {
    if a.len() < MIN_CONTAINMENT_LEN || b.len() < MIN_CONTAINMENT_LEN {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Among `candidates` (key index, key length) choose the one whose length is
/// closest to `target_len`; ties keep collection order.
fn closest_by_length(candidates: &[(usize, usize)], target_len: usize) -> Option<usize> {
    candidates
        .iter()
        .min_by_key(|(index, len)| (len.abs_diff(target_len), *index))
        .map(|(index, _)| *index)
}

/// Find the best key for `label` in `keys`, honouring `policy`.
pub fn best_match(label: &str, keys: &[&str], policy: MatchPolicy) -> Option<NameMatch> {
    let variants = name_variants(label);
    if variants.is_empty() || keys.is_empty() {
        return None;
    }

    // Level 1: exact key match on any variant
    for variant in &variants {
        if let Some(index) = keys.iter().position(|k| k.trim() == variant) {
            return Some(NameMatch {
                index,
                strength: MatchStrength::Exact,
            });
        }
    }
    if !policy.allows(MatchStrength::CaseInsensitive) {
        return None;
    }

    // Level 2: case-insensitive equality
    let lowered_keys: Vec<String> = keys.iter().map(|k| k.trim().to_lowercase()).collect();
    for variant in &variants {
        let lowered = variant.to_lowercase();
        if let Some(index) = lowered_keys.iter().position(|k| *k == lowered) {
            return Some(NameMatch {
                index,
                strength: MatchStrength::CaseInsensitive,
            });
        }
    }
    if !policy.allows(MatchStrength::Substring) {
        return None;
    }

    // Level 3: substring containment in either direction
    for variant in &variants {
        let lowered = variant.to_lowercase();
        let hits: Vec<(usize, usize)> = lowered_keys
            .iter()
            .enumerate()
            .filter(|(_, k)| contains_either_way(k, &lowered))
            .map(|(i, k)| (i, k.len()))
            .collect();
        if let Some(index) = closest_by_length(&hits, lowered.len()) {
            return Some(NameMatch {
                index,
                strength: MatchStrength::Substring,
            });
        }
    }
    if !policy.allows(MatchStrength::Normalized) {
        return None;
    }

    // Level 4: whitespace/punctuation-normalized containment
    let normalized_keys: Vec<String> = keys.iter().map(|k| normalize_tokens(k)).collect();
    for variant in &variants {
        let normalized = normalize_tokens(variant);
        let hits: Vec<(usize, usize)> = normalized_keys
            .iter()
            .enumerate()
            .filter(|(_, k)| contains_either_way(k, &normalized))
            .map(|(i, k)| (i, k.len()))
            .collect();
        if let Some(index) = closest_by_length(&hits, normalized.len()) {
            return Some(NameMatch {
                index,
                strength: MatchStrength::Normalized,
            });
        }
    }

    None
}

/// Resolve a label to one of the loaded diagrams.
pub fn find_diagram<'a>(
    label: &str,
    diagrams: &'a [SequenceDiagramModel],
    policy: MatchPolicy,
) -> Option<(&'a SequenceDiagramModel, MatchStrength)> {
    let keys: Vec<&str> = diagrams.iter().map(|d| d.name.as_str()).collect();
    best_match(label, &keys, policy).map(|m| (&diagrams[m.index], m.strength))
}

/// Resolve a label to a class in the catalog.
pub fn find_class<'a>(
    label: &str,
    classes: &'a [ClassModel],
    policy: MatchPolicy,
) -> Option<(&'a ClassModel, MatchStrength)> {
    let keys: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    best_match(label, &keys, policy).map(|m| (&classes[m.index], m.strength))
}

/// Loose equality of two labels: same normalized tokens, or one normalized
/// form containing the other.
pub fn labels_match(a: &str, b: &str) -> bool {
    let left = normalize_tokens(&strip_reference_prefix(a));
    let right = normalize_tokens(&strip_reference_prefix(b));
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left == right || contains_either_way(&left, &right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::diagram_named;

    #[test]
    fn test_strip_reference_prefix() {
        assert_eq!(strip_reference_prefix("ref Validate Account"), "Validate Account");
        assert_eq!(strip_reference_prefix("sd: Deposit"), "Deposit");
        assert_eq!(strip_reference_prefix("Sequence_Withdraw"), "Withdraw");
        assert_eq!(strip_reference_prefix("Diagram - Login"), "Login");
        // Words that merely start with a prefix are left alone
        assert_eq!(strip_reference_prefix("refund"), "refund");
        assert_eq!(strip_reference_prefix("sequencer"), "sequencer");
        // A bare prefix keeps the label
        assert_eq!(strip_reference_prefix("ref"), "ref");
    }

    #[test]
    fn test_expand_camel_case() {
        assert_eq!(expand_camel_case("processDeposit"), "process Deposit");
        assert_eq!(expand_camel_case("ProcessDeposit"), "Process Deposit");
        assert_eq!(expand_camel_case("HTTPRequestFlow"), "HTTP Request Flow");
    }

    #[test]
    fn test_name_variants_cover_forms() {
        let variants = name_variants("ref process_deposit");
        assert_eq!(variants[0], "ref process_deposit");
        assert!(variants.contains(&"process_deposit".to_string()));
        assert!(variants.contains(&"process deposit".to_string()));
        assert!(variants.contains(&"Process Deposit".to_string()));
        assert!(variants.contains(&"Process Deposit Diagram".to_string()));
        assert!(variants.contains(&"Process DepositDiagram".to_string()));
        assert!(variants.contains(&"process deposit diagram".to_string()));
    }

    #[test]
    fn test_name_variants_empty() {
        assert!(name_variants("   ").is_empty());
    }

    #[test]
    fn test_exact_beats_fuzzy() {
        let keys = ["Process Deposit Flow", "ProcessDeposit"];
        let m = best_match("ProcessDeposit", &keys, MatchPolicy::Fuzzy).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.strength, MatchStrength::Exact);
    }

    #[test]
    fn test_case_insensitive_level() {
        let keys = ["LoginSequence"];
        let m = best_match("loginsequence", &keys, MatchPolicy::Fuzzy).unwrap();
        assert_eq!(m.strength, MatchStrength::CaseInsensitive);
    }

    #[test]
    fn test_diagram_suffix_variant_is_exact() {
        let keys = ["Withdraw Diagram"];
        let m = best_match("ref Withdraw", &keys, MatchPolicy::Exact).unwrap();
        assert_eq!(m.strength, MatchStrength::Exact);
    }

    #[test]
    fn test_token_containment_resolves_spaced_name() {
        let diagrams = vec![
            diagram_named("Login Flow"),
            diagram_named("Process Deposit Flow"),
        ];
        let (found, strength) =
            find_diagram("ProcessDeposit", &diagrams, MatchPolicy::Fuzzy).unwrap();
        assert_eq!(found.name, "Process Deposit Flow");
        assert!(strength >= MatchStrength::Substring);
    }

    #[test]
    fn test_normalized_level() {
        let keys = ["deposit-funds.v2"];
        let m = best_match("Deposit Funds", &keys, MatchPolicy::Fuzzy).unwrap();
        assert_eq!(m.strength, MatchStrength::Normalized);
    }

    #[test]
    fn test_policy_caps_strength() {
        let keys = ["Process Deposit Flow"];
        assert!(best_match("ProcessDeposit", &keys, MatchPolicy::CaseInsensitive).is_none());
        assert!(best_match("ProcessDeposit", &keys, MatchPolicy::Substring).is_some());
    }

    #[test]
    fn test_closest_length_wins_among_substrings() {
        let keys = ["Deposit Funds And Notify Branch", "Deposit Funds Flow"];
        let m = best_match("Deposit Funds", &keys, MatchPolicy::Fuzzy).unwrap();
        assert_eq!(m.index, 1);
    }

    #[test]
    fn test_no_match() {
        let keys = ["Login"];
        assert!(best_match("Transfer", &keys, MatchPolicy::Fuzzy).is_none());
        assert!(best_match("Transfer", &[], MatchPolicy::Fuzzy).is_none());
    }

    #[test]
    fn test_short_labels_do_not_substring_match() {
        let keys = ["Authentication"];
        assert!(best_match("au", &keys, MatchPolicy::Fuzzy).is_none());
    }

    #[test]
    fn test_labels_match() {
        assert!(labels_match("ref Validate Account", "validateAccount"));
        assert!(labels_match("checkBalance", "check_balance"));
        assert!(!labels_match("deposit", "withdraw"));
        assert!(!labels_match("", "withdraw"));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(MatchPolicy::parse("EXACT"), Some(MatchPolicy::Exact));
        assert_eq!(MatchPolicy::parse("case"), Some(MatchPolicy::CaseInsensitive));
        assert_eq!(MatchPolicy::parse("fuzzy"), Some(MatchPolicy::Fuzzy));
        assert_eq!(MatchPolicy::parse("nope"), None);
    }
}
