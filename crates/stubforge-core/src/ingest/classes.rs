//! Class-diagram ingestion and the class-catalog identity/merge rule.

use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{Diagnostic, DiagnosticKind, ForgeError, ForgeResult, Parsed};
use crate::ingest::xml::{parse_vendor_document, NameTable, XmlElement};
use crate::models::{
    stable_id, ClassModel, MethodModel, ParameterModel, DEFAULT_PACKAGE, DEFAULT_PARAMETER_TYPE,
    DEFAULT_RETURN_TYPE,
};

/// Names modelling tools hand out to freshly created, never-renamed classes.
static PLACEHOLDER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:class|newclass|new class|unnamed|untitled)\s*\d*$").unwrap());

fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || PLACEHOLDER_NAME_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// Type resolution
// ---------------------------------------------------------------------------

/// Type named by `attr_name` on `element`, as an attribute (id or literal
/// name) or as a child element carrying an `Idref`/`Name` reference.
fn resolve_type(element: &XmlElement, attr_name: &str, types: &NameTable) -> Option<String> {
    if let Some(value) = element.attr(attr_name) {
        return Some(types.resolve_id_or_name(value));
    }
    let holder = element.child(attr_name)?;
    if let Some(name) = holder.display_name() {
        return Some(types.resolve_id_or_name(name));
    }
    holder
        .children
        .iter()
        .find_map(|reference| types.resolve_reference(reference))
        .filter(|name| !name.trim().is_empty())
}

fn is_return_parameter(parameter: &XmlElement) -> bool {
    ["Direction", "Kind"].iter().any(|key| {
        parameter
            .attr(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("return"))
    })
}

fn parse_operation(operation: &XmlElement, types: &NameTable) -> Option<MethodModel> {
    let name = operation.display_name()?.to_string();
    let parameters: Vec<&XmlElement> = operation
        .model_children()
        .into_iter()
        .filter(|c| c.name == "Parameter")
        .collect();

    let return_type = resolve_type(operation, "ReturnType", types)
        .or_else(|| {
            parameters
                .iter()
                .find(|p| is_return_parameter(p))
                .and_then(|p| resolve_type(p, "Type", types))
        })
        .unwrap_or_else(|| DEFAULT_RETURN_TYPE.to_string());

    let mut method = MethodModel::new(name, return_type);
    if let Some(id) = operation.id() {
        method.id = id.to_string();
    }
    method.visibility = operation
        .attr("Visibility")
        .map(str::to_lowercase)
        .unwrap_or_else(|| "public".to_string());

    for (position, parameter) in parameters
        .into_iter()
        .filter(|p| !is_return_parameter(p))
        .enumerate()
    {
        let param_name = parameter
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("arg{position}"));
        let param_type = resolve_type(parameter, "Type", types)
            .unwrap_or_else(|| DEFAULT_PARAMETER_TYPE.to_string());
        method.parameters.push(ParameterModel::new(param_name, param_type));
    }
    Some(method)
}

fn parse_class(class: &XmlElement, package: &str, types: &NameTable) -> Option<ClassModel> {
    let name = class.display_name()?;
    if is_placeholder_name(name) {
        debug!("Skipping placeholder class name {name:?}");
        return None;
    }
    let mut model = ClassModel::new(name, package);
    model.methods = class
        .model_children()
        .into_iter()
        .filter(|c| c.name == "Operation" && c.is_definition())
        .filter_map(|op| parse_operation(op, types))
        .collect();
    Some(model)
}

// ---------------------------------------------------------------------------
// Package walk
// ---------------------------------------------------------------------------

fn walk_package<'a>(
    container: &'a XmlElement,
    package: &str,
    types: &NameTable,
    seen: &mut HashSet<&'a str>,
    out: &mut Vec<ClassModel>,
) {
    for child in container.model_children() {
        match child.name.as_str() {
            "Package" if child.is_definition() => {
                let segment = child.display_name().unwrap_or("").trim();
                let nested = match (package == DEFAULT_PACKAGE, segment.is_empty()) {
                    (_, true) => package.to_string(),
                    (true, false) => segment.to_string(),
                    (false, false) => format!("{package}.{segment}"),
                };
                walk_package(child, &nested, types, seen, out);
            }
            "Class" if child.is_definition() => {
                if let Some(id) = child.id() {
                    seen.insert(id);
                }
                if let Some(class) = parse_class(child, package, types) {
                    out.push(class);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Identity / merge rule
// ---------------------------------------------------------------------------

/// Fold `loser`'s methods into `winner` by signature.
fn merge_methods(winner: &mut ClassModel, loser: ClassModel) {
    let known: HashSet<String> = winner.methods.iter().map(MethodModel::signature).collect();
    for method in loser.methods {
        if !known.contains(&method.signature()) {
            winner.methods.push(method);
        }
    }
    winner.related_function_ids.extend(loser.related_function_ids);
}

fn incoming_wins(existing: &ClassModel, incoming: &ClassModel) -> bool {
    incoming.methods.len() > existing.methods.len()
        || (incoming.methods.len() == existing.methods.len()
            && existing.has_default_package()
            && !incoming.has_default_package())
}

/// Fold `incoming` into the catalog entry `slot`: more methods wins, then a
/// real package beats the default one; the loser's unique methods are kept.
pub fn merge_into(slot: &mut ClassModel, incoming: ClassModel) {
    if incoming_wins(slot, &incoming) {
        let loser = std::mem::replace(slot, incoming);
        merge_methods(slot, loser);
    } else {
        merge_methods(slot, incoming);
    }
}

/// By-value form of [`merge_into`].
pub fn merge_class(mut existing: ClassModel, incoming: ClassModel) -> ClassModel {
    merge_into(&mut existing, incoming);
    existing
}

/// Deduplicate by `(package, name)`, then fold default-package copies into a
/// same-named packaged class when exactly one exists.
pub fn dedupe_classes(
    classes: impl IntoIterator<Item = ClassModel>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ClassModel> {
    let mut by_identity: IndexMap<(String, String), ClassModel> = IndexMap::new();
    for class in classes {
        let key = (class.package_name.clone(), class.name.clone());
        match by_identity.get_mut(&key) {
            Some(existing) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateClass,
                    format!("class {}.{} defined more than once; merged", key.0, key.1),
                ));
                merge_into(existing, class);
            }
            None => {
                by_identity.insert(key, class);
            }
        }
    }

    let unpackaged: Vec<(String, String)> = by_identity
        .keys()
        .filter(|(package, _)| package == DEFAULT_PACKAGE || package.is_empty())
        .cloned()
        .collect();
    for key in unpackaged {
        let homes: Vec<(String, String)> = by_identity
            .keys()
            .filter(|(package, name)| *name == key.1 && *package != key.0)
            .cloned()
            .collect();
        let [home] = homes.as_slice() else {
            continue;
        };
        let Some(stray) = by_identity.shift_remove(&key) else {
            continue;
        };
        if let Some(slot) = by_identity.get_mut(home) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateClass,
                format!("class {} appears outside package {}; merged", key.1, home.0),
            ));
            merge_into(slot, stray);
            // The stray may have won on method count; it still lives in `home`.
            if slot.has_default_package() {
                slot.package_name = home.0.clone();
                slot.id = stable_id("cls", &format!("{}.{}", home.0, home.1));
            }
        }
    }

    by_identity.into_values().collect()
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Parse one class-diagram export into a deduplicated class list.
///
/// # Errors
///
/// `InvalidFormat`/`Xml` for documents that are not vendor exports,
/// `Structure` when the export has no `<Models>` section.
pub fn parse_class_diagram(text: &str) -> ForgeResult<Parsed<Vec<ClassModel>>> {
    let root = parse_vendor_document(text)?;
    let models = root
        .child("Models")
        .ok_or_else(|| ForgeError::Structure("class diagram has no <Models> section".to_string()))?;
    let types = NameTable::data_types(&root);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut collected = Vec::new();
    walk_package(models, DEFAULT_PACKAGE, &types, &mut seen, &mut collected);

    // Classes nested somewhere other than a package chain
    for class in models.definitions("Class") {
        if class.id().is_some_and(|id| seen.contains(id)) {
            continue;
        }
        if let Some(model) = parse_class(class, DEFAULT_PACKAGE, &types) {
            collected.push(model);
        }
    }

    let mut diagnostics = Vec::new();
    let classes = dedupe_classes(collected, &mut diagnostics);
    if classes.is_empty() {
        warn!("Class diagram contains no usable classes");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::EmptyResult,
            "no classes found in class diagram",
        ));
    }
    debug!("Parsed class diagram: {} classes", classes.len());
    Ok(Parsed::new(classes, diagnostics))
}
