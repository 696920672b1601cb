//! Requirements-traceability-matrix ingestion.
//!
//! The matrix is a CSV export whose header wording varies from team to team,
//! so the three logical columns (function id, function name, diagram names)
//! are located through ranked synonym lists rather than fixed titles.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{Diagnostic, DiagnosticKind, ForgeError, ForgeResult, Parsed};
use crate::models::SystemFunction;

// ---------------------------------------------------------------------------
// RFC4180 reader
// ---------------------------------------------------------------------------

/// Split CSV text into records. Quoted fields may hold separators, line
/// breaks and doubled quotes; blank lines are dropped.
pub fn read_records(text: &str) -> ForgeResult<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                if !record.iter().all(|f| f.trim().is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ForgeError::InvalidFormat(format!(
            "unterminated quoted field at line {line}"
        )));
    }
    record.push(field);
    if !record.iter().all(|f| f.trim().is_empty()) {
        records.push(record);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

const ID_SYNONYMS: &[&str] = &[
    "requirement id",
    "req id",
    "function id",
    "fr id",
    "id",
    "identifier",
    "requirement",
    "req no",
    "number",
    "no",
];

const NAME_SYNONYMS: &[&str] = &[
    "function name",
    "system function",
    "requirement name",
    "function",
    "name",
    "feature",
    "description",
    "title",
];

const DIAGRAM_SYNONYMS: &[&str] = &[
    "sequence diagram",
    "sequence diagrams",
    "related diagrams",
    "diagram",
    "diagrams",
    "sequence",
    "sd",
    "uml",
];

/// Shortest token allowed to take part in fuzzy header matching.
const MIN_FUZZY_TOKEN_LEN: usize = 3;

const MAX_DIAGRAM_COLUMNS: usize = 2;

static HEADER_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

fn normalize_header(header: &str) -> String {
    HEADER_NOISE_RE
        .replace_all(&header.trim().to_lowercase(), " ")
        .trim()
        .to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderLevel {
    Exact,
    Substring,
    Fuzzy,
}

fn header_matches(header: &str, synonym: &str, level: HeaderLevel) -> bool {
    match level {
        HeaderLevel::Exact => header == synonym,
        HeaderLevel::Substring => format!(" {header} ").contains(&format!(" {synonym} ")),
        HeaderLevel::Fuzzy => header.split(' ').any(|token| {
            token.len() >= MIN_FUZZY_TOKEN_LEN
                && synonym.split(' ').any(|s| {
                    s.len() >= MIN_FUZZY_TOKEN_LEN && (token.starts_with(s) || s.starts_with(token))
                })
        }),
    }
}

/// Unclaimed columns matching any synonym at `level`, best-ranked synonym
/// first, then column order.
fn candidates(
    headers: &[String],
    synonyms: &[&str],
    level: HeaderLevel,
    claimed: &[usize],
) -> Vec<usize> {
    let mut found = Vec::new();
    for synonym in synonyms {
        for (index, header) in headers.iter().enumerate() {
            if claimed.contains(&index) || found.contains(&index) {
                continue;
            }
            if header_matches(header, synonym, level) {
                found.push(index);
            }
        }
    }
    found
}

/// Positions of the logical matrix columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixColumns {
    pub id: usize,
    pub name: usize,
    pub diagrams: Vec<usize>,
}

/// Locate the id, name and diagram columns. Every role is tried at the exact
/// level before any role falls back to substring, then fuzzy, matching.
/// Within a level the diagram role claims columns before the name role.
pub fn resolve_columns(headers: &[&str]) -> Option<MatrixColumns> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut id: Option<usize> = None;
    let mut name: Option<usize> = None;
    let mut diagrams: Vec<usize> = Vec::new();

    for level in [HeaderLevel::Exact, HeaderLevel::Substring, HeaderLevel::Fuzzy] {
        let mut claimed: Vec<usize> = id.into_iter().chain(name).chain(diagrams.iter().copied()).collect();
        if id.is_none() {
            id = candidates(&normalized, ID_SYNONYMS, level, &claimed).first().copied();
            claimed.extend(id);
        }
        // "Sequence Diagram Name" belongs to the diagram role, not the name role
        if diagrams.len() < MAX_DIAGRAM_COLUMNS {
            diagrams.extend(candidates(&normalized, DIAGRAM_SYNONYMS, level, &claimed));
            diagrams.truncate(MAX_DIAGRAM_COLUMNS);
            claimed.extend(diagrams.iter().copied());
        }
        if name.is_none() {
            name = candidates(&normalized, NAME_SYNONYMS, level, &claimed).first().copied();
        }
    }

    diagrams.sort_unstable();
    let (id, name) = match (id, name) {
        (Some(id), Some(name)) => (id, name),
        (Some(only), None) | (None, Some(only)) => (only, only),
        (None, None) => return None,
    };
    Some(MatrixColumns { id, name, diagrams })
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Split a diagram cell on the first of `,` `;` `|` it contains.
pub fn split_diagram_cell(cell: &str) -> Vec<String> {
    let separator = [',', ';', '|'].into_iter().find(|sep| cell.contains(*sep));
    let parts: Vec<&str> = match separator {
        Some(sep) => cell.split(sep).collect(),
        None => vec![cell],
    };
    parts
        .into_iter()
        .map(|part| part.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn cell(record: &[String], index: usize) -> &str {
    record.get(index).map(|v| v.trim()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Parse the matrix into one [`SystemFunction`] per distinct id.
///
/// # Errors
///
/// `InvalidFormat` for unreadable CSV or a missing header row,
/// `ColumnsNotFound` when neither an id-like nor a name-like column exists.
pub fn parse_matrix(text: &str) -> ForgeResult<Parsed<Vec<SystemFunction>>> {
    let records = read_records(text)?;
    let Some((header, rows)) = records.split_first() else {
        return Err(ForgeError::InvalidFormat("matrix has no header row".to_string()));
    };
    let headers: Vec<&str> = header.iter().map(String::as_str).collect();
    let columns = resolve_columns(&headers).ok_or_else(|| {
        ForgeError::ColumnsNotFound(format!(
            "no function id or name column among [{}]",
            headers.join(", ")
        ))
    })?;
    debug!("Matrix columns resolved: {columns:?}");

    let mut diagnostics = Vec::new();
    let mut functions: IndexMap<String, SystemFunction> = IndexMap::new();

    for (offset, record) in rows.iter().enumerate() {
        let row_number = offset + 2;
        let id = cell(record, columns.id);
        let name = cell(record, columns.name);
        if id.is_empty() || name.is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::SkippedRow,
                format!("row {row_number}: missing function id or name"),
            ));
            continue;
        }

        let diagram_names: Vec<String> = columns
            .diagrams
            .iter()
            .flat_map(|&index| split_diagram_cell(cell(record, index)))
            .collect();

        functions
            .entry(id.to_string())
            .or_insert_with(|| SystemFunction {
                id: id.to_string(),
                name: name.to_string(),
                sequence_diagram_names: Vec::new(),
            })
            .merge_diagram_names(diagram_names);
    }

    if functions.is_empty() {
        warn!("Matrix produced no functions");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::EmptyResult,
            "matrix contains no function rows",
        ));
    }
    Ok(Parsed::new(functions.into_values().collect(), diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DEPOSIT_MATRIX_CSV;

    #[test]
    fn test_read_records_quoting() {
        let text = "a,b,c\r\n\"x, y\",\"say \"\"hi\"\"\",\"multi\nline\"\n\n1,2,3";
        let records = read_records(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["x, y", "say \"hi\"", "multi\nline"]);
        assert_eq!(records[2], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unterminated_quote_is_format_error() {
        let err = read_records("id,name\n\"FR1,Deposit\n").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_parse_deposit_matrix() {
        let parsed = parse_matrix(DEPOSIT_MATRIX_CSV).unwrap();
        assert_eq!(
            parsed.value,
            vec![SystemFunction {
                id: "FR1".into(),
                name: "Deposit Funds".into(),
                sequence_diagram_names: vec!["DepositSequence".into()],
            }]
        );
    }

    #[test]
    fn test_resolve_columns_synonyms() {
        let columns = resolve_columns(&["Req. ID", "System Function", "Sequence Diagrams", "Notes"]).unwrap();
        assert_eq!(columns, MatrixColumns { id: 0, name: 1, diagrams: vec![2] });

        let columns = resolve_columns(&["Function", "ID", "Primary Diagram", "Secondary Diagram"]).unwrap();
        assert_eq!(columns, MatrixColumns { id: 1, name: 0, diagrams: vec![2, 3] });
    }

    #[test]
    fn test_resolve_columns_sequence_diagram_name_header() {
        let columns = resolve_columns(&["ID", "Requirement", "Sequence Diagram Name"]).unwrap();
        assert_eq!(columns, MatrixColumns { id: 0, name: 1, diagrams: vec![2] });

        let columns =
            resolve_columns(&["No.", "Requirement Description", "Sequence Diagram Name"]).unwrap();
        assert_eq!(columns, MatrixColumns { id: 0, name: 1, diagrams: vec![2] });
    }

    #[test]
    fn test_parse_matrix_keeps_diagram_names_under_name_wording() {
        let text = "ID,Requirement,Sequence Diagram Name\nFR1,Deposit Funds,DepositSequence\n";
        let functions = parse_matrix(text).unwrap().value;
        assert_eq!(
            functions,
            vec![SystemFunction {
                id: "FR1".into(),
                name: "Deposit Funds".into(),
                sequence_diagram_names: vec!["DepositSequence".into()],
            }]
        );
    }

    #[test]
    fn test_exact_level_beats_fuzzy_for_other_roles() {
        // "Function Name" would fuzzily satisfy the id role through "function id"
        let columns = resolve_columns(&["Function Name", "Identifier"]).unwrap();
        assert_eq!(columns.id, 1);
        assert_eq!(columns.name, 0);
    }

    #[test]
    fn test_single_key_column_serves_both() {
        let columns = resolve_columns(&["Feature", "Sequence"]).unwrap();
        assert_eq!(columns.id, 0);
        assert_eq!(columns.name, 0);
        assert_eq!(columns.diagrams, vec![1]);
    }

    #[test]
    fn test_columns_not_found() {
        let err = parse_matrix("Owner,Priority\nalice,high\n").unwrap_err();
        assert!(matches!(err, ForgeError::ColumnsNotFound(_)));
    }

    #[test]
    fn test_rows_merge_by_id() {
        let text = "ID,Name,Diagram,Extra Diagrams\n\
                    FR1,Deposit,\"DepositSeq; Audit\",Ledger\n\
                    FR2,Withdraw,WithdrawSeq,\n\
                    FR1,Deposit,DepositSeq|Notify,\n";
        let functions = parse_matrix(text).unwrap().value;
        assert_eq!(functions.len(), 2);
        assert_eq!(
            functions[0].sequence_diagram_names,
            vec!["DepositSeq", "Audit", "Ledger", "Notify"]
        );
        assert_eq!(functions[1].id, "FR2");
    }

    #[test]
    fn test_incomplete_rows_skipped() {
        let text = "ID,Name,Diagram\nFR1,,A\n,Orphan,B\nFR3,Ok,C\n";
        let parsed = parse_matrix(text).unwrap();
        assert_eq!(parsed.value.len(), 1);
        assert_eq!(
            parsed
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::SkippedRow)
                .count(),
            2
        );
    }

    #[test]
    fn test_split_diagram_cell() {
        assert_eq!(split_diagram_cell(" 'A' , \"B\",, "), vec!["A", "B"]);
        assert_eq!(split_diagram_cell("A;B,C"), vec!["A;B", "C"]);
        assert_eq!(split_diagram_cell("A|B"), vec!["A", "B"]);
        assert!(split_diagram_cell("   ").is_empty());
    }
}
