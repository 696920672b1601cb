//! Source rendering for generated stubs, drivers and run summaries.
//!
//! [`ArtifactRenderer`] is the seam between target selection and the text
//! that ends up in files; [`JavaRenderer`] is the bundled JUnit 5 flavour.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ForgeResult;
use crate::models::{ClassModel, MethodModel};
use crate::synth::literals::LiteralGenerator;

pub trait ArtifactRenderer {
    /// Subclass of a modelled class overriding every visible method.
    fn render_stub(&self, class: &ClassModel, literals: &mut LiteralGenerator) -> ForgeResult<String>;

    /// Standalone stand-in for a synthetic service class.
    fn render_service_stub(&self, service: &ClassModel, literals: &mut LiteralGenerator) -> ForgeResult<String>;

    /// Test harness calling every visible method of `caller`.
    fn render_driver(
        &self,
        caller: &ClassModel,
        under_test: &str,
        literals: &mut LiteralGenerator,
    ) -> ForgeResult<String>;

    /// Harness for a caller with no modelled methods: construction only.
    fn render_fallback_driver(&self, caller_name: &str, under_test: &str) -> ForgeResult<String>;

    /// Human-readable note for a selection that needs nothing generated.
    fn render_summary(&self, selected: &[String]) -> ForgeResult<String>;
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

static IDENTIFIER_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_$]+").unwrap());

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long", "native",
    "new", "package", "private", "protected", "public", "return", "short", "static", "strictfp",
    "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try", "void",
    "volatile", "while", "true", "false", "null", "_",
];

/// `name` reduced to a legal Java identifier. Leading digits and keywords
/// get a `_` prefix; a name with no usable characters becomes `_unnamed`.
pub fn java_identifier(name: &str) -> String {
    let cleaned = IDENTIFIER_NOISE_RE.replace_all(name.trim(), "");
    match cleaned.chars().next() {
        None => "_unnamed".to_string(),
        Some(first) if first.is_ascii_digit() || JAVA_KEYWORDS.contains(&&*cleaned) => {
            format!("_{cleaned}")
        }
        Some(_) => cleaned.into_owned(),
    }
}

fn lower_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Source modifier for a model visibility; `None` for methods a subclass or
/// a harness cannot reach.
fn modifier(visibility: &str) -> Option<&'static str> {
    match visibility.trim() {
        "" | "public" => Some("public "),
        "protected" => Some("protected "),
        "package" | "default" => Some(""),
        _ => None,
    }
}

fn is_callable(method: &MethodModel) -> bool {
    modifier(&method.visibility).is_some()
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

const STUB_IMPORTS: &str = "import java.math.BigDecimal;\nimport java.time.LocalDate;\nimport java.time.LocalDateTime;\nimport java.util.*;\n";

const DRIVER_IMPORTS: &str = "import static org.junit.jupiter.api.Assertions.*;\n\nimport java.math.BigDecimal;\nimport java.time.LocalDate;\nimport java.time.LocalDateTime;\nimport java.util.*;\n\nimport org.junit.jupiter.api.Test;\n";

/// JUnit 5 rendering, optionally inside a package.
#[derive(Clone, Debug, Default)]
pub struct JavaRenderer {
    pub package: Option<String>,
}

impl JavaRenderer {
    pub fn new(package: Option<String>) -> Self {
        Self { package }
    }

    fn preamble(&self, imports: &str) -> String {
        let mut out = String::new();
        if let Some(package) = self.package.as_deref().filter(|p| !p.trim().is_empty()) {
            let _ = writeln!(out, "package {};\n", package.trim());
        }
        out.push_str(imports);
        out.push('\n');
        out
    }

    fn parameter_list(method: &MethodModel) -> String {
        method
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name.trim(), java_identifier(&p.name)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn method_body(method: &MethodModel, literals: &mut LiteralGenerator) -> String {
        if method.returns_void() {
            return "        // no-op\n".to_string();
        }
        let value = literals.return_literal(&method.return_type, &method.name);
        format!("        return {value};\n")
    }

    fn stub_methods(
        &self,
        class: &ClassModel,
        literals: &mut LiteralGenerator,
        overriding: bool,
    ) -> String {
        let mut out = String::new();
        for method in class.methods.iter().filter(|m| is_callable(m)) {
            let return_type = if method.returns_void() { "void" } else { method.return_type.trim() };
            let name = java_identifier(&method.name);
            out.push('\n');
            if overriding {
                out.push_str("    @Override\n");
            }
            let _ = writeln!(
                out,
                "    {}{return_type} {name}({}) {{",
                modifier(&method.visibility).unwrap_or("public "),
                Self::parameter_list(method)
            );
            out.push_str(&Self::method_body(method, literals));
            out.push_str("    }\n");
        }
        out
    }
}

impl ArtifactRenderer for JavaRenderer {
    fn render_stub(&self, class: &ClassModel, literals: &mut LiteralGenerator) -> ForgeResult<String> {
        let name = java_identifier(&class.name);
        let mut out = self.preamble(STUB_IMPORTS);
        let _ = writeln!(out, "/**\n * Stub for {name}: every method returns a canned value.\n */");
        let _ = writeln!(out, "public class {name}Stub extends {name} {{");
        out.push_str(&self.stub_methods(class, literals, true));
        out.push_str("}\n");
        Ok(out)
    }

    fn render_service_stub(&self, service: &ClassModel, literals: &mut LiteralGenerator) -> ForgeResult<String> {
        let name = java_identifier(&service.name);
        let mut out = self.preamble(STUB_IMPORTS);
        let _ = writeln!(
            out,
            "/**\n * Stand-in for {name}, an operation referenced by the diagrams but not\n * present in the class model.\n */"
        );
        let _ = writeln!(out, "public class {name}Stub {{");
        out.push_str(&self.stub_methods(service, literals, false));
        out.push_str("}\n");
        Ok(out)
    }

    fn render_driver(
        &self,
        caller: &ClassModel,
        under_test: &str,
        literals: &mut LiteralGenerator,
    ) -> ForgeResult<String> {
        let name = java_identifier(&caller.name);
        let field = lower_first(&name);
        let mut out = self.preamble(DRIVER_IMPORTS);
        let _ = writeln!(out, "/**\n * Driver exercising {under_test} through its caller {name}.\n */");
        let _ = writeln!(out, "public class {name}Driver {{\n");
        let _ = writeln!(out, "    private final {name} {field} = new {name}();");

        let mut test_names: HashSet<String> = HashSet::new();
        for method in caller.methods.iter().filter(|m| is_callable(m)) {
            let method_name = java_identifier(&method.name);
            let base = format!("test{}", upper_first(&method_name));
            let mut test_name = base.clone();
            let mut suffix = 2;
            while !test_names.insert(test_name.clone()) {
                test_name = format!("{base}{suffix}");
                suffix += 1;
            }

            let mut arguments = Vec::new();
            let _ = writeln!(out, "\n    @Test\n    void {test_name}() {{");
            for param in &method.parameters {
                let param_name = java_identifier(&param.name);
                let value = literals.argument_literal(&param.type_name, &param.name);
                let _ = writeln!(out, "        {} {param_name} = {value};", param.type_name.trim());
                arguments.push(param_name);
            }
            let call = format!("{field}.{method_name}({})", arguments.join(", "));
            if method.returns_void() {
                let _ = writeln!(out, "        assertDoesNotThrow(() -> {call});");
            } else {
                let _ = writeln!(
                    out,
                    "        {} result = assertDoesNotThrow(() -> {call});",
                    method.return_type.trim()
                );
                let _ = writeln!(out, "        System.out.println(\"{method_name} returned: \" + result);");
            }
            out.push_str("    }\n");
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn render_fallback_driver(&self, caller_name: &str, under_test: &str) -> ForgeResult<String> {
        let name = java_identifier(caller_name);
        let local = lower_first(&name);
        let mut out = self.preamble(DRIVER_IMPORTS);
        let _ = writeln!(
            out,
            "/**\n * Driver for {under_test}. {name} has no modelled methods, so only\n * construction is exercised.\n */"
        );
        let _ = writeln!(out, "public class {name}Driver {{\n");
        let _ = writeln!(out, "    @Test\n    void testConstruction() {{");
        let _ = writeln!(out, "        {name} {local} = assertDoesNotThrow(() -> new {name}());");
        let _ = writeln!(out, "        assertNotNull({local});");
        out.push_str("    }\n}\n");
        Ok(out)
    }

    fn render_summary(&self, selected: &[String]) -> ForgeResult<String> {
        let mut out = String::from("Generation summary\n==================\n\n");
        let _ = writeln!(out, "Selected classes: {}\n", selected.join(", "));
        out.push_str(
            "No stubs or drivers are needed. Every caller and callee of the selected\n\
             classes found in the sequence diagrams is itself under test, so the\n\
             selection is self-contained.\n",
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_PACKAGE;

    fn account_service() -> ClassModel {
        let mut private = MethodModel::new("audit", "void");
        private.visibility = "private".to_string();
        ClassModel::new("AccountService", "bank")
            .with_method(MethodModel::new("processDeposit", "boolean").with_parameter("amount", "double"))
            .with_method(MethodModel::new("reset", "void"))
            .with_method(private)
    }

    #[test]
    fn test_java_identifier() {
        assert_eq!(java_identifier("Account Service"), "AccountService");
        assert_eq!(java_identifier("2FA-Gate"), "_2FAGate");
        assert_eq!(java_identifier("42"), "_42");
        assert_eq!(java_identifier("new"), "_new");
        assert_eq!(java_identifier(" - "), "_unnamed");
    }

    #[test]
    fn test_render_stub() {
        let renderer = JavaRenderer::new(Some("com.bank.test".to_string()));
        let mut literals = LiteralGenerator::seeded(1);
        let source = renderer.render_stub(&account_service(), &mut literals).unwrap();
        assert!(source.starts_with("package com.bank.test;\n"));
        assert!(source.contains("public class AccountServiceStub extends AccountService {"));
        assert!(source.contains("    @Override\n    public boolean processDeposit(double amount) {"));
        assert!(source.contains("        return true;") || source.contains("        return false;"));
        assert!(source.contains("public void reset() {\n        // no-op"));
        assert!(!source.contains("audit"));
    }

    #[test]
    fn test_render_service_stub() {
        let mut service = ClassModel::new("TransactionService", DEFAULT_PACKAGE);
        service.methods = vec![MethodModel::new("getBalance", "double").with_parameter("accountId", "long")];
        let source = JavaRenderer::default()
            .render_service_stub(&service, &mut LiteralGenerator::seeded(2))
            .unwrap();
        assert!(!source.contains("package "));
        assert!(source.contains("public class TransactionServiceStub {"));
        assert!(!source.contains("@Override"));
        assert!(source.contains("public double getBalance(long accountId)"));
    }

    #[test]
    fn test_render_driver() {
        let teller = ClassModel::new("Teller", "bank")
            .with_method(
                MethodModel::new("handleDeposit", "void")
                    .with_parameter("accountId", "long")
                    .with_parameter("amount", "double"),
            )
            .with_method(MethodModel::new("balance", "double"))
            .with_method(MethodModel::new("balance", "double").with_parameter("currency", "String"));
        let source = JavaRenderer::default()
            .render_driver(&teller, "AccountService", &mut LiteralGenerator::seeded(9))
            .unwrap();
        assert!(source.contains("import org.junit.jupiter.api.Test;"));
        assert!(source.contains("public class TellerDriver {"));
        assert!(source.contains("private final Teller teller = new Teller();"));
        assert!(source.contains("void testHandleDeposit() {"));
        assert!(source.contains("assertDoesNotThrow(() -> teller.handleDeposit(accountId, amount));"));
        assert!(source.contains("double result = assertDoesNotThrow(() -> teller.balance());"));
        assert!(source.contains("void testBalance2() {"));
        assert!(source.contains("System.out.println(\"balance returned: \" + result);"));
    }

    #[test]
    fn test_render_fallback_driver_and_summary() {
        let renderer = JavaRenderer::default();
        let source = renderer.render_fallback_driver("Atm", "AccountService").unwrap();
        assert!(source.contains("public class AtmDriver {"));
        assert!(source.contains("Atm atm = assertDoesNotThrow(() -> new Atm());"));

        let summary = renderer
            .render_summary(&["Teller".to_string(), "AccountService".to_string()])
            .unwrap();
        assert!(summary.contains("Selected classes: Teller, AccountService"));
        assert!(summary.contains("self-contained"));
    }
}
