//! Call-vs-return classification of sequence-diagram messages.
//!
//! Vendor message types are unreliable (replies are frequently exported as
//! plain `message` or even `synchCall`), so the role is derived from the
//! message text through an ordered table of named rules. The first rule that
//! returns a verdict wins; [`RULES`] is the precedence contract.
//!
//! This is a best-effort heuristic. It is known to misclassify some names in
//! both directions (for example `closeAccount(id)` reads as cleanup and is
//! treated as a return); use [`classify_with_rule`] to see which rule fired.

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::matcher::expand_camel_case;

/// Role of a message in the call graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageRole {
    Call,
    Return,
}

/// A call expression found in a message name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallExpression {
    pub receiver: Option<String>,
    pub method: String,
}

/// Pre-computed views of a message handed to every rule.
#[derive(Clone, Debug)]
pub struct MessageFacts {
    pub declared_type: String,
    pub name: String,
    pub call: Option<CallExpression>,
}

impl MessageFacts {
    pub fn new(declared_type: &str, name: &str) -> Self {
        let name = name.trim().to_string();
        Self {
            declared_type: declared_type.trim().to_lowercase(),
            call: extract_call(&name),
            name,
        }
    }
}

/// One named, independently testable classification rule.
pub struct ClassifierRule {
    pub name: &'static str,
    pub verdict: fn(&MessageFacts) -> Option<MessageRole>,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once via LazyLock)
// ---------------------------------------------------------------------------

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
});

static RETURN_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^\s*(?:return|reply|response)|\b(?:returns?|returned|returning|reply|replies|response)\b)")
        .unwrap()
});

static VOID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:void|null|none|nil|undefined|empty)$").unwrap());

static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Za-z_][A-Za-z0-9_]*\s+(?:object|instance|entity)$").unwrap());

static CONTAINER_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[A-Za-z_][A-Za-z0-9_.]*\s*<.*>|[A-Za-z_][A-Za-z0-9_]*\s*\[\s*\]|(?i:list|array|map|set|optional|collection)\s+of\s+\w+)$",
    )
    .unwrap()
});

static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*\s*(?:[+\-*/%]?=)\s*[^=()]+$").unwrap()
});

static BOOLEAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:true|false)$").unwrap());

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?[dDfFlL]?$").unwrap());

static STRING_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?:"[^"]*"|'[^']*')$"#).unwrap());

static JSON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^\{.*\}$").unwrap());

static ARRAY_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)^\[.*\]$").unwrap());

static RETURN_OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:->|=>|<-|:=)").unwrap());

// ---------------------------------------------------------------------------
// Word lists
// ---------------------------------------------------------------------------

/// Terminal side-effecting actions: not a forward call worth graphing.
const SIDE_EFFECT_VERBS: &[&str] = &[
    "send", "emit", "publish", "notify", "broadcast", "dispatch", "log", "print", "println",
    "trace", "audit", "cleanup", "dispose", "close", "release", "flush", "shutdown",
];

/// Mutations that only matter when aimed at a side-effect receiver.
const MUTATION_VERBS: &[&str] = &[
    "set", "update", "put", "add", "remove", "delete", "clear", "insert", "save", "store",
    "write", "append", "increment", "decrement", "invalidate", "evict", "persist",
];

const SIDE_EFFECT_RECEIVERS: &[&str] = &[
    "cache", "storage", "store", "log", "logger", "db", "database", "repo", "repository",
];

/// Verbs that always denote a forward call.
const CALL_VERBS: &[&str] = &[
    "get", "find", "fetch", "load", "read", "create", "build", "make", "new", "process",
    "handle", "validate", "verify", "check", "calculate", "compute", "connect", "open",
    "deposit", "withdraw", "transfer", "authenticate", "authorize", "login", "logout",
    "execute", "run", "submit", "request", "query", "search", "lookup", "retrieve",
    "parse", "convert", "transform", "init", "initialize", "start", "register", "apply",
    "call", "invoke", "generate", "approve", "reject", "cancel", "confirm", "pay", "charge",
    "book", "reserve", "select", "list", "show", "display", "enter", "input", "update",
];

/// Words that, without a call expression, indicate returned data.
const RETURN_INDICATORS: &[&str] = &[
    "ok", "success", "successful", "succeeded", "done", "ack", "acknowledged", "result",
    "results", "status", "confirmation", "confirmed", "failed", "failure", "error",
    "exception", "valid", "invalid", "balance", "value", "data", "details", "info", "list",
    "record", "records", "receipt", "token", "id", "approved", "denied", "rejected",
];

/// Longest phrase still treated as a short data label.
const SHORT_LABEL_MAX_WORDS: usize = 3;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// First `receiver.method(` or `method(` occurrence in the message text.
pub fn extract_call(name: &str) -> Option<CallExpression> {
    let caps = CALL_RE.captures(name)?;
    let method = caps.get(2)?.as_str().to_string();
    Some(CallExpression {
        receiver: caps.get(1).map(|m| m.as_str().to_string()),
        method,
    })
}

/// True when `word` is `verb` or starts with `verb` at a camelCase / snake
/// boundary (`sendEmail`, `log_event`), but not `sender` or `logout`.
fn starts_with_verb(word: &str, verb: &str) -> bool {
    if word.len() < verb.len() || !word.is_char_boundary(verb.len()) {
        return false;
    }
    let (head, rest) = word.split_at(verb.len());
    if !head.eq_ignore_ascii_case(verb) {
        return false;
    }
    match rest.chars().next() {
        Some(next) => next.is_uppercase() || next == '_' || next.is_ascii_digit(),
        None => true,
    }
}

fn leading_verb_in(word: &str, verbs: &[&str]) -> bool {
    verbs.iter().any(|verb| starts_with_verb(word, verb))
}

/// `accountRepo`, `session_cache`, `userDB` are sinks; `loginService` is not.
fn receiver_is_side_effect_sink(receiver: &str) -> bool {
    let spaced = expand_camel_case(&receiver.replace(['_', '-'], " "));
    spaced
        .split_whitespace()
        .any(|part| SIDE_EFFECT_RECEIVERS.contains(&part.to_lowercase().as_str()))
}

fn words(value: &str) -> Vec<String> {
    value
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// (1) The export explicitly declared a reply.
pub fn declared_return(facts: &MessageFacts) -> Option<MessageRole> {
    matches!(facts.declared_type.as_str(), "return" | "reply" | "response")
        .then_some(MessageRole::Return)
}

/// (2) Leading or embedded return/reply/response keyword.
pub fn return_keyword(facts: &MessageFacts) -> Option<MessageRole> {
    RETURN_KEYWORD_RE
        .is_match(&facts.name)
        .then_some(MessageRole::Return)
}

/// (3) Text shaped like returned data rather than an invocation.
pub fn return_shaped_literal(facts: &MessageFacts) -> Option<MessageRole> {
    let name = facts.name.as_str();
    if name.is_empty() {
        return Some(MessageRole::Return);
    }
    let shaped = VOID_RE.is_match(name)
        || OBJECT_RE.is_match(name)
        || CONTAINER_TYPE_RE.is_match(name)
        || ASSIGNMENT_RE.is_match(name)
        || BOOLEAN_RE.is_match(name)
        || NUMBER_RE.is_match(name)
        || STRING_LITERAL_RE.is_match(name)
        || JSON_RE.is_match(name)
        || ARRAY_LITERAL_RE.is_match(name);
    shaped.then_some(MessageRole::Return)
}

/// (4a) Terminal side-effecting action such as `notify(...)` or `log(...)`.
pub fn side_effect_action(facts: &MessageFacts) -> Option<MessageRole> {
    let call = facts.call.as_ref()?;
    leading_verb_in(&call.method, SIDE_EFFECT_VERBS).then_some(MessageRole::Return)
}

/// (4b) State mutation on a cache/storage/log/db/repo receiver.
pub fn side_effect_mutation(facts: &MessageFacts) -> Option<MessageRole> {
    let call = facts.call.as_ref()?;
    let receiver = call.receiver.as_deref()?;
    (receiver_is_side_effect_sink(receiver) && leading_verb_in(&call.method, MUTATION_VERBS))
        .then_some(MessageRole::Return)
}

/// (4c) Allow-listed call verbs.
pub fn call_verb(facts: &MessageFacts) -> Option<MessageRole> {
    let call = facts.call.as_ref()?;
    leading_verb_in(&call.method, CALL_VERBS).then_some(MessageRole::Call)
}

/// (4d) Any other `object.method(...)` or `identifier(...)`.
pub fn any_call_expression(facts: &MessageFacts) -> Option<MessageRole> {
    facts.call.as_ref().map(|_| MessageRole::Call)
}

/// (5a) Return indicator words or arrow/assignment operators.
pub fn return_indicator(facts: &MessageFacts) -> Option<MessageRole> {
    if RETURN_OPERATOR_RE.is_match(&facts.name) {
        return Some(MessageRole::Return);
    }
    let tokens = words(&facts.name);
    let first_is_command = tokens
        .first()
        .map(|w| leading_verb_in(w, CALL_VERBS))
        .unwrap_or(false);
    if first_is_command {
        return None;
    }
    tokens
        .iter()
        .any(|w| RETURN_INDICATORS.contains(&w.to_lowercase().as_str()))
        .then_some(MessageRole::Return)
}

/// (5b) Short labels that do not start with a command verb read as data.
pub fn short_data_label(facts: &MessageFacts) -> Option<MessageRole> {
    let tokens = words(&facts.name);
    if tokens.is_empty() || tokens.len() > SHORT_LABEL_MAX_WORDS {
        return None;
    }
    let first = &tokens[0];
    if leading_verb_in(first, CALL_VERBS) || leading_verb_in(first, SIDE_EFFECT_VERBS) {
        return None;
    }
    Some(MessageRole::Return)
}

/// (5c) Anything left is an imperative phrase.
pub fn default_call(_facts: &MessageFacts) -> Option<MessageRole> {
    Some(MessageRole::Call)
}

/// Precedence-ordered rule table.
pub static RULES: &[ClassifierRule] = &[
    ClassifierRule {
        name: "declared_return",
        verdict: declared_return,
    },
    ClassifierRule {
        name: "return_keyword",
        verdict: return_keyword,
    },
    ClassifierRule {
        name: "return_shaped_literal",
        verdict: return_shaped_literal,
    },
    ClassifierRule {
        name: "side_effect_action",
        verdict: side_effect_action,
    },
    ClassifierRule {
        name: "side_effect_mutation",
        verdict: side_effect_mutation,
    },
    ClassifierRule {
        name: "call_verb",
        verdict: call_verb,
    },
    ClassifierRule {
        name: "any_call_expression",
        verdict: any_call_expression,
    },
    ClassifierRule {
        name: "return_indicator",
        verdict: return_indicator,
    },
    ClassifierRule {
        name: "short_data_label",
        verdict: short_data_label,
    },
    ClassifierRule {
        name: "default_call",
        verdict: default_call,
    },
];

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Classify a message and report which rule decided it.
pub fn classify_with_rule(declared_type: &str, name: &str) -> (MessageRole, &'static str) {
    let facts = MessageFacts::new(declared_type, name);
    for rule in RULES {
        if let Some(role) = (rule.verdict)(&facts) {
            return (role, rule.name);
        }
    }
    (MessageRole::Call, "default_call")
}

pub fn classify(declared_type: &str, name: &str) -> MessageRole {
    classify_with_rule(declared_type, name).0
}

pub fn is_call(declared_type: &str, name: &str) -> bool {
    classify(declared_type, name) == MessageRole::Call
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(name: &str) -> MessageFacts {
        MessageFacts::new("message", name)
    }

    #[test]
    fn test_extract_call() {
        let call = extract_call("account.deposit(amount)").unwrap();
        assert_eq!(call.receiver.as_deref(), Some("account"));
        assert_eq!(call.method, "deposit");

        let bare = extract_call("result = validate(card)").unwrap();
        assert!(bare.receiver.is_none());
        assert_eq!(bare.method, "validate");

        assert!(extract_call("balance").is_none());
    }

    #[test]
    fn test_starts_with_verb_respects_boundaries() {
        assert!(starts_with_verb("sendEmail", "send"));
        assert!(starts_with_verb("log_event", "log"));
        assert!(starts_with_verb("notify", "notify"));
        assert!(!starts_with_verb("sender", "send"));
        assert!(!starts_with_verb("logout", "log"));
    }

    #[test]
    fn test_declared_return_rule() {
        assert_eq!(
            declared_return(&MessageFacts::new("Reply", "x")),
            Some(MessageRole::Return)
        );
        assert_eq!(declared_return(&MessageFacts::new("synchCall", "x")), None);
    }

    #[test]
    fn test_return_keyword_rule() {
        assert!(return_keyword(&facts("return balance")).is_some());
        assert!(return_keyword(&facts("Response: OK")).is_some());
        assert!(return_keyword(&facts("returns account list")).is_some());
        assert!(return_keyword(&facts("processResponse(msg)")).is_none());
        assert!(return_keyword(&facts("getReplyQueue()")).is_none());
    }

    #[test]
    fn test_return_shaped_literal_rule() {
        for name in [
            "void",
            "null",
            "Account object",
            "List<Account>",
            "Map<String, Integer>",
            "Optional<User>",
            "Account[]",
            "balance = balance - amount",
            "total += fee",
            "true",
            "FALSE",
            "123",
            "-45.67",
            "\"approved\"",
            "{\"status\": \"ok\"}",
            "[1, 2, 3]",
        ] {
            assert_eq!(
                return_shaped_literal(&facts(name)),
                Some(MessageRole::Return),
                "{name} should be return-shaped"
            );
        }
        assert!(return_shaped_literal(&facts("processDeposit(amount)")).is_none());
        assert!(return_shaped_literal(&facts("result = calculate(x)")).is_none());
    }

    #[test]
    fn test_side_effect_rules() {
        assert!(side_effect_action(&facts("notifier.sendEmail(user)")).is_some());
        assert!(side_effect_action(&facts("log(\"done\")")).is_some());
        assert!(side_effect_action(&facts("sender.forward(msg)")).is_none());

        assert!(side_effect_mutation(&facts("cache.put(key, value)")).is_some());
        assert!(side_effect_mutation(&facts("accountRepo.save(account)")).is_some());
        assert!(side_effect_mutation(&facts("account.save(x)")).is_none());
        assert!(side_effect_mutation(&facts("cache.get(key)")).is_none());
        assert!(side_effect_mutation(&facts("loginService.update(user)")).is_none());
        assert!(side_effect_mutation(&facts("userDB.insert(row)")).is_some());
    }

    #[test]
    fn test_call_rules() {
        assert_eq!(
            call_verb(&facts("processDeposit(amount)")),
            Some(MessageRole::Call)
        );
        assert!(call_verb(&facts("frobnicate(x)")).is_none());
        assert_eq!(
            any_call_expression(&facts("frobnicate(x)")),
            Some(MessageRole::Call)
        );
    }

    #[test]
    fn test_no_parenthesis_rules() {
        assert!(return_indicator(&facts("status -> ok")).is_some());
        assert!(return_indicator(&facts("transaction receipt")).is_some());
        assert!(return_indicator(&facts("validate account details")).is_none());
        assert!(short_data_label(&facts("accountBalance")).is_some());
        assert!(short_data_label(&facts("withdraw cash")).is_none());
        assert!(short_data_label(&facts("please look up the account now")).is_none());
    }

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify("synchCall", "processDeposit(amount)"), MessageRole::Call);
        assert_eq!(classify("message", "accountBalance"), MessageRole::Return);
        assert_eq!(classify("synchCall", "true"), MessageRole::Return);
        assert_eq!(classify("message", "List<Account>"), MessageRole::Return);
        assert_eq!(classify("message", "123"), MessageRole::Return);
        assert_eq!(classify("return", "processDeposit(amount)"), MessageRole::Return);
        assert_eq!(classify("message", "withdraw cash"), MessageRole::Call);
        assert_eq!(classify("message", "ask the bank to move funds between accounts"), MessageRole::Call);
        assert_eq!(classify("message", "repo.frobnicate(x)"), MessageRole::Call);
    }

    #[test]
    fn test_classify_with_rule_reports_rule() {
        assert_eq!(
            classify_with_rule("message", "notify(customer)"),
            (MessageRole::Return, "side_effect_action")
        );
        assert_eq!(
            classify_with_rule("message", "ledger.post(entry)"),
            (MessageRole::Call, "any_call_expression")
        );
        assert_eq!(
            classify_with_rule("reply", "anything"),
            (MessageRole::Return, "declared_return")
        );
    }

    #[test]
    fn test_rule_table_order_is_stable() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names.first(), Some(&"declared_return"));
        assert_eq!(names.last(), Some(&"default_call"));
        let call_verb_at = names.iter().position(|n| *n == "call_verb").unwrap();
        let side_effect_at = names.iter().position(|n| *n == "side_effect_action").unwrap();
        assert!(side_effect_at < call_verb_at);
    }
}
