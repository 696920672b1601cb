//! Type- and name-aware Java literal generation for stub and driver bodies.
//!
//! Values are random but plausible: ids are large integers, counts are small,
//! flags lean towards `true`, and strings follow the shape their name
//! suggests. The RNG is injectable so generated files can be reproduced.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::analysis::matcher::expand_camel_case;

const FIRST_NAMES: &[&str] = &["Alice", "Bruno", "Chen", "Dana", "Emeka", "Farah", "Goran", "Hana"];
const LAST_NAMES: &[&str] = &["Novak", "Okafor", "Silva", "Tanaka", "Weber", "Lindqvist", "Haddad"];
const STATUS_VALUES: &[&str] = &["ACTIVE", "PENDING", "COMPLETED", "FAILED"];
const CODE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Probability that a generated return flag is `true`.
const RETURN_TRUE_BIAS: f64 = 0.8;
/// Probability that a generated argument flag is `true`.
const ARGUMENT_TRUE_BIAS: f64 = 0.7;

/// Where a literal will be used; flags are biased differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    Return,
    Argument,
}

fn name_words(name: &str) -> Vec<String> {
    expand_camel_case(&name.replace(['_', '-'], " "))
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

fn has_word(words: &[String], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.contains(&w.as_str()))
}

/// `List<Account>` → `List`, `java.util.Map<K, V>` → `Map`.
fn base_type(type_name: &str) -> &str {
    let head = type_name.split('<').next().unwrap_or(type_name).trim();
    head.rsplit('.').next().unwrap_or(head)
}

pub struct LiteralGenerator {
    rng: StdRng,
}

impl LiteralGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is set, otherwise from OS entropy.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Expression a stub method returns, or an empty string for `void`.
    pub fn return_literal(&mut self, type_name: &str, method_name: &str) -> String {
        self.literal(type_name, method_name, Position::Return)
    }

    /// Expression passed for a parameter in a driver call.
    pub fn argument_literal(&mut self, type_name: &str, param_name: &str) -> String {
        self.literal(type_name, param_name, Position::Argument)
    }

    fn literal(&mut self, type_name: &str, name: &str, position: Position) -> String {
        let type_name = type_name.trim();
        let words = name_words(name);

        if let Some(element) = type_name.strip_suffix("[]") {
            return format!("new {}[0]", element.trim());
        }

        match base_type(type_name) {
            "" | "void" | "Void" => String::new(),
            "boolean" | "Boolean" => {
                let bias = match position {
                    Position::Return => RETURN_TRUE_BIAS,
                    Position::Argument => ARGUMENT_TRUE_BIAS,
                };
                self.rng.gen_bool(bias).to_string()
            }
            "int" | "Integer" | "short" | "Short" | "byte" | "Byte" => self.integer(&words).to_string(),
            "long" | "Long" => format!("{}L", self.integer(&words)),
            "double" | "Double" => format!("{:.2}", self.decimal(&words)),
            "float" | "Float" => format!("{:.2}f", self.decimal(&words)),
            "BigDecimal" => format!("new BigDecimal(\"{:.2}\")", self.decimal(&words)),
            "char" | "Character" => {
                let letter = CODE_LETTERS[self.rng.gen_range(0..CODE_LETTERS.len())] as char;
                format!("'{letter}'")
            }
            "String" | "CharSequence" => format!("\"{}\"", self.text(&words)),
            "List" | "ArrayList" | "Collection" | "Iterable" => "new ArrayList<>()".to_string(),
            "Set" | "HashSet" => "new HashSet<>()".to_string(),
            "Map" | "HashMap" => "new HashMap<>()".to_string(),
            "Optional" => "Optional.empty()".to_string(),
            "LocalDate" => "LocalDate.now()".to_string(),
            "LocalDateTime" => "LocalDateTime.now()".to_string(),
            "Date" => "new Date()".to_string(),
            "Object" => "new Object()".to_string(),
            other => format!("new {other}()"),
        }
    }

    fn integer(&mut self, words: &[String]) -> i64 {
        if has_word(words, &["count", "size", "quantity", "qty", "num", "number", "total"]) {
            self.rng.gen_range(0..10)
        } else if has_word(words, &["id", "key", "no"]) {
            self.rng.gen_range(100_000..1_000_000)
        } else if has_word(words, &["age"]) {
            self.rng.gen_range(18..80)
        } else if has_word(words, &["year"]) {
            self.rng.gen_range(1990..2031)
        } else if has_word(words, &["percent", "percentage", "rate", "score"]) {
            self.rng.gen_range(0..101)
        } else {
            self.rng.gen_range(1..1000)
        }
    }

    fn decimal(&mut self, words: &[String]) -> f64 {
        if has_word(words, &["rate", "interest", "ratio", "percent"]) {
            self.rng.gen_range(0.01..0.25)
        } else if has_word(words, &["amount", "balance", "price", "total", "fee", "salary", "cost", "limit"]) {
            self.rng.gen_range(10.0..5000.0)
        } else {
            self.rng.gen_range(0.0..1000.0)
        }
    }

    fn pick<'a>(&mut self, values: &[&'a str]) -> &'a str {
        values.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn text(&mut self, words: &[String]) -> String {
        if has_word(words, &["email", "mail"]) {
            let first = self.pick(FIRST_NAMES).to_lowercase();
            let last = self.pick(LAST_NAMES).to_lowercase();
            return format!("{first}.{last}{}@example.com", self.rng.gen_range(1..100));
        }
        if has_word(words, &["phone", "mobile", "tel", "telephone"]) {
            return format!(
                "555-{:03}-{:04}",
                self.rng.gen_range(0..1000),
                self.rng.gen_range(0..10_000)
            );
        }
        if has_word(words, &["status", "state"]) {
            return self.pick(STATUS_VALUES).to_string();
        }
        if has_word(words, &["code", "reference", "ref"]) {
            let letters: String = (0..3)
                .map(|_| CODE_LETTERS[self.rng.gen_range(0..CODE_LETTERS.len())] as char)
                .collect();
            return format!("{letters}{:04}", self.rng.gen_range(0..10_000));
        }
        if has_word(words, &["id"]) {
            return format!("ID-{}", self.rng.gen_range(100_000..1_000_000));
        }
        if has_word(words, &["name"]) {
            let first = self.pick(FIRST_NAMES);
            if has_word(words, &["first", "given"]) {
                return first.to_string();
            }
            let last = self.pick(LAST_NAMES);
            if has_word(words, &["last", "family", "surname"]) {
                return last.to_string();
            }
            return format!("{first} {last}");
        }
        if has_word(words, &["address", "street"]) {
            return format!("{} Main Street", self.rng.gen_range(1..500));
        }
        let subject = words.last().map(String::as_str).unwrap_or("value");
        format!("sample {subject} {}", self.rng.gen_range(1..100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn integer_of(literal: &str) -> i64 {
        literal.trim_end_matches('L').parse().unwrap()
    }

    #[test]
    fn test_seeded_generators_repeat() {
        let mut a = LiteralGenerator::seeded(42);
        let mut b = LiteralGenerator::seeded(42);
        for (ty, name) in [("int", "count"), ("String", "email"), ("boolean", "ok"), ("double", "amount")] {
            assert_eq!(a.return_literal(ty, name), b.return_literal(ty, name));
        }
    }

    #[test]
    fn test_numeric_ranges_follow_names() {
        let mut gen = LiteralGenerator::seeded(7);
        for _ in 0..50 {
            let count = integer_of(&gen.return_literal("int", "getCount"));
            assert!((0..10).contains(&count));
            let id = integer_of(&gen.argument_literal("long", "accountId"));
            assert!((100_000..1_000_000).contains(&id));
            let age = integer_of(&gen.argument_literal("Integer", "age"));
            assert!((18..80).contains(&age));
        }
        assert!(gen.return_literal("long", "total").ends_with('L'));
    }

    #[test]
    fn test_decimals_and_big_decimal() {
        let mut gen = LiteralGenerator::seeded(3);
        let amount: f64 = gen.argument_literal("double", "amount").parse().unwrap();
        assert!((10.0..=5000.0).contains(&amount));
        assert!(gen.argument_literal("float", "ratio").ends_with('f'));
        let big = Regex::new(r#"^new BigDecimal\("\d+\.\d{2}"\)$"#).unwrap();
        assert!(big.is_match(&gen.return_literal("BigDecimal", "getBalance")));
    }

    #[test]
    fn test_booleans_lean_true() {
        let mut gen = LiteralGenerator::seeded(11);
        let trues = (0..400)
            .filter(|_| gen.return_literal("boolean", "isOpen") == "true")
            .count();
        assert!(trues > 240, "only {trues} of 400 were true");
    }

    #[test]
    fn test_strings_follow_names() {
        let mut gen = LiteralGenerator::seeded(5);
        let email = gen.argument_literal("String", "customerEmail");
        assert!(email.starts_with('"') && email.ends_with("@example.com\""));
        let phone = Regex::new(r#"^"555-\d{3}-\d{4}"$"#).unwrap();
        assert!(phone.is_match(&gen.argument_literal("String", "phone_number")));
        let status = gen.return_literal("String", "getStatus");
        assert!(STATUS_VALUES.iter().any(|s| status == format!("\"{s}\"")));
        let full_name = gen.argument_literal("String", "name");
        assert_eq!(full_name.split(' ').count(), 2);
    }

    #[test]
    fn test_containers_and_objects() {
        let mut gen = LiteralGenerator::seeded(1);
        assert_eq!(gen.return_literal("void", "run"), "");
        assert_eq!(gen.return_literal("List<Account>", "findAll"), "new ArrayList<>()");
        assert_eq!(gen.return_literal("java.util.Map<String, Long>", "index"), "new HashMap<>()");
        assert_eq!(gen.return_literal("Optional<User>", "lookup"), "Optional.empty()");
        assert_eq!(gen.return_literal("Account[]", "all"), "new Account[0]");
        assert_eq!(gen.return_literal("Receipt", "issue"), "new Receipt()");
        assert_eq!(gen.argument_literal("Object", "entity"), "new Object()");
    }
}
