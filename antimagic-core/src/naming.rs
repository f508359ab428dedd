//! Deterministic constant-name derivation.
//!
//! [`derive_name`] is a pure function of its inputs: the same value and
//! limits always give the same identifier (or `None` when the value cannot
//! be named and needs the assistant or a policy decision).

use regex::Regex;
use std::sync::OnceLock;

/// Suffix appended to the value of an interpolated literal before naming.
pub const FORMATTED_SUFFIX: &str = "_formatted";

/// Short strings that always get a fixed mnemonic.
const KNOWN_STRINGS: &[(&str, &str)] = &[
    ("\n", "NEWLINE"),
    ("\t", "TAB"),
    ("", "EMPTY"),
    (" ", "SPACE"),
    ("_", "UNDERSCORE"),
    ("*", "STAR"),
    ("?", "QUESTION_MARK"),
    (",", "COMMA"),
    (", ", "COMMA_SPACE"),
    (".", "DOT"),
    (":", "COLON"),
    ("/", "SLASH"),
    ("-", "DASH"),
    ("\"", "DOUBLE_QUOTES"),
    ("'", "SINGLE_QUOTES"),
];

/// Limits applied while deriving a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameLimits {
    /// Maximum underscore-separated segments; `None` disables the check.
    pub max_segments: Option<usize>,
}

impl NameLimits {
    /// Limits for names derived from literal values.
    pub fn for_values(max_segments: usize) -> Self {
        Self {
            max_segments: Some(max_segments),
        }
    }

    /// Limits for names proposed by the naming assistant.
    pub fn for_proposals() -> Self {
        Self { max_segments: None }
    }
}

fn camel_boundary() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"([a-z])([A-Z])").expect("Hardcoded regex pattern is valid"))
}

fn separator_run() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[\s/-]+").expect("Hardcoded regex pattern is valid"))
}

/// Derive a constant name for `value`.
///
/// Returns `None` for values that normalise to nothing, look like opaque
/// hex content, or need more segments than allowed. With
/// [`NameLimits::for_proposals`] the hex and segment checks are skipped:
/// the input is already a name chosen by someone and only needs sanitising.
pub fn derive_name(value: &str, limits: NameLimits) -> Option<String> {
    if let Some((_, known)) = KNOWN_STRINGS.iter().find(|(s, _)| *s == value) {
        return Some((*known).to_string());
    }

    let mut name = normalize(value);
    let letters_and_digits: String = name.chars().filter(|c| *c != '_').collect();
    if letters_and_digits.is_empty() {
        return None;
    }
    if limits.max_segments.is_some() && letters_and_digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        let digits_end = name
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(name.len());
        let words = number_to_words(&name[..digits_end]);
        let rest = name[digits_end..].trim_start_matches('_');
        name = if rest.is_empty() {
            words
        } else {
            format!("{}_{}", words, rest)
        };
    }

    if let Some(max) = limits.max_segments {
        if name.split('_').count() > max {
            return None;
        }
    }
    Some(name)
}

/// Name for a value whose sites are interpolated templates.
pub fn derive_formatted_name(template: &str, limits: NameLimits) -> Option<String> {
    derive_name(&format!("{}{}", template, FORMATTED_SUFFIX), limits)
}

/// Uppercase, separator-normalised, `[A-Z0-9_]`-only form of a value.
fn normalize(value: &str) -> String {
    let split = camel_boundary().replace_all(value, "${1}_${2}");
    let separated = separator_run().replace_all(&split, "_");

    let mut out = String::with_capacity(separated.len());
    for c in separated.chars().flat_map(char::to_uppercase) {
        if !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            continue;
        }
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

const ONES: [&str; 20] = [
    "ZERO", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN",
    "ELEVEN", "TWELVE", "THIRTEEN", "FOURTEEN", "FIFTEEN", "SIXTEEN", "SEVENTEEN", "EIGHTEEN",
    "NINETEEN",
];

const TENS: [&str; 10] = [
    "", "", "TWENTY", "THIRTY", "FORTY", "FIFTY", "SIXTY", "SEVENTY", "EIGHTY", "NINETY",
];

const SCALES: [&str; 13] = [
    "",
    "THOUSAND",
    "MILLION",
    "BILLION",
    "TRILLION",
    "QUADRILLION",
    "QUINTILLION",
    "SEXTILLION",
    "SEPTILLION",
    "OCTILLION",
    "NONILLION",
    "DECILLION",
    "UNDECILLION",
];

/// English words for a run of ASCII digits, joined by underscores.
///
/// Runs with leading zeros or too long for the scale table are spelled
/// digit by digit.
pub fn number_to_words(digits: &str) -> String {
    let spell_each = digits.len() > 1 && digits.starts_with('0');
    match digits.parse::<u128>() {
        Ok(n) if !spell_each && digits.len() <= 3 * SCALES.len() => {
            if n == 0 {
                return ONES[0].to_string();
            }
            let mut groups = Vec::new();
            let mut rest = n;
            while rest > 0 {
                groups.push((rest % 1000) as usize);
                rest /= 1000;
            }
            let mut words = Vec::new();
            for (scale, group) in groups.iter().enumerate().rev() {
                if *group == 0 {
                    continue;
                }
                words.extend(hundreds_to_words(*group));
                if scale > 0 {
                    words.push(SCALES[scale]);
                }
            }
            words.join("_")
        }
        _ => digits
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| ONES[d as usize])
            .collect::<Vec<_>>()
            .join("_"),
    }
}

fn hundreds_to_words(n: usize) -> Vec<&'static str> {
    let mut words = Vec::new();
    let hundreds = n / 100;
    let rest = n % 100;
    if hundreds > 0 {
        words.push(ONES[hundreds]);
        words.push("HUNDRED");
    }
    if rest >= 20 {
        words.push(TENS[rest / 10]);
        if rest % 10 > 0 {
            words.push(ONES[rest % 10]);
        }
    } else if rest > 0 {
        words.push(ONES[rest]);
    }
    words
}

/// Whether `name` is a well-formed generated identifier.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> Option<String> {
        derive_name(value, NameLimits::for_values(3))
    }

    #[test]
    fn test_known_strings_win() {
        assert_eq!(name("\n").as_deref(), Some("NEWLINE"));
        assert_eq!(name("").as_deref(), Some("EMPTY"));
        assert_eq!(name("'").as_deref(), Some("SINGLE_QUOTES"));
    }

    #[test]
    fn test_simple_words() {
        assert_eq!(name("user-id").as_deref(), Some("USER_ID"));
        assert_eq!(name("hello world").as_deref(), Some("HELLO_WORLD"));
        assert_eq!(name("path/to/file").as_deref(), Some("PATH_TO_FILE"));
        assert_eq!(name("  spaced__out  ").as_deref(), Some("SPACED_OUT"));
    }

    #[test]
    fn test_camel_case_is_split() {
        assert_eq!(name("userName").as_deref(), Some("USER_NAME"));
    }

    #[test]
    fn test_punctuation_is_stripped() {
        assert_eq!(name("don't stop!").as_deref(), Some("DONT_STOP"));
        assert_eq!(name("!!!"), None);
    }

    #[test]
    fn test_hex_only_values_are_unnameable() {
        assert_eq!(name("deadbeef"), None);
        assert_eq!(name("123"), None);
        assert_eq!(name("dead-beef"), None);
    }

    #[test]
    fn test_leading_number_is_spelled_out() {
        assert_eq!(name("3cats").as_deref(), Some("THREE_CATS"));
        assert_eq!(name("12 monkeys").as_deref(), Some("TWELVE_MONKEYS"));
        let derived = name("3cats").unwrap();
        assert!(!derived.starts_with(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn test_segment_limit() {
        assert_eq!(name("one two three four"), None);
        assert_eq!(name("2023 annual report"), None);
        assert_eq!(
            derive_name("one two three four", NameLimits::for_values(4)).as_deref(),
            Some("ONE_TWO_THREE_FOUR")
        );
    }

    #[test]
    fn test_proposals_bypass_segment_and_hex_checks() {
        let limits = NameLimits::for_proposals();
        assert_eq!(
            derive_name("a very long proposed name", limits).as_deref(),
            Some("A_VERY_LONG_PROPOSED_NAME")
        );
        assert_eq!(derive_name("FACADE", limits).as_deref(), Some("FACADE"));
        assert_eq!(derive_name("404_PAGE", limits).as_deref(), Some("FOUR_HUNDRED_FOUR_PAGE"));
        assert_eq!(derive_name("???", limits), None);
    }

    #[test]
    fn test_formatted_names() {
        assert_eq!(
            derive_formatted_name("Hello {}", NameLimits::for_values(3)).as_deref(),
            Some("HELLO_FORMATTED")
        );
    }

    #[test]
    fn test_number_to_words() {
        assert_eq!(number_to_words("0"), "ZERO");
        assert_eq!(number_to_words("15"), "FIFTEEN");
        assert_eq!(number_to_words("42"), "FORTY_TWO");
        assert_eq!(number_to_words("100"), "ONE_HUNDRED");
        assert_eq!(number_to_words("1001"), "ONE_THOUSAND_ONE");
        assert_eq!(number_to_words("2500000"), "TWO_MILLION_FIVE_HUNDRED_THOUSAND");
        assert_eq!(number_to_words("007"), "ZERO_ZERO_SEVEN");
    }

    #[test]
    fn test_derived_names_are_valid_and_stable() {
        for value in ["user-id", "3cats", "userName", "hello world", "\n", "a_b"] {
            if let Some(derived) = name(value) {
                assert!(is_valid_name(&derived), "{} -> {}", value, derived);
                assert_eq!(name(value), Some(derived));
            }
        }
    }
}
