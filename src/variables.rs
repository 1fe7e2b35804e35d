//! Template variable preservation across machine translation.
//!
//! `{{variable}}` tokens are swapped for `<VARk>` placeholders before text
//! goes to a provider, then restored in the provider's output. Restoration
//! is best effort: mismatches are reported by [`validate_variables`], never
//! raised.

use regex::{NoExpand, Regex};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::OnceLock;
use tracing::{debug, warn};

static VARIABLE_REGEX: OnceLock<Regex> = OnceLock::new();

fn variable_regex() -> &'static Regex {
    VARIABLE_REGEX.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid variable regex"))
}

/// One `{{ name }}` occurrence in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Trimmed text between the braces
    pub name: String,
    /// The exact token, braces and inner whitespace included
    pub full_match: String,
    /// Byte offset of the token in the text
    pub index: usize,
}

/// Every variable occurrence in `text`, left to right.
pub fn extract_variables(text: &str) -> Vec<Variable> {
    variable_regex()
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let inner = cap.get(1)?;
            Some(Variable {
                name: inner.as_str().trim().to_string(),
                full_match: whole.as_str().to_string(),
                index: whole.start(),
            })
        })
        .collect()
}

/// Placeholder token for the k-th variable.
pub fn placeholder(k: usize) -> String {
    format!("<VAR{}>", k)
}

/// Text with its variables replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
    /// The original text
    pub source: String,
    /// Text to send to the provider
    pub sanitized: String,
    /// Placeholder ordinal → original token, in left-to-right order
    pub placeholders: Vec<String>,
}

/// Replace every variable occurrence with `<VARk>`, where k is the
/// occurrence's left-to-right ordinal.
///
/// Occurrences are substituted from the rightmost backwards so the byte
/// offsets of those still to be replaced stay valid.
///
/// Placeholders are not escaped: a source that already contains a literal
/// `<VARk>` cannot be told apart from the placeholder, and `restore` turns
/// it into the k-th variable as well.
pub fn protect_variables(text: &str) -> ProtectedText {
    let variables = extract_variables(text);
    let mut sanitized = text.to_string();

    for (k, variable) in variables.iter().enumerate().rev() {
        let end = variable.index + variable.full_match.len();
        sanitized.replace_range(variable.index..end, &placeholder(k));
    }

    ProtectedText {
        source: text.to_string(),
        sanitized,
        placeholders: variables.into_iter().map(|v| v.full_match).collect(),
    }
}

impl ProtectedText {
    pub fn has_variables(&self) -> bool {
        !self.placeholders.is_empty()
    }

    /// Put the original tokens back into a provider's output, then run the
    /// fuzzy repair pass if the variable sets no longer match.
    pub fn restore(&self, translated: &str) -> String {
        if !self.has_variables() {
            return translated.to_string();
        }

        let mut restored = translated.to_string();
        for (k, original) in self.placeholders.iter().enumerate() {
            let pattern = regex::escape(&placeholder(k));
            match Regex::new(&pattern) {
                Ok(re) => {
                    restored = re.replace_all(&restored, NoExpand(original)).into_owned();
                }
                Err(e) => warn!("Skipping placeholder {}: {}", k, e),
            }
        }

        let validation = validate_variables(&self.source, &restored);
        if validation.is_valid {
            return restored;
        }

        debug!(
            "Variable mismatch after restore (missing {:?}, extra {:?}), trying fuzzy repair",
            validation.missing_variables, validation.extra_variables
        );
        repair_variables(&self.source, &restored)
    }
}

/// Translate `text` while keeping its `{{variables}}` intact.
///
/// Without variables, `translate_fn` sees the text unchanged. Errors from
/// `translate_fn` propagate; variable mismatches do not.
pub async fn translate_with_variable_preservation<F, Fut, E>(
    text: &str,
    translate_fn: F,
) -> Result<String, E>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    let protected = protect_variables(text);
    if !protected.has_variables() {
        return translate_fn(text.to_string()).await;
    }

    let translated = translate_fn(protected.sanitized.clone()).await?;
    Ok(protected.restore(&translated))
}

/// Result of comparing source and translated variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableValidation {
    pub is_valid: bool,
    /// Source variable names absent from the translation
    pub missing_variables: Vec<String>,
    /// Translation variable names absent from the source
    pub extra_variables: Vec<String>,
    pub warnings: Vec<String>,
}

fn lowercase_names(variables: &[Variable]) -> BTreeSet<String> {
    variables.iter().map(|v| v.name.to_lowercase()).collect()
}

/// Compare variable names between a source text and its translation.
///
/// Names compare case-insensitively. Differences in literal casing or in
/// occurrence counts only produce warnings.
pub fn validate_variables(source: &str, translated: &str) -> VariableValidation {
    let source_vars = extract_variables(source);
    let translated_vars = extract_variables(translated);

    let source_names = lowercase_names(&source_vars);
    let translated_names = lowercase_names(&translated_vars);

    let missing_variables: Vec<String> = source_names
        .difference(&translated_names)
        .cloned()
        .collect();
    let extra_variables: Vec<String> = translated_names
        .difference(&source_names)
        .cloned()
        .collect();

    let mut warnings = Vec::new();

    if missing_variables.is_empty() && extra_variables.is_empty() {
        let literal_source: BTreeSet<&str> = source_vars.iter().map(|v| v.name.as_str()).collect();
        let literal_translated: BTreeSet<&str> =
            translated_vars.iter().map(|v| v.name.as_str()).collect();
        if literal_source != literal_translated {
            warnings.push(format!(
                "Variable casing differs: source has {:?}, translation has {:?}",
                literal_source, literal_translated
            ));
        }
    }

    let count = |vars: &[Variable]| {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for v in vars {
            *counts.entry(v.name.to_lowercase()).or_default() += 1;
        }
        counts
    };
    let source_counts = count(&source_vars);
    let translated_counts = count(&translated_vars);
    for name in source_names.intersection(&translated_names) {
        let expected = source_counts.get(name).copied().unwrap_or_default();
        let actual = translated_counts.get(name).copied().unwrap_or_default();
        if expected != actual {
            warnings.push(format!(
                "Variable '{}' appears {} time(s) in source but {} in translation",
                name, expected, actual
            ));
        }
    }

    VariableValidation {
        is_valid: missing_variables.is_empty() && extra_variables.is_empty(),
        missing_variables,
        extra_variables,
        warnings,
    }
}

/// Reduce a variable name to lowercase alphanumerics for fuzzy comparison.
fn fuzzy_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Best source variable for a mangled name, if any.
///
/// Exact fuzzy-key equality wins; otherwise the first source variable whose
/// key contains, or is contained in, the candidate's key. Overlapping names
/// can pick the wrong variable.
fn fuzzy_match<'a>(candidate: &str, source_vars: &'a [Variable]) -> Option<&'a Variable> {
    let key = fuzzy_key(candidate);
    if key.is_empty() {
        return None;
    }

    source_vars
        .iter()
        .find(|v| fuzzy_key(&v.name) == key)
        .or_else(|| {
            source_vars.iter().find(|v| {
                let source_key = fuzzy_key(&v.name);
                !source_key.is_empty() && (source_key.contains(&key) || key.contains(&source_key))
            })
        })
}

/// Replace residual `{{...}}` tokens that are not source variables with the
/// source variable they most resemble.
fn repair_variables(source: &str, restored: &str) -> String {
    let source_vars = extract_variables(source);
    let source_names = lowercase_names(&source_vars);

    let repaired = variable_regex().replace_all(restored, |cap: &regex::Captures<'_>| {
        let token = &cap[0];
        let name = cap[1].trim();
        if source_names.contains(&name.to_lowercase()) {
            return token.to_string();
        }
        match fuzzy_match(name, &source_vars) {
            Some(source_var) => {
                debug!("Repaired variable {} -> {}", token, source_var.full_match);
                source_var.full_match.clone()
            }
            None => token.to_string(),
        }
    });

    repaired.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::convert::Infallible;

    async fn identity(text: String) -> Result<String, Infallible> {
        Ok(text)
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables("Hi {{name}}, you have {{ count }} items");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "name");
        assert_eq!(vars[0].full_match, "{{name}}");
        assert_eq!(vars[0].index, 3);
        assert_eq!(vars[1].name, "count");
        assert_eq!(vars[1].full_match, "{{ count }}");
    }

    #[test]
    fn test_extract_variables_none() {
        assert!(extract_variables("Plain text { not } {a}").is_empty());
    }

    #[test]
    fn test_extract_variables_repeated() {
        let vars = extract_variables("{{a}} and {{a}}");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[1].index, 10);
    }

    #[test]
    fn test_protect_assigns_left_to_right_ordinals() {
        let protected = protect_variables("Hi {{name}}, you have {{count}} items");
        assert_eq!(protected.sanitized, "Hi <VAR0>, you have <VAR1> items");
        assert_eq!(protected.placeholders, vec!["{{name}}", "{{count}}"]);
    }

    #[test]
    fn test_restore_handles_reordering() {
        let protected = protect_variables("{{user}} sent {{file}}");
        let restored = protected.restore("<VAR1> wurde von <VAR0> gesendet");
        assert_eq!(restored, "{{file}} wurde von {{user}} gesendet");
    }

    #[test]
    fn test_literal_placeholder_in_source_is_restored_as_variable() {
        let protected = protect_variables("Type <VAR0> or {{name}}");
        assert_eq!(protected.sanitized, "Type <VAR0> or <VAR0>");
        assert_eq!(
            protected.restore(&protected.sanitized),
            "Type {{name}} or {{name}}"
        );
    }

    #[test]
    fn test_restore_does_not_expand_dollar_signs() {
        let protected = protect_variables("Price: {{$amount}}");
        assert_eq!(protected.restore("Prix : <VAR0>"), "Prix : {{$amount}}");
    }

    #[test]
    fn test_restore_distinguishes_var1_and_var10() {
        let text = (0..11).map(|i| format!("{{{{v{}}}}}", i)).collect::<Vec<_>>().join(" ");
        let protected = protect_variables(&text);
        assert_eq!(protected.restore(&protected.sanitized), text);
    }

    #[tokio::test]
    async fn test_round_trip_with_identity() {
        let text = "Hi {{name}}, you have {{count}} items";
        let result = translate_with_variable_preservation(text, identity)
            .await
            .unwrap();
        assert_eq!(result, text);
        assert_eq!(result.matches("{{name}}").count(), 1);
        assert_eq!(result.matches("{{count}}").count(), 1);
        assert!(result.find("{{name}}").unwrap() < result.find("{{count}}").unwrap());
    }

    #[tokio::test]
    async fn test_no_variables_passes_text_unchanged() {
        let result = translate_with_variable_preservation("Welcome", |text: String| async move {
            assert_eq!(text, "Welcome");
            Ok::<_, Infallible>("Bienvenue".to_string())
        })
        .await
        .unwrap();
        assert_eq!(result, "Bienvenue");
    }

    #[tokio::test]
    async fn test_provider_sees_placeholders_only() {
        let result = translate_with_variable_preservation("Hello {{name}}", |text: String| async move {
            assert_eq!(text, "Hello <VAR0>");
            Ok::<_, Infallible>("Bonjour <VAR0>".to_string())
        })
        .await
        .unwrap();
        assert_eq!(result, "Bonjour {{name}}");
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let result = translate_with_variable_preservation("Hello {{name}}", |_text: String| async {
            Err::<String, _>("provider down")
        })
        .await;
        assert_eq!(result.unwrap_err(), "provider down");
    }

    #[tokio::test]
    async fn test_fuzzy_repair_of_mangled_variable() {
        // Provider dropped the placeholder and translated the name itself
        let result = translate_with_variable_preservation("Hello {{userName}}", |_text: String| async {
            Ok::<_, Infallible>("Bonjour {{user_name}}".to_string())
        })
        .await
        .unwrap();
        assert_eq!(result, "Bonjour {{userName}}");
    }

    #[tokio::test]
    async fn test_mismatch_is_not_an_error() {
        let result = translate_with_variable_preservation("Hello {{name}}", |_text: String| async {
            Ok::<_, Infallible>("Bonjour".to_string())
        })
        .await
        .unwrap();
        assert_eq!(result, "Bonjour");
        assert!(!validate_variables("Hello {{name}}", &result).is_valid);
    }

    #[test]
    fn test_validate_variables_valid() {
        let report = validate_variables("Hi {{name}}", "Salut {{name}}");
        assert!(report.is_valid);
        assert!(report.missing_variables.is_empty());
        assert!(report.extra_variables.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_validate_variables_missing_and_extra() {
        let report = validate_variables("Hi {{name}}, {{count}}", "Salut {{nom}}, {{count}}");
        assert!(!report.is_valid);
        assert_eq!(report.missing_variables, vec!["name"]);
        assert_eq!(report.extra_variables, vec!["nom"]);
    }

    #[test]
    fn test_validate_variables_case_warning() {
        let report = validate_variables("Hi {{Name}}", "Salut {{name}}");
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("casing"));
    }

    #[test]
    fn test_validate_variables_count_warning() {
        let report = validate_variables("{{a}} {{a}}", "{{a}}");
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|w| w.contains("appears 2 time(s)")));
    }

    #[test]
    fn test_fuzzy_match_prefers_exact_key() {
        let source = extract_variables("{{count}} {{item_count}}");
        let matched = fuzzy_match("Item Count", &source).expect("match");
        assert_eq!(matched.name, "item_count");
    }

    proptest! {
        #[test]
        fn prop_identity_round_trip(
            names in proptest::collection::btree_set("[a-z]{1,8}", 1..5),
            words in proptest::collection::vec("[A-Za-z]{1,6}", 1..5),
        ) {
            let mut text = String::new();
            for (i, name) in names.iter().enumerate() {
                let word = &words[i % words.len()];
                text.push_str(&format!("{} {{{{{}}}}} ", word, name));
            }

            let result = tokio_test::block_on(translate_with_variable_preservation(&text, identity))
                .expect("identity never fails");

            let mut last = 0;
            for name in &names {
                let token = format!("{{{{{}}}}}", name);
                prop_assert_eq!(result.matches(&token).count(), 1);
                let pos = result.find(&token).expect("present");
                prop_assert!(pos >= last);
                last = pos;
            }
        }
    }
}
