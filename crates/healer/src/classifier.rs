//! Failure classification: maps diagnostic evidence to a root-cause category

use once_cell::sync::Lazy;
use regex::Regex;

use shopheal_common::{FailureCategory, FailureEvidence};

/// A classified failure: the category plus a remediation hint for the fix
/// applier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: FailureCategory,
    pub hint: String,
}

/// Element-lookup timeout: the driver never resolved the locator.
static SELECTOR_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)waiting for locator\(",
        r"(?i)waiting for selector",
        r"(?i)timeout.*waiting for (get_by|locator|selector)",
        r"(?i)strict mode violation",
        r"(?i)(locator|selector|element).*(resolved to 0|not found|did not match)",
    ])
});

/// State-transition timeout: the element/dialog was found but never reached
/// the expected state.
static TIMING_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)time[d]? ?out.*(to be|to become) (visible|hidden|attached|detached|enabled|editable|stable)",
        r"(?i)timeout.*waiting for (dialog|popup|navigation|event|function|load state)",
        r"(?i)waitfor(navigation|event|function|loadstate).*timeout",
        r"(?i)element is not (visible|stable|enabled).*timeout",
    ])
});

/// Cross-test contamination: state left behind by another case.
static ISOLATION_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)cart (was |is )?not empty",
        r"(?i)expected (an |the )?empty cart",
        r"(?i)pre-?existing (state|item|cart|session)",
        r"(?i)left ?over (state|item)",
        r"(?i)already (in|present in) (the )?cart",
    ])
});

/// Assertion comparator output carrying both sides of the comparison.
static ASSERTION_RULES: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"(?i)expect(ed)?[^\n]*\n?.*received"]));

/// Authentication / redirect evidence: the storefront password gate.
static AUTH_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)password (gate|page|challenge|protected)",
        r"(?i)storefront password",
        r"(?i)redirect(ed)? to .*(login|password|challenge)",
        r"(?i)\b(401|403)\b.*(unauthorized|forbidden)",
        r"(?i)authenticat(e|ion) (failed|required)",
        r"(?i)still on .*(password|login|challenge)",
    ])
});

static TIMEOUT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)time[d]? ?out|timeout").expect("valid regex"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid classifier regex"))
        .collect()
}

/// Maps raw failure evidence to a category plus a remediation hint.
///
/// Classification is a pure function of the evidence: the rule order below is
/// a fixed precedence (first match wins) and re-classifying the same evidence
/// always yields the same category. Unparseable evidence lands in `Unknown`;
/// classification never raises, so it can never abort a healing attempt.
#[derive(Debug, Clone, Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, evidence: &FailureEvidence) -> Classification {
        let message = &evidence.error_message;

        if matches_any(&SELECTOR_RULES, message) {
            return Classification {
                category: FailureCategory::SelectorMismatch,
                hint: "locator never resolved; prefer role/label/text lookups over \
                       structural selectors, and match dynamic text with a pattern"
                    .to_string(),
            };
        }

        if matches_any(&TIMING_RULES, message) {
            return Classification {
                category: FailureCategory::TimingRace,
                hint: "state transition timed out; rely on built-in readiness waits \
                       or a retrying assertion instead of fixed delays"
                    .to_string(),
            };
        }

        if matches_any(&ISOLATION_RULES, message) {
            return Classification {
                category: FailureCategory::StateIsolation,
                hint: "unexpected pre-existing state; reset or recreate required \
                       state inside the case so it runs in any order"
                    .to_string(),
            };
        }

        // A comparator failure only counts when both sides are present and
        // the failure is not a disguised timeout.
        let comparator_failed = (evidence.actual.is_some() && evidence.expected.is_some())
            || matches_any(&ASSERTION_RULES, message);
        if comparator_failed && !TIMEOUT_MARKER.is_match(message) {
            return Classification {
                category: FailureCategory::AssertionMismatch,
                hint: "comparator failed with concrete actual/expected values; \
                       check whether the expected value is dynamic"
                    .to_string(),
            };
        }

        if matches_any(&AUTH_RULES, message) {
            return Classification {
                category: FailureCategory::EnvironmentOrAuth,
                hint: "authentication or redirect failure; the case must rely on \
                       the externally-established session, not its own credentials"
                    .to_string(),
            };
        }

        Classification {
            category: FailureCategory::Unknown,
            hint: "no recognizable failure pattern; inspect the artifact and \
                   error text manually"
                .to_string(),
        }
    }
}

fn matches_any(rules: &[Regex], text: &str) -> bool {
    rules.iter().any(|r| r.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn evidence(message: &str) -> FailureEvidence {
        FailureEvidence::from_message(message)
    }

    #[test_case(
        "Timeout 5000ms exceeded.\nwaiting for locator('.product-card >> nth=0')",
        FailureCategory::SelectorMismatch; "locator timeout")]
    #[test_case(
        "Error: strict mode violation: locator('a') resolved to 12 elements",
        FailureCategory::SelectorMismatch; "strict mode")]
    #[test_case(
        "Timed out waiting for element to be visible",
        FailureCategory::TimingRace; "visibility timeout")]
    #[test_case(
        "page.waitForNavigation: Timeout 10000ms exceeded",
        FailureCategory::TimingRace; "navigation timeout")]
    #[test_case(
        "assertion failed: cart was not empty at test start",
        FailureCategory::StateIsolation; "dirty cart")]
    #[test_case(
        "Expected string: \"$19.99\"\nReceived string: \"$24.99\"",
        FailureCategory::AssertionMismatch; "price mismatch")]
    #[test_case(
        "navigation redirected to /password page",
        FailureCategory::EnvironmentOrAuth; "password gate")]
    #[test_case(
        "net::ERR_CONNECTION_RESET at https://store.example.com",
        FailureCategory::Unknown; "connection reset")]
    fn test_rule_precedence(message: &str, expected: FailureCategory) {
        let classifier = Classifier::new();
        assert_eq!(classifier.classify(&evidence(message)).category, expected);
    }

    #[test]
    fn test_selector_wins_over_timing() {
        // Both a timeout and a locator reference: rule 1 takes it.
        let classifier = Classifier::new();
        let c = classifier.classify(&evidence(
            "Timeout 5000ms exceeded while waiting for locator('.sort-menu') to be visible",
        ));
        assert_eq!(c.category, FailureCategory::SelectorMismatch);
    }

    #[test]
    fn test_structured_comparator_fields() {
        let classifier = Classifier::new();
        let mut ev = evidence("expect(received).toBe(expected)");
        ev.actual = Some("24".to_string());
        ev.expected = Some("12".to_string());
        assert_eq!(
            classifier.classify(&ev).category,
            FailureCategory::AssertionMismatch
        );
    }

    #[test]
    fn test_comparator_with_timeout_is_not_assertion() {
        // A timed-out retrying assertion reports actual/expected too, but the
        // timeout marker keeps it out of AssertionMismatch.
        let classifier = Classifier::new();
        let mut ev = evidence("Timed out waiting for element to be visible");
        ev.actual = Some("hidden".to_string());
        ev.expected = Some("visible".to_string());
        assert_eq!(
            classifier.classify(&ev).category,
            FailureCategory::TimingRace
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        let classifier = Classifier::new();
        let ev = evidence("waiting for selector '[data-testid=\"pager\"]'");
        let first = classifier.classify(&ev);
        let second = classifier.classify(&ev);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_evidence_is_unknown_not_error() {
        let classifier = Classifier::new();
        let c = classifier.classify(&FailureEvidence::default());
        assert_eq!(c.category, FailureCategory::Unknown);
        assert!(!c.hint.is_empty());
    }
}
