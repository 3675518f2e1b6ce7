//! Outcome classification.
//!
//! Successful executions are tiered by mean latency; failures go through an
//! ordered rule list where the first matching rule decides the status.

use dbparity_core::{FailureKind, LatencyTier};

use crate::target::TargetError;

/// Upper bound (inclusive) of the `OK` tier, in milliseconds.
pub const OK_THRESHOLD_MS: f64 = 50.0;
/// Upper bound (inclusive) of the `Warning` tier, in milliseconds.
pub const WARNING_THRESHOLD_MS: f64 = 200.0;

pub fn classify_latency(mean_ms: f64) -> LatencyTier {
    if mean_ms <= OK_THRESHOLD_MS {
        LatencyTier::Ok
    } else if mean_ms <= WARNING_THRESHOLD_MS {
        LatencyTier::Warning
    } else {
        LatencyTier::Problem
    }
}

/// What a rule looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorPredicate {
    /// Server error number is one of these.
    Code(Vec<u16>),
    /// Rendered error text contains one of these (case-insensitive).
    MessageContains(Vec<String>),
}

impl ErrorPredicate {
    fn matches(&self, code: Option<u16>, lowered: &str) -> bool {
        match self {
            ErrorPredicate::Code(codes) => code.is_some_and(|c| codes.contains(&c)),
            ErrorPredicate::MessageContains(needles) => {
                needles.iter().any(|n| lowered.contains(n.as_str()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRule {
    pub predicate: ErrorPredicate,
    pub kind: FailureKind,
}

impl ClassifierRule {
    pub fn code(codes: &[u16], kind: FailureKind) -> Self {
        Self {
            predicate: ErrorPredicate::Code(codes.to_vec()),
            kind,
        }
    }

    pub fn message(needles: &[&str], kind: FailureKind) -> Self {
        Self {
            predicate: ErrorPredicate::MessageContains(
                needles.iter().map(|n| n.to_lowercase()).collect(),
            ),
            kind,
        }
    }
}

/// Ordered failure rules; first match wins, fallback [`FailureKind::Error`].
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ErrorClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Add a rule that is consulted before every existing one.
    pub fn prepend(&mut self, rule: ClassifierRule) {
        self.rules.insert(0, rule);
    }

    pub fn classify(&self, err: &TargetError) -> FailureKind {
        self.classify_parts(err.code(), &err.to_string())
    }

    pub fn classify_parts(&self, code: Option<u16>, message: &str) -> FailureKind {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.predicate.matches(code, &lowered))
            .map(|r| r.kind)
            .unwrap_or(FailureKind::Error)
    }
}

pub fn default_rules() -> Vec<ClassifierRule> {
    vec![
        // ER_PARSE_ERROR
        ClassifierRule::code(&[1064], FailureKind::SyntaxError),
        // no such table / column / database, unknown table on drop,
        // unknown function or procedure, cannot drop key
        ClassifierRule::code(
            &[1146, 1054, 1049, 1051, 1305, 1091],
            FailureKind::MissingFeature,
        ),
        ClassifierRule::message(
            &["syntax error", "error in your sql syntax"],
            FailureKind::SyntaxError,
        ),
        ClassifierRule::message(&["doesn't exist", "unknown"], FailureKind::MissingFeature),
        ClassifierRule::message(&["unread result"], FailureKind::Unsupported),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_tier_boundaries() {
        assert_eq!(classify_latency(0.1), LatencyTier::Ok);
        assert_eq!(classify_latency(49.9), LatencyTier::Ok);
        assert_eq!(classify_latency(50.0), LatencyTier::Ok);
        assert_eq!(classify_latency(50.1), LatencyTier::Warning);
        assert_eq!(classify_latency(200.0), LatencyTier::Warning);
        assert_eq!(classify_latency(200.1), LatencyTier::Problem);
    }

    #[test]
    fn message_rules() {
        let c = ErrorClassifier::default();
        assert_eq!(
            c.classify_parts(None, "Table 'x' doesn't exist"),
            FailureKind::MissingFeature
        );
        assert_eq!(
            c.classify_parts(None, "You have an error in your SQL syntax"),
            FailureKind::SyntaxError
        );
        assert_eq!(
            c.classify_parts(None, "Lost connection to server during query"),
            FailureKind::Error
        );
        assert_eq!(
            c.classify_parts(None, "Unread result found"),
            FailureKind::Unsupported
        );
    }

    #[test]
    fn unknown_objects_are_missing_features_by_message_alone() {
        let c = ErrorClassifier::default();
        assert_eq!(
            c.classify_parts(None, "Unknown column 'x' in 'field list'"),
            FailureKind::MissingFeature
        );
        assert_eq!(
            c.classify(&TargetError::Driver("unknown system variable 'secure_file_priv'".into())),
            FailureKind::MissingFeature
        );
    }

    #[test]
    fn message_matching_ignores_case() {
        let c = ErrorClassifier::default();
        assert_eq!(
            c.classify_parts(None, "SYNTAX ERROR at or near \"HANDLER\""),
            FailureKind::SyntaxError
        );
        assert_eq!(
            c.classify_parts(None, "TABLE 'films_v' DOESN'T EXIST"),
            FailureKind::MissingFeature
        );
    }

    #[test]
    fn code_rules_take_precedence_over_text() {
        let c = ErrorClassifier::default();
        // 1064 text mentions nothing recognisable
        assert_eq!(
            c.classify(&TargetError::database(1064, "42000", "near 'HANDLER' at line 1")),
            FailureKind::SyntaxError
        );
        // a parse error whose text mentions an unknown thing is still a syntax error
        assert_eq!(
            c.classify(&TargetError::database(1064, "42000", "unknown token")),
            FailureKind::SyntaxError
        );
        assert_eq!(
            c.classify(&TargetError::database(1305, "42000", "FUNCTION testdb.json_extract")),
            FailureKind::MissingFeature
        );
    }

    #[test]
    fn unknown_code_falls_back_to_message() {
        let c = ErrorClassifier::default();
        assert_eq!(
            c.classify(&TargetError::database(1062, "23000", "Duplicate entry 'tt999'")),
            FailureKind::Error
        );
        assert_eq!(
            c.classify(&TargetError::database(9999, "HY000", "syntax error at or near \"HANDLER\"")),
            FailureKind::SyntaxError
        );
    }

    #[test]
    fn prepended_rules_win() {
        let mut c = ErrorClassifier::default();
        c.prepend(ClassifierRule::message(&["Duplicate entry"], FailureKind::Unsupported));
        assert_eq!(
            c.classify_parts(Some(1062), "Duplicate entry 'x'"),
            FailureKind::Unsupported
        );
        assert_eq!(c.rules().len(), default_rules().len() + 1);
    }
}
