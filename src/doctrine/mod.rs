//! Deterministic doctrine validation for scenario candidates.
//!
//! The doctrine encodes the operational rule set every training scenario
//! must respect: required fields, recognized categories and threat levels,
//! a minimum response-step count, and a fixed scan for disallowed content
//! (procedures a scenario must never instruct, such as handling a
//! suspicious device or using live fire against property or a crowd).
//!
//! This pass runs before any LLM judging: a candidate that hard-fails here
//! is rejected without spending a judge call.

use crate::scenario::ScenarioData;

/// Categories the doctrine recognizes.
pub const RECOGNIZED_CATEGORIES: &[&str] = &[
    "suspicious object",
    "suspicious person",
    "suspicious vehicle",
    "aerial threat",
    "public disturbance",
    "emergency",
];

/// Recognized threat-level values (case-insensitive).
pub const THREAT_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

/// Minimum number of response steps a complete scenario carries.
pub const MIN_RESPONSE_STEPS: usize = 4;

/// Score deduction for an unrecognized category.
const CATEGORY_DEDUCTION: f64 = 15.0;

/// Score deduction for an unrecognized threat level.
const THREAT_LEVEL_DEDUCTION: f64 = 10.0;

/// Score deduction for too few response steps.
const STEP_COUNT_DEDUCTION: f64 = 15.0;

/// Content patterns that disqualify a scenario outright. Matched
/// case-insensitively against every text field and list item.
const DISALLOWED_PATTERNS: &[(&str, &str)] = &[
    ("touch the object", "instructs contact with a suspicious object"),
    ("touch the device", "instructs contact with a suspicious device"),
    ("move the object", "instructs moving a suspicious object"),
    ("open the bag", "instructs opening a suspicious item"),
    ("open the package", "instructs opening a suspicious item"),
    (
        "fire to protect property",
        "authorizes live fire in defense of property",
    ),
    (
        "fire at the crowd",
        "authorizes live fire for crowd dispersal",
    ),
    (
        "warning shots into the crowd",
        "authorizes live fire for crowd dispersal",
    ),
    (
        "shoot the fleeing",
        "authorizes fire at a non-threatening fleeing person",
    ),
    ("racial profiling", "instructs profiling by ethnicity"),
    ("profile by ethnicity", "instructs profiling by ethnicity"),
    ("profile by race", "instructs profiling by ethnicity"),
];

/// Result of the deterministic doctrine pass.
#[derive(Debug, Clone)]
pub struct DoctrineReport {
    /// Score in [0, 100]; 0 when any hard violation fired.
    pub doctrine_score: f64,
    /// False when a hard violation fired; such candidates skip the LLM
    /// judge entirely.
    pub is_valid: bool,
    /// Hard violations.
    pub errors: Vec<String>,
    /// Soft violations (deducted but not disqualifying).
    pub warnings: Vec<String>,
}

impl DoctrineReport {
    fn valid(score: f64, warnings: Vec<String>) -> Self {
        Self {
            doctrine_score: score.clamp(0.0, 100.0),
            is_valid: true,
            errors: Vec::new(),
            warnings,
        }
    }

    fn invalid(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            doctrine_score: 0.0,
            is_valid: false,
            errors,
            warnings,
        }
    }
}

/// Run the deterministic doctrine pass over one scenario.
pub fn evaluate(data: &ScenarioData) -> DoctrineReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut score = 100.0f64;

    // Hard requirement: a scenario without a title or category has no
    // identity to judge.
    if data.title().trim().is_empty() {
        errors.push("missing required field: title".to_string());
    }
    if data.category().trim().is_empty() {
        errors.push("missing required field: category".to_string());
    }

    // Hard requirement: disallowed content.
    let haystack = flatten_text(data).to_lowercase();
    for (pattern, reason) in DISALLOWED_PATTERNS {
        if haystack.contains(pattern) {
            errors.push(format!("disallowed content ({reason}): '{pattern}'"));
        }
    }

    if !errors.is_empty() {
        return DoctrineReport::invalid(errors, warnings);
    }

    // Soft checks: deduct and warn.
    let category = data.category().trim().to_lowercase();
    if !RECOGNIZED_CATEGORIES.contains(&category.as_str()) {
        score -= CATEGORY_DEDUCTION;
        warnings.push(format!("unrecognized category: '{}'", data.category()));
    }

    let threat = data.get_str("threat_level").trim().to_lowercase();
    if !THREAT_LEVELS.contains(&threat.as_str()) {
        score -= THREAT_LEVEL_DEDUCTION;
        warnings.push(format!(
            "unrecognized threat level: '{}'",
            data.get_str("threat_level")
        ));
    }

    if data.step_count() < MIN_RESPONSE_STEPS {
        score -= STEP_COUNT_DEDUCTION;
        warnings.push(format!(
            "only {} response steps (expected at least {})",
            data.step_count(),
            MIN_RESPONSE_STEPS
        ));
    }

    DoctrineReport::valid(score, warnings)
}

/// Concatenate every string in the record (scalars and list items) for the
/// disallowed-content scan.
fn flatten_text(data: &ScenarioData) -> String {
    let mut out = String::new();
    for value in data.0.values() {
        match value {
            serde_json::Value::String(s) => {
                out.push_str(s);
                out.push('\n');
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        out.push_str(s);
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
    out
}
