//! Deterministic keyword routing of user queries to analysis domains.
//!
//! Used as the fallback when the narrative engine's intent classification
//! is unavailable or returns garbage, so routing is fully testable offline.

use crate::analyzer::AnalysisDomain;

const DIAGNOSTIC_KEYWORDS: &[&str] = &[
    "diagnos",
    "health",
    "wrong",
    "error",
    "fault",
    "warning light",
    "check engine",
    "noise",
    "trouble",
    "broken",
];

const MAINTENANCE_KEYWORDS: &[&str] = &[
    "maintenance",
    "service",
    "schedule",
    "oil change",
    "fluid",
    "replace",
    "brake pad",
    "tire rotation",
    "inspection",
    "tune-up",
];

const PERFORMANCE_KEYWORDS: &[&str] = &[
    "performance",
    "efficien",
    "fuel economy",
    "consumption",
    "range",
    "mileage",
    "acceleration",
    "speed",
    "driving style",
    "optimiz",
];

fn score(query: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| query.contains(*k)).count()
}

/// Route a free-text query to the domain with the most keyword hits.
///
/// Ties and zero hits route to diagnostic, matching the system's historical
/// default when routing was unclear.
pub fn route_query(query: &str) -> AnalysisDomain {
    let query = query.to_lowercase();

    let mut best = AnalysisDomain::Diagnostic;
    let mut best_score = score(&query, DIAGNOSTIC_KEYWORDS);

    for (domain, keywords) in [
        (AnalysisDomain::Maintenance, MAINTENANCE_KEYWORDS),
        (AnalysisDomain::Performance, PERFORMANCE_KEYWORDS),
    ] {
        let s = score(&query, keywords);
        if s > best_score {
            best = domain;
            best_score = s;
        }
    }
    best
}
