//! Multi-domain analysis orchestration.
//!
//! Fans a comprehensive request out to the three domain analyzers
//! concurrently and joins on all of them: a failing domain is captured as
//! that domain's error result and never cancels its siblings. Single
//! queries are routed to exactly one analyzer, through the narrative
//! engine's intent classification when available and the keyword router
//! otherwise.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analyzer::{AnalysisDomain, DomainAnalyzer, DomainResult};
use crate::error::Result;
use crate::history::{AnalysisRecord, HistoryLog};
use crate::narrative::NarrativeEngine;
use crate::ranges::RangeTable;
use crate::router;
use crate::store::VehicleDataStore;

/// Combined result of all three domain analyses. Always carries exactly
/// three entries, whatever failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveReport {
    pub vehicle_id: String,
    pub diagnostic: DomainResult,
    pub maintenance: DomainResult,
    pub performance: DomainResult,
}

impl ComprehensiveReport {
    pub fn domain(&self, domain: AnalysisDomain) -> &DomainResult {
        match domain {
            AnalysisDomain::Diagnostic => &self.diagnostic,
            AnalysisDomain::Maintenance => &self.maintenance,
            AnalysisDomain::Performance => &self.performance,
        }
    }
}

/// Result of a routed single-query analysis.
#[derive(Debug, Clone, Serialize)]
pub struct SingleAnalysis {
    pub vehicle_id: String,
    /// Which specialist handled the query.
    pub agent: AnalysisDomain,
    pub result: DomainResult,
}

/// Orchestrates the three domain analyzers over the shared store, range
/// table, narrative engine and history log.
pub struct AnalysisOrchestrator {
    store: Arc<VehicleDataStore>,
    ranges: Arc<RangeTable>,
    engine: Arc<dyn NarrativeEngine>,
    history: Arc<HistoryLog>,
    narrative_timeout: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<VehicleDataStore>,
        ranges: Arc<RangeTable>,
        engine: Arc<dyn NarrativeEngine>,
        history: Arc<HistoryLog>,
        narrative_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ranges,
            engine,
            history,
            narrative_timeout,
        }
    }

    fn analyzer(&self, domain: AnalysisDomain) -> DomainAnalyzer {
        DomainAnalyzer::new(
            domain,
            Arc::clone(&self.store),
            Arc::clone(&self.ranges),
            Arc::clone(&self.engine),
            self.narrative_timeout,
        )
    }

    /// Classify the query's intent. The narrative engine is tried first;
    /// any failure or unparseable reply falls back to keyword routing.
    async fn route(&self, query: &str) -> AnalysisDomain {
        match self.engine.classify_intent(query).await {
            Ok(domain) => domain,
            Err(e) => {
                let domain = router::route_query(query);
                debug!(
                    event = "routing.fallback",
                    error = %e,
                    domain = %domain,
                );
                domain
            }
        }
    }

    /// Route a user query to exactly one domain analyzer.
    ///
    /// Fails with `VehicleNotFound` for unknown ids; the analyzer's own
    /// narrative failures are returned inside the result, not as errors.
    pub async fn run_single(&self, vehicle_id: &str, query: &str) -> Result<SingleAnalysis> {
        self.store.get(vehicle_id)?;

        let agent = self.route(query).await;
        info!(
            event = "analysis.single",
            vehicle_id = %vehicle_id,
            agent = %agent,
        );

        let result = self.analyzer(agent).analyze(vehicle_id, query).await?;

        let response = result
            .output
            .clone()
            .or_else(|| result.error.clone())
            .unwrap_or_default();
        self.history
            .append(
                vehicle_id,
                AnalysisRecord::Query {
                    query: query.to_string(),
                    agent,
                    response,
                },
            )
            .await;

        Ok(SingleAnalysis {
            vehicle_id: vehicle_id.to_string(),
            agent,
            result,
        })
    }

    /// Run all three domain analyzers concurrently and wait for all of
    /// them. The existence check happens once, before fan-out.
    pub async fn run_comprehensive(&self, vehicle_id: &str) -> Result<ComprehensiveReport> {
        self.store.get(vehicle_id)?;
        info!(event = "analysis.comprehensive", vehicle_id = %vehicle_id);

        let diagnostic = self.analyzer(AnalysisDomain::Diagnostic);
        let maintenance = self.analyzer(AnalysisDomain::Maintenance);
        let performance = self.analyzer(AnalysisDomain::Performance);

        // Wait-all join: a failed domain is folded into its slot and never
        // cancels the siblings.
        let (diagnostic, maintenance, performance) = tokio::join!(
            diagnostic.analyze(
                vehicle_id,
                "Perform a complete diagnostic analysis of this vehicle. Check all systems and sensors.",
            ),
            maintenance.analyze(
                vehicle_id,
                "Provide a complete maintenance assessment and recommendations for this vehicle.",
            ),
            performance.analyze(
                vehicle_id,
                "Analyze overall performance, efficiency, and driving metrics for this vehicle.",
            ),
        );

        let report = ComprehensiveReport {
            vehicle_id: vehicle_id.to_string(),
            diagnostic: flatten(AnalysisDomain::Diagnostic, diagnostic),
            maintenance: flatten(AnalysisDomain::Maintenance, maintenance),
            performance: flatten(AnalysisDomain::Performance, performance),
        };

        self.history
            .append(
                vehicle_id,
                AnalysisRecord::ComprehensiveAnalysis {
                    result: report.clone(),
                },
            )
            .await;

        Ok(report)
    }

    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }
}

/// Fold an analyzer-level error into an error-status result so the
/// comprehensive report always carries three domain entries.
fn flatten(domain: AnalysisDomain, result: Result<DomainResult>) -> DomainResult {
    match result {
        Ok(r) => r,
        Err(e) => DomainResult::failure(domain, e.to_string()),
    }
}
