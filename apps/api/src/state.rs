use crate::analysis::orchestrator::AnalysisDeps;
use crate::analysis::registry::AnalysisRegistry;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Collaborators handed to every new analysis.
    pub analysis: AnalysisDeps,
    pub registry: AnalysisRegistry,
    pub config: Config,
}
