use serde::Serialize;

use crate::db::CallDataStore;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::metrics::PeriodKPIs;
use crate::models::{ClientSelector, ComparisonRequest};
use crate::orchestrator::FetchOrchestrator;
use crate::periods::{self, ComparisonWindow};

/// A current window and its baseline, both fully derived.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodComparison {
    pub config: periods::PeriodConfig,
    pub current: PeriodKPIs,
    pub comparison: PeriodKPIs,
}

/// Expand a selector into the concrete client list. An empty universe is a
/// request error, caught here before any fetch is scheduled.
pub async fn resolve_clients<S>(
    orchestrator: &FetchOrchestrator<S>,
    selector: &ClientSelector,
) -> AnalyticsResult<Vec<String>>
where
    S: CallDataStore + 'static,
{
    let clients = match selector {
        ClientSelector::One(name) => vec![name.clone()],
        ClientSelector::All => orchestrator.list_clients().await?,
        ClientSelector::AllExcept(excluded) => {
            let mut clients = orchestrator.list_clients().await?;
            clients.retain(|client| client != excluded);
            clients
        }
    };
    if clients.is_empty() {
        return Err(AnalyticsError::InvalidRequest(
            "client selection matched no clients".to_string(),
        ));
    }
    Ok(clients)
}

/// Fetch and derive both sides of a comparison. The comparison side is one
/// summed window, or the average of several full weeks for week-to-date.
pub async fn compare_periods<S>(
    orchestrator: &FetchOrchestrator<S>,
    request: &ComparisonRequest,
) -> AnalyticsResult<PeriodComparison>
where
    S: CallDataStore + 'static,
{
    let clients = resolve_clients(orchestrator, &request.clients).await?;
    let config = periods::period_config(request.comparison_type, request.reference_date);
    tracing::info!(
        comparison = %config.comparison_type,
        current = %config.current.label,
        clients = clients.len(),
        "running period comparison"
    );

    let current_totals = orchestrator
        .fetch_window_totals(&clients, &config.current)
        .await?;
    let current = PeriodKPIs::from_totals(&current_totals);

    let comparison = match &config.comparison {
        ComparisonWindow::Single(range) => {
            let totals = orchestrator.fetch_window_totals(&clients, range).await?;
            PeriodKPIs::from_totals(&totals)
        }
        ComparisonWindow::WeeklyAverage(ranges) => {
            let weeks = orchestrator.fetch_per_window_totals(&clients, ranges).await?;
            PeriodKPIs::from_weekly_average(&weeks)
        }
    };

    Ok(PeriodComparison {
        config,
        current,
        comparison,
    })
}
