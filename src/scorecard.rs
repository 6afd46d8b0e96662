use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::comparison::resolve_clients;
use crate::db::CallDataStore;
use crate::error::AnalyticsResult;
use crate::metrics::CollectionsMetrics;
use crate::models::{CategoryAggregates, ClientSelector, RawCallAggregate};
use crate::orchestrator::{FetchOrchestrator, FetchTask};
use crate::periods::{self, BASELINE_WEEKS};

const W_CALL_VOLUME: f64 = 0.10;
const W_CONNECT_RATE: f64 = 0.15;
const W_RPC_RATE: f64 = 0.20;
const W_PROMISE_RATE: f64 = 0.15;
const W_PAYMENT_SUCCESS: f64 = 0.20;
const W_DOLLARS_COLLECTED: f64 = 0.20;

/// Changes inside this band count as flat, so day-to-day noise does not read
/// as movement.
const TREND_DEAD_BAND: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    Good,
    Neutral,
    Warning,
    Critical,
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreStatus::Good => "good",
            ScoreStatus::Neutral => "neutral",
            ScoreStatus::Warning => "warning",
            ScoreStatus::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Change {
    pub value: f64,
    pub trend: Trend,
}

/// Percent change against a baseline. A zero or missing baseline reads as
/// "no movement" rather than an infinite swing.
pub fn calculate_change(current: f64, baseline: f64) -> Change {
    let value = if baseline > 0.0 {
        (current - baseline) / baseline * 100.0
    } else {
        0.0
    };
    let trend = if value > TREND_DEAD_BAND {
        Trend::Up
    } else if value < -TREND_DEAD_BAND {
        Trend::Down
    } else {
        Trend::Neutral
    };
    Change { value, trend }
}

fn status_for(change: f64) -> ScoreStatus {
    if change <= -15.0 {
        ScoreStatus::Critical
    } else if change < -5.0 {
        ScoreStatus::Warning
    } else if change > 5.0 {
        ScoreStatus::Good
    } else {
        ScoreStatus::Neutral
    }
}

/// One scored metric. `change_percent` and `trend` always describe the raw
/// direction of movement; `status` and `score` are computed from the change
/// with the sign flipped when `invert_logic` marks a metric where down is
/// good.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorecardMetric {
    pub current: f64,
    pub baseline: f64,
    pub change_percent: f64,
    pub trend: Trend,
    pub status: ScoreStatus,
    pub score: f64,
}

impl ScorecardMetric {
    pub fn new(current: f64, baseline: f64, invert_logic: bool) -> Self {
        let change = calculate_change(current, baseline);
        let effective = if invert_logic {
            -change.value
        } else {
            change.value
        };
        ScorecardMetric {
            current,
            baseline,
            change_percent: change.value,
            trend: change.trend,
            status: status_for(effective),
            score: 50.0 + effective.clamp(-50.0, 50.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorecardMetrics {
    pub call_volume: ScorecardMetric,
    pub connect_rate: ScorecardMetric,
    pub rpc_rate: ScorecardMetric,
    pub promise_rate: ScorecardMetric,
    pub payment_success: ScorecardMetric,
    pub dollars_collected: ScorecardMetric,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientScorecardData {
    pub client: String,
    pub metrics: ScorecardMetrics,
    pub overall_score: u8,
    pub overall_status: ScoreStatus,
}

fn overall_score(metrics: &ScorecardMetrics) -> u8 {
    let weighted = metrics.call_volume.score * W_CALL_VOLUME
        + metrics.connect_rate.score * W_CONNECT_RATE
        + metrics.rpc_rate.score * W_RPC_RATE
        + metrics.promise_rate.score * W_PROMISE_RATE
        + metrics.payment_success.score * W_PAYMENT_SUCCESS
        + metrics.dollars_collected.score * W_DOLLARS_COLLECTED;
    weighted.clamp(0.0, 100.0).round() as u8
}

fn overall_status(score: u8) -> ScoreStatus {
    if score >= 55 {
        ScoreStatus::Good
    } else if score >= 45 {
        ScoreStatus::Neutral
    } else if score >= 35 {
        ScoreStatus::Warning
    } else {
        ScoreStatus::Critical
    }
}

fn combined_outbound_inbound(totals: &CategoryAggregates) -> RawCallAggregate {
    totals.collections.combine(&totals.inbound)
}

/// Score one client: a rolling seven-day window measured against the mean of
/// its baseline weeks. Scorecard metrics read the combined collections and
/// inbound funnel.
pub fn build_scorecard(
    client: &str,
    current: &CategoryAggregates,
    baseline_weeks: &[CategoryAggregates],
) -> ClientScorecardData {
    let current_raw = combined_outbound_inbound(current);
    let weekly: Vec<RawCallAggregate> = baseline_weeks
        .iter()
        .map(combined_outbound_inbound)
        .collect();

    let now = CollectionsMetrics::from_raw(&current_raw);
    let base = CollectionsMetrics::from_weekly_average(weekly.iter());

    let metrics = ScorecardMetrics {
        call_volume: ScorecardMetric::new(now.calls, base.calls, false),
        connect_rate: ScorecardMetric::new(now.connect_rate, base.connect_rate, false),
        rpc_rate: ScorecardMetric::new(now.rpc_rate, base.rpc_rate, false),
        promise_rate: ScorecardMetric::new(now.promises_per_rpc, base.promises_per_rpc, false),
        payment_success: ScorecardMetric::new(now.cash_per_promises, base.cash_per_promises, false),
        dollars_collected: ScorecardMetric::new(now.dollar_collected, base.dollar_collected, false),
    };
    let score = overall_score(&metrics);

    ClientScorecardData {
        client: client.to_string(),
        metrics,
        overall_score: score,
        overall_status: overall_status(score),
    }
}

/// Score every selected client in one fan-out batch and return the cards
/// worst first, the order an operator works the list in.
pub async fn scorecard_for_clients<S>(
    orchestrator: &FetchOrchestrator<S>,
    selector: &ClientSelector,
    reference: NaiveDate,
) -> AnalyticsResult<Vec<ClientScorecardData>>
where
    S: CallDataStore + 'static,
{
    let clients = resolve_clients(orchestrator, selector).await?;
    let current = periods::rolling_seven_day(reference);
    let baseline = periods::weekly_baseline_ranges(reference, BASELINE_WEEKS);
    let windows_per_client = 1 + baseline.len();

    let mut tasks = Vec::with_capacity(clients.len() * windows_per_client);
    for client in &clients {
        tasks.push(FetchTask {
            client: client.clone(),
            range: current.clone(),
        });
        for week in &baseline {
            tasks.push(FetchTask {
                client: client.clone(),
                range: week.clone(),
            });
        }
    }
    tracing::info!(
        clients = clients.len(),
        tasks = tasks.len(),
        "building client scorecards"
    );
    let batch = orchestrator.fetch_batch(tasks).await?;

    let mut cards: Vec<ClientScorecardData> = clients
        .iter()
        .zip(batch.results.chunks(windows_per_client))
        .map(|(client, windows)| build_scorecard(client, &windows[0], &windows[1..]))
        .collect();
    cards.sort_by(|a, b| {
        a.overall_score
            .cmp(&b.overall_score)
            .then_with(|| a.client.cmp(&b.client))
    });
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsResult;
    use crate::orchestrator::OrchestratorConfig;
    use crate::periods::DateRange;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn change_is_percent_against_baseline() {
        let change = calculate_change(120.0, 100.0);
        assert_eq!(change.value, 20.0);
        assert_eq!(change.trend, Trend::Up);

        let change = calculate_change(80.0, 100.0);
        assert_eq!(change.value, -20.0);
        assert_eq!(change.trend, Trend::Down);
    }

    #[test]
    fn small_moves_sit_in_the_dead_band() {
        assert_eq!(calculate_change(100.4, 100.0).trend, Trend::Neutral);
        assert_eq!(calculate_change(99.6, 100.0).trend, Trend::Neutral);
        assert_eq!(calculate_change(100.5, 100.0).trend, Trend::Neutral);
        assert_eq!(calculate_change(100.6, 100.0).trend, Trend::Up);
    }

    #[test]
    fn zero_baseline_reads_as_no_movement() {
        let change = calculate_change(500.0, 0.0);
        assert_eq!(change.value, 0.0);
        assert_eq!(change.trend, Trend::Neutral);
        assert_eq!(calculate_change(0.0, 0.0).value, 0.0);
    }

    #[test]
    fn status_thresholds_bucket_the_change() {
        assert_eq!(ScorecardMetric::new(85.0, 100.0, false).status, ScoreStatus::Critical);
        assert_eq!(ScorecardMetric::new(85.1, 100.0, false).status, ScoreStatus::Warning);
        assert_eq!(ScorecardMetric::new(94.9, 100.0, false).status, ScoreStatus::Warning);
        assert_eq!(ScorecardMetric::new(95.0, 100.0, false).status, ScoreStatus::Neutral);
        assert_eq!(ScorecardMetric::new(105.0, 100.0, false).status, ScoreStatus::Neutral);
        assert_eq!(ScorecardMetric::new(105.1, 100.0, false).status, ScoreStatus::Good);
    }

    #[test]
    fn inverted_metrics_flip_scoring_but_not_trend() {
        let metric = ScorecardMetric::new(120.0, 100.0, true);
        assert_eq!(metric.change_percent, 20.0);
        assert_eq!(metric.trend, Trend::Up);
        assert_eq!(metric.status, ScoreStatus::Critical);
        assert_eq!(metric.score, 30.0);

        let metric = ScorecardMetric::new(80.0, 100.0, true);
        assert_eq!(metric.trend, Trend::Down);
        assert_eq!(metric.status, ScoreStatus::Good);
        assert_eq!(metric.score, 70.0);
    }

    #[test]
    fn metric_score_is_change_clamped_around_fifty() {
        assert_eq!(ScorecardMetric::new(110.0, 100.0, false).score, 60.0);
        assert_eq!(ScorecardMetric::new(300.0, 100.0, false).score, 100.0);
        assert_eq!(ScorecardMetric::new(10.0, 100.0, false).score, 0.0);
    }

    #[test]
    fn overall_score_weights_hand_computed_example() {
        // Changes +10, -20, 0, +60, -60, +25 give scores 60, 30, 50, 100, 0, 75.
        let metrics = ScorecardMetrics {
            call_volume: ScorecardMetric::new(110.0, 100.0, false),
            connect_rate: ScorecardMetric::new(80.0, 100.0, false),
            rpc_rate: ScorecardMetric::new(100.0, 100.0, false),
            promise_rate: ScorecardMetric::new(160.0, 100.0, false),
            payment_success: ScorecardMetric::new(40.0, 100.0, false),
            dollars_collected: ScorecardMetric::new(125.0, 100.0, false),
        };
        // 6 + 4.5 + 10 + 15 + 0 + 15 = 50.5, rounded half away from zero.
        assert_eq!(overall_score(&metrics), 51);
    }

    #[test]
    fn barely_good_everywhere_is_good_everywhere() {
        let make = || ScorecardMetric::new(105.0001, 100.0, false);
        let metrics = ScorecardMetrics {
            call_volume: make(),
            connect_rate: make(),
            rpc_rate: make(),
            promise_rate: make(),
            payment_success: make(),
            dollars_collected: make(),
        };
        assert_eq!(metrics.call_volume.status, ScoreStatus::Good);
        assert_eq!(metrics.dollars_collected.status, ScoreStatus::Good);
        let score = overall_score(&metrics);
        assert_eq!(score, 55);
        assert_eq!(overall_status(score), ScoreStatus::Good);
    }

    #[test]
    fn flat_client_lands_at_fifty_neutral() {
        let steady = CategoryAggregates {
            collections: RawCallAggregate {
                accounts: 40,
                calls: 200,
                connects: 80,
                rpcs: 30,
                promises: 12,
                cash_payments: 6,
                transfers: 2,
                duration_minutes: 540.0,
                dollar_promised: 3_000.0,
                dollar_collected: 1_400.0,
                ..RawCallAggregate::zero()
            },
            ..CategoryAggregates::zero()
        };
        let card = build_scorecard("apex", &steady, &[steady.clone()]);
        assert_eq!(card.overall_score, 50);
        assert_eq!(card.overall_status, ScoreStatus::Neutral);
        assert_eq!(card.metrics.call_volume.trend, Trend::Neutral);
    }

    #[test]
    fn scorecard_reads_collections_and_inbound_combined() {
        let current = CategoryAggregates {
            collections: RawCallAggregate {
                calls: 100,
                ..RawCallAggregate::zero()
            },
            inbound: RawCallAggregate {
                calls: 50,
                ..RawCallAggregate::zero()
            },
            ..CategoryAggregates::zero()
        };
        let baseline = CategoryAggregates {
            collections: RawCallAggregate {
                calls: 60,
                ..RawCallAggregate::zero()
            },
            inbound: RawCallAggregate {
                calls: 40,
                ..RawCallAggregate::zero()
            },
            ..CategoryAggregates::zero()
        };

        let card = build_scorecard("apex", &current, &[baseline]);
        assert_eq!(card.metrics.call_volume.current, 150.0);
        assert_eq!(card.metrics.call_volume.baseline, 100.0);
        assert_eq!(card.metrics.call_volume.change_percent, 50.0);
        assert_eq!(card.metrics.call_volume.trend, Trend::Up);
    }

    struct ScriptedStore {
        clients: Vec<String>,
        windows: HashMap<(String, chrono::NaiveDate), RawCallAggregate>,
    }

    impl ScriptedStore {
        fn new(clients: &[&str]) -> Self {
            ScriptedStore {
                clients: clients.iter().map(|c| c.to_string()).collect(),
                windows: HashMap::new(),
            }
        }

        fn with_window(
            mut self,
            client: &str,
            start: chrono::NaiveDate,
            raw: RawCallAggregate,
        ) -> Self {
            self.windows.insert((client.to_string(), start), raw);
            self
        }
    }

    #[async_trait]
    impl CallDataStore for ScriptedStore {
        async fn fetch_raw_aggregates(
            &self,
            client: &str,
            range: &DateRange,
        ) -> AnalyticsResult<CategoryAggregates> {
            let key = (client.to_string(), range.start.date_naive());
            let collections = self.windows.get(&key).cloned().unwrap_or_default();
            Ok(CategoryAggregates {
                collections,
                ..CategoryAggregates::zero()
            })
        }

        async fn list_clients(&self) -> AnalyticsResult<Vec<String>> {
            Ok(self.clients.clone())
        }
    }

    #[tokio::test]
    async fn clients_come_back_worst_first() {
        let d = |y, m, day| chrono::NaiveDate::from_ymd_opt(y, m, day).unwrap();
        let reference = d(2025, 1, 15);
        let current_start = d(2025, 1, 9);
        let week_starts = [d(2024, 12, 15), d(2024, 12, 22), d(2024, 12, 29), d(2025, 1, 5)];

        let baseline_week = RawCallAggregate {
            calls: 100,
            connects: 50,
            dollar_collected: 100.0,
            ..RawCallAggregate::zero()
        };
        let mut store = ScriptedStore::new(&["climbing", "sliding"])
            .with_window(
                "sliding",
                current_start,
                RawCallAggregate {
                    calls: 50,
                    connects: 10,
                    ..RawCallAggregate::zero()
                },
            )
            .with_window(
                "climbing",
                current_start,
                RawCallAggregate {
                    calls: 200,
                    connects: 100,
                    dollar_collected: 300.0,
                    ..RawCallAggregate::zero()
                },
            );
        for start in week_starts {
            store = store
                .with_window("sliding", start, baseline_week.clone())
                .with_window("climbing", start, baseline_week.clone());
        }

        let orchestrator =
            FetchOrchestrator::new(Arc::new(store), OrchestratorConfig::scorecard());
        let cards = scorecard_for_clients(&orchestrator, &ClientSelector::All, reference)
            .await
            .unwrap();

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].client, "sliding");
        assert_eq!(cards[1].client, "climbing");
        assert_eq!(cards[0].overall_score, 28);
        assert_eq!(cards[0].overall_status, ScoreStatus::Critical);
        assert_eq!(cards[1].overall_score, 65);
        assert_eq!(cards[1].overall_status, ScoreStatus::Good);
    }
}
