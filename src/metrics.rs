use serde::Serialize;

use crate::models::{CategoryAggregates, RawCallAggregate};

/// Division that treats an empty denominator as "no data" rather than an
/// error: returns 0 instead of NaN or infinity.
pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Mean raw counters across one or more week aggregates. Counts become
/// fractional here (325.5 calls per week is meaningful); rates are derived
/// from these means afterwards, never averaged directly.
#[derive(Debug, Clone, Copy, Default)]
struct RawMeans {
    accounts: f64,
    calls: f64,
    connects: f64,
    rpcs: f64,
    promises: f64,
    cash_payments: f64,
    transfers: f64,
    eligible: f64,
    completed: f64,
    duration_minutes: f64,
    dollar_promised: f64,
    dollar_collected: f64,
}

impl RawMeans {
    fn from_raw(raw: &RawCallAggregate) -> Self {
        RawMeans {
            accounts: raw.accounts as f64,
            calls: raw.calls as f64,
            connects: raw.connects as f64,
            rpcs: raw.rpcs as f64,
            promises: raw.promises as f64,
            cash_payments: raw.cash_payments as f64,
            transfers: raw.transfers as f64,
            eligible: raw.eligible as f64,
            completed: raw.completed as f64,
            duration_minutes: raw.duration_minutes,
            dollar_promised: raw.dollar_promised,
            dollar_collected: raw.dollar_collected,
        }
    }

    fn mean_of<'a, I>(weeks: I) -> Self
    where
        I: IntoIterator<Item = &'a RawCallAggregate>,
    {
        let weeks: Vec<&RawCallAggregate> = weeks.into_iter().collect();
        let summed = Self::from_raw(&RawCallAggregate::sum(weeks.iter().copied()));
        let n = weeks.len() as f64;
        RawMeans {
            accounts: safe_divide(summed.accounts, n),
            calls: safe_divide(summed.calls, n),
            connects: safe_divide(summed.connects, n),
            rpcs: safe_divide(summed.rpcs, n),
            promises: safe_divide(summed.promises, n),
            cash_payments: safe_divide(summed.cash_payments, n),
            transfers: safe_divide(summed.transfers, n),
            eligible: safe_divide(summed.eligible, n),
            completed: safe_divide(summed.completed, n),
            duration_minutes: safe_divide(summed.duration_minutes, n),
            dollar_promised: safe_divide(summed.dollar_promised, n),
            dollar_collected: safe_divide(summed.dollar_collected, n),
        }
    }
}

/// Collections/inbound funnel record: raw counts (fractional when this is a
/// weekly average) plus every derived rate. Rates are on a 0-100 scale and
/// deliberately unclamped, so defect data shows up as an impossible rate
/// instead of hiding inside a clamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionsMetrics {
    pub accounts: f64,
    pub calls: f64,
    pub connects: f64,
    pub rpcs: f64,
    pub promises: f64,
    pub cash_payments: f64,
    pub transfers: f64,
    pub duration_minutes: f64,
    pub dollar_promised: f64,
    pub dollar_collected: f64,
    pub calls_per_account: f64,
    pub connect_rate: f64,
    pub rpc_rate: f64,
    pub promises_per_rpc: f64,
    pub cash_per_rpc: f64,
    pub cash_per_promises: f64,
    pub transfers_per_rpc: f64,
    pub time_on_call_hours: f64,
    pub avg_time_per_call_min: f64,
    pub avg_payment_amount: f64,
    pub dollar_per_rpc: f64,
}

impl CollectionsMetrics {
    fn from_means(means: &RawMeans) -> Self {
        CollectionsMetrics {
            accounts: means.accounts,
            calls: means.calls,
            connects: means.connects,
            rpcs: means.rpcs,
            promises: means.promises,
            cash_payments: means.cash_payments,
            transfers: means.transfers,
            duration_minutes: means.duration_minutes,
            dollar_promised: means.dollar_promised,
            dollar_collected: means.dollar_collected,
            calls_per_account: safe_divide(means.calls, means.accounts),
            connect_rate: safe_divide(means.connects, means.calls) * 100.0,
            rpc_rate: safe_divide(means.rpcs, means.connects) * 100.0,
            promises_per_rpc: safe_divide(means.promises, means.rpcs) * 100.0,
            cash_per_rpc: safe_divide(means.cash_payments, means.rpcs) * 100.0,
            cash_per_promises: safe_divide(means.cash_payments, means.promises) * 100.0,
            transfers_per_rpc: safe_divide(means.transfers, means.rpcs) * 100.0,
            time_on_call_hours: means.duration_minutes / 60.0,
            avg_time_per_call_min: safe_divide(means.duration_minutes, means.calls),
            avg_payment_amount: safe_divide(means.dollar_collected, means.cash_payments),
            dollar_per_rpc: safe_divide(means.dollar_collected, means.rpcs),
        }
    }

    pub fn from_raw(raw: &RawCallAggregate) -> Self {
        Self::from_means(&RawMeans::from_raw(raw))
    }

    pub fn from_weekly_average<'a, I>(weeks: I) -> Self
    where
        I: IntoIterator<Item = &'a RawCallAggregate>,
    {
        Self::from_means(&RawMeans::mean_of(weeks))
    }
}

/// Welcome/verification funnel record. `incomplete` is signed: an account
/// can complete the flow more often than it was eligible in the window, and
/// that defect should be visible, not clamped away.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeVerificationMetrics {
    pub eligible: f64,
    pub completed: f64,
    pub incomplete: f64,
    pub calls: f64,
    pub connects: f64,
    pub rpcs: f64,
    pub duration_minutes: f64,
    pub completion_rate: f64,
    pub connect_rate: f64,
    pub rpc_rate: f64,
    pub time_on_call_hours: f64,
    pub avg_time_per_call_min: f64,
}

impl WelcomeVerificationMetrics {
    fn from_means(means: &RawMeans) -> Self {
        WelcomeVerificationMetrics {
            eligible: means.eligible,
            completed: means.completed,
            incomplete: means.eligible - means.completed,
            calls: means.calls,
            connects: means.connects,
            rpcs: means.rpcs,
            duration_minutes: means.duration_minutes,
            completion_rate: safe_divide(means.completed, means.eligible) * 100.0,
            connect_rate: safe_divide(means.connects, means.calls) * 100.0,
            rpc_rate: safe_divide(means.rpcs, means.connects) * 100.0,
            time_on_call_hours: means.duration_minutes / 60.0,
            avg_time_per_call_min: safe_divide(means.duration_minutes, means.calls),
        }
    }

    pub fn from_raw(raw: &RawCallAggregate) -> Self {
        Self::from_means(&RawMeans::from_raw(raw))
    }

    pub fn from_weekly_average<'a, I>(weeks: I) -> Self
    where
        I: IntoIterator<Item = &'a RawCallAggregate>,
    {
        Self::from_means(&RawMeans::mean_of(weeks))
    }
}

/// Full KPI set for one window: every category derived from its summed raws.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodKPIs {
    pub collections: CollectionsMetrics,
    pub inbound: CollectionsMetrics,
    pub welcome: WelcomeVerificationMetrics,
    pub verification: WelcomeVerificationMetrics,
}

impl PeriodKPIs {
    pub fn from_totals(totals: &CategoryAggregates) -> Self {
        PeriodKPIs {
            collections: CollectionsMetrics::from_raw(&totals.collections),
            inbound: CollectionsMetrics::from_raw(&totals.inbound),
            welcome: WelcomeVerificationMetrics::from_raw(&totals.welcome),
            verification: WelcomeVerificationMetrics::from_raw(&totals.verification),
        }
    }

    /// Derive KPIs for an N-week baseline: mean the raw counters first, then
    /// compute rates from the means.
    pub fn from_weekly_average(weeks: &[CategoryAggregates]) -> Self {
        PeriodKPIs {
            collections: CollectionsMetrics::from_weekly_average(
                weeks.iter().map(|w| &w.collections),
            ),
            inbound: CollectionsMetrics::from_weekly_average(weeks.iter().map(|w| &w.inbound)),
            welcome: WelcomeVerificationMetrics::from_weekly_average(
                weeks.iter().map(|w| &w.welcome),
            ),
            verification: WelcomeVerificationMetrics::from_weekly_average(
                weeks.iter().map(|w| &w.verification),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funnel_raw() -> RawCallAggregate {
        RawCallAggregate {
            accounts: 1000,
            calls: 5000,
            connects: 2000,
            rpcs: 800,
            promises: 400,
            cash_payments: 200,
            transfers: 100,
            eligible: 0,
            completed: 0,
            duration_minutes: 15_000.0,
            dollar_promised: 120_000.0,
            dollar_collected: 5_000.0,
        }
    }

    #[test]
    fn safe_divide_returns_zero_for_zero_denominator() {
        assert_eq!(safe_divide(10.0, 0.0), 0.0);
        assert_eq!(safe_divide(0.0, 0.0), 0.0);
        assert_eq!(safe_divide(9.0, 3.0), 3.0);
    }

    #[test]
    fn collections_rates_match_hand_computed_funnel() {
        let m = CollectionsMetrics::from_raw(&funnel_raw());
        assert_eq!(m.calls_per_account, 5.0);
        assert_eq!(m.connect_rate, 40.0);
        assert_eq!(m.rpc_rate, 40.0);
        assert_eq!(m.promises_per_rpc, 50.0);
        assert_eq!(m.cash_per_rpc, 25.0);
        assert_eq!(m.cash_per_promises, 50.0);
        assert_eq!(m.transfers_per_rpc, 12.5);
        assert_eq!(m.time_on_call_hours, 250.0);
        assert_eq!(m.avg_time_per_call_min, 3.0);
        assert_eq!(m.avg_payment_amount, 25.0);
        assert_eq!(m.dollar_per_rpc, 6.25);
    }

    #[test]
    fn zero_activity_derives_to_all_zero_rates() {
        let m = CollectionsMetrics::from_raw(&RawCallAggregate::zero());
        assert_eq!(m.connect_rate, 0.0);
        assert_eq!(m.calls_per_account, 0.0);
        assert_eq!(m.avg_payment_amount, 0.0);
        assert_eq!(m.time_on_call_hours, 0.0);
    }

    #[test]
    fn rates_are_not_clamped_to_one_hundred() {
        let raw = RawCallAggregate {
            calls: 100,
            connects: 150,
            ..RawCallAggregate::zero()
        };
        let m = CollectionsMetrics::from_raw(&raw);
        assert_eq!(m.connect_rate, 150.0);
    }

    #[test]
    fn weekly_average_derives_from_mean_counts_not_mean_rates() {
        let busy = RawCallAggregate {
            calls: 100,
            connects: 80,
            ..RawCallAggregate::zero()
        };
        let quiet = RawCallAggregate {
            calls: 300,
            connects: 60,
            ..RawCallAggregate::zero()
        };

        let avg = CollectionsMetrics::from_weekly_average([&busy, &quiet]);
        assert_eq!(avg.calls, 200.0);
        assert_eq!(avg.connects, 70.0);
        // 70/200, not the mean of the per-week rates (80% and 20% -> 50%).
        assert_eq!(avg.connect_rate, 35.0);
        assert_ne!(avg.connect_rate, 50.0);
    }

    #[test]
    fn weekly_average_of_nothing_is_all_zero() {
        let avg = CollectionsMetrics::from_weekly_average(std::iter::empty());
        assert_eq!(avg.calls, 0.0);
        assert_eq!(avg.connect_rate, 0.0);
    }

    #[test]
    fn fan_in_must_sum_raws_before_deriving() {
        let a = RawCallAggregate {
            calls: 200,
            connects: 150,
            ..RawCallAggregate::zero()
        };
        let b = RawCallAggregate {
            calls: 600,
            connects: 90,
            ..RawCallAggregate::zero()
        };

        let combined = CollectionsMetrics::from_raw(&a.combine(&b));
        assert_eq!(combined.calls, 800.0);
        assert_eq!(combined.connect_rate, 30.0);

        // Deriving per client first and then summing or averaging the rate
        // fields lands somewhere else entirely.
        let rate_a = CollectionsMetrics::from_raw(&a).connect_rate;
        let rate_b = CollectionsMetrics::from_raw(&b).connect_rate;
        assert_eq!(rate_a, 75.0);
        assert_eq!(rate_b, 15.0);
        assert_ne!(combined.connect_rate, rate_a + rate_b);
        assert_ne!(combined.connect_rate, (rate_a + rate_b) / 2.0);
    }

    #[test]
    fn completion_shortfall_is_signed() {
        let behind = RawCallAggregate {
            eligible: 50,
            completed: 40,
            ..RawCallAggregate::zero()
        };
        let m = WelcomeVerificationMetrics::from_raw(&behind);
        assert_eq!(m.completion_rate, 80.0);
        assert_eq!(m.incomplete, 10.0);

        let ahead = RawCallAggregate {
            eligible: 50,
            completed: 60,
            ..RawCallAggregate::zero()
        };
        let m = WelcomeVerificationMetrics::from_raw(&ahead);
        assert_eq!(m.incomplete, -10.0);
        assert_eq!(m.completion_rate, 120.0);
    }

    #[test]
    fn period_kpis_keep_categories_separate() {
        let totals = CategoryAggregates {
            collections: funnel_raw(),
            inbound: RawCallAggregate {
                calls: 200,
                connects: 100,
                ..RawCallAggregate::zero()
            },
            welcome: RawCallAggregate {
                eligible: 20,
                completed: 5,
                ..RawCallAggregate::zero()
            },
            verification: RawCallAggregate::zero(),
        };

        let kpis = PeriodKPIs::from_totals(&totals);
        assert_eq!(kpis.collections.connect_rate, 40.0);
        assert_eq!(kpis.inbound.connect_rate, 50.0);
        assert_eq!(kpis.welcome.completion_rate, 25.0);
        assert_eq!(kpis.verification.completion_rate, 0.0);
    }
}
