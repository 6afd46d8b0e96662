use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify;

/// Dialer model a call was placed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFlowModel {
    Collections,
    Welcome,
    Verification,
}

impl CallFlowModel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "collections" => Some(CallFlowModel::Collections),
            "welcome" => Some(CallFlowModel::Welcome),
            "verification" => Some(CallFlowModel::Verification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outbound,
    Inbound,
}

impl CallDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "outbound" => Some(CallDirection::Outbound),
            "inbound" => Some(CallDirection::Inbound),
            _ => None,
        }
    }
}

/// Reporting category a raw row belongs to, resolved once at ingestion from
/// the (model, direction) pair. Welcome and verification flows report the
/// same way regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Collections,
    Inbound,
    Welcome,
    Verification,
}

impl DataCategory {
    pub fn from_parts(model: CallFlowModel, direction: CallDirection) -> Self {
        match (model, direction) {
            (CallFlowModel::Collections, CallDirection::Outbound) => DataCategory::Collections,
            (CallFlowModel::Collections, CallDirection::Inbound) => DataCategory::Inbound,
            (CallFlowModel::Welcome, _) => DataCategory::Welcome,
            (CallFlowModel::Verification, _) => DataCategory::Verification,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "collections" => Some(DataCategory::Collections),
            "inbound" => Some(DataCategory::Inbound),
            "welcome" => Some(DataCategory::Welcome),
            "verification" => Some(DataCategory::Verification),
            _ => None,
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataCategory::Collections => "Collections",
            DataCategory::Inbound => "Inbound",
            DataCategory::Welcome => "Welcome",
            DataCategory::Verification => "Verification",
        };
        write!(f, "{name}")
    }
}

/// One per-call row as the store hands it back, with the model/direction
/// strings already resolved to a category.
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub account_ref: String,
    pub category: DataCategory,
    pub result_code: String,
    pub promise_flag: bool,
    pub duration_minutes: f64,
    pub dollar_promised: f64,
    pub dollar_collected: f64,
}

/// Raw funnel counters for one (client, category) slice of a time window.
///
/// Counters are whole counts as returned by the store, never pre-divided;
/// all rates are derived later. `eligible`/`completed` only carry data for
/// welcome/verification flows and stay zero elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawCallAggregate {
    pub accounts: u64,
    pub calls: u64,
    pub connects: u64,
    pub rpcs: u64,
    pub promises: u64,
    pub cash_payments: u64,
    pub transfers: u64,
    pub eligible: u64,
    pub completed: u64,
    pub duration_minutes: f64,
    pub dollar_promised: f64,
    pub dollar_collected: f64,
}

impl RawCallAggregate {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Field-wise sum. Associative and commutative, so fan-in order and
    /// batching never change the result.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            accounts: self.accounts + other.accounts,
            calls: self.calls + other.calls,
            connects: self.connects + other.connects,
            rpcs: self.rpcs + other.rpcs,
            promises: self.promises + other.promises,
            cash_payments: self.cash_payments + other.cash_payments,
            transfers: self.transfers + other.transfers,
            eligible: self.eligible + other.eligible,
            completed: self.completed + other.completed,
            duration_minutes: self.duration_minutes + other.duration_minutes,
            dollar_promised: self.dollar_promised + other.dollar_promised,
            dollar_collected: self.dollar_collected + other.dollar_collected,
        }
    }

    pub fn sum<'a, I>(aggregates: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        aggregates
            .into_iter()
            .fold(Self::zero(), |acc, a| acc.combine(a))
    }
}

/// The four per-category aggregates for one fetched (client, window) slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryAggregates {
    pub collections: RawCallAggregate,
    pub inbound: RawCallAggregate,
    pub welcome: RawCallAggregate,
    pub verification: RawCallAggregate,
}

impl CategoryAggregates {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn combine(&self, other: &Self) -> Self {
        Self {
            collections: self.collections.combine(&other.collections),
            inbound: self.inbound.combine(&other.inbound),
            welcome: self.welcome.combine(&other.welcome),
            verification: self.verification.combine(&other.verification),
        }
    }

    pub fn sum<'a, I>(bundles: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        bundles
            .into_iter()
            .fold(Self::zero(), |acc, b| acc.combine(b))
    }

    fn category_mut(&mut self, category: DataCategory) -> &mut RawCallAggregate {
        match category {
            DataCategory::Collections => &mut self.collections,
            DataCategory::Inbound => &mut self.inbound,
            DataCategory::Welcome => &mut self.welcome,
            DataCategory::Verification => &mut self.verification,
        }
    }

    /// Fold classified call events into per-category funnel counts.
    ///
    /// `accounts` counts distinct account references per category. For the
    /// welcome/verification flows, `eligible` is that same distinct-account
    /// count while `completed` counts completion-coded calls, so `completed`
    /// can legitimately exceed `eligible` when an account completes a flow
    /// more than once in the window.
    pub fn from_events(events: &[CallEvent]) -> Self {
        let mut totals = Self::zero();
        let mut seen: HashMap<DataCategory, HashSet<&str>> = HashMap::new();

        for event in events {
            let outcome = classify::classify(&event.result_code, event.promise_flag);
            let bucket = totals.category_mut(event.category);

            bucket.calls += 1;
            if outcome.is_connect {
                bucket.connects += 1;
            }
            if outcome.is_rpc {
                bucket.rpcs += 1;
            }
            if outcome.is_promise {
                bucket.promises += 1;
            }
            if outcome.is_cash_payment {
                bucket.cash_payments += 1;
            }
            if outcome.is_transfer {
                bucket.transfers += 1;
            }
            if outcome.is_completion {
                bucket.completed += 1;
            }
            bucket.duration_minutes += event.duration_minutes;
            bucket.dollar_promised += event.dollar_promised;
            bucket.dollar_collected += event.dollar_collected;

            seen.entry(event.category)
                .or_default()
                .insert(event.account_ref.as_str());
        }

        for (category, accounts) in seen {
            let bucket = totals.category_mut(category);
            bucket.accounts = accounts.len() as u64;
            if matches!(category, DataCategory::Welcome | DataCategory::Verification) {
                bucket.eligible = bucket.accounts;
            }
        }

        totals
    }
}

/// Which clients a request covers.
#[derive(Debug, Clone)]
pub enum ClientSelector {
    One(String),
    All,
    AllExcept(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonType {
    MonthOverMonth,
    WeekOverWeek,
    MonthToDate,
    WeekToDate,
}

impl FromStr for ComparisonType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "month-over-month" | "mom" => Ok(ComparisonType::MonthOverMonth),
            "week-over-week" | "wow" => Ok(ComparisonType::WeekOverWeek),
            "month-to-date" | "mtd" => Ok(ComparisonType::MonthToDate),
            "week-to-date" | "wtd" => Ok(ComparisonType::WeekToDate),
            other => Err(format!(
                "unknown comparison type '{other}' (expected month-over-month, \
                 week-over-week, month-to-date or week-to-date)"
            )),
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonType::MonthOverMonth => "month-over-month",
            ComparisonType::WeekOverWeek => "week-over-week",
            ComparisonType::MonthToDate => "month-to-date",
            ComparisonType::WeekToDate => "week-to-date",
        };
        write!(f, "{name}")
    }
}

/// The engine's single inbound request shape.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub comparison_type: ComparisonType,
    pub reference_date: NaiveDate,
    pub clients: ClientSelector,
    pub category: Option<DataCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(calls: u64, connects: u64, rpcs: u64, dollars: f64) -> RawCallAggregate {
        RawCallAggregate {
            accounts: calls / 5,
            calls,
            connects,
            rpcs,
            promises: rpcs / 2,
            cash_payments: rpcs / 4,
            transfers: rpcs / 8,
            eligible: 0,
            completed: 0,
            duration_minutes: calls as f64 * 3.0,
            dollar_promised: dollars * 2.0,
            dollar_collected: dollars,
        }
    }

    fn event(account: &str, category: DataCategory, code: &str, promise: bool) -> CallEvent {
        CallEvent {
            account_ref: account.to_string(),
            category,
            result_code: code.to_string(),
            promise_flag: promise,
            duration_minutes: 2.5,
            dollar_promised: 0.0,
            dollar_collected: 0.0,
        }
    }

    #[test]
    fn combine_is_associative_and_commutative() {
        let a = sample(100, 40, 20, 500.0);
        let b = sample(80, 30, 12, 250.0);
        let c = sample(300, 120, 90, 1200.0);

        let left = a.combine(&b).combine(&c);
        let right = a.combine(&b.combine(&c));
        let swapped = b.combine(&a.combine(&c));

        assert_eq!(left, right);
        assert_eq!(left, swapped);
    }

    #[test]
    fn combine_zero_is_identity() {
        let a = sample(42, 17, 9, 75.0);
        assert_eq!(a.combine(&RawCallAggregate::zero()), a);
        assert_eq!(RawCallAggregate::zero().combine(&a), a);
    }

    #[test]
    fn sum_matches_pairwise_combination() {
        let parts = vec![
            sample(10, 4, 2, 10.0),
            sample(20, 9, 3, 20.0),
            sample(5, 1, 1, 5.0),
        ];
        let folded = RawCallAggregate::sum(&parts);
        let pairwise = parts[0].combine(&parts[1]).combine(&parts[2]);
        assert_eq!(folded, pairwise);
    }

    #[test]
    fn from_events_keeps_funnel_subset_ordering() {
        let events = vec![
            event("acct-1", DataCategory::Collections, "PTP", false),
            event("acct-1", DataCategory::Collections, "AM", false),
            event("acct-2", DataCategory::Collections, "WN", false),
            event("acct-3", DataCategory::Collections, "HU", false),
            event("acct-3", DataCategory::Collections, "NA", false),
            event("acct-4", DataCategory::Collections, "UNKNOWN-CODE", true),
        ];

        let totals = CategoryAggregates::from_events(&events);
        let c = &totals.collections;

        assert_eq!(c.calls, 6);
        assert!(c.rpcs <= c.connects, "rpcs must never exceed connects");
        assert!(c.connects <= c.calls, "connects must never exceed calls");
        // AM and NA are non-connects; WN connects but is not an RPC.
        assert_eq!(c.connects, 4);
        assert_eq!(c.rpcs, 3);
        // PTP code plus the flagged unknown code.
        assert_eq!(c.promises, 2);
        assert_eq!(c.accounts, 4);
    }

    #[test]
    fn from_events_counts_eligible_and_completed_independently() {
        let events = vec![
            event("w-1", DataCategory::Welcome, "WELCOME COMPLETE", false),
            event("w-1", DataCategory::Welcome, "WELCOME COMPLETE", false),
            event("w-2", DataCategory::Verification, "NA", false),
        ];

        let totals = CategoryAggregates::from_events(&events);
        // Same account completed twice: completed exceeds eligible.
        assert_eq!(totals.welcome.eligible, 1);
        assert_eq!(totals.welcome.completed, 2);
        assert_eq!(totals.verification.eligible, 1);
        assert_eq!(totals.verification.completed, 0);
        // Collections categories never populate the welcome-flow counters.
        assert_eq!(totals.collections.eligible, 0);
    }

    #[test]
    fn category_resolution_is_fixed_by_model_and_direction() {
        assert_eq!(
            DataCategory::from_parts(CallFlowModel::Collections, CallDirection::Outbound),
            DataCategory::Collections
        );
        assert_eq!(
            DataCategory::from_parts(CallFlowModel::Collections, CallDirection::Inbound),
            DataCategory::Inbound
        );
        assert_eq!(
            DataCategory::from_parts(CallFlowModel::Welcome, CallDirection::Inbound),
            DataCategory::Welcome
        );
        assert_eq!(
            DataCategory::from_parts(CallFlowModel::Verification, CallDirection::Outbound),
            DataCategory::Verification
        );
    }

    #[test]
    fn comparison_type_parses_long_and_short_names() {
        assert_eq!(
            "month-over-month".parse::<ComparisonType>().unwrap(),
            ComparisonType::MonthOverMonth
        );
        assert_eq!(
            "wtd".parse::<ComparisonType>().unwrap(),
            ComparisonType::WeekToDate
        );
        assert!("fortnightly".parse::<ComparisonType>().is_err());
    }
}
