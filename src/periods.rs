use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::models::ComparisonType;

/// Number of full weeks that make up a rolling weekly baseline.
pub const BASELINE_WEEKS: u32 = 4;

/// Closed UTC interval with a display label. `end` always sits on the last
/// millisecond of its day so timestamp filters can use plain `<=`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl DateRange {
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: day_start(start),
            end: day_end(end),
            label: span_label(start, end),
        }
    }
}

/// What a current window is measured against: one window, or several full
/// weeks whose counters get averaged before any rate is derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonWindow {
    Single(DateRange),
    WeeklyAverage(Vec<DateRange>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodConfig {
    pub comparison_type: ComparisonType,
    pub current: DateRange,
    pub comparison: ComparisonWindow,
    pub comparison_label: String,
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    day_start(date) + Duration::days(1) - Duration::milliseconds(1)
}

fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

fn span_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %-d, %Y"), end.format("%b %-d, %Y"))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).expect("day 1 exists in every month")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("day 1 exists in every month")
        .pred_opt()
        .expect("first of month has a predecessor")
        .day()
}

/// Same calendar day one month earlier, with the day clamped when the
/// target month is shorter (Mar 31 shifts to Feb 28/29).
fn shift_month_back(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid")
}

fn week_start(reference: NaiveDate) -> NaiveDate {
    reference - Duration::days(reference.weekday().num_days_from_sunday() as i64)
}

/// Sunday through Saturday week containing the reference date. Spans month
/// and year boundaries without adjustment.
pub fn week_range(reference: NaiveDate) -> DateRange {
    let start = week_start(reference);
    DateRange::from_days(start, start + Duration::days(6))
}

/// First through last day of the reference date's calendar month.
pub fn month_range(reference: NaiveDate) -> DateRange {
    let start = first_of_month(reference);
    let end = NaiveDate::from_ymd_opt(
        reference.year(),
        reference.month(),
        days_in_month(reference.year(), reference.month()),
    )
    .expect("last day of month is valid");
    DateRange {
        start: day_start(start),
        end: day_end(end),
        label: month_label(reference),
    }
}

pub fn month_to_date(reference: NaiveDate) -> DateRange {
    DateRange::from_days(first_of_month(reference), reference)
}

/// Shift a day span back one month, clamping both bounds to the shorter
/// target month where needed.
pub fn same_period_last_month(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::from_days(shift_month_back(start), shift_month_back(end))
}

/// The `weeks` full Sunday-Saturday weeks immediately before the week
/// containing the reference date, oldest first. The week in progress is
/// never part of its own baseline.
pub fn weekly_baseline_ranges(reference: NaiveDate, weeks: u32) -> Vec<DateRange> {
    let current_start = week_start(reference);
    (1..=weeks as i64)
        .rev()
        .map(|back| {
            let start = current_start - Duration::days(7 * back);
            DateRange::from_days(start, start + Duration::days(6))
        })
        .collect()
}

/// Seven calendar days ending on the reference date, inclusive.
pub fn rolling_seven_day(reference: NaiveDate) -> DateRange {
    DateRange::from_days(reference - Duration::days(6), reference)
}

/// Assemble the current window and its comparison for one comparison type.
pub fn period_config(comparison_type: ComparisonType, reference: NaiveDate) -> PeriodConfig {
    match comparison_type {
        ComparisonType::MonthOverMonth => {
            let previous = shift_month_back(first_of_month(reference));
            PeriodConfig {
                comparison_type,
                current: month_range(reference),
                comparison: ComparisonWindow::Single(month_range(previous)),
                comparison_label: format!("vs {}", month_label(previous)),
            }
        }
        ComparisonType::WeekOverWeek => PeriodConfig {
            comparison_type,
            current: week_range(reference),
            comparison: ComparisonWindow::Single(week_range(reference - Duration::days(7))),
            comparison_label: "vs last week".to_string(),
        },
        ComparisonType::MonthToDate => {
            let comparison = same_period_last_month(first_of_month(reference), reference);
            let comparison_label = format!("vs {}", comparison.label);
            PeriodConfig {
                comparison_type,
                current: month_to_date(reference),
                comparison: ComparisonWindow::Single(comparison),
                comparison_label,
            }
        }
        ComparisonType::WeekToDate => PeriodConfig {
            comparison_type,
            current: DateRange::from_days(week_start(reference), reference),
            comparison: ComparisonWindow::WeeklyAverage(weekly_baseline_ranges(
                reference,
                BASELINE_WEEKS,
            )),
            comparison_label: "vs 4-week avg".to_string(),
        },
    }
}
