use std::fmt::Write;

use crate::comparison::PeriodComparison;
use crate::metrics::{CollectionsMetrics, WelcomeVerificationMetrics};
use crate::models::DataCategory;
use crate::scorecard::{calculate_change, ClientScorecardData, ScorecardMetric};

fn metric_line(output: &mut String, name: &str, current: f64, baseline: f64, unit: &str) {
    let change = calculate_change(current, baseline);
    let _ = writeln!(
        output,
        "- {}: {:.1}{} (vs {:.1}{}, {:+.1}%)",
        name, current, unit, baseline, unit, change.value
    );
}

fn dollar_line(output: &mut String, name: &str, current: f64, baseline: f64) {
    let change = calculate_change(current, baseline);
    let _ = writeln!(
        output,
        "- {}: ${:.2} (vs ${:.2}, {:+.1}%)",
        name, current, baseline, change.value
    );
}

fn funnel_section(
    output: &mut String,
    category: DataCategory,
    current: &CollectionsMetrics,
    baseline: &CollectionsMetrics,
) {
    let _ = writeln!(output, "## {}", category);
    if current.calls == 0.0 && baseline.calls == 0.0 {
        let _ = writeln!(output, "No call activity in this category.");
        let _ = writeln!(output);
        return;
    }
    metric_line(output, "Calls", current.calls, baseline.calls, "");
    metric_line(output, "Accounts worked", current.accounts, baseline.accounts, "");
    metric_line(
        output,
        "Calls per account",
        current.calls_per_account,
        baseline.calls_per_account,
        "",
    );
    metric_line(output, "Connect rate", current.connect_rate, baseline.connect_rate, "%");
    metric_line(output, "RPC rate", current.rpc_rate, baseline.rpc_rate, "%");
    metric_line(
        output,
        "Promises per RPC",
        current.promises_per_rpc,
        baseline.promises_per_rpc,
        "%",
    );
    metric_line(
        output,
        "Cash per promises",
        current.cash_per_promises,
        baseline.cash_per_promises,
        "%",
    );
    metric_line(
        output,
        "Transfers per RPC",
        current.transfers_per_rpc,
        baseline.transfers_per_rpc,
        "%",
    );
    metric_line(
        output,
        "Avg minutes per call",
        current.avg_time_per_call_min,
        baseline.avg_time_per_call_min,
        "",
    );
    metric_line(
        output,
        "Time on calls",
        current.time_on_call_hours,
        baseline.time_on_call_hours,
        " hrs",
    );
    dollar_line(output, "Dollars collected", current.dollar_collected, baseline.dollar_collected);
    let _ = writeln!(output);
}

fn completion_section(
    output: &mut String,
    category: DataCategory,
    current: &WelcomeVerificationMetrics,
    baseline: &WelcomeVerificationMetrics,
) {
    let _ = writeln!(output, "## {}", category);
    if current.calls == 0.0 && baseline.calls == 0.0 && current.eligible == 0.0 {
        let _ = writeln!(output, "No call activity in this category.");
        let _ = writeln!(output);
        return;
    }
    metric_line(output, "Eligible accounts", current.eligible, baseline.eligible, "");
    metric_line(output, "Completed", current.completed, baseline.completed, "");
    metric_line(
        output,
        "Completion rate",
        current.completion_rate,
        baseline.completion_rate,
        "%",
    );
    metric_line(output, "Still incomplete", current.incomplete, baseline.incomplete, "");
    metric_line(output, "Calls", current.calls, baseline.calls, "");
    metric_line(output, "Connect rate", current.connect_rate, baseline.connect_rate, "%");
    metric_line(
        output,
        "Avg minutes per call",
        current.avg_time_per_call_min,
        baseline.avg_time_per_call_min,
        "",
    );
    let _ = writeln!(output);
}

fn movers_section(output: &mut String, comparison: &PeriodComparison) {
    let current = &comparison.current;
    let baseline = &comparison.comparison;
    let mut movers: Vec<(&str, f64)> = vec![
        (
            "Collections calls",
            calculate_change(current.collections.calls, baseline.collections.calls).value,
        ),
        (
            "Collections connect rate",
            calculate_change(current.collections.connect_rate, baseline.collections.connect_rate)
                .value,
        ),
        (
            "Collections promises per RPC",
            calculate_change(
                current.collections.promises_per_rpc,
                baseline.collections.promises_per_rpc,
            )
            .value,
        ),
        (
            "Collections dollars collected",
            calculate_change(
                current.collections.dollar_collected,
                baseline.collections.dollar_collected,
            )
            .value,
        ),
        (
            "Inbound calls",
            calculate_change(current.inbound.calls, baseline.inbound.calls).value,
        ),
        (
            "Welcome completion rate",
            calculate_change(current.welcome.completion_rate, baseline.welcome.completion_rate)
                .value,
        ),
        (
            "Verification completion rate",
            calculate_change(
                current.verification.completion_rate,
                baseline.verification.completion_rate,
            )
            .value,
        ),
    ];
    movers.retain(|(_, change)| change.abs() > 5.0);
    movers.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output, "## Notable Movers");
    if movers.is_empty() {
        let _ = writeln!(output, "No metric moved more than 5% either way.");
    } else {
        for (name, change) in movers.iter().take(3) {
            let _ = writeln!(output, "- {}: {:+.1}%", name, change);
        }
    }
}

pub fn build_comparison_report(
    comparison: &PeriodComparison,
    category: Option<DataCategory>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Call Center Comparison Report");
    let _ = writeln!(
        output,
        "Period: {} ({})",
        comparison.config.current.label, comparison.config.comparison_label
    );
    let _ = writeln!(output);

    let show = |wanted: DataCategory| category.is_none() || category == Some(wanted);

    if show(DataCategory::Collections) {
        funnel_section(
            &mut output,
            DataCategory::Collections,
            &comparison.current.collections,
            &comparison.comparison.collections,
        );
    }
    if show(DataCategory::Inbound) {
        funnel_section(
            &mut output,
            DataCategory::Inbound,
            &comparison.current.inbound,
            &comparison.comparison.inbound,
        );
    }
    if show(DataCategory::Welcome) {
        completion_section(
            &mut output,
            DataCategory::Welcome,
            &comparison.current.welcome,
            &comparison.comparison.welcome,
        );
    }
    if show(DataCategory::Verification) {
        completion_section(
            &mut output,
            DataCategory::Verification,
            &comparison.current.verification,
            &comparison.comparison.verification,
        );
    }
    if category.is_none() {
        movers_section(&mut output, comparison);
    }

    output
}

fn scorecard_metric_line(output: &mut String, name: &str, metric: &ScorecardMetric) {
    let _ = writeln!(
        output,
        "- {}: {:.1} vs {:.1} avg ({:+.1}%, {})",
        name, metric.current, metric.baseline, metric.change_percent, metric.status
    );
}

pub fn build_scorecard_report(cards: &[ClientScorecardData]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Client Scorecards");
    let _ = writeln!(output, "Rolling 7 days vs 4-week average, worst first.");
    let _ = writeln!(output);

    if cards.is_empty() {
        let _ = writeln!(output, "No clients matched the selection.");
        return output;
    }

    for card in cards {
        let _ = writeln!(
            output,
            "## {}: {}/100 ({})",
            card.client, card.overall_score, card.overall_status
        );
        scorecard_metric_line(&mut output, "Call volume", &card.metrics.call_volume);
        scorecard_metric_line(&mut output, "Connect rate", &card.metrics.connect_rate);
        scorecard_metric_line(&mut output, "RPC rate", &card.metrics.rpc_rate);
        scorecard_metric_line(&mut output, "Promises per RPC", &card.metrics.promise_rate);
        scorecard_metric_line(&mut output, "Cash per promises", &card.metrics.payment_success);
        scorecard_metric_line(&mut output, "Dollars collected", &card.metrics.dollars_collected);
        let _ = writeln!(output);
    }

    output
}
