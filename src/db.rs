use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{CallDirection, CallEvent, CallFlowModel, CategoryAggregates, DataCategory};
use crate::periods::DateRange;

/// Read-side port the engine pulls aggregates through. Implementations
/// return whole counters for a closed timestamp window; rates are always
/// derived downstream.
#[async_trait]
pub trait CallDataStore: Send + Sync {
    async fn fetch_raw_aggregates(
        &self,
        client: &str,
        range: &DateRange,
    ) -> AnalyticsResult<CategoryAggregates>;

    async fn list_clients(&self) -> AnalyticsResult<Vec<String>>;
}

/// Postgres-backed store. Scans per-call event rows and folds them through
/// the result-code taxonomy, so classification lives in one place instead of
/// being duplicated in SQL.
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    pub fn new(pool: PgPool) -> Self {
        PgCallStore { pool }
    }
}

#[async_trait]
impl CallDataStore for PgCallStore {
    async fn fetch_raw_aggregates(
        &self,
        client: &str,
        range: &DateRange,
    ) -> AnalyticsResult<CategoryAggregates> {
        let rows = sqlx::query(
            "SELECT e.account_ref, e.flow_model, e.direction, e.result_code, \
             e.promise_flag, e.duration_minutes, e.dollar_promised, e.dollar_collected \
             FROM call_analytics.call_events e \
             JOIN call_analytics.clients c ON c.id = e.client_id \
             WHERE c.name = $1 AND e.occurred_at >= $2 AND e.occurred_at <= $3",
        )
        .bind(client)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let flow_model: String = row.get("flow_model");
            let direction: String = row.get("direction");
            let model = CallFlowModel::parse(&flow_model).ok_or_else(|| {
                AnalyticsError::Store(format!("unknown flow model '{flow_model}'"))
            })?;
            let direction = CallDirection::parse(&direction).ok_or_else(|| {
                AnalyticsError::Store(format!("unknown call direction '{direction}'"))
            })?;

            events.push(CallEvent {
                account_ref: row.get("account_ref"),
                category: DataCategory::from_parts(model, direction),
                result_code: row.get("result_code"),
                promise_flag: row.get("promise_flag"),
                duration_minutes: row.get("duration_minutes"),
                dollar_promised: row.get("dollar_promised"),
                dollar_collected: row.get("dollar_collected"),
            });
        }

        Ok(CategoryAggregates::from_events(&events))
    }

    async fn list_clients(&self) -> AnalyticsResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM call_analytics.clients WHERE active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    fn event_time(year: i32, month: u32, day: u32, hour: u32) -> anyhow::Result<DateTime<Utc>> {
        let date = NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?;
        let time = date.and_hms_opt(hour, 0, 0).context("invalid time")?;
        Ok(time.and_utc())
    }

    let clients = vec![
        (
            Uuid::parse_str("7b1c4f7e-9d6a-4f0b-8a34-5d2e91c7a0f1")?,
            "apex-recovery",
        ),
        (
            Uuid::parse_str("c3a8e2d5-1f47-4b6c-9e80-2b5f6d4a8c92")?,
            "meridian-credit",
        ),
        (
            Uuid::parse_str("e9f2b6a1-8c3d-4e75-b1a6-7d0c5e9f3b24")?,
            "northstar-financial",
        ),
    ];

    for (id, name) in clients {
        sqlx::query(
            r#"
            INSERT INTO call_analytics.clients (id, name, active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (name) DO UPDATE SET active = TRUE
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(pool)
        .await?;
    }

    #[rustfmt::skip]
    let events = vec![
        ("seed-001", "apex-recovery", "AX-1001", "collections", "outbound", "PTP", false, 6.5, 250.0, 0.0, event_time(2026, 8, 18, 14)?),
        ("seed-002", "apex-recovery", "AX-1001", "collections", "outbound", "AM", false, 0.5, 0.0, 0.0, event_time(2026, 8, 18, 16)?),
        ("seed-003", "apex-recovery", "AX-1042", "collections", "outbound", "PaymentToday", false, 9.0, 180.0, 180.0, event_time(2026, 8, 19, 10)?),
        ("seed-004", "apex-recovery", "AX-1077", "collections", "outbound", "NA", false, 0.3, 0.0, 0.0, event_time(2026, 8, 19, 11)?),
        ("seed-005", "apex-recovery", "AX-1103", "collections", "outbound", "WN", false, 1.2, 0.0, 0.0, event_time(2026, 8, 20, 9)?),
        ("seed-006", "apex-recovery", "AX-1150", "collections", "inbound", "PaymentScheduled", false, 7.8, 320.0, 320.0, event_time(2026, 8, 20, 15)?),
        ("seed-007", "apex-recovery", "AX-1188", "collections", "inbound", "HU", false, 2.1, 0.0, 0.0, event_time(2026, 8, 21, 10)?),
        ("seed-008", "meridian-credit", "MC-2001", "collections", "outbound", "PTP", false, 5.4, 150.0, 0.0, event_time(2026, 8, 18, 13)?),
        ("seed-009", "meridian-credit", "MC-2002", "collections", "outbound", "VM", false, 0.4, 0.0, 0.0, event_time(2026, 8, 18, 13)?),
        ("seed-010", "meridian-credit", "MC-2003", "collections", "outbound", "XFER", false, 3.3, 0.0, 0.0, event_time(2026, 8, 19, 14)?),
        ("seed-011", "meridian-credit", "MC-2004", "collections", "outbound", "RTP", true, 4.6, 90.0, 0.0, event_time(2026, 8, 20, 16)?),
        ("seed-012", "meridian-credit", "MC-2010", "welcome", "outbound", "WELCOME COMPLETE", false, 3.9, 0.0, 0.0, event_time(2026, 8, 21, 9)?),
        ("seed-013", "meridian-credit", "MC-2011", "welcome", "outbound", "NA", false, 0.2, 0.0, 0.0, event_time(2026, 8, 21, 9)?),
        ("seed-014", "northstar-financial", "NF-3001", "collections", "outbound", "BUSY", false, 0.1, 0.0, 0.0, event_time(2026, 8, 18, 10)?),
        ("seed-015", "northstar-financial", "NF-3002", "collections", "inbound", "PaymentToday", false, 8.2, 410.0, 410.0, event_time(2026, 8, 19, 12)?),
        ("seed-016", "northstar-financial", "NF-3010", "verification", "outbound", "VERIFIED", false, 2.7, 0.0, 0.0, event_time(2026, 8, 20, 11)?),
        ("seed-017", "northstar-financial", "NF-3011", "verification", "outbound", "3P", false, 1.5, 0.0, 0.0, event_time(2026, 8, 20, 12)?),
        ("seed-018", "northstar-financial", "NF-3050", "collections", "outbound", "PTP", true, 6.1, 275.0, 0.0, event_time(2026, 8, 22, 15)?),
    ];

    for (source_key, client, account_ref, flow_model, direction, result_code, promise_flag, duration, promised, collected, occurred_at) in events {
        let client_id: Uuid = sqlx::query(
            "SELECT id FROM call_analytics.clients WHERE name = $1",
        )
        .bind(client)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO call_analytics.call_events
            (id, client_id, account_ref, flow_model, direction, result_code,
             promise_flag, duration_minutes, dollar_promised, dollar_collected,
             occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(account_ref)
        .bind(flow_model)
        .bind(direction)
        .bind(result_code)
        .bind(promise_flag)
        .bind(duration)
        .bind(promised)
        .bind(collected)
        .bind(occurred_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        client: String,
        account_ref: String,
        flow_model: String,
        direction: String,
        result_code: String,
        promise_flag: bool,
        duration_minutes: f64,
        dollar_promised: f64,
        dollar_collected: f64,
        occurred_at: DateTime<Utc>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if CallFlowModel::parse(&row.flow_model).is_none() {
            anyhow::bail!(
                "unknown flow model '{}' for account {}",
                row.flow_model,
                row.account_ref
            );
        }
        if CallDirection::parse(&row.direction).is_none() {
            anyhow::bail!(
                "unknown call direction '{}' for account {}",
                row.direction,
                row.account_ref
            );
        }

        let client_id: Uuid = sqlx::query(
            r#"
            INSERT INTO call_analytics.clients (id, name, active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (name) DO UPDATE SET active = TRUE
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.client)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO call_analytics.call_events
            (id, client_id, account_ref, flow_model, direction, result_code,
             promise_flag, duration_minutes, dollar_promised, dollar_collected,
             occurred_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(&row.account_ref)
        .bind(&row.flow_model)
        .bind(&row.direction)
        .bind(&row.result_code)
        .bind(row.promise_flag)
        .bind(row.duration_minutes)
        .bind(row.dollar_promised)
        .bind(row.dollar_collected)
        .bind(row.occurred_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
