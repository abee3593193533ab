use std::sync::Arc;

use ashare_core::{DecisionRecord, DecisionType, OutcomeCategory};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{AnyPool, FromRow};
use tracing::{info, warn};

use crate::embedding::{cosine_similarity, embed_chunked, EmbeddingProvider};
use crate::error::MemoryError;

/// A similarity-search hit returned by `query`/`query_by_outcome`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub matched_situation: String,
    pub recommendation: String,
    pub similarity_score: f32,
    pub ticker: String,
    pub decision_date: String,
    pub decision_type: DecisionType,
    pub confidence: f64,
    pub actual_return: Option<f64>,
    pub outcome_category: Option<OutcomeCategory>,
    pub outcome_updated: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_decisions: u32,
    pub decisions_with_outcome: u32,
    pub profit_count: u32,
    pub loss_count: u32,
    pub breakeven_count: u32,
    pub total_return: f64,
    pub avg_return: f64,
    pub win_rate: f64,
    pub avg_days_held: f64,
    pub best_return: Option<f64>,
    pub worst_return: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Disabled,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub record_count: u64,
    pub embedding_ok: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(FromRow)]
struct RecordRow {
    record_id: String,
    ticker: String,
    decision_date: String,
    situation: String,
    recommendation: String,
    decision_type: String,
    confidence: f64,
    embedding: String,
    outcome_updated: bool,
    actual_return: Option<f64>,
    days_held: Option<i64>,
    outcome_category: Option<String>,
    exit_date: Option<String>,
    exit_reason: Option<String>,
    created_at: String,
    outcome_updated_at: Option<String>,
}

fn decision_type_to_str(dt: DecisionType) -> &'static str {
    match dt {
        DecisionType::StrongBuy => "STRONG_BUY",
        DecisionType::Buy => "BUY",
        DecisionType::Hold => "HOLD",
        DecisionType::Reduce => "REDUCE",
        DecisionType::Sell => "SELL",
        DecisionType::StrongSell => "STRONG_SELL",
    }
}

fn decision_type_from_str(s: &str) -> DecisionType {
    match s {
        "STRONG_BUY" => DecisionType::StrongBuy,
        "BUY" => DecisionType::Buy,
        "REDUCE" => DecisionType::Reduce,
        "SELL" => DecisionType::Sell,
        "STRONG_SELL" => DecisionType::StrongSell,
        _ => DecisionType::Hold,
    }
}

fn outcome_category_to_str(c: OutcomeCategory) -> &'static str {
    match c {
        OutcomeCategory::Profit => "profit",
        OutcomeCategory::Loss => "loss",
        OutcomeCategory::Breakeven => "breakeven",
    }
}

fn outcome_category_from_str(s: &str) -> Option<OutcomeCategory> {
    match s {
        "profit" => Some(OutcomeCategory::Profit),
        "loss" => Some(OutcomeCategory::Loss),
        "breakeven" => Some(OutcomeCategory::Breakeven),
        _ => None,
    }
}

/// Similarity-indexed store of prior `(situation -> recommendation ->
/// outcome)` records, keyed by `(ticker, decision_date)`.
///
/// When `embedder` is `None` the store runs in disabled mode: all reads
/// return empty results and all writes return a placeholder id, the same
/// capability-flag behaviour the original falls back to when no usable
/// embedding credential is configured. The run must complete normally either
/// way.
pub struct DecisionMemoryStore {
    pool: AnyPool,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl DecisionMemoryStore {
    pub fn new(pool: AnyPool, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { pool, embedder }
    }

    pub fn is_disabled(&self) -> bool {
        self.embedder.is_none()
    }

    pub async fn init_schema(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decision_records (
                record_id TEXT PRIMARY KEY,
                ticker TEXT NOT NULL,
                decision_date TEXT NOT NULL,
                situation TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                decision_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                embedding TEXT NOT NULL,
                outcome_updated INTEGER NOT NULL DEFAULT 0,
                actual_return REAL,
                days_held INTEGER,
                outcome_category TEXT,
                exit_date TEXT,
                exit_reason TEXT,
                created_at TEXT NOT NULL,
                outcome_updated_at TEXT,
                UNIQUE(ticker, decision_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_existing_record_id(&self, ticker: &str, decision_date: &str) -> Result<Option<String>, MemoryError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT record_id FROM decision_records WHERE ticker = ? AND decision_date = ?",
        )
        .bind(ticker)
        .bind(decision_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Inserts a new record or, if `(ticker, decision_date)` already exists,
    /// overwrites it in place. Returns the record id.
    pub async fn add_or_update(&self, record: &DecisionRecord) -> Result<String, MemoryError> {
        let Some(embedder) = &self.embedder else {
            info!("memory store disabled, skipping add_or_update");
            return Ok(format!("{}_{}_disabled", record.ticker, record.decision_date));
        };

        let embedding = embed_chunked(embedder.as_ref(), &record.situation).await?;
        let embedding_json = serde_json::to_string(&embedding).map_err(|e| MemoryError::Other(e.to_string()))?;

        let existing = self.find_existing_record_id(&record.ticker, &record.decision_date).await?;
        let record_id = existing.clone().unwrap_or_else(|| record.record_id.clone());

        if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE decision_records SET
                    situation = ?, recommendation = ?, decision_type = ?, confidence = ?,
                    embedding = ?, created_at = ?
                WHERE record_id = ?
                "#,
            )
            .bind(&record.situation)
            .bind(&record.recommendation)
            .bind(decision_type_to_str(record.decision_type))
            .bind(record.confidence)
            .bind(&embedding_json)
            .bind(record.created_at.to_rfc3339())
            .bind(&record_id)
            .execute(&self.pool)
            .await?;
            info!(record_id, "updated existing decision record for same-day ticker");
        } else {
            sqlx::query(
                r#"
                INSERT INTO decision_records (
                    record_id, ticker, decision_date, situation, recommendation,
                    decision_type, confidence, embedding, outcome_updated, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(&record_id)
            .bind(&record.ticker)
            .bind(&record.decision_date)
            .bind(&record.situation)
            .bind(&record.recommendation)
            .bind(decision_type_to_str(record.decision_type))
            .bind(record.confidence)
            .bind(&embedding_json)
            .bind(record.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
            info!(record_id, "inserted new decision record");
        }

        Ok(record_id)
    }

    async fn all_rows(&self) -> Result<Vec<RecordRow>, MemoryError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT record_id, ticker, decision_date, situation, recommendation,
                   decision_type, confidence, embedding, outcome_updated,
                   actual_return, days_held, outcome_category, exit_date,
                   exit_reason, created_at, outcome_updated_at
            FROM decision_records
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    fn row_to_match(row: &RecordRow, similarity: f32) -> MemoryMatch {
        MemoryMatch {
            matched_situation: row.situation.clone(),
            recommendation: row.recommendation.clone(),
            similarity_score: similarity,
            ticker: row.ticker.clone(),
            decision_date: row.decision_date.clone(),
            decision_type: decision_type_from_str(&row.decision_type),
            confidence: row.confidence,
            actual_return: row.actual_return,
            outcome_category: row.outcome_category.as_deref().and_then(outcome_category_from_str),
            outcome_updated: row.outcome_updated,
        }
    }

    /// Finds the `n` most similar records to `situation`, never returning a
    /// record whose `decision_date` equals `exclude_date`.
    pub async fn query(
        &self,
        situation: &str,
        n: usize,
        exclude_date: Option<&str>,
    ) -> Result<Vec<MemoryMatch>, MemoryError> {
        self.query_filtered(situation, n, exclude_date, None).await
    }

    /// Same as `query`, additionally restricted to `outcome_category ==
    /// outcome_filter`. Over-fetches and filters in-process so a sparse
    /// outcome category never starves below `n` unnecessarily.
    pub async fn query_by_outcome(
        &self,
        situation: &str,
        outcome_filter: OutcomeCategory,
        n: usize,
    ) -> Result<Vec<MemoryMatch>, MemoryError> {
        self.query_filtered(situation, n, None, Some(outcome_filter)).await
    }

    async fn query_filtered(
        &self,
        situation: &str,
        n: usize,
        exclude_date: Option<&str>,
        outcome_filter: Option<OutcomeCategory>,
    ) -> Result<Vec<MemoryMatch>, MemoryError> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };

        let query_embedding = embed_chunked(embedder.as_ref(), situation).await?;
        let rows = self.all_rows().await?;

        let mut scored: Vec<(f32, &RecordRow)> = rows
            .iter()
            .filter(|r| exclude_date.map(|d| r.decision_date != d).unwrap_or(true))
            .filter(|r| {
                outcome_filter
                    .map(|f| r.outcome_category.as_deref() == Some(outcome_category_to_str(f)))
                    .unwrap_or(true)
            })
            .filter_map(|r| {
                let emb: Vec<f32> = serde_json::from_str(&r.embedding).ok()?;
                Some((cosine_similarity(&query_embedding, &emb), r))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n);

        Ok(scored.into_iter().map(|(sim, row)| Self::row_to_match(row, sim)).collect())
    }

    /// Finds the most recent prior decision recorded for `ticker`, excluding
    /// `exclude_date`, by lexicographic (== chronological for `YYYY-MM-DD`)
    /// comparison of `decision_date`. Feeds the consolidation stage's
    /// historical-decision reflection block.
    pub async fn latest_decision_for_ticker(
        &self,
        ticker: &str,
        exclude_date: &str,
    ) -> Result<Option<MemoryMatch>, MemoryError> {
        if self.is_disabled() {
            return Ok(None);
        }

        let rows = self.all_rows().await?;
        let latest = rows
            .iter()
            .filter(|r| r.ticker == ticker && r.decision_date != exclude_date)
            .max_by(|a, b| a.decision_date.cmp(&b.decision_date));

        Ok(latest.map(|row| Self::row_to_match(row, 1.0)))
    }

    /// Updates a record's realised outcome, deriving `outcome_category` from
    /// the ±0.5% thresholds.
    pub async fn update_outcome(
        &self,
        record_id: &str,
        actual_return: f64,
        days_held: u32,
        exit_date: Option<&str>,
        exit_reason: Option<&str>,
    ) -> Result<(), MemoryError> {
        if self.is_disabled() {
            return Ok(());
        }

        let category = OutcomeCategory::from_return(actual_return);
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE decision_records SET
                outcome_updated = 1, actual_return = ?, days_held = ?,
                outcome_category = ?, exit_date = COALESCE(?, exit_date),
                exit_reason = COALESCE(?, exit_reason), outcome_updated_at = ?
            WHERE record_id = ?
            "#,
        )
        .bind(actual_return)
        .bind(days_held as i64)
        .bind(outcome_category_to_str(category))
        .bind(exit_date)
        .bind(exit_reason)
        .bind(&now)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFound(record_id.to_string()));
        }
        Ok(())
    }

    /// Paired successes/failures query, used to ground debate prompts with
    /// concrete win/loss precedent.
    pub async fn lessons_learned(
        &self,
        situation: &str,
        n_succ: usize,
        n_fail: usize,
    ) -> Result<(Vec<MemoryMatch>, Vec<MemoryMatch>), MemoryError> {
        let successes = self.query_by_outcome(situation, OutcomeCategory::Profit, n_succ).await?;
        let failures = self.query_by_outcome(situation, OutcomeCategory::Loss, n_fail).await?;
        Ok((successes, failures))
    }

    pub async fn performance_stats(
        &self,
        ticker: Option<&str>,
        decision_type: Option<DecisionType>,
    ) -> Result<PerformanceStats, MemoryError> {
        if self.is_disabled() {
            return Ok(PerformanceStats::default());
        }

        let rows = self.all_rows().await?;
        let mut stats = PerformanceStats::default();
        let mut returns = Vec::new();
        let mut days_held_list = Vec::new();

        for row in rows.iter() {
            if let Some(t) = ticker {
                if row.ticker != t {
                    continue;
                }
            }
            if let Some(dt) = decision_type {
                if decision_type_from_str(&row.decision_type) != dt {
                    continue;
                }
            }

            stats.total_decisions += 1;

            if row.outcome_updated {
                stats.decisions_with_outcome += 1;
                let ret = row.actual_return.unwrap_or(0.0);
                returns.push(ret);
                if let Some(days) = row.days_held {
                    days_held_list.push(days as f64);
                }
                match row.outcome_category.as_deref().and_then(outcome_category_from_str) {
                    Some(OutcomeCategory::Profit) => stats.profit_count += 1,
                    Some(OutcomeCategory::Loss) => stats.loss_count += 1,
                    _ => stats.breakeven_count += 1,
                }
            }
        }

        if !returns.is_empty() {
            stats.total_return = returns.iter().sum();
            stats.avg_return = stats.total_return / returns.len() as f64;
            stats.best_return = returns.iter().cloned().fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))));
            stats.worst_return = returns.iter().cloned().fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))));
            stats.win_rate = if stats.decisions_with_outcome > 0 {
                stats.profit_count as f64 / stats.decisions_with_outcome as f64 * 100.0
            } else {
                0.0
            };
        }
        if !days_held_list.is_empty() {
            stats.avg_days_held = days_held_list.iter().sum::<f64>() / days_held_list.len() as f64;
        }

        Ok(stats)
    }

    /// Age-based purge, never dropping below `keep_min` retained records.
    pub async fn cleanup(&self, max_age_days: i64, keep_min: usize) -> Result<(u64, u64), MemoryError> {
        if self.is_disabled() {
            return Ok((0, 0));
        }

        let rows = self.all_rows().await?;
        let total_before = rows.len();
        if total_before <= keep_min {
            return Ok((total_before as u64, 0));
        }

        let cutoff = Utc::now() - Duration::days(max_age_days);
        let max_deletable = total_before - keep_min;

        let mut candidates: Vec<&RecordRow> = rows
            .iter()
            .filter(|r| {
                r.created_at
                    .parse::<DateTime<Utc>>()
                    .map(|d| d < cutoff)
                    .unwrap_or(false)
            })
            .collect();
        candidates.truncate(max_deletable);

        let mut deleted = 0u64;
        for row in candidates {
            sqlx::query("DELETE FROM decision_records WHERE record_id = ?")
                .bind(&row.record_id)
                .execute(&self.pool)
                .await?;
            deleted += 1;
        }

        if deleted > 0 {
            info!(deleted, "purged expired decision records");
        }

        Ok((total_before as u64, deleted))
    }

    pub async fn health_check(&self) -> HealthCheck {
        if self.is_disabled() {
            return HealthCheck {
                status: HealthStatus::Disabled,
                record_count: 0,
                embedding_ok: false,
                warnings: vec!["memory store disabled: no embedding provider configured".to_string()],
                errors: Vec::new(),
            };
        }

        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let count = match self.all_rows().await {
            Ok(rows) => rows.len() as u64,
            Err(e) => {
                errors.push(format!("record count query failed: {e}"));
                0
            }
        };
        if count == 0 {
            warnings.push("store is empty, no historical records yet".to_string());
        } else if count > 10_000 {
            warnings.push(format!("record count is large ({count}), query performance may degrade"));
        }

        let embedding_ok = match &self.embedder {
            Some(embedder) => embedder.embed_one("health check probe text").await.is_ok(),
            None => false,
        };
        if !embedding_ok {
            errors.push("embedding service probe failed".to_string());
        }

        let status = if !errors.is_empty() {
            HealthStatus::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthCheck { status, record_count: count, embedding_ok, warnings, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use ashare_core::DecisionType;

    async fn test_store() -> DecisionMemoryStore {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let store = DecisionMemoryStore::new(pool, Some(Arc::new(HashEmbeddingProvider::new(32))));
        store.init_schema().await.unwrap();
        store
    }

    fn sample_record(ticker: &str, date: &str, situation: &str) -> DecisionRecord {
        DecisionRecord {
            record_id: format!("{ticker}_{date}_0"),
            ticker: ticker.to_string(),
            decision_date: date.to_string(),
            situation: situation.to_string(),
            recommendation: "建议买入".to_string(),
            decision_type: DecisionType::Buy,
            confidence: 0.75,
            outcome_updated: false,
            actual_return: None,
            days_held: None,
            outcome_category: None,
            exit_date: None,
            exit_reason: None,
            created_at: Utc::now(),
            outcome_updated_at: None,
            extra_context: Default::default(),
        }
    }

    #[tokio::test]
    async fn add_or_update_is_idempotent_for_same_ticker_and_date() {
        let store = test_store().await;
        let id1 = store.add_or_update(&sample_record("600036", "2024-06-01", "市场震荡")).await.unwrap();
        let id2 = store
            .add_or_update(&sample_record("600036", "2024-06-01", "市场震荡偏强"))
            .await
            .unwrap();
        assert_eq!(id1, id2);

        let rows = store.all_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].situation, "市场震荡偏强");
    }

    #[tokio::test]
    async fn query_excludes_given_decision_date() {
        let store = test_store().await;
        store.add_or_update(&sample_record("600036", "2024-06-01", "市场震荡")).await.unwrap();
        store.add_or_update(&sample_record("600036", "2024-07-01", "市场震荡")).await.unwrap();

        let results = store.query("市场震荡", 10, Some("2024-06-01")).await.unwrap();
        assert!(results.iter().all(|r| r.decision_date != "2024-06-01"));
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn update_outcome_categorizes_by_threshold() {
        let store = test_store().await;
        let id = store.add_or_update(&sample_record("600036", "2024-06-01", "市场震荡")).await.unwrap();

        store.update_outcome(&id, 5.2, 10, Some("2024-06-11"), Some("目标达成")).await.unwrap();
        let stats = store.performance_stats(Some("600036"), None).await.unwrap();
        assert_eq!(stats.profit_count, 1);
        assert_eq!(stats.decisions_with_outcome, 1);
    }

    #[tokio::test]
    async fn latest_decision_for_ticker_excludes_current_date_and_picks_most_recent() {
        let store = test_store().await;
        store.add_or_update(&sample_record("600036", "2024-03-01", "一季度")).await.unwrap();
        store.add_or_update(&sample_record("600036", "2024-06-01", "二季度")).await.unwrap();
        store.add_or_update(&sample_record("000001", "2024-07-01", "别的票")).await.unwrap();

        let latest = store.latest_decision_for_ticker("600036", "2024-09-01").await.unwrap().unwrap();
        assert_eq!(latest.decision_date, "2024-06-01");

        let excluded = store.latest_decision_for_ticker("600036", "2024-06-01").await.unwrap().unwrap();
        assert_eq!(excluded.decision_date, "2024-03-01");
    }

    #[tokio::test]
    async fn cleanup_never_drops_below_keep_min() {
        let store = test_store().await;
        for i in 0..5 {
            store
                .add_or_update(&sample_record("600036", &format!("2020-01-0{i}"), "旧记录"))
                .await
                .unwrap();
        }
        let (before, deleted) = store.cleanup(1, 3).await.unwrap();
        assert_eq!(before, 5);
        assert!(deleted <= 2);
    }
}
