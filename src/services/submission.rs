use chrono::{Duration, NaiveDate};
use libsql::{params, Value};
use rand::seq::SliceRandom;
use rand::Rng;
use teloxide::types::UserId;

use crate::storage::{DbClient, StorageError};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Submission {0} not found")]
    NotFound(i64),
    #[error("Submission {0} is not pending")]
    NotPending(i64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SubmissionStatus::Pending),
            "approved" => Some(SubmissionStatus::Approved),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub text: String,
    pub submitted_by: UserId,
    pub status: SubmissionStatus,
    pub schedule_date: Option<NaiveDate>,
}

/// Moderated motivation pipeline. Status moves exactly once from `pending` to
/// `approved` or `rejected`; the transition is a conditional update so a
/// second moderation action can never overwrite the first.
#[derive(Clone)]
pub struct SubmissionService {
    db: DbClient,
}

impl SubmissionService {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    pub async fn create(&self, text: &str, submitted_by: UserId) -> Result<i64, SubmissionError> {
        let conn = self.db.get_connection().await?;
        conn.execute(
            "INSERT INTO motivations (text, submitted_by, status) VALUES (?1, ?2, 'pending')",
            params![text, submitted_by.0 as i64],
        )
        .await
        .map_err(StorageError::from)?;
        Ok(conn.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Submission>, SubmissionError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, text, submitted_by, status, schedule_date FROM motivations WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(StorageError::from)?;

        match rows.next().await.map_err(StorageError::from)? {
            Some(row) => Ok(Some(row_to_submission(&row)?)),
            None => Ok(None),
        }
    }

    /// Approve for immediate delivery; the item stays in the daily pool since
    /// no schedule date is set.
    pub async fn approve(&self, id: i64) -> Result<Submission, SubmissionError> {
        self.transition(id, SubmissionStatus::Approved, None).await?;
        self.get(id).await?.ok_or(SubmissionError::NotFound(id))
    }

    pub async fn reject(&self, id: i64) -> Result<(), SubmissionError> {
        self.transition(id, SubmissionStatus::Rejected, None).await
    }

    pub async fn schedule(&self, id: i64, days: i64, today: NaiveDate) -> Result<NaiveDate, SubmissionError> {
        let date = today + Duration::days(days);
        self.transition(id, SubmissionStatus::Approved, Some(date)).await?;
        Ok(date)
    }

    async fn transition(
        &self,
        id: i64,
        status: SubmissionStatus,
        schedule_date: Option<NaiveDate>,
    ) -> Result<(), SubmissionError> {
        let conn = self.db.get_connection().await?;

        // Conditional update keeps the transition monotonic even if two
        // moderators press buttons concurrently.
        let changed = match schedule_date {
            Some(date) => {
                conn.execute(
                    "UPDATE motivations SET status = ?2, schedule_date = ?3 WHERE id = ?1 AND status = 'pending'",
                    params![id, status.as_str(), date.format(DATE_FORMAT).to_string()],
                )
                .await
            }
            None => {
                conn.execute(
                    "UPDATE motivations SET status = ?2 WHERE id = ?1 AND status = 'pending'",
                    params![id, status.as_str()],
                )
                .await
            }
        }
        .map_err(StorageError::from)?;

        if changed > 0 {
            return Ok(());
        }
        match self.get(id).await? {
            Some(_) => Err(SubmissionError::NotPending(id)),
            None => Err(SubmissionError::NotFound(id)),
        }
    }

    /// Approved items with no schedule date are eligible every day; scheduled
    /// items only on their day. Delivery never mutates status, so repeats
    /// across days are expected.
    pub async fn daily_pool(&self, today: NaiveDate) -> Result<Vec<Submission>, SubmissionError> {
        let conn = self.db.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT id, text, submitted_by, status, schedule_date FROM motivations
                 WHERE status = 'approved' AND (schedule_date IS NULL OR schedule_date = ?1)
                 ORDER BY id",
                params![today.format(DATE_FORMAT).to_string()],
            )
            .await
            .map_err(StorageError::from)?;

        let mut pool = Vec::new();
        while let Some(row) = rows.next().await.map_err(StorageError::from)? {
            pool.push(row_to_submission(&row)?);
        }
        Ok(pool)
    }
}

/// Uniform, independent draw; no rotation or exhaustion tracking.
pub fn pick_daily<'a, R: Rng>(pool: &'a [Submission], rng: &mut R) -> Option<&'a Submission> {
    pool.choose(rng)
}

fn row_to_submission(row: &libsql::Row) -> Result<Submission, SubmissionError> {
    let status_text = row.get::<String>(3).map_err(StorageError::from)?;
    let status = SubmissionStatus::parse(&status_text)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown submission status {status_text:?}")))?;

    let schedule_date = match row.get_value(4).map_err(StorageError::from)? {
        Value::Null => None,
        Value::Text(text) => Some(
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map_err(|_| StorageError::Corrupt(format!("bad schedule date {text:?}")))?,
        ),
        other => return Err(StorageError::Corrupt(format!("bad schedule date {other:?}")).into()),
    };

    Ok(Submission {
        id: row.get::<i64>(0).map_err(StorageError::from)?,
        text: row.get::<String>(1).map_err(StorageError::from)?,
        submitted_by: UserId(row.get::<i64>(2).map_err(StorageError::from)? as u64),
        status,
        schedule_date,
    })
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    async fn service() -> SubmissionService {
        let db = DbClient::open_in_memory().await.unwrap();
        SubmissionService::new(db)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn submission_starts_pending_with_provenance() {
        let submissions = service().await;
        let id = submissions.create("Never give up", UserId(42)).await.unwrap();

        let stored = submissions.get(id).await.unwrap().unwrap();
        assert_eq!(stored.text, "Never give up");
        assert_eq!(stored.submitted_by, UserId(42));
        assert_eq!(stored.status, SubmissionStatus::Pending);
        assert_eq!(stored.schedule_date, None);
    }

    #[tokio::test]
    async fn approve_is_single_shot() {
        let submissions = service().await;
        let id = submissions.create("Never give up", UserId(42)).await.unwrap();

        let approved = submissions.approve(id).await.unwrap();
        assert_eq!(approved.status, SubmissionStatus::Approved);
        assert_eq!(approved.schedule_date, None);

        assert!(matches!(
            submissions.approve(id).await,
            Err(SubmissionError::NotPending(found)) if found == id
        ));
        assert!(matches!(submissions.reject(id).await, Err(SubmissionError::NotPending(_))));
        assert!(matches!(
            submissions.schedule(id, 1, today()).await,
            Err(SubmissionError::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn reject_is_final() {
        let submissions = service().await;
        let id = submissions.create("text", UserId(1)).await.unwrap();

        submissions.reject(id).await.unwrap();
        assert_eq!(
            submissions.get(id).await.unwrap().unwrap().status,
            SubmissionStatus::Rejected
        );
        assert!(matches!(submissions.approve(id).await, Err(SubmissionError::NotPending(_))));
    }

    #[tokio::test]
    async fn schedule_sets_future_date() {
        let submissions = service().await;
        let id = submissions.create("text", UserId(1)).await.unwrap();

        let date = submissions.schedule(id, 2, today()).await.unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());

        let stored = submissions.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Approved);
        assert_eq!(stored.schedule_date, Some(date));
    }

    #[tokio::test]
    async fn unknown_id_is_reported_as_not_found() {
        let submissions = service().await;
        assert!(matches!(submissions.approve(99).await, Err(SubmissionError::NotFound(99))));
        assert_eq!(submissions.get(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn daily_pool_filters_by_status_and_date() {
        let submissions = service().await;

        let unscheduled = submissions.create("unscheduled", UserId(1)).await.unwrap();
        submissions.approve(unscheduled).await.unwrap();

        let due_today = submissions.create("due today", UserId(1)).await.unwrap();
        submissions.schedule(due_today, 0, today()).await.unwrap();

        let due_later = submissions.create("due later", UserId(1)).await.unwrap();
        submissions.schedule(due_later, 3, today()).await.unwrap();

        let rejected = submissions.create("rejected", UserId(1)).await.unwrap();
        submissions.reject(rejected).await.unwrap();

        submissions.create("still pending", UserId(1)).await.unwrap();

        let pool = submissions.daily_pool(today()).await.unwrap();
        let ids: Vec<i64> = pool.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![unscheduled, due_today]);
    }

    #[tokio::test]
    async fn unscheduled_approved_item_stays_eligible_every_day() {
        let submissions = service().await;
        let id = submissions.create("forever", UserId(1)).await.unwrap();
        submissions.approve(id).await.unwrap();

        for offset in 0..5 {
            let day = today() + Duration::days(offset);
            let pool = submissions.daily_pool(day).await.unwrap();
            assert_eq!(pool.len(), 1, "day offset {offset}");
            assert_eq!(pool[0].id, id);
        }
    }

    #[tokio::test]
    async fn single_candidate_is_picked_with_probability_one() {
        let submissions = service().await;
        let id = submissions.create("Never give up", UserId(1)).await.unwrap();
        submissions.approve(id).await.unwrap();

        let pool = submissions.daily_pool(today()).await.unwrap();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pick = pick_daily(&pool, &mut rng).unwrap();
            assert_eq!(pick.text, "Never give up");
        }
    }

    #[tokio::test]
    async fn two_candidates_split_draws_evenly() {
        let submissions = service().await;
        for text in ["first", "second"] {
            let id = submissions.create(text, UserId(1)).await.unwrap();
            submissions.approve(id).await.unwrap();
        }
        let pool = submissions.daily_pool(today()).await.unwrap();

        let mut rng = StdRng::seed_from_u64(1337);
        let mut first = 0usize;
        for _ in 0..1000 {
            if pick_daily(&pool, &mut rng).unwrap().text == "first" {
                first += 1;
            }
        }
        // Uniform draw: expect roughly 500 of 1000.
        assert!((400..=600).contains(&first), "observed {first} of 1000");
    }

    #[tokio::test]
    async fn empty_pool_yields_no_pick() {
        let pool: Vec<Submission> = Vec::new();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pick_daily(&pool, &mut rng).is_none());
    }
}
