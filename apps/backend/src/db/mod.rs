//! PostgreSQL database operations

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;

const PROGRESS_COLUMNS: &str = "owner_id, day, video_watched, podcast_listened, words_reviewed, \
    article_read, video_content_id, podcast_content_id, words_content_id, article_content_id, \
    progress_percent, completed_at";

/// UTC bounds `[start, end)` of a calendar day.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::default()).and_utc();
    (start, start + Duration::days(1))
}

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // === Owner Repository ===

    /// Create a new owner with generated token
    pub async fn create_owner(&self, name: Option<&str>) -> Result<Owner> {
        let token = Uuid::new_v4().to_string();
        let owner = sqlx::query_as::<_, Owner>(
            r#"
            INSERT INTO owners (token, name)
            VALUES ($1, $2)
            RETURNING id, token, name, created_at, last_seen_at
            "#,
        )
        .bind(&token)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(owner)
    }

    /// Get owner by token
    pub async fn get_owner_by_token(&self, token: &str) -> Result<Option<Owner>> {
        let owner = sqlx::query_as::<_, Owner>(
            r#"
            SELECT id, token, name, created_at, last_seen_at
            FROM owners
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    /// Update owner last_seen_at timestamp
    pub async fn update_last_seen(&self, owner_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE owners
            SET last_seen_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === Flashcard Repository ===

    /// Insert a new card
    pub async fn insert_card(&self, card: &DbFlashCard) -> Result<DbFlashCard> {
        let card = sqlx::query_as::<_, DbFlashCard>(
            r#"
            INSERT INTO flashcards (id, owner_id, front, back, box_number, next_review_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, owner_id, front, back, box_number, next_review_at, created_at
            "#,
        )
        .bind(card.id)
        .bind(card.owner_id)
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.box_number)
        .bind(card.next_review_at)
        .bind(card.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(card)
    }

    /// Get card by ID, regardless of owner
    pub async fn get_card(&self, card_id: Uuid) -> Result<Option<DbFlashCard>> {
        let card = sqlx::query_as::<_, DbFlashCard>(
            r#"
            SELECT id, owner_id, front, back, box_number, next_review_at, created_at
            FROM flashcards
            WHERE id = $1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    /// Get cards due at or before `now`
    pub async fn get_due_cards(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Vec<DbFlashCard>> {
        let cards = sqlx::query_as::<_, DbFlashCard>(
            r#"
            SELECT id, owner_id, front, back, box_number, next_review_at, created_at
            FROM flashcards
            WHERE owner_id = $1 AND next_review_at <= $2
            ORDER BY next_review_at, created_at
            "#,
        )
        .bind(owner_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    /// Write a new schedule only if the card still holds the schedule that was read.
    ///
    /// Returns false when another writer got there first.
    pub async fn update_card_schedule(
        &self,
        card: &DbFlashCard,
        box_number: i32,
        next_review_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE flashcards
            SET box_number = $1, next_review_at = $2
            WHERE id = $3 AND owner_id = $4 AND box_number = $5 AND next_review_at = $6
            "#,
        )
        .bind(box_number)
        .bind(next_review_at)
        .bind(card.id)
        .bind(card.owner_id)
        .bind(card.box_number)
        .bind(card.next_review_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete the listed cards that belong to `owner_id`; other ids are ignored
    pub async fn delete_cards(&self, owner_id: Uuid, card_ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM flashcards
            WHERE owner_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(owner_id)
        .bind(card_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // === Activity Event Repository ===

    /// Append an activity event
    pub async fn insert_event(&self, event: &DbActivityEvent) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO activity_events (id, owner_id, activity_type, content_id,
                                         duration_seconds, pathname, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(event.id)
        .bind(event.owner_id)
        .bind(&event.activity_type)
        .bind(&event.content_id)
        .bind(event.duration_seconds)
        .bind(&event.pathname)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Get unconsumed events for an owner's calendar day
    pub async fn get_unconsumed_events(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<DbActivityEvent>> {
        let (start, end) = day_bounds(day);
        let events = sqlx::query_as::<_, DbActivityEvent>(
            r#"
            SELECT id, owner_id, activity_type, content_id, duration_seconds,
                   pathname, created_at, consumed, consumed_at
            FROM activity_events
            WHERE owner_id = $1 AND consumed = FALSE
              AND created_at >= $2 AND created_at < $3
            ORDER BY created_at, id
            "#,
        )
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    // === Daily Progress Repository ===

    /// Get the progress row for an owner's day
    pub async fn get_daily_progress(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> Result<Option<DbDailyProgress>> {
        let progress = sqlx::query_as::<_, DbDailyProgress>(&format!(
            "SELECT {} FROM daily_progress WHERE owner_id = $1 AND day = $2",
            PROGRESS_COLUMNS
        ))
        .bind(owner_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    /// Commit one aggregation run: consume events and merge the progress row
    /// in a single transaction.
    ///
    /// Returns `None` (and writes nothing) if some of the events were consumed
    /// by another run in the meantime.
    pub async fn commit_aggregation(
        &self,
        progress: &DailyProgress,
        consumed_event_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Option<DbDailyProgress>> {
        let mut tx = self.pool.begin().await?;

        if !consumed_event_ids.is_empty() {
            let result = sqlx::query(
                r#"
                UPDATE activity_events
                SET consumed = TRUE, consumed_at = $2
                WHERE id = ANY($1) AND consumed = FALSE
                "#,
            )
            .bind(consumed_event_ids)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != consumed_event_ids.len() as u64 {
                tx.rollback().await?;
                return Ok(None);
            }
        }

        // Flags are OR-merged so a row never loses an achieved type.
        let merged = sqlx::query_as::<_, DbDailyProgress>(&format!(
            r#"
            INSERT INTO daily_progress (owner_id, day, video_watched, podcast_listened,
                                        words_reviewed, article_read, video_content_id,
                                        podcast_content_id, words_content_id, article_content_id,
                                        progress_percent, completed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (owner_id, day) DO UPDATE SET
                video_watched = daily_progress.video_watched OR EXCLUDED.video_watched,
                podcast_listened = daily_progress.podcast_listened OR EXCLUDED.podcast_listened,
                words_reviewed = daily_progress.words_reviewed OR EXCLUDED.words_reviewed,
                article_read = daily_progress.article_read OR EXCLUDED.article_read,
                video_content_id = COALESCE(EXCLUDED.video_content_id, daily_progress.video_content_id),
                podcast_content_id = COALESCE(EXCLUDED.podcast_content_id, daily_progress.podcast_content_id),
                words_content_id = COALESCE(EXCLUDED.words_content_id, daily_progress.words_content_id),
                article_content_id = COALESCE(EXCLUDED.article_content_id, daily_progress.article_content_id),
                progress_percent = 25 * (
                    (daily_progress.video_watched OR EXCLUDED.video_watched)::int
                    + (daily_progress.podcast_listened OR EXCLUDED.podcast_listened)::int
                    + (daily_progress.words_reviewed OR EXCLUDED.words_reviewed)::int
                    + (daily_progress.article_read OR EXCLUDED.article_read)::int
                ),
                completed_at = COALESCE(
                    daily_progress.completed_at,
                    EXCLUDED.completed_at,
                    CASE WHEN (daily_progress.video_watched OR EXCLUDED.video_watched)
                          AND (daily_progress.podcast_listened OR EXCLUDED.podcast_listened)
                          AND (daily_progress.words_reviewed OR EXCLUDED.words_reviewed)
                          AND (daily_progress.article_read OR EXCLUDED.article_read)
                         THEN EXCLUDED.updated_at END
                ),
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            PROGRESS_COLUMNS
        ))
        .bind(progress.owner_id)
        .bind(progress.day)
        .bind(progress.video_watched)
        .bind(progress.podcast_listened)
        .bind(progress.words_reviewed)
        .bind(progress.article_read)
        .bind(&progress.video_content_id)
        .bind(&progress.podcast_content_id)
        .bind(&progress.words_content_id)
        .bind(&progress.article_content_id)
        .bind(i32::from(progress.progress_percent))
        .bind(progress.completed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(merged))
    }
}
