//! `SQLite` implementation of the `QueueRepository` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use gamedock_core::{
    EntryId, EntryStatus, NewQueueEntry, QueueEntry, QueueRepository, RepositoryError,
    TransferProgress, Transition,
};

use super::row_mappers::{ENTRY_SELECT_COLUMNS, format_datetime, row_to_entry, storage};

/// `SQLite` implementation of the `QueueRepository` trait.
///
/// Writes are serialized through an in-process lock and run inside a
/// transaction, so a status check and the update that depends on it are
/// one atomic step. Reads go straight to the pool.
pub struct SqliteQueueRepository {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteQueueRepository {
    /// Create a new `SQLite` queue repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    async fn fetch_entry(&self, id: EntryId) -> Result<Option<QueueEntry>, RepositoryError> {
        let sql = format!("SELECT {ENTRY_SELECT_COLUMNS} FROM queue_entries WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_entry).transpose()
    }
}

/// Map an insert/update error, turning open-resource uniqueness into `AlreadyExists`.
fn write_error(e: sqlx::Error, resource_id: &str) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::AlreadyExists(
            format!("open queue entry for resource '{resource_id}'"),
        ),
        _ => storage(e),
    }
}

async fn current_status(
    tx: &mut Transaction<'_, Sqlite>,
    id: EntryId,
) -> Result<Option<(EntryStatus, String)>, RepositoryError> {
    let row = sqlx::query("SELECT status, resource_id FROM queue_entries WHERE id = ?")
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?;

    row.map(|r| {
        let status: String = r.try_get("status").map_err(storage)?;
        let resource_id: String = r.try_get("resource_id").map_err(storage)?;
        EntryStatus::parse(&status)
            .map(|s| (s, resource_id))
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown status '{status}'")))
    })
    .transpose()
}

async fn entry_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: EntryId,
) -> Result<QueueEntry, RepositoryError> {
    let sql = format!("SELECT {ENTRY_SELECT_COLUMNS} FROM queue_entries WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut **tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| RepositoryError::NotFound(format!("queue entry {id}")))?;
    row_to_entry(&row)
}

async fn next_position(tx: &mut Transaction<'_, Sqlite>) -> Result<i64, RepositoryError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(queue_position), 0) + 1 AS next FROM queue_entries WHERE status = 'queued'",
    )
    .fetch_one(&mut **tx)
    .await
    .map_err(storage)?;
    row.try_get("next").map_err(storage)
}

async fn queued_ids(tx: &mut Transaction<'_, Sqlite>) -> Result<Vec<i64>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id FROM queue_entries WHERE status = 'queued' ORDER BY queue_position ASC, id ASC",
    )
    .fetch_all(&mut **tx)
    .await
    .map_err(storage)?;
    rows.iter()
        .map(|r| r.try_get::<i64, _>("id").map_err(storage))
        .collect()
}

/// Write positions 1..=n in the given order.
async fn write_positions(
    tx: &mut Transaction<'_, Sqlite>,
    ordered: &[i64],
) -> Result<(), RepositoryError> {
    for (index, id) in ordered.iter().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let position = index as i64 + 1;
        sqlx::query("UPDATE queue_entries SET queue_position = ? WHERE id = ? AND status = 'queued'")
            .bind(position)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
    }
    Ok(())
}

/// Close gaps left by an entry that stopped being queued.
async fn compact_positions(tx: &mut Transaction<'_, Sqlite>) -> Result<(), RepositoryError> {
    let ids = queued_ids(tx).await?;
    write_positions(tx, &ids).await
}

#[async_trait]
impl QueueRepository for SqliteQueueRepository {
    async fn insert(&self, entry: &NewQueueEntry) -> Result<QueueEntry, RepositoryError> {
        let image_refs = serde_json::to_string(&entry.metadata.image_refs)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let position = next_position(&mut tx).await?;
        #[allow(clippy::cast_possible_wrap)]
        let result = sqlx::query(
            r#"
            INSERT INTO queue_entries (
                resource_id, title, size_hint, image_refs, status, queue_position, created_at
            ) VALUES (?, ?, ?, ?, 'queued', ?, ?)
            "#,
        )
        .bind(&entry.resource_id)
        .bind(&entry.metadata.title)
        .bind(entry.metadata.size_hint.map(|v| v as i64))
        .bind(&image_refs)
        .bind(position)
        .bind(format_datetime(Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, &entry.resource_id))?;

        let inserted = entry_in_tx(&mut tx, EntryId::new(result.last_insert_rowid())).await?;
        tx.commit().await.map_err(storage)?;
        drop(guard);

        Ok(inserted)
    }

    async fn get(&self, id: EntryId) -> Result<QueueEntry, RepositoryError> {
        self.fetch_entry(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("queue entry {id}")))
    }

    async fn list(&self) -> Result<Vec<QueueEntry>, RepositoryError> {
        let sql = format!("SELECT {ENTRY_SELECT_COLUMNS} FROM queue_entries ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn list_by_status(
        &self,
        status: EntryStatus,
    ) -> Result<Vec<QueueEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {ENTRY_SELECT_COLUMNS} FROM queue_entries WHERE status = ? \
             ORDER BY queue_position ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn count_by_status(&self, status: EntryStatus) -> Result<u32, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM queue_entries WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        let n: i64 = row.try_get("n").map_err(storage)?;
        u32::try_from(n).map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    async fn find_latest_by_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<QueueEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {ENTRY_SELECT_COLUMNS} FROM queue_entries \
             WHERE resource_id = ? ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(row_to_entry).transpose()
    }

    async fn transition(
        &self,
        id: EntryId,
        expected: &[EntryStatus],
        transition: Transition,
    ) -> Result<QueueEntry, RepositoryError> {
        let guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let (from, resource_id) = current_status(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("queue entry {id}")))?;
        if !expected.contains(&from) {
            return Err(RepositoryError::Conflict(format!(
                "entry {id} is {from}, cannot {}",
                transition.action()
            )));
        }

        let now = format_datetime(Utc::now());
        let query = match &transition {
            Transition::Activate { install_dir } => sqlx::query(
                r#"
                UPDATE queue_entries SET
                    status = 'active', queue_position = NULL, error_message = NULL,
                    progress_percent = 0, bytes_downloaded = 0, bytes_total = NULL,
                    transfer_rate = NULL, eta_seconds = NULL, awaiting_second_factor = 0,
                    install_dir = ?, started_at = ?, completed_at = NULL
                WHERE id = ?
                "#,
            )
            .bind(install_dir)
            .bind(&now),
            Transition::Pause => sqlx::query(
                r#"
                UPDATE queue_entries SET
                    status = 'paused', queue_position = NULL, transfer_rate = NULL,
                    eta_seconds = NULL, awaiting_second_factor = 0
                WHERE id = ?
                "#,
            ),
            Transition::Requeue => {
                let position = next_position(&mut tx).await?;
                sqlx::query(
                    r#"
                    UPDATE queue_entries SET
                        status = 'queued', queue_position = ?, error_message = NULL,
                        progress_percent = 0, bytes_downloaded = 0, bytes_total = NULL,
                        transfer_rate = NULL, eta_seconds = NULL, awaiting_second_factor = 0,
                        completed_at = NULL
                    WHERE id = ?
                    "#,
                )
                .bind(position)
            }
            Transition::Complete => sqlx::query(
                r#"
                UPDATE queue_entries SET
                    status = 'completed', queue_position = NULL, progress_percent = 100,
                    bytes_downloaded = COALESCE(bytes_total, bytes_downloaded),
                    transfer_rate = NULL, eta_seconds = NULL, awaiting_second_factor = 0,
                    completed_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&now),
            Transition::Fail { message } => sqlx::query(
                r#"
                UPDATE queue_entries SET
                    status = 'failed', queue_position = NULL, error_message = ?,
                    transfer_rate = NULL, eta_seconds = NULL, awaiting_second_factor = 0
                WHERE id = ?
                "#,
            )
            .bind(message),
            Transition::Cancel => sqlx::query(
                r#"
                UPDATE queue_entries SET
                    status = 'canceled', queue_position = NULL, transfer_rate = NULL,
                    eta_seconds = NULL, awaiting_second_factor = 0
                WHERE id = ?
                "#,
            ),
        };

        query
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, &resource_id))?;

        if from == EntryStatus::Queued && transition.target() != EntryStatus::Queued {
            compact_positions(&mut tx).await?;
        }

        let updated = entry_in_tx(&mut tx, id).await?;
        tx.commit().await.map_err(storage)?;
        drop(guard);

        tracing::debug!(
            target: "gamedock.queue",
            entry_id = %id,
            from = %from,
            to = %transition.target(),
            "transition applied"
        );

        Ok(updated)
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn update_progress(
        &self,
        id: EntryId,
        progress: &TransferProgress,
    ) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            r#"
            UPDATE queue_entries SET
                progress_percent = MAX(progress_percent, MIN(MAX(?, 0.0), 99.0)),
                bytes_downloaded = MAX(bytes_downloaded, ?),
                bytes_total = COALESCE(?, bytes_total),
                transfer_rate = ?,
                eta_seconds = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(progress.percent)
        .bind(progress.bytes_downloaded as i64)
        .bind(progress.bytes_total.map(|v| v as i64))
        .bind(progress.rate_bps)
        .bind(progress.eta_seconds.map(|v| v as i64))
        .bind(id.get())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_second_factor_pending(
        &self,
        id: EntryId,
        pending: bool,
    ) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "UPDATE queue_entries SET awaiting_second_factor = ? WHERE id = ? AND status = 'active'",
        )
        .bind(pending)
        .bind(id.get())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder(&self, order: &[EntryId]) -> Result<u32, RepositoryError> {
        let guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let current = queued_ids(&mut tx).await?;
        let mut ordered: Vec<i64> = Vec::with_capacity(current.len());
        for id in order.iter().map(|id| id.get()) {
            if current.contains(&id) && !ordered.contains(&id) {
                ordered.push(id);
            }
        }
        let applied = ordered.len();
        ordered.extend(current.iter().filter(|id| !order.iter().any(|o| o.get() == **id)));

        write_positions(&mut tx, &ordered).await?;
        tx.commit().await.map_err(storage)?;
        drop(guard);

        u32::try_from(applied).map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    async fn delete(&self, id: EntryId, expected: &[EntryStatus]) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let (from, _) = current_status(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("queue entry {id}")))?;
        if !expected.contains(&from) {
            return Err(RepositoryError::Conflict(format!(
                "entry {id} is {from}, cannot delete"
            )));
        }

        sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        if from == EntryStatus::Queued {
            compact_positions(&mut tx).await?;
        }

        tx.commit().await.map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use gamedock_core::ResourceMetadata;

    async fn repo() -> SqliteQueueRepository {
        SqliteQueueRepository::new(setup_test_database().await.unwrap())
    }

    fn new_entry(resource_id: &str) -> NewQueueEntry {
        NewQueueEntry::new(resource_id, ResourceMetadata::titled(format!("Game {resource_id}")))
    }

    async fn positions(repo: &SqliteQueueRepository) -> Vec<(i64, u32)> {
        repo.list_by_status(EntryStatus::Queued)
            .await
            .unwrap()
            .iter()
            .map(|e| (e.id.get(), e.queue_position.unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_positions() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("10")).await.unwrap();
        let b = repo.insert(&new_entry("20")).await.unwrap();

        assert_eq!(a.status, EntryStatus::Queued);
        assert_eq!(a.queue_position, Some(1));
        assert_eq!(b.queue_position, Some(2));
        assert!(b.id > a.id);
        assert_eq!(a.metadata.title, "Game 10");
    }

    #[tokio::test]
    async fn test_insert_rejects_open_duplicate() {
        let repo = repo().await;
        repo.insert(&new_entry("10")).await.unwrap();
        let err = repo.insert(&new_entry("10")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_allowed_after_terminal() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("10")).await.unwrap();
        repo.transition(a.id, &[EntryStatus::Queued], Transition::Cancel)
            .await
            .unwrap();
        let again = repo.insert(&new_entry("10")).await.unwrap();
        assert_eq!(again.queue_position, Some(1));
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("10")).await.unwrap();

        let err = repo
            .transition(a.id, &[EntryStatus::Active], Transition::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.get(a.id).await.unwrap().status, EntryStatus::Queued);

        let err = repo
            .transition(EntryId::new(999), &[EntryStatus::Queued], Transition::Cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_activate_compacts_positions() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        let b = repo.insert(&new_entry("2")).await.unwrap();
        let c = repo.insert(&new_entry("3")).await.unwrap();

        let active = repo
            .transition(
                a.id,
                &[EntryStatus::Queued],
                Transition::Activate {
                    install_dir: "/games/1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(active.status, EntryStatus::Active);
        assert_eq!(active.queue_position, None);
        assert_eq!(active.install_dir.as_deref(), Some("/games/1"));
        assert!(active.started_at.is_some());

        assert_eq!(positions(&repo).await, vec![(b.id.get(), 1), (c.id.get(), 2)]);
    }

    #[tokio::test]
    async fn test_requeue_goes_to_back_with_reset_progress() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        let b = repo.insert(&new_entry("2")).await.unwrap();
        repo.transition(
            a.id,
            &[EntryStatus::Queued],
            Transition::Activate {
                install_dir: "/g".into(),
            },
        )
        .await
        .unwrap();
        repo.update_progress(
            a.id,
            &TransferProgress {
                percent: 40.0,
                bytes_downloaded: 400,
                bytes_total: Some(1000),
                rate_bps: Some(10.0),
                eta_seconds: Some(60),
            },
        )
        .await
        .unwrap();
        let paused = repo
            .transition(a.id, &[EntryStatus::Active], Transition::Pause)
            .await
            .unwrap();
        assert_eq!(paused.transfer_rate, None);
        assert_eq!(paused.eta_seconds, None);
        assert!((paused.progress_percent - 40.0).abs() < f64::EPSILON);

        let requeued = repo
            .transition(a.id, &[EntryStatus::Paused], Transition::Requeue)
            .await
            .unwrap();
        assert_eq!(requeued.queue_position, Some(2));
        assert!(requeued.progress_percent.abs() < f64::EPSILON);
        assert_eq!(requeued.bytes_downloaded, 0);
        assert_eq!(positions(&repo).await, vec![(b.id.get(), 1), (a.id.get(), 2)]);
    }

    #[tokio::test]
    async fn test_progress_clamped_and_monotonic() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();

        let sample = |percent| TransferProgress {
            percent,
            bytes_downloaded: 10,
            ..Default::default()
        };
        assert!(!repo.update_progress(a.id, &sample(10.0)).await.unwrap());

        repo.transition(
            a.id,
            &[EntryStatus::Queued],
            Transition::Activate {
                install_dir: "/g".into(),
            },
        )
        .await
        .unwrap();
        assert!(repo.update_progress(a.id, &sample(50.0)).await.unwrap());
        repo.update_progress(a.id, &sample(20.0)).await.unwrap();
        assert!((repo.get(a.id).await.unwrap().progress_percent - 50.0).abs() < f64::EPSILON);

        repo.update_progress(a.id, &sample(100.0)).await.unwrap();
        assert!((repo.get(a.id).await.unwrap().progress_percent - 99.0).abs() < f64::EPSILON);

        let done = repo
            .transition(a.id, &[EntryStatus::Active], Transition::Complete)
            .await
            .unwrap();
        assert!((done.progress_percent - 100.0).abs() < f64::EPSILON);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_records_message() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        repo.transition(
            a.id,
            &[EntryStatus::Queued],
            Transition::Activate {
                install_dir: "/g".into(),
            },
        )
        .await
        .unwrap();
        let failed = repo
            .transition(
                a.id,
                &[EntryStatus::Active],
                Transition::Fail {
                    message: "Rate limited".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("Rate limited"));

        let retried = repo
            .transition(a.id, &[EntryStatus::Failed], Transition::Requeue)
            .await
            .unwrap();
        assert_eq!(retried.error_message, None);
        assert_eq!(retried.queue_position, Some(1));
    }

    #[tokio::test]
    async fn test_requeue_conflicts_with_newer_open_entry() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        repo.transition(a.id, &[EntryStatus::Queued], Transition::Cancel)
            .await
            .unwrap();
        repo.insert(&new_entry("1")).await.unwrap();

        let err = repo
            .transition(a.id, &[EntryStatus::Canceled], Transition::Requeue)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_reorder_listed_first() {
        let repo = repo().await;
        let one = repo.insert(&new_entry("1")).await.unwrap().id;
        let two = repo.insert(&new_entry("2")).await.unwrap().id;
        let three = repo.insert(&new_entry("3")).await.unwrap().id;

        let applied = repo.reorder(&[three, one, two]).await.unwrap();
        assert_eq!(applied, 3);
        assert_eq!(
            positions(&repo).await,
            vec![(three.get(), 1), (one.get(), 2), (two.get(), 3)]
        );
    }

    #[tokio::test]
    async fn test_reorder_ignores_stale_ids() {
        let repo = repo().await;
        let one = repo.insert(&new_entry("1")).await.unwrap().id;
        let two = repo.insert(&new_entry("2")).await.unwrap().id;
        let three = repo.insert(&new_entry("3")).await.unwrap().id;
        repo.transition(
            one,
            &[EntryStatus::Queued],
            Transition::Activate {
                install_dir: "/g".into(),
            },
        )
        .await
        .unwrap();

        let applied = repo
            .reorder(&[EntryId::new(77), one, three, three])
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            positions(&repo).await,
            vec![(three.get(), 1), (two.get(), 2)]
        );
    }

    #[tokio::test]
    async fn test_delete_requires_expected_status() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        let b = repo.insert(&new_entry("2")).await.unwrap();

        let err = repo
            .delete(a.id, &EntryStatus::TERMINAL)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        repo.delete(a.id, &[EntryStatus::Queued]).await.unwrap();
        assert!(matches!(
            repo.get(a.id).await.unwrap_err(),
            RepositoryError::NotFound(_)
        ));
        assert_eq!(positions(&repo).await, vec![(b.id.get(), 1)]);
    }

    #[tokio::test]
    async fn test_second_factor_flag_only_on_active() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        assert!(!repo.set_second_factor_pending(a.id, true).await.unwrap());

        repo.transition(
            a.id,
            &[EntryStatus::Queued],
            Transition::Activate {
                install_dir: "/g".into(),
            },
        )
        .await
        .unwrap();
        assert!(repo.set_second_factor_pending(a.id, true).await.unwrap());
        assert!(repo.get(a.id).await.unwrap().awaiting_second_factor);
    }

    #[tokio::test]
    async fn test_counts_and_find_latest() {
        let repo = repo().await;
        let a = repo.insert(&new_entry("1")).await.unwrap();
        repo.insert(&new_entry("2")).await.unwrap();
        assert_eq!(repo.count_by_status(EntryStatus::Queued).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(EntryStatus::Active).await.unwrap(), 0);

        let latest = repo.find_latest_by_resource("1").await.unwrap().unwrap();
        assert_eq!(latest.id, a.id);
        assert!(repo.find_latest_by_resource("9").await.unwrap().is_none());

        repo.transition(a.id, &[EntryStatus::Queued], Transition::Cancel)
            .await
            .unwrap();
        let b = repo.insert(&new_entry("1")).await.unwrap();
        let latest = repo.find_latest_by_resource("1").await.unwrap().unwrap();
        assert_eq!(latest.id, b.id);
        assert_eq!(latest.status, EntryStatus::Queued);
    }
}
