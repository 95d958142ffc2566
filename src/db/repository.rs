use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Connection, Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, error};

use crate::error::AppError;
use crate::models::Duty;

/// Future returned by a unit of work run through
/// [`SqliteDutyRepository::execute_transaction`].
pub type UnitOfWork<'c, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'c>>;

#[async_trait]
pub trait DutyRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Duty>, AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Duty>, AppError>;
    async fn create(&self, name: &str) -> Result<Duty, AppError>;
    async fn update(
        &self,
        id: i64,
        name: &str,
        completed: Option<bool>,
    ) -> Result<Option<Duty>, AppError>;
    async fn delete(&self, id: i64) -> Result<Option<Duty>, AppError>;
    async fn ping(&self) -> Result<(), AppError>;
}

pub async fn fetch_duties<'e, E>(db: E) -> Result<Vec<Duty>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Duty>(
        "SELECT id, name, completed, created_at, updated_at FROM duties ORDER BY created_at DESC, id DESC"
    )
    .fetch_all(db)
    .await
}

pub async fn find_duty_by_id<'e, E>(db: E, id: i64) -> Result<Option<Duty>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Duty>(
        "SELECT id, name, completed, created_at, updated_at FROM duties WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_duty<'e, E>(db: E, name: &str) -> Result<Duty, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();

    sqlx::query_as::<_, Duty>(
        r#"
        INSERT INTO duties (name, completed, created_at, updated_at)
        VALUES (?1, 0, ?2, ?2)
        RETURNING id, name, completed, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(now)
    .fetch_one(db)
    .await
}

/// `completed` is left untouched when `None`. `updated_at` never moves
/// backwards even if the clock does.
pub async fn update_duty<'e, E>(
    db: E,
    id: i64,
    name: &str,
    completed: Option<bool>,
) -> Result<Option<Duty>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();

    sqlx::query_as::<_, Duty>(
        r#"
        UPDATE duties
        SET name = ?1,
            completed = COALESCE(?2, completed),
            updated_at = MAX(updated_at, ?3)
        WHERE id = ?4
        RETURNING id, name, completed, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(completed)
    .bind(now)
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete_duty<'e, E>(db: E, id: i64) -> Result<Option<Duty>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Duty>(
        "DELETE FROM duties WHERE id = ? RETURNING id, name, completed, created_at, updated_at"
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

#[derive(Clone)]
pub struct SqliteDutyRepository {
    db: SqlitePool,
}

impl SqliteDutyRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Runs `unit_of_work` inside a transaction on a single pooled
    /// connection. Commits on `Ok`, rolls back on `Err` and hands the
    /// original error back. The connection goes back to the pool exactly
    /// once whichever way this returns.
    pub async fn execute_transaction<T, F>(&self, unit_of_work: F) -> Result<T, AppError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> UnitOfWork<'c, T>,
    {
        let mut conn = self.db.acquire().await.map_err(|e| {
            debug!("Failed to acquire database connection: {}", e);
            AppError::database("Failed to acquire database connection", e)
        })?;

        let result = run_in_transaction(&mut conn, unit_of_work).await;

        drop(conn);
        debug!("Released database connection");

        result
    }
}

async fn run_in_transaction<T, F>(conn: &mut SqliteConnection, unit_of_work: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> UnitOfWork<'c, T>,
{
    let mut tx = conn.begin().await.map_err(|e| {
        debug!("Failed to begin transaction: {}", e);
        AppError::database("Failed to begin transaction", e)
    })?;
    debug!("Started database transaction");

    match unit_of_work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                debug!("Failed to commit transaction: {}", e);
                AppError::database("Failed to commit transaction", e)
            })?;
            debug!("Committed database transaction");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Rollback failed: {}", rollback_err);
            }
            debug!("Database transaction rolled back: {}", err);
            Err(err)
        }
    }
}

#[async_trait]
impl DutyRepository for SqliteDutyRepository {
    async fn find_all(&self) -> Result<Vec<Duty>, AppError> {
        match fetch_duties(&self.db).await {
            Ok(duties) => {
                debug!("Fetched {} duties", duties.len());
                Ok(duties)
            }
            Err(e) => {
                debug!("Failed to fetch duties: {}", e);
                Err(AppError::database("Failed to fetch duties", e))
            }
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Duty>, AppError> {
        let duty = find_duty_by_id(&self.db, id).await.map_err(|e| {
            debug!("Failed to fetch duty {}: {}", id, e);
            AppError::database(format!("Failed to fetch duty with id {}", id), e)
        })?;

        if duty.is_none() {
            debug!("Duty {} not found", id);
        }
        Ok(duty)
    }

    async fn create(&self, name: &str) -> Result<Duty, AppError> {
        let duty = insert_duty(&self.db, name).await.map_err(|e| {
            debug!("Failed to create duty: {}", e);
            AppError::database("Failed to create duty", e)
        })?;

        debug!("Created duty {}", duty.id);
        Ok(duty)
    }

    async fn update(
        &self,
        id: i64,
        name: &str,
        completed: Option<bool>,
    ) -> Result<Option<Duty>, AppError> {
        let duty = update_duty(&self.db, id, name, completed).await.map_err(|e| {
            debug!("Failed to update duty {}: {}", id, e);
            AppError::database(format!("Failed to update duty with id {}", id), e)
        })?;

        match &duty {
            Some(_) => debug!("Updated duty {}", id),
            None => debug!("Duty {} not found for update", id),
        }
        Ok(duty)
    }

    async fn delete(&self, id: i64) -> Result<Option<Duty>, AppError> {
        let duty = delete_duty(&self.db, id).await.map_err(|e| {
            debug!("Failed to delete duty {}: {}", id, e);
            AppError::database(format!("Failed to delete duty with id {}", id), e)
        })?;

        match &duty {
            Some(_) => debug!("Deleted duty {}", id),
            None => debug!("Duty {} not found for deletion", id),
        }
        Ok(duty)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("select 1")
            .execute(&self.db)
            .await
            .map_err(|e| AppError::database("Database is unreachable", e))?;
        Ok(())
    }
}
