use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::db::DutyRepository;
use crate::error::AppError;
use crate::models::Duty;

/// Vec-backed repository for exercising the service and router without a
/// database. Counts every call and can be switched into a failing mode.
#[derive(Default)]
pub struct InMemoryDutyRepository {
    duties: Mutex<Vec<Duty>>,
    next_id: AtomicUsize,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryDutyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of repository calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn enter(&self, operation: &str) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::database(
                format!("Failed to {}", operation),
                sqlx::Error::PoolTimedOut,
            ));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Duty>>, AppError> {
        self.duties.lock().map_err(|_| AppError::Internal)
    }
}

#[async_trait]
impl DutyRepository for InMemoryDutyRepository {
    async fn find_all(&self) -> Result<Vec<Duty>, AppError> {
        self.enter("fetch duties")?;
        let mut duties = self.lock()?.clone();
        duties.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(duties)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Duty>, AppError> {
        self.enter("fetch duty")?;
        Ok(self.lock()?.iter().find(|d| d.id == id).cloned())
    }

    async fn create(&self, name: &str) -> Result<Duty, AppError> {
        self.enter("create duty")?;
        let now = Utc::now();
        let duty = Duty {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1,
            name: name.to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.push(duty.clone());
        Ok(duty)
    }

    async fn update(
        &self,
        id: i64,
        name: &str,
        completed: Option<bool>,
    ) -> Result<Option<Duty>, AppError> {
        self.enter("update duty")?;
        let mut duties = self.lock()?;
        let Some(duty) = duties.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };

        duty.name = name.to_string();
        if let Some(completed) = completed {
            duty.completed = completed;
        }
        duty.updated_at = duty.updated_at.max(Utc::now());
        Ok(Some(duty.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<Duty>, AppError> {
        self.enter("delete duty")?;
        let mut duties = self.lock()?;
        let removed = duties
            .iter()
            .position(|d| d.id == id)
            .map(|index| duties.remove(index));
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.enter("reach database")
    }
}
