use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::DutyRepository;
use crate::error::AppError;
use crate::models::{CreateDutyRequest, Duty, UpdateDutyRequest};

pub const MAX_NAME_LENGTH: usize = 255;

#[derive(Clone)]
pub struct DutyService {
    repo: Arc<dyn DutyRepository>,
}

impl DutyService {
    pub fn new(repo: Arc<dyn DutyRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_all_duties(&self) -> Result<Vec<Duty>, AppError> {
        debug!("Getting all duties");
        let duties = self
            .repo
            .find_all()
            .await
            .map_err(|e| wrap("Failed to retrieve duties", e))?;
        debug!("Retrieved {} duties", duties.len());
        Ok(duties)
    }

    pub async fn get_duty_by_id(&self, id: i64) -> Result<Duty, AppError> {
        debug!("Getting duty {}", id);
        self.repo
            .find_by_id(id)
            .await
            .map_err(|e| wrap(format!("Failed to retrieve duty by id {}", id), e))?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create_duty(&self, req: CreateDutyRequest) -> Result<Duty, AppError> {
        debug!("Creating duty");
        validate_duty_name(&req.name)?;

        let duty = self
            .repo
            .create(&req.name)
            .await
            .map_err(|e| wrap("Failed to create duty", e))?;
        debug!("Created duty {}", duty.id);
        Ok(duty)
    }

    pub async fn update_duty(&self, id: i64, req: UpdateDutyRequest) -> Result<Duty, AppError> {
        debug!("Updating duty {}", id);
        validate_duty_name(&req.name)?;

        self.repo
            .update(id, &req.name, req.completed)
            .await
            .map_err(|e| wrap(format!("Failed to update duty with id {}", id), e))?
            .ok_or_else(|| not_found(id))
    }

    /// Returns the removed duty.
    pub async fn delete_duty(&self, id: i64) -> Result<Duty, AppError> {
        debug!("Deleting duty {}", id);
        self.repo
            .delete(id)
            .await
            .map_err(|e| wrap(format!("Failed to delete duty with id {}", id), e))?
            .ok_or_else(|| not_found(id))
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.repo.ping().await
    }
}

/// Rejects names that are empty, too long, contain anything besides ASCII
/// letters, digits and whitespace, or are not already trimmed.
pub fn validate_duty_name(name: &str) -> Result<(), AppError> {
    let rejection = if name.trim().is_empty() {
        Some("Duty name cannot be empty".to_string())
    } else if name.chars().count() > MAX_NAME_LENGTH {
        Some(format!("Duty name cannot exceed {} characters", MAX_NAME_LENGTH))
    } else if name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c.is_whitespace()))
    {
        Some("Duty name contains invalid characters".to_string())
    } else if name != name.trim() {
        Some("Duty name cannot have leading or trailing spaces".to_string())
    } else {
        None
    };

    match rejection {
        Some(message) => {
            warn!("Rejected duty name: {}", message);
            Err(AppError::Validation(message))
        }
        None => Ok(()),
    }
}

fn not_found(id: i64) -> AppError {
    warn!("Duty {} not found", id);
    AppError::NotFound(format!("Duty with id {} not found", id))
}

fn wrap(message: impl Into<String>, err: AppError) -> AppError {
    if err.is_validation() || err.is_not_found() {
        return err;
    }
    let message = message.into();
    debug!("{}: {}", message, err);
    AppError::service(message, err)
}
