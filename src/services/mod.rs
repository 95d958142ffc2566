pub mod duty_service;

pub use duty_service::{DutyService, validate_duty_name};
