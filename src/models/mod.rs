pub mod duty;

pub use duty::{CreateDutyRequest, Duty, UpdateDutyRequest};
