use crate::services::DutyService;

#[derive(Clone)]
pub struct AppState {
    pub duties: DutyService,
}

impl AppState {
    pub fn new(duties: DutyService) -> Self {
        Self { duties }
    }
}
