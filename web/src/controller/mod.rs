pub(crate) mod health_check_controller;
pub(crate) mod job_event_controller;
