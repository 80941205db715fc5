pub(crate) mod job_event;
