use std::collections::HashMap;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifies one import run. UUIDv7, so ids sort by creation time.
pub type JobId = uuid::Uuid;

/// One source row: column name to raw cell value.
pub type RowMap = HashMap<String, String>;

/// Generate a fresh, time-ordered job id.
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7()
}
