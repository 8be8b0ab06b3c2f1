// src/utils/time.rs

use chrono::Utc;

/// Gets the current timestamp in milliseconds since Unix epoch.
pub fn get_current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
