use chrono::{DateTime, Utc};

// Read-only facts shared with the status handlers
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub model: String,
}
