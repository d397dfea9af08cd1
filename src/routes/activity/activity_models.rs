use serde::{Deserialize, Serialize};

use crate::models::activity::ActivityEntry;

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ActivityResponse {
    pub success: bool,
    pub activity: Vec<ActivityEntry>,
    /// Pass as `before` to fetch the next page; absent on the last page.
    pub next_before: Option<i64>,
}
