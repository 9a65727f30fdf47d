use serde::{Deserialize, Serialize};

use crate::model::ApiKeyQuota;

/// Fixed public prefix invariant (spec §3, §6).
pub const API_KEY_PREFIX: &str = "ah-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub hashed_secret: String,
    pub user_id: i64,
    pub quota: Option<ApiKeyQuota>,
}
