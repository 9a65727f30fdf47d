pub mod engine;
pub mod store;
pub mod window;

pub use engine::{check_api_key_quota, get_quota, QuotaCheck, QuotaDenial, QuotaSnapshot};
pub use store::QuotaStore;
pub use window::{quota_window, Window};
