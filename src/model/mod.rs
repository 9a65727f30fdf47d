//! Data model shared by every component (spec §3).
//!
//! Split file-per-entity the way the teacher splits
//! `persistence::models` — one `sqlx::FromRow` struct per table, plain
//! constructors and small derived accessors, no behavior beyond that.

pub mod apikey;
pub mod association;
pub mod channel;
pub mod price;
pub mod probe;
pub mod quota;
pub mod request;
pub mod usage;
pub mod user;

pub use apikey::ApiKey;
pub use association::{ExcludeAssociation, ModelAssociation, ModelChannelConnection};
pub use channel::{Channel, ChannelStatus};
pub use price::{ModelPrice, ModelPriceItem, Pricing, TierStep};
pub use probe::ChannelProbe;
pub use quota::{ApiKeyQuota, QuotaPeriod};
pub use request::{ExecutionStatus, Request, RequestExecution, RequestStatus};
pub use usage::{Usage, UsageLog};
pub use user::{Role, RoleScope, User, UserProject};
