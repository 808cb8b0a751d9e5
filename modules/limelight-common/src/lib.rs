pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{LimelightError, Result};
pub use types::{
    AccountMapping, AuthToken, DailyDeltas, DailySnapshot, DeltaPoint, LinkedAccount,
    OwnerScope, PersonaScope, PersonaSummary,
};
