pub mod config;
pub mod error;
pub mod partner;
pub mod paths;
pub mod types;

pub use config::Config;
pub use error::{Error, ProviderError, ProviderErrorKind, Result};
pub use partner::{Capability, Partner, PartnerDraft, Tier};
pub use paths::Paths;
