pub mod directory;
pub mod notion;

pub use directory::{ListOrigin, PartnerDirectory};
pub use notion::{NotionClient, PartnerSource};
