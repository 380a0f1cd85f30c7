pub mod authoring;
pub mod chat;
pub mod context;
pub mod evolution;
pub mod experience;
pub mod market;
pub mod structured;

#[cfg(test)]
mod testing;

pub use authoring::{PartnerAuthor, PitchIdeas, PitchRequest};
pub use chat::{ChatTurn, PartnerChat};
pub use context::{ContextBuilder, ExperienceTier};
pub use evolution::{EvolutionEngine, EvolutionOutcome};
pub use experience::ExperienceTracker;
pub use market::{AlphaVantageClient, QuoteSource, StockQuote};
