pub mod chat;
pub mod evolve;
pub mod feedback;
pub mod gateway;
pub mod onboard;
pub mod partners;
pub mod pitch;
pub mod status;
