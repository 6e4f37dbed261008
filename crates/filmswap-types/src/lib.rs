pub mod api;
pub mod events;
pub mod models;
pub mod views;

pub use models::{Exchange, Participant, ParticipantId, Phase};
