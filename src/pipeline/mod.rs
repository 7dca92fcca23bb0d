// Request pipeline: the moderation orchestrator and aggregated health.

pub mod health;
pub mod orchestrator;
