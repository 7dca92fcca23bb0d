// crossmodal: cross-modal content moderation
//
// This is the library root. Each module corresponds to a major subsystem
// of the moderation service: the analyzer clients, the scoring engine,
// the request pipeline, the feedback loop and storage.

pub mod config;
pub mod db;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod signals;
pub mod status;

#[cfg(feature = "web")]
pub mod web;
