// Scoring — the deterministic half of the pipeline.
//
// context derives a supplementary risk signal from request metadata;
// fusion combines image, text and context signals into the final decision.

pub mod context;
pub mod fusion;
