// Feedback loop: reviewer feedback storage and threshold-driven retraining.

pub mod coordinator;
pub mod retrain;

pub use coordinator::{CoordinatorSettings, FeedbackCoordinator, FeedbackStats, SubmitReceipt};
pub use retrain::{Modality, Retrainer, SimulatedRetrainer};
