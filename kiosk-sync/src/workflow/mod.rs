//! Packaging workflow

mod sequencer;
mod session;

pub use sequencer::{Sequencer, Transition, WorkflowAction, WorkflowContext, WorkflowState};
pub use session::KioskSession;
