//! Access & playback authorization: the per-event access state machine.

pub mod authorizer;
pub mod identity;

pub use authorizer::{
    AccessConfig, AccessService, RegisterInput, RegisterOutcome, StepState, StreamInfo,
    VerifyPasswordOutcome,
};
