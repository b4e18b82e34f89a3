//! Core domain types shared by every subsystem.
//!
//! - The fixed, ordered stage enumeration
//! - The report sub-phase within a stage

mod stage_type;

pub use stage_type::{StageType, SubPhase};
