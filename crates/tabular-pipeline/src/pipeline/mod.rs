//! Pipeline module.
//!
//! This module holds the editable pipeline model, the per-step
//! configuration types and the wire format sent to the processing service.

pub mod model;
pub mod steps;
pub mod wire;

pub use model::{DEFAULT_ORDER, PipelineModel, StepOrder, move_step};
pub use steps::{
    CastType, CleanerConfig, CleanerPatch, CleanerStrategy, ColumnSelection, EncoderConfig,
    EncoderPatch, EncoderStrategy, ScalerConfig, ScalerPatch, ScalerStrategy, StepConfig,
    StepKind, StepPatch, TypeCasterConfig, TypeCasterPatch,
};
pub use wire::{ColumnTarget, OrdinalLevels, WireConfig, parse_ordinal_mapping, serialize};
