//! Harmonization transform: sentinel removal, zero-basing and reverse coding.

mod engine;
mod operations;

pub use engine::{
    restore_column, transform_column, ColumnTransform, InvalidCode, InvalidReason, TransformEngine,
    MAX_CODE_MAGNITUDE,
};
pub use operations::{HarmonizeResult, ItemTransform, ObservedBounds, TransformNote};
