//! Step-level splicing of generated test code.
mod convert;
mod engine;
mod jest;
mod step;

pub use convert::{ConvertError, TestConverter};
pub use engine::{Selection, SpliceEngine, SpliceError};
pub use jest::JestConverter;
pub use step::{
    remove_blank_lines, trim_blank_edges, ParentRef, Step, StepFragments, StepId, StepIdentity,
};
