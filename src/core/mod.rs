// Engine boundary, call serialization, type mapping and error modeling.
pub mod error;
pub mod gate;
pub mod handle;
pub mod marshal;
pub mod sys;
pub mod types;
