//! Purpose: Public API for reading and writing netCDF datasets through the engine.
//! Exports: Container entry points, resource-tree descriptors and the error types they return.
//! Role: Stable boundary over `core`; descriptors keep their container session alive.
//! Invariants: Descriptors never hold references to each other, only ids and a shared session.
//! Invariants: Every engine call made from here goes through the call gate.

mod attribute;
mod container;
mod dimension;
mod group;
mod variable;

pub use crate::core::error::{Error, ErrorKind, Lookup};
pub use crate::core::handle::{DimId, NcId, TypeId, VarId};
pub use crate::core::types::{ExternalType, NcNumeric, NcType};
pub use attribute::{Attribute, AttributeProvider, AttributeTarget};
pub use container::{
    CreateOptions, FillMode, Format, OpenMode, create, library_version, open, open_memory,
};
pub use dimension::Dimension;
pub use group::Group;
pub use variable::{Chunking, Deflate, Endian, SzipOptions, TypedVariable, Variable};

pub type ApiResult<T> = Result<T, Error>;
