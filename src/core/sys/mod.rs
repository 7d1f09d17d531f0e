//! Purpose: Raw engine boundary: status codes, mode flags and the flat call set.
//! Exports: `nc_*` functions with C calling conventions plus the constants they use.
//! Role: The only module that knows which engine backs the crate.
//! Invariants: Both backends expose identical signatures; callers never branch on the backend.
//! Invariants: Nothing here locks; serialization is `core::gate`'s job.
use std::os::raw::c_int;

#[cfg(feature = "libnetcdf")]
mod ffi;
#[cfg(feature = "libnetcdf")]
pub use ffi::*;

#[cfg(not(feature = "libnetcdf"))]
pub(crate) mod mem;
#[cfg(not(feature = "libnetcdf"))]
pub use mem::*;

#[allow(non_camel_case_types)]
pub type nc_type = c_int;

pub const NC_NOERR: c_int = 0;
pub const NC_EBADID: c_int = -33;
pub const NC_ENFILE: c_int = -34;
pub const NC_EEXIST: c_int = -35;
pub const NC_EINVAL: c_int = -36;
pub const NC_EPERM: c_int = -37;
pub const NC_ENOTINDEFINE: c_int = -38;
pub const NC_EINDEFINE: c_int = -39;
pub const NC_EINVALCOORDS: c_int = -40;
pub const NC_ENAMEINUSE: c_int = -42;
pub const NC_ENOTATT: c_int = -43;
pub const NC_EBADTYPE: c_int = -45;
pub const NC_EBADDIM: c_int = -46;
pub const NC_EUNLIMPOS: c_int = -47;
pub const NC_ENOTVAR: c_int = -49;
pub const NC_EGLOBAL: c_int = -50;
pub const NC_ENOTNC: c_int = -51;
pub const NC_EMAXNAME: c_int = -53;
pub const NC_EUNLIMIT: c_int = -54;
pub const NC_EEDGE: c_int = -57;
pub const NC_ESTRIDE: c_int = -58;
pub const NC_EBADNAME: c_int = -59;
pub const NC_ENOMEM: c_int = -61;
pub const NC_EHDFERR: c_int = -101;
pub const NC_EDIMMETA: c_int = -106;
pub const NC_ENOTNC4: c_int = -111;
pub const NC_ESTRICTNC3: c_int = -112;
pub const NC_EBADGRPID: c_int = -116;
pub const NC_EBADTYPID: c_int = -117;
pub const NC_ELATEDEF: c_int = -123;
pub const NC_ENOGRP: c_int = -125;

pub const NC_NOWRITE: c_int = 0x0000;
pub const NC_WRITE: c_int = 0x0001;
pub const NC_CLOBBER: c_int = 0x0000;
pub const NC_NOCLOBBER: c_int = 0x0004;
pub const NC_NETCDF4: c_int = 0x1000;

pub const NC_FILL: c_int = 0;
pub const NC_NOFILL: c_int = 0x100;

pub const NC_GLOBAL: c_int = -1;
pub const NC_UNLIMITED: usize = 0;
pub const NC_MAX_NAME: usize = 256;

pub const NC_CHUNKED: c_int = 0;
pub const NC_CONTIGUOUS: c_int = 1;

pub const NC_ENDIAN_NATIVE: c_int = 0;
pub const NC_ENDIAN_LITTLE: c_int = 1;
pub const NC_ENDIAN_BIG: c_int = 2;

pub const NC_SZIP_EC: c_int = 4;
pub const NC_SZIP_NN: c_int = 32;

pub const NC_BYTE: nc_type = 1;
pub const NC_CHAR: nc_type = 2;
pub const NC_SHORT: nc_type = 3;
pub const NC_INT: nc_type = 4;
pub const NC_FLOAT: nc_type = 5;
pub const NC_DOUBLE: nc_type = 6;
pub const NC_UBYTE: nc_type = 7;
pub const NC_USHORT: nc_type = 8;
pub const NC_UINT: nc_type = 9;
pub const NC_INT64: nc_type = 10;
pub const NC_UINT64: nc_type = 11;
pub const NC_STRING: nc_type = 12;
