//! Purpose: Map the closed set of external primitive type codes onto host types.
//! Exports: `ExternalType`, `NcType`, `NcNumeric`.
//! Role: Static dispatch table consumed by attribute and variable I/O.
//! Invariants: External codes are fixed (byte=1 .. string=12) and must match the engine exactly.
//! Invariants: Unsigned host types also read their same-width signed code (legacy files store
//! unsigned data bit-for-bit in signed containers); signed host types read only their own code.
use std::fmt;
use std::os::raw::{c_int, c_void};

use crate::core::error::Error;
use crate::core::marshal;
use crate::core::sys::{self, nc_type};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExternalType {
    Byte,
    Char,
    Short,
    Int32,
    Float,
    Double,
    UByte,
    UShort,
    UInt32,
    Int64,
    UInt64,
    String,
}

impl ExternalType {
    pub const ALL: [ExternalType; 12] = [
        ExternalType::Byte,
        ExternalType::Char,
        ExternalType::Short,
        ExternalType::Int32,
        ExternalType::Float,
        ExternalType::Double,
        ExternalType::UByte,
        ExternalType::UShort,
        ExternalType::UInt32,
        ExternalType::Int64,
        ExternalType::UInt64,
        ExternalType::String,
    ];

    pub fn code(self) -> nc_type {
        match self {
            ExternalType::Byte => sys::NC_BYTE,
            ExternalType::Char => sys::NC_CHAR,
            ExternalType::Short => sys::NC_SHORT,
            ExternalType::Int32 => sys::NC_INT,
            ExternalType::Float => sys::NC_FLOAT,
            ExternalType::Double => sys::NC_DOUBLE,
            ExternalType::UByte => sys::NC_UBYTE,
            ExternalType::UShort => sys::NC_USHORT,
            ExternalType::UInt32 => sys::NC_UINT,
            ExternalType::Int64 => sys::NC_INT64,
            ExternalType::UInt64 => sys::NC_UINT64,
            ExternalType::String => sys::NC_STRING,
        }
    }

    /// `None` for codes outside the primitive set (user-defined types).
    pub fn from_code(code: nc_type) -> Option<Self> {
        Self::ALL.into_iter().find(|external| external.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ExternalType::Byte => "byte",
            ExternalType::Char => "char",
            ExternalType::Short => "short",
            ExternalType::Int32 => "int",
            ExternalType::Float => "float",
            ExternalType::Double => "double",
            ExternalType::UByte => "ubyte",
            ExternalType::UShort => "ushort",
            ExternalType::UInt32 => "uint",
            ExternalType::Int64 => "int64",
            ExternalType::UInt64 => "uint64",
            ExternalType::String => "string",
        }
    }

    /// Element size in bytes as laid out in engine buffers.
    pub fn size(self) -> usize {
        match self {
            ExternalType::Byte | ExternalType::Char | ExternalType::UByte => 1,
            ExternalType::Short | ExternalType::UShort => 2,
            ExternalType::Int32 | ExternalType::Float | ExternalType::UInt32 => 4,
            ExternalType::Double | ExternalType::Int64 | ExternalType::UInt64 => 8,
            ExternalType::String => std::mem::size_of::<*mut std::os::raw::c_char>(),
        }
    }
}

impl fmt::Display for ExternalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host type that can move values in and out of engine buffers.
pub trait NcType: Sized + Clone {
    /// External type written when no explicit type is requested.
    const EXTERNAL: ExternalType;
    /// Additional codes accepted on read.
    const LEGACY: &'static [ExternalType];

    fn can_read(external: ExternalType) -> bool {
        external == Self::EXTERNAL || Self::LEGACY.contains(&external)
    }

    /// Allocate `len` elements and let `fill` populate them through one engine call.
    fn read_buffer(len: usize, fill: impl FnOnce(*mut c_void) -> c_int) -> Result<Vec<Self>, Error>;

    /// Hand `values` to `write` as a contiguous engine buffer.
    fn write_buffer(values: &[Self], write: impl FnOnce(*const c_void) -> c_int) -> Result<(), Error>;
}

/// Fixed-width numeric host type with a sentinel for not-yet-read slots.
pub trait NcNumeric: NcType + Copy {
    const EMPTY: Self;
}

macro_rules! impl_numeric {
    ($ty:ty, $external:ident, $empty:expr, [$($legacy:ident),*]) => {
        impl NcType for $ty {
            const EXTERNAL: ExternalType = ExternalType::$external;
            const LEGACY: &'static [ExternalType] = &[$(ExternalType::$legacy),*];

            fn read_buffer(
                len: usize,
                fill: impl FnOnce(*mut c_void) -> c_int,
            ) -> Result<Vec<Self>, Error> {
                marshal::read_numeric(len, fill)
            }

            fn write_buffer(
                values: &[Self],
                write: impl FnOnce(*const c_void) -> c_int,
            ) -> Result<(), Error> {
                marshal::write_numeric(values, write)
            }
        }

        impl NcNumeric for $ty {
            const EMPTY: Self = $empty;
        }
    };
}

impl_numeric!(f32, Float, f32::NAN, []);
impl_numeric!(f64, Double, f64::NAN, []);
impl_numeric!(i8, Byte, i8::MIN, []);
impl_numeric!(u8, UByte, u8::MAX, [Byte, Char]);
impl_numeric!(i16, Short, i16::MIN, []);
impl_numeric!(u16, UShort, u16::MAX, [Short]);
impl_numeric!(i32, Int32, i32::MIN, []);
impl_numeric!(u32, UInt32, u32::MAX, [Int32]);
impl_numeric!(i64, Int64, i64::MIN, []);
impl_numeric!(u64, UInt64, u64::MAX, [Int64]);
#[cfg(target_pointer_width = "64")]
impl_numeric!(isize, Int64, isize::MIN, []);
#[cfg(target_pointer_width = "64")]
impl_numeric!(usize, UInt64, usize::MAX, [Int64]);

impl NcType for String {
    const EXTERNAL: ExternalType = ExternalType::String;
    const LEGACY: &'static [ExternalType] = &[];

    fn read_buffer(len: usize, fill: impl FnOnce(*mut c_void) -> c_int) -> Result<Vec<Self>, Error> {
        marshal::read_strings(len, fill)
    }

    fn write_buffer(values: &[Self], write: impl FnOnce(*const c_void) -> c_int) -> Result<(), Error> {
        marshal::write_strings(values, write)
    }
}

#[cfg(test)]
mod tests {
    use super::{ExternalType, NcNumeric, NcType};

    fn readable<T: NcType>() -> Vec<ExternalType> {
        ExternalType::ALL
            .into_iter()
            .filter(|&external| T::can_read(external))
            .collect()
    }

    #[test]
    fn codes_are_fixed() {
        let codes: Vec<i32> = ExternalType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes, (1..=12).collect::<Vec<_>>());
        assert_eq!(ExternalType::from_code(13), None);
        assert_eq!(ExternalType::from_code(4), Some(ExternalType::Int32));
    }

    #[test]
    fn can_read_truth_table() {
        use ExternalType::*;
        assert_eq!(readable::<f32>(), vec![Float]);
        assert_eq!(readable::<f64>(), vec![Double]);
        assert_eq!(readable::<i8>(), vec![Byte]);
        assert_eq!(readable::<u8>(), vec![Byte, Char, UByte]);
        assert_eq!(readable::<i16>(), vec![Short]);
        assert_eq!(readable::<u16>(), vec![Short, UShort]);
        assert_eq!(readable::<i32>(), vec![Int32]);
        assert_eq!(readable::<u32>(), vec![Int32, UInt32]);
        assert_eq!(readable::<i64>(), vec![Int64]);
        assert_eq!(readable::<u64>(), vec![Int64, UInt64]);
        assert_eq!(readable::<isize>(), vec![Int64]);
        assert_eq!(readable::<usize>(), vec![Int64, UInt64]);
        assert_eq!(readable::<std::string::String>(), vec![String]);
    }

    #[test]
    fn sentinels_mark_unread_slots() {
        assert!(f32::EMPTY.is_nan());
        assert!(f64::EMPTY.is_nan());
        assert_eq!(i16::EMPTY, i16::MIN);
        assert_eq!(u32::EMPTY, u32::MAX);
    }

    #[test]
    fn sizes_match_host_layout() {
        assert_eq!(ExternalType::Short.size(), std::mem::size_of::<i16>());
        assert_eq!(ExternalType::Double.size(), std::mem::size_of::<f64>());
        assert_eq!(ExternalType::UInt64.size(), std::mem::size_of::<u64>());
    }
}
