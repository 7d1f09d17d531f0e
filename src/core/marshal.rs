//! Purpose: Allocate, fill and read back host buffers around one engine call.
//! Exports: `read_numeric`, `write_numeric`, `read_strings`, `write_strings` (crate-internal).
//! Role: Buffer half of the type registry; `NcType` impls delegate here.
//! Invariants: Numeric buffers start filled with the type sentinel; writes pass host memory directly.
//! Invariants: Engine-allocated strings are copied out, then released through `nc_free_string`.
//! Invariants: Per-string storage for writes outlives the call and is dropped right after it.
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use crate::core::error::{Error, ErrorKind, check};
use crate::core::gate;
use crate::core::sys;
use crate::core::types::NcNumeric;

pub(crate) fn read_numeric<T: NcNumeric>(
    len: usize,
    fill: impl FnOnce(*mut c_void) -> c_int,
) -> Result<Vec<T>, Error> {
    let mut values = buffer(len, T::EMPTY)?;
    check(fill(values.as_mut_ptr().cast()))?;
    Ok(values)
}

/// `len` copies of `init`, or `OutOfMemory` instead of an allocation panic.
fn buffer<T: Clone>(len: usize, init: T) -> Result<Vec<T>, Error> {
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|err| {
        Error::new(ErrorKind::OutOfMemory)
            .with_message(format!("cannot allocate a {len}-element read buffer"))
            .with_source(err)
    })?;
    values.resize(len, init);
    Ok(values)
}

pub(crate) fn write_numeric<T: NcNumeric>(
    values: &[T],
    write: impl FnOnce(*const c_void) -> c_int,
) -> Result<(), Error> {
    check(write(values.as_ptr().cast()))
}

pub(crate) fn read_strings(
    len: usize,
    fill: impl FnOnce(*mut c_void) -> c_int,
) -> Result<Vec<String>, Error> {
    let mut slots: Vec<*mut c_char> = buffer(len, ptr::null_mut())?;
    let status = fill(slots.as_mut_ptr().cast());
    let values = slots
        .iter()
        .map(|&slot| {
            if slot.is_null() {
                String::new()
            } else {
                unsafe { CStr::from_ptr(slot) }.to_string_lossy().into_owned()
            }
        })
        .collect();
    release_strings(&mut slots);
    check(status)?;
    Ok(values)
}

// Failed calls may still have populated some slots.
fn release_strings(slots: &mut [*mut c_char]) {
    if slots.iter().all(|slot| slot.is_null()) {
        return;
    }
    let status = gate::exec("nc_free_string", || unsafe {
        sys::nc_free_string(slots.len(), slots.as_mut_ptr())
    });
    if status != sys::NC_NOERR {
        tracing::warn!(status, count = slots.len(), "failed to release engine strings");
    }
}

pub(crate) fn write_strings(
    values: &[String],
    write: impl FnOnce(*const c_void) -> c_int,
) -> Result<(), Error> {
    let owned = values
        .iter()
        .map(|value| {
            CString::new(value.as_str()).map_err(|err| {
                Error::new(ErrorKind::ValueNotConvertible)
                    .with_message("string contains an interior NUL byte")
                    .with_source(err)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let pointers: Vec<*const c_char> = owned.iter().map(|value| value.as_ptr()).collect();
    check(write(pointers.as_ptr().cast()))
}

#[cfg(test)]
mod tests {
    use super::{read_numeric, read_strings, write_strings};
    use crate::core::error::ErrorKind;
    use crate::core::sys;
    use std::ffi::{CStr, CString};
    use std::os::raw::c_char;

    #[test]
    fn failed_numeric_read_is_an_error() {
        let err = read_numeric::<f64>(3, |_| sys::NC_EHDFERR).expect_err("status surfaces");
        assert_eq!(err.kind(), ErrorKind::BackingStoreError);

        let values = read_numeric::<i16>(2, |_| sys::NC_NOERR).expect("read");
        assert_eq!(values, vec![i16::MIN, i16::MIN]);
    }

    #[test]
    fn unallocatable_buffers_fail_before_the_engine_runs() {
        let mut called = false;
        let err = read_numeric::<f64>(usize::MAX, |_| {
            called = true;
            sys::NC_NOERR
        })
        .expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        let err = read_strings(usize::MAX / 2, |_| {
            called = true;
            sys::NC_NOERR
        })
        .expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert!(!called);
    }

    // Slots are allocated the way the reference engine allocates them.
    #[cfg(not(feature = "libnetcdf"))]
    #[test]
    fn strings_are_copied_and_released() {
        let values = read_strings(2, |buf| {
            let slots = buf.cast::<*mut c_char>();
            unsafe {
                *slots = CString::new("north").expect("cstring").into_raw();
                *slots.add(1) = CString::new("south").expect("cstring").into_raw();
            }
            sys::NC_NOERR
        })
        .expect("read");
        assert_eq!(values, vec!["north".to_string(), "south".to_string()]);
    }

    #[test]
    fn string_writes_are_null_terminated() {
        let values = vec!["a".to_string(), "bc".to_string()];
        write_strings(&values, |buf| {
            let pointers = buf.cast::<*const c_char>();
            let second = unsafe { CStr::from_ptr(*pointers.add(1)) };
            assert_eq!(second.to_bytes(), b"bc");
            sys::NC_NOERR
        })
        .expect("write");

        let err = write_strings(&["nul\0byte".to_string()], |_| sys::NC_NOERR)
            .expect_err("interior nul");
        assert_eq!(err.kind(), ErrorKind::ValueNotConvertible);
    }
}
