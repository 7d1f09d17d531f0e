//! Purpose: Opaque engine identifiers and one thin wrapper per engine call.
//! Exports: `NcId`, `VarId`, `DimId`, `TypeId`, `VarInfo`.
//! Role: Safe boundary over `core::sys`; every wrapper goes through `core::gate`.
//! Invariants: Ids are built only from engine answers; constructors are crate-internal.
//! Invariants: A `VarId` carries the container id it came from and is only used against it.
//! Invariants: Each wrapper issues one gated call per engine function it names; an attribute
//! read also re-checks the stored type and length inside its acquisition.
use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_void};
use std::ptr;

use crate::core::error::{Error, ErrorKind, Lookup, check};
use crate::core::gate;
use crate::core::sys::{self, nc_type};
use crate::core::types::{ExternalType, NcType};

/// Container or group id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NcId(c_int);

/// Variable id bound to the container/group it was obtained from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct VarId {
    ncid: NcId,
    varid: c_int,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DimId(c_int);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TypeId(nc_type);

/// Snapshot returned by `nc_inq_var`.
#[derive(Clone, Debug)]
pub struct VarInfo {
    pub name: String,
    pub xtype: TypeId,
    pub dimids: Vec<DimId>,
    pub natts: usize,
}

pub(crate) fn c_name(name: &str) -> Result<CString, Error> {
    CString::new(name).map_err(|err| {
        Error::new(ErrorKind::BadName)
            .with_message(format!("name {name:?} contains a NUL byte"))
            .with_source(err)
    })
}

fn lookup<T>(status: c_int, missing: c_int, found: impl FnOnce() -> T) -> Lookup<T> {
    Lookup::from_status(status, missing).map(|()| found())
}

fn count(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Element count of a hyperslab; an overflowing product is a caller error, not a panic.
pub(crate) fn selection_len(count: &[usize]) -> Result<usize, Error> {
    count
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| {
            Error::new(ErrorKind::ElementCountMismatch)
                .with_message(format!("selection {count:?} has more elements than fit in memory"))
        })
}

/// Two-step id list: ask for the count, then fetch that many ids.
fn id_list(
    op: &'static str,
    call: impl Fn(*mut c_int, *mut c_int) -> c_int,
) -> Result<Vec<c_int>, Error> {
    let mut n: c_int = 0;
    check(gate::exec(op, || call(&mut n, ptr::null_mut())))?;
    let mut ids = vec![0; count(n)];
    if ids.is_empty() {
        return Ok(ids);
    }
    check(gate::exec(op, || call(ptr::null_mut(), ids.as_mut_ptr())))?;
    Ok(ids)
}

pub(crate) fn library_version() -> String {
    let mut version = String::new();
    gate::exec("nc_inq_libvers", || {
        let raw = unsafe { sys::nc_inq_libvers() };
        if !raw.is_null() {
            version = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        }
        sys::NC_NOERR
    });
    version
}

impl NcId {
    pub fn raw(self) -> c_int {
        self.0
    }

    pub(crate) fn create(path: &CStr, cmode: c_int) -> Result<Self, Error> {
        let mut ncid = 0;
        check(gate::exec("nc_create", || unsafe {
            sys::nc_create(path.as_ptr(), cmode, &mut ncid)
        }))?;
        Ok(Self(ncid))
    }

    pub(crate) fn open(path: &CStr, mode: c_int) -> Result<Self, Error> {
        let mut ncid = 0;
        check(gate::exec("nc_open", || unsafe {
            sys::nc_open(path.as_ptr(), mode, &mut ncid)
        }))?;
        Ok(Self(ncid))
    }

    /// The engine only reads from `memory` for read-only opens.
    pub(crate) fn open_memory(name: &CStr, mode: c_int, memory: &[u8]) -> Result<Self, Error> {
        let mut ncid = 0;
        check(gate::exec("nc_open_mem", || unsafe {
            sys::nc_open_mem(
                name.as_ptr(),
                mode,
                memory.len(),
                memory.as_ptr() as *mut c_void,
                &mut ncid,
            )
        }))?;
        Ok(Self(ncid))
    }

    pub(crate) fn close(self) -> Result<(), Error> {
        check(gate::exec("nc_close", || unsafe { sys::nc_close(self.0) }))
    }

    pub(crate) fn sync(self) -> Result<(), Error> {
        check(gate::exec("nc_sync", || unsafe { sys::nc_sync(self.0) }))
    }

    pub(crate) fn redef(self) -> Result<(), Error> {
        check(gate::exec("nc_redef", || unsafe { sys::nc_redef(self.0) }))
    }

    pub(crate) fn enddef(self) -> Result<(), Error> {
        check(gate::exec("nc_enddef", || unsafe { sys::nc_enddef(self.0) }))
    }

    /// Returns the previous fill mode.
    pub(crate) fn set_fill(self, mode: c_int) -> Result<c_int, Error> {
        let mut old = 0;
        check(gate::exec("nc_set_fill", || unsafe {
            sys::nc_set_fill(self.0, mode, &mut old)
        }))?;
        Ok(old)
    }

    pub(crate) fn global(self) -> VarId {
        VarId {
            ncid: self,
            varid: sys::NC_GLOBAL,
        }
    }

    pub(crate) fn inq_varids(self) -> Result<Vec<VarId>, Error> {
        let ids = id_list("nc_inq_varids", |n, ids| unsafe {
            sys::nc_inq_varids(self.0, n, ids)
        })?;
        Ok(ids
            .into_iter()
            .map(|varid| VarId { ncid: self, varid })
            .collect())
    }

    pub(crate) fn inq_varid(self, name: &str) -> Lookup<VarId> {
        let name = match c_name(name) {
            Ok(name) => name,
            Err(err) => return Lookup::Failed(err),
        };
        let mut varid = 0;
        let status = gate::exec("nc_inq_varid", || unsafe {
            sys::nc_inq_varid(self.0, name.as_ptr(), &mut varid)
        });
        lookup(status, sys::NC_ENOTVAR, || VarId { ncid: self, varid })
    }

    pub(crate) fn def_grp(self, name: &str) -> Result<NcId, Error> {
        let name = c_name(name)?;
        let mut ncid = 0;
        check(gate::exec("nc_def_grp", || unsafe {
            sys::nc_def_grp(self.0, name.as_ptr(), &mut ncid)
        }))?;
        Ok(NcId(ncid))
    }

    pub(crate) fn inq_grpname(self) -> Result<String, Error> {
        let (status, name) =
            gate::exec_with_name("nc_inq_grpname", |buf| unsafe { sys::nc_inq_grpname(self.0, buf) });
        check(status)?;
        Ok(name)
    }

    pub(crate) fn inq_grps(self) -> Result<Vec<NcId>, Error> {
        let ids = id_list("nc_inq_grps", |n, ids| unsafe { sys::nc_inq_grps(self.0, n, ids) })?;
        Ok(ids.into_iter().map(NcId).collect())
    }

    pub(crate) fn inq_grp_ncid(self, name: &str) -> Lookup<NcId> {
        let name = match c_name(name) {
            Ok(name) => name,
            Err(err) => return Lookup::Failed(err),
        };
        let mut ncid = 0;
        let status = gate::exec("nc_inq_grp_ncid", || unsafe {
            sys::nc_inq_grp_ncid(self.0, name.as_ptr(), &mut ncid)
        });
        lookup(status, sys::NC_ENOGRP, || NcId(ncid))
    }

    /// `Missing` for the root group.
    pub(crate) fn inq_grp_parent(self) -> Lookup<NcId> {
        let mut ncid = 0;
        let status = gate::exec("nc_inq_grp_parent", || unsafe {
            sys::nc_inq_grp_parent(self.0, &mut ncid)
        });
        lookup(status, sys::NC_ENOGRP, || NcId(ncid))
    }

    pub(crate) fn def_dim(self, name: &str, len: usize) -> Result<DimId, Error> {
        let name = c_name(name)?;
        let mut dimid = 0;
        check(gate::exec("nc_def_dim", || unsafe {
            sys::nc_def_dim(self.0, name.as_ptr(), len, &mut dimid)
        }))?;
        Ok(DimId(dimid))
    }

    pub(crate) fn inq_dim(self, dimid: DimId) -> Result<(String, usize), Error> {
        let mut len = 0usize;
        let (status, name) = gate::exec_with_name("nc_inq_dim", |buf| unsafe {
            sys::nc_inq_dim(self.0, dimid.0, buf, &mut len)
        });
        check(status)?;
        Ok((name, len))
    }

    pub(crate) fn inq_dimlen(self, dimid: DimId) -> Result<usize, Error> {
        let mut len = 0usize;
        check(gate::exec("nc_inq_dimlen", || unsafe {
            sys::nc_inq_dimlen(self.0, dimid.0, &mut len)
        }))?;
        Ok(len)
    }

    pub(crate) fn inq_dimid(self, name: &str) -> Lookup<DimId> {
        let name = match c_name(name) {
            Ok(name) => name,
            Err(err) => return Lookup::Failed(err),
        };
        let mut dimid = 0;
        let status = gate::exec("nc_inq_dimid", || unsafe {
            sys::nc_inq_dimid(self.0, name.as_ptr(), &mut dimid)
        });
        lookup(status, sys::NC_EBADDIM, || DimId(dimid))
    }

    pub(crate) fn inq_dimids(self, include_parents: bool) -> Result<Vec<DimId>, Error> {
        let ids = id_list("nc_inq_dimids", |n, ids| unsafe {
            sys::nc_inq_dimids(self.0, n, ids, include_parents as c_int)
        })?;
        Ok(ids.into_iter().map(DimId).collect())
    }

    /// Unlimited dimensions visible from this group.
    pub(crate) fn inq_unlimdims(self) -> Result<Vec<DimId>, Error> {
        let ids = id_list("nc_inq_unlimdims", |n, ids| unsafe {
            sys::nc_inq_unlimdims(self.0, n, ids)
        })?;
        Ok(ids.into_iter().map(DimId).collect())
    }

    pub(crate) fn def_var(self, name: &str, xtype: TypeId, dimids: &[DimId]) -> Result<VarId, Error> {
        let name = c_name(name)?;
        let raw: Vec<c_int> = dimids.iter().map(|dimid| dimid.0).collect();
        let ndims = c_int::try_from(raw.len()).map_err(|_| {
            Error::new(ErrorKind::DimensionCountMismatch).with_message("too many dimensions")
        })?;
        let mut varid = 0;
        check(gate::exec("nc_def_var", || unsafe {
            sys::nc_def_var(self.0, name.as_ptr(), xtype.0, ndims, raw.as_ptr(), &mut varid)
        }))?;
        Ok(VarId { ncid: self, varid })
    }
}

impl VarId {
    pub fn ncid(self) -> NcId {
        self.ncid
    }

    pub fn raw(self) -> c_int {
        self.varid
    }

    pub fn is_global(self) -> bool {
        self.varid == sys::NC_GLOBAL
    }

    pub(crate) fn inq(self) -> Result<VarInfo, Error> {
        let mut ndims = 0;
        check(gate::exec("nc_inq_varndims", || unsafe {
            sys::nc_inq_varndims(self.ncid.0, self.varid, &mut ndims)
        }))?;
        let mut dimids = vec![0; count(ndims)];
        let mut xtype = 0;
        let mut natts = 0;
        let (status, name) = gate::exec_with_name("nc_inq_var", |buf| unsafe {
            sys::nc_inq_var(
                self.ncid.0,
                self.varid,
                buf,
                &mut xtype,
                ptr::null_mut(),
                dimids.as_mut_ptr(),
                &mut natts,
            )
        });
        check(status)?;
        Ok(VarInfo {
            name,
            xtype: TypeId(xtype),
            dimids: dimids.into_iter().map(DimId).collect(),
            natts: count(natts),
        })
    }

    /// Works for `NC_GLOBAL` as well as real variables.
    pub(crate) fn inq_natts(self) -> Result<usize, Error> {
        let mut natts = 0;
        check(gate::exec("nc_inq_varnatts", || unsafe {
            sys::nc_inq_varnatts(self.ncid.0, self.varid, &mut natts)
        }))?;
        Ok(count(natts))
    }

    pub(crate) fn inq_att(self, name: &str) -> Lookup<(TypeId, usize)> {
        let name = match c_name(name) {
            Ok(name) => name,
            Err(err) => return Lookup::Failed(err),
        };
        let mut xtype = 0;
        let mut len = 0usize;
        let status = gate::exec("nc_inq_att", || unsafe {
            sys::nc_inq_att(self.ncid.0, self.varid, name.as_ptr(), &mut xtype, &mut len)
        });
        lookup(status, sys::NC_ENOTATT, || (TypeId(xtype), len))
    }

    pub(crate) fn inq_attname(self, index: usize) -> Result<String, Error> {
        let attnum = c_int::try_from(index)
            .map_err(|_| Error::new(ErrorKind::AttributeNotFound).with_message("index out of range"))?;
        let (status, name) = gate::exec_with_name("nc_inq_attname", |buf| unsafe {
            sys::nc_inq_attname(self.ncid.0, self.varid, attnum, buf)
        });
        check(status)?;
        Ok(name)
    }

    /// Read an attribute expected to hold `len` elements of `xtype`.
    ///
    /// The stored type and length are re-checked under the same gate acquisition as the read.
    pub(crate) fn get_att<T: NcType>(
        self,
        name: &str,
        xtype: TypeId,
        len: usize,
    ) -> Result<Vec<T>, Error> {
        let raw_name = c_name(name)?;
        let mut changed = false;
        let values = T::read_buffer(len, |buf| {
            gate::exec("nc_get_att", || unsafe {
                let (mut stored_type, mut stored_len) = (0, 0usize);
                let status =
                    sys::nc_inq_att(self.ncid.0, self.varid, raw_name.as_ptr(), &mut stored_type, &mut stored_len);
                if status != sys::NC_NOERR {
                    return status;
                }
                if stored_type != xtype.0 || stored_len != len {
                    changed = true;
                    return sys::NC_NOERR;
                }
                sys::nc_get_att(self.ncid.0, self.varid, raw_name.as_ptr(), buf)
            })
        })?;
        if changed {
            return Err(Error::new(ErrorKind::ElementCountMismatch)
                .with_message(format!("attribute {name:?} changed while it was being read")));
        }
        Ok(values)
    }

    pub(crate) fn put_att<T: NcType>(self, name: &str, xtype: TypeId, values: &[T]) -> Result<(), Error> {
        let name = c_name(name)?;
        T::write_buffer(values, |buf| {
            gate::exec("nc_put_att", || unsafe {
                sys::nc_put_att(self.ncid.0, self.varid, name.as_ptr(), xtype.0, values.len(), buf)
            })
        })
    }

    pub(crate) fn del_att(self, name: &str) -> Result<(), Error> {
        let name = c_name(name)?;
        check(gate::exec("nc_del_att", || unsafe {
            sys::nc_del_att(self.ncid.0, self.varid, name.as_ptr())
        }))
    }

    pub(crate) fn get_vara<T: NcType>(self, start: &[usize], count: &[usize]) -> Result<Vec<T>, Error> {
        let len = selection_len(count)?;
        T::read_buffer(len, |buf| {
            gate::exec("nc_get_vara", || unsafe {
                sys::nc_get_vara(self.ncid.0, self.varid, start.as_ptr(), count.as_ptr(), buf)
            })
        })
    }

    pub(crate) fn get_vars<T: NcType>(
        self,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
    ) -> Result<Vec<T>, Error> {
        let len = selection_len(count)?;
        T::read_buffer(len, |buf| {
            gate::exec("nc_get_vars", || unsafe {
                sys::nc_get_vars(
                    self.ncid.0,
                    self.varid,
                    start.as_ptr(),
                    count.as_ptr(),
                    stride.as_ptr(),
                    buf,
                )
            })
        })
    }

    pub(crate) fn put_vara<T: NcType>(self, start: &[usize], count: &[usize], data: &[T]) -> Result<(), Error> {
        T::write_buffer(data, |buf| {
            gate::exec("nc_put_vara", || unsafe {
                sys::nc_put_vara(self.ncid.0, self.varid, start.as_ptr(), count.as_ptr(), buf)
            })
        })
    }

    pub(crate) fn put_vars<T: NcType>(
        self,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        data: &[T],
    ) -> Result<(), Error> {
        T::write_buffer(data, |buf| {
            gate::exec("nc_put_vars", || unsafe {
                sys::nc_put_vars(
                    self.ncid.0,
                    self.varid,
                    start.as_ptr(),
                    count.as_ptr(),
                    stride.as_ptr(),
                    buf,
                )
            })
        })
    }

    pub(crate) fn def_var_deflate(self, shuffle: bool, deflate: bool, level: c_int) -> Result<(), Error> {
        check(gate::exec("nc_def_var_deflate", || unsafe {
            sys::nc_def_var_deflate(self.ncid.0, self.varid, shuffle as c_int, deflate as c_int, level)
        }))
    }

    /// (shuffle, deflate, level)
    pub(crate) fn inq_var_deflate(self) -> Result<(bool, bool, c_int), Error> {
        let (mut shuffle, mut deflate, mut level) = (0, 0, 0);
        check(gate::exec("nc_inq_var_deflate", || unsafe {
            sys::nc_inq_var_deflate(self.ncid.0, self.varid, &mut shuffle, &mut deflate, &mut level)
        }))?;
        Ok((shuffle != 0, deflate != 0, level))
    }

    pub(crate) fn def_var_chunking(self, storage: c_int, chunks: Option<&[usize]>) -> Result<(), Error> {
        let chunks = chunks.map_or(ptr::null(), <[usize]>::as_ptr);
        check(gate::exec("nc_def_var_chunking", || unsafe {
            sys::nc_def_var_chunking(self.ncid.0, self.varid, storage, chunks)
        }))
    }

    pub(crate) fn inq_var_chunking(self, ndims: usize) -> Result<(c_int, Vec<usize>), Error> {
        let mut storage = 0;
        let mut chunks = vec![0usize; ndims];
        check(gate::exec("nc_inq_var_chunking", || unsafe {
            sys::nc_inq_var_chunking(self.ncid.0, self.varid, &mut storage, chunks.as_mut_ptr())
        }))?;
        Ok((storage, chunks))
    }

    pub(crate) fn def_var_fletcher32(self, enable: bool) -> Result<(), Error> {
        check(gate::exec("nc_def_var_fletcher32", || unsafe {
            sys::nc_def_var_fletcher32(self.ncid.0, self.varid, enable as c_int)
        }))
    }

    pub(crate) fn def_var_endian(self, endian: c_int) -> Result<(), Error> {
        check(gate::exec("nc_def_var_endian", || unsafe {
            sys::nc_def_var_endian(self.ncid.0, self.varid, endian)
        }))
    }

    pub(crate) fn def_var_szip(self, options_mask: c_int, pixels_per_block: c_int) -> Result<(), Error> {
        check(gate::exec("nc_def_var_szip", || unsafe {
            sys::nc_def_var_szip(self.ncid.0, self.varid, options_mask, pixels_per_block)
        }))
    }
}

impl TypeId {
    pub fn code(self) -> nc_type {
        self.0
    }

    /// `None` for user-defined types.
    pub fn external(self) -> Option<ExternalType> {
        ExternalType::from_code(self.0)
    }

    /// Engine-reported (name, size in bytes) of this type within `ncid`.
    pub fn inq_type(self, ncid: NcId) -> Result<(String, usize), Error> {
        let mut size = 0usize;
        let (status, name) = gate::exec_with_name("nc_inq_type", |buf| unsafe {
            sys::nc_inq_type(ncid.0, self.0, buf, &mut size)
        });
        check(status)?;
        Ok((name, size))
    }
}

impl From<ExternalType> for TypeId {
    fn from(external: ExternalType) -> Self {
        TypeId(external.code())
    }
}

impl DimId {
    pub fn raw(self) -> c_int {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{TypeId, selection_len};
    use crate::api::{AttributeProvider, CreateOptions, create};
    use crate::core::error::ErrorKind;
    use crate::core::types::ExternalType;

    #[test]
    fn attribute_reads_reject_a_changed_size_or_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = create(dir.path().join("att.nc"), CreateOptions::new()).expect("create");
        root.set_attribute("a", 5i32).expect("scalar");
        let global = root.id().global();
        let int = TypeId::from(ExternalType::Int32);

        let err = global.get_att::<i32>("a", int, 3).expect_err("length changed");
        assert_eq!(err.kind(), ErrorKind::ElementCountMismatch);
        let err = global
            .get_att::<i32>("a", TypeId::from(ExternalType::Short), 1)
            .expect_err("type changed");
        assert_eq!(err.kind(), ErrorKind::ElementCountMismatch);
        assert_eq!(global.get_att::<i32>("a", int, 1).expect("read"), vec![5]);
    }

    #[test]
    fn selection_length_overflow_is_an_error() {
        assert_eq!(selection_len(&[4, 3]).expect("fits"), 12);
        assert_eq!(selection_len(&[]).expect("scalar"), 1);
        let err = selection_len(&[usize::MAX, 2]).expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::ElementCountMismatch);
    }
}
