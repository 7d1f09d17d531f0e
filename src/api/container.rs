//! Purpose: Open, create and close datasets; own the engine session behind every descriptor.
//! Exports: `create`, `open`, `open_memory`, `library_version`, `CreateOptions`, `Format`,
//! `OpenMode`, `FillMode`.
//! Role: Entry points of the public API; every descriptor shares one `Session`.
//! Invariants: Exactly one session per open dataset; it closes on explicit close or last drop.
//! Invariants: After close, descriptors fail with `InvalidContainerHandle` before any engine call.
//! Invariants: Calls made under a `check` guard finish before close starts; none run after it.
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use bytes::Bytes;

use super::ApiResult;
use super::group::Group;
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::{self, NcId};
use crate::core::sys;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    #[default]
    NetCdf4,
    /// Classic format: strict define/data modes, no groups or extended types.
    Classic,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FillMode {
    Fill,
    NoFill,
}

impl FillMode {
    pub(crate) fn code(self) -> i32 {
        match self {
            FillMode::Fill => sys::NC_FILL,
            FillMode::NoFill => sys::NC_NOFILL,
        }
    }

    pub(crate) fn from_code(code: i32) -> Self {
        if code == sys::NC_NOFILL {
            FillMode::NoFill
        } else {
            FillMode::Fill
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CreateOptions {
    overwrite: bool,
    format: Format,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    fn cmode(self) -> i32 {
        let clobber = if self.overwrite {
            sys::NC_CLOBBER
        } else {
            sys::NC_NOCLOBBER
        };
        match self.format {
            Format::NetCdf4 => clobber | sys::NC_NETCDF4,
            Format::Classic => clobber,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Origin {
    File(PathBuf),
    /// The buffer must outlive the engine's view of it.
    Memory(#[allow(dead_code)] Bytes),
}

/// One open dataset. Shared by every descriptor derived from it.
#[derive(Debug)]
pub(crate) struct Session {
    ncid: NcId,
    /// `true` while open. Readers hold it across their engine calls; close takes it exclusively.
    open: RwLock<bool>,
    origin: Origin,
}

/// Keeps the container open for as long as it is held. Never take a second one on the same
/// thread while holding the first.
pub(crate) type OpenGuard<'a> = RwLockReadGuard<'a, bool>;

impl Session {
    fn new(ncid: NcId, origin: Origin) -> Arc<Self> {
        Arc::new(Self {
            ncid,
            open: RwLock::new(true),
            origin,
        })
    }

    pub(crate) fn check(&self) -> ApiResult<OpenGuard<'_>> {
        let open = self.open.read().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return Err(Error::new(ErrorKind::InvalidContainerHandle)
                .with_message("container is closed")
                .with_status(sys::NC_EBADID));
        }
        Ok(open)
    }

    pub(crate) fn root(&self) -> NcId {
        self.ncid
    }

    /// Waits for in-flight calls on this container, then closes it.
    pub(crate) fn close(&self) -> ApiResult<()> {
        let mut open = self.open.write().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            return Err(Error::new(ErrorKind::InvalidContainerHandle)
                .with_message("container is already closed"));
        }
        *open = false;
        tracing::debug!(ncid = self.ncid.raw(), origin = ?self.origin, "closing container");
        self.ncid.close().map_err(|err| self.annotate(err))
    }

    fn annotate(&self, err: Error) -> Error {
        match &self.origin {
            Origin::File(path) => err.with_path(path),
            Origin::Memory(_) => err,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let open = self.open.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !std::mem::replace(open, false) {
            return;
        }
        if let Err(err) = self.ncid.close() {
            tracing::warn!(ncid = self.ncid.raw(), error = %err, "implicit close failed");
        }
    }
}

fn c_path(path: &Path) -> ApiResult<CString> {
    CString::new(path.as_os_str().as_encoded_bytes()).map_err(|err| {
        Error::new(ErrorKind::BadName)
            .with_message("path contains a NUL byte")
            .with_path(path)
            .with_source(err)
    })
}

/// Create a new dataset; it starts in define mode.
pub fn create(path: impl AsRef<Path>, options: CreateOptions) -> ApiResult<Group> {
    let path = path.as_ref();
    let ncid = NcId::create(&c_path(path)?, options.cmode()).map_err(|err| err.with_path(path))?;
    tracing::debug!(ncid = ncid.raw(), path = %path.display(), format = ?options.format, "created container");
    Group::root(Session::new(ncid, Origin::File(path.to_path_buf())))
}

/// Open an existing dataset; a missing path fails with `NotFound`.
pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> ApiResult<Group> {
    let path = path.as_ref();
    let omode = match mode {
        OpenMode::ReadOnly => sys::NC_NOWRITE,
        OpenMode::ReadWrite => sys::NC_WRITE,
    };
    let ncid = NcId::open(&c_path(path)?, omode).map_err(|err| err.with_path(path))?;
    tracing::debug!(ncid = ncid.raw(), path = %path.display(), ?mode, "opened container");
    Group::root(Session::new(ncid, Origin::File(path.to_path_buf())))
}

/// Open a read-only dataset from bytes held for the lifetime of the container.
pub fn open_memory(memory: impl Into<Bytes>, name: &str) -> ApiResult<Group> {
    let memory = memory.into();
    let name = handle::c_name(name)?;
    let ncid = NcId::open_memory(&name, sys::NC_NOWRITE, &memory)?;
    tracing::debug!(ncid = ncid.raw(), len = memory.len(), "opened in-memory container");
    Group::root(Session::new(ncid, Origin::Memory(memory)))
}

/// Version string reported by the engine.
pub fn library_version() -> String {
    handle::library_version()
}
