//! Purpose: Closed error taxonomy for every failure the binding layer can report.
//! Exports: `ErrorKind`, `Error`, `Lookup`.
//! Role: Single place where raw engine status codes become typed outcomes.
//! Invariants: Name lookups turn their specific "missing" status into `Lookup::Missing`, never an error.
//! Invariants: Every other non-success status is surfaced unchanged; nothing here retries.
use std::error::Error as StdError;
use std::ffi::CStr;
use std::fmt;
use std::io;
use std::os::raw::c_int;
use std::path::PathBuf;

use crate::core::gate;
use crate::core::sys;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    InvalidContainerHandle,
    InvalidVariableHandle,
    InvalidGroupHandle,
    BadName,
    AttributeNotFound,
    AlreadyInDefineMode,
    NoPermission,
    RequiresExtendedFormat,
    StrictLegacyModeViolation,
    NoGroupFound,
    DimensionCountMismatch,
    ElementCountMismatch,
    TooManyOpenHandles,
    OutOfMemory,
    BackingStoreError,
    MetadataError,
    AlreadyExists,
    DatatypeNotCompatible,
    ValueNotConvertible,
    UnknownEngine { code: i32 },
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    path: Option<PathBuf>,
    status: Option<i32>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            path: None,
            status: None,
            source: None,
        }
    }

    /// Translate a non-success engine status.
    ///
    /// Positive codes are OS errno values passed through by the engine.
    pub fn from_status(status: c_int) -> Self {
        let kind = match status {
            libc::ENOENT => ErrorKind::NotFound,
            sys::NC_EBADID => ErrorKind::InvalidContainerHandle,
            sys::NC_ENOTVAR => ErrorKind::InvalidVariableHandle,
            sys::NC_EBADGRPID => ErrorKind::InvalidGroupHandle,
            sys::NC_EBADNAME | sys::NC_EMAXNAME => ErrorKind::BadName,
            sys::NC_ENOTATT => ErrorKind::AttributeNotFound,
            sys::NC_EINDEFINE => ErrorKind::AlreadyInDefineMode,
            sys::NC_EPERM => ErrorKind::NoPermission,
            sys::NC_ENOTNC4 => ErrorKind::RequiresExtendedFormat,
            sys::NC_ESTRICTNC3 => ErrorKind::StrictLegacyModeViolation,
            sys::NC_ENOGRP => ErrorKind::NoGroupFound,
            sys::NC_ENFILE => ErrorKind::TooManyOpenHandles,
            sys::NC_ENOMEM => ErrorKind::OutOfMemory,
            sys::NC_EHDFERR => ErrorKind::BackingStoreError,
            sys::NC_EDIMMETA => ErrorKind::MetadataError,
            sys::NC_EEXIST => ErrorKind::AlreadyExists,
            code => ErrorKind::UnknownEngine { code },
        };
        Self::new(kind)
            .with_status(status)
            .with_message(status_message(status))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Raw engine status this error was translated from, if any.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

/// Turn a raw engine status into `Ok(())` or a typed error.
pub(crate) fn check(status: c_int) -> Result<(), Error> {
    if status == sys::NC_NOERR {
        Ok(())
    } else {
        Err(Error::from_status(status))
    }
}

/// Must not run while the gate is held; callers translate statuses after their call returns.
fn status_message(status: c_int) -> String {
    if status > 0 {
        return io::Error::from_raw_os_error(status).to_string();
    }
    let mut message = None;
    gate::exec("nc_strerror", || {
        let ptr = unsafe { sys::nc_strerror(status) };
        if !ptr.is_null() {
            message = Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned());
        }
        sys::NC_NOERR
    });
    message.unwrap_or_else(|| format!("engine status {status}"))
}

/// Outcome of an engine call whose "missing" status is an expected answer.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    Failed(Error),
}

impl Lookup<()> {
    /// Classify a raw status, treating `missing` as absence rather than failure.
    pub(crate) fn from_status(status: c_int, missing: c_int) -> Self {
        if status == sys::NC_NOERR {
            Lookup::Found(())
        } else if status == missing {
            Lookup::Missing
        } else {
            Lookup::Failed(Error::from_status(status))
        }
    }
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Missing => Lookup::Missing,
            Lookup::Failed(err) => Lookup::Failed(err),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Error> {
        match self {
            Lookup::Found(value) => Ok(Some(value)),
            Lookup::Missing => Ok(None),
            Lookup::Failed(err) => Err(err),
        }
    }
}
