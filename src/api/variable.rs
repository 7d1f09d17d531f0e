//! Purpose: Variable descriptors, typed slice I/O and per-variable storage settings.
//! Exports: `Variable`, `TypedVariable`, `Chunking`, `Deflate`, `Endian`, `SzipOptions`.
//! Role: Data path of the resource tree.
//! Invariants: Offset/count/stride and chunk vectors must match the variable's rank; checked
//! before any engine call.
//! Invariants: Written data length must equal the selected element count; checked before any
//! engine call.
//! Invariants: Selections past the cached length of a fixed dimension fail with the engine's
//! status (`NC_EINVALCOORDS` or `NC_EEDGE`) before any buffer is allocated.
//! Invariants: A typed view exists only when the stored external type is readable as `T`.
use std::marker::PhantomData;

use super::ApiResult;
use super::attribute::{AttributeProvider, AttributeTarget};
use super::container::OpenGuard;
use super::dimension::Dimension;
use super::group::Group;
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::{self, TypeId, VarId};
use crate::core::sys;
use crate::core::types::{ExternalType, NcType};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Chunking {
    Chunked,
    Contiguous,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endian {
    Native,
    Little,
    Big,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SzipOptions {
    EntropyCoding,
    NearestNeighbor,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deflate {
    pub enabled: bool,
    pub level: i32,
    pub shuffle: bool,
}

#[derive(Clone, Debug)]
pub struct Variable {
    group: Group,
    varid: VarId,
    name: String,
    xtype: TypeId,
    dimensions: Vec<Dimension>,
}

impl Variable {
    pub(crate) fn new(
        group: Group,
        varid: VarId,
        name: String,
        xtype: TypeId,
        dimensions: Vec<Dimension>,
    ) -> Self {
        Self {
            group,
            varid,
            name,
            xtype,
            dimensions,
        }
    }

    pub(crate) fn from_id(group: Group, varid: VarId) -> ApiResult<Self> {
        let info = varid.inq()?;
        let unlimited = group.unlimited_dimensions()?;
        let dimensions = info
            .dimids
            .iter()
            .map(|&dimid| Dimension::from_id(group.session(), group.id(), dimid, &unlimited))
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(Self::new(group, varid, info.name, info.xtype, dimensions))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> VarId {
        self.varid
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn type_id(&self) -> TypeId {
        self.xtype
    }

    /// `None` for user-defined types.
    pub fn external_type(&self) -> Option<ExternalType> {
        self.xtype.external()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn number_of_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// Cached dimension lengths; see `refresh_dimensions`.
    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(Dimension::length).collect()
    }

    /// Total element count from the cached shape.
    pub fn count(&self) -> usize {
        self.dimensions.iter().map(Dimension::length).product()
    }

    /// Re-query every dimension length, picking up growth of unlimited dimensions.
    pub fn refresh_dimensions(&mut self) -> ApiResult<()> {
        for dimension in &mut self.dimensions {
            dimension.refresh()?;
        }
        Ok(())
    }

    pub fn as_typed<T: NcType>(&self) -> Option<TypedVariable<T>> {
        self.clone().into_typed()
    }

    pub fn into_typed<T: NcType>(self) -> Option<TypedVariable<T>> {
        let readable = self.external_type().is_some_and(T::can_read);
        readable.then(|| TypedVariable::new(self))
    }

    fn live(&self) -> ApiResult<(OpenGuard<'_>, VarId)> {
        let open = self.group.session().check()?;
        Ok((open, self.varid))
    }

    fn check_rank(&self, what: &str, len: usize) -> ApiResult<()> {
        let rank = self.dimensions.len();
        if len != rank {
            return Err(Error::new(ErrorKind::DimensionCountMismatch).with_message(format!(
                "{what} has {len} entries but {:?} has {rank} dimensions",
                self.name
            )));
        }
        Ok(())
    }

    /// Element count of a selection, checked against the rank and the cached lengths of fixed
    /// dimensions. Unlimited dimensions are left to the engine.
    fn check_selection(
        &self,
        offset: &[usize],
        count: &[usize],
        stride: Option<&[isize]>,
    ) -> ApiResult<usize> {
        self.check_rank("offset", offset.len())?;
        self.check_rank("count", count.len())?;
        if let Some(stride) = stride {
            self.check_rank("stride", stride.len())?;
        }
        for (axis, dimension) in self.dimensions.iter().enumerate() {
            let step = stride.map_or(1, |stride| stride[axis]);
            if dimension.is_unlimited() || step <= 0 {
                continue;
            }
            let (start, n, length) = (offset[axis], count[axis], dimension.length());
            let reach = match n {
                0 => Some(start),
                _ => (n - 1)
                    .checked_mul(step as usize)
                    .and_then(|span| span.checked_add(start))
                    .and_then(|last| last.checked_add(1)),
            };
            let code = if start > length {
                sys::NC_EINVALCOORDS
            } else if reach.is_none_or(|reach| reach > length) {
                sys::NC_EEDGE
            } else {
                continue;
            };
            return Err(Error::new(ErrorKind::UnknownEngine { code })
                .with_status(code)
                .with_message(format!(
                    "selection on {:?} exceeds dimension {:?} of length {length}",
                    self.name,
                    dimension.name()
                )));
        }
        handle::selection_len(count)
    }

    /// Compression settings; only legal before the first data write.
    pub fn define_deflate(&self, enable: bool, level: i32, shuffle: bool) -> ApiResult<()> {
        let (_open, varid) = self.live()?;
        varid.def_var_deflate(shuffle, enable, level)
    }

    /// `chunks` must have one entry per dimension; it is ignored for contiguous storage.
    pub fn define_chunking(&self, chunking: Chunking, chunks: &[usize]) -> ApiResult<()> {
        let (_open, varid) = self.live()?;
        match chunking {
            Chunking::Chunked => {
                self.check_rank("chunk sizes", chunks.len())?;
                varid.def_var_chunking(sys::NC_CHUNKED, Some(chunks))
            }
            Chunking::Contiguous => varid.def_var_chunking(sys::NC_CONTIGUOUS, None),
        }
    }

    pub fn define_checksum(&self, enable: bool) -> ApiResult<()> {
        let (_open, varid) = self.live()?;
        varid.def_var_fletcher32(enable)
    }

    pub fn define_endian(&self, endian: Endian) -> ApiResult<()> {
        let code = match endian {
            Endian::Native => sys::NC_ENDIAN_NATIVE,
            Endian::Little => sys::NC_ENDIAN_LITTLE,
            Endian::Big => sys::NC_ENDIAN_BIG,
        };
        let (_open, varid) = self.live()?;
        varid.def_var_endian(code)
    }

    pub fn define_szip(&self, options: SzipOptions, pixels_per_block: i32) -> ApiResult<()> {
        let mask = match options {
            SzipOptions::EntropyCoding => sys::NC_SZIP_EC,
            SzipOptions::NearestNeighbor => sys::NC_SZIP_NN,
        };
        let (_open, varid) = self.live()?;
        varid.def_var_szip(mask, pixels_per_block)
    }

    pub fn deflate(&self) -> ApiResult<Deflate> {
        let (_open, varid) = self.live()?;
        let (shuffle, enabled, level) = varid.inq_var_deflate()?;
        Ok(Deflate {
            enabled,
            level,
            shuffle,
        })
    }

    /// Storage layout and, for chunked storage, the chunk sizes.
    pub fn chunking(&self) -> ApiResult<(Chunking, Vec<usize>)> {
        let (_open, varid) = self.live()?;
        let (storage, chunks) = varid.inq_var_chunking(self.dimensions.len())?;
        if storage == sys::NC_CONTIGUOUS {
            Ok((Chunking::Contiguous, Vec::new()))
        } else {
            Ok((Chunking::Chunked, chunks))
        }
    }
}

impl AttributeProvider for Variable {
    fn attribute_target(&self) -> AttributeTarget {
        AttributeTarget::new(self.group.session().clone(), self.varid)
    }
}

/// Variable whose stored type is readable as `T`.
#[derive(Clone, Debug)]
pub struct TypedVariable<T> {
    variable: Variable,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NcType> TypedVariable<T> {
    pub(crate) fn new(variable: Variable) -> Self {
        Self {
            variable,
            _marker: PhantomData,
        }
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn variable_mut(&mut self) -> &mut Variable {
        &mut self.variable
    }

    pub fn into_inner(self) -> Variable {
        self.variable
    }

    /// Whole variable at its cached shape.
    pub fn read(&self) -> ApiResult<Vec<T>> {
        let shape = self.variable.shape();
        self.read_at(&vec![0; shape.len()], &shape)
    }

    pub fn read_at(&self, offset: &[usize], count: &[usize]) -> ApiResult<Vec<T>> {
        self.variable.check_selection(offset, count, None)?;
        let (_open, varid) = self.variable.live()?;
        varid.get_vara(offset, count)
    }

    pub fn read_strided(&self, offset: &[usize], count: &[usize], stride: &[isize]) -> ApiResult<Vec<T>> {
        self.variable.check_selection(offset, count, Some(stride))?;
        let (_open, varid) = self.variable.live()?;
        varid.get_vars(offset, count, stride)
    }

    /// Whole variable at its cached shape; `data` must hold exactly `count()` elements.
    pub fn write(&self, data: &[T]) -> ApiResult<()> {
        let shape = self.variable.shape();
        self.write_at(&vec![0; shape.len()], &shape, data)
    }

    pub fn write_at(&self, offset: &[usize], count: &[usize], data: &[T]) -> ApiResult<()> {
        check_len(data.len(), self.variable.check_selection(offset, count, None)?)?;
        let (_open, varid) = self.variable.live()?;
        varid.put_vara(offset, count, data)
    }

    pub fn write_strided(
        &self,
        offset: &[usize],
        count: &[usize],
        stride: &[isize],
        data: &[T],
    ) -> ApiResult<()> {
        check_len(data.len(), self.variable.check_selection(offset, count, Some(stride))?)?;
        let (_open, varid) = self.variable.live()?;
        varid.put_vars(offset, count, stride, data)
    }
}

impl<T: NcType> AttributeProvider for TypedVariable<T> {
    fn attribute_target(&self) -> AttributeTarget {
        self.variable.attribute_target()
    }
}

fn check_len(actual: usize, expected: usize) -> ApiResult<()> {
    if actual != expected {
        return Err(Error::new(ErrorKind::ElementCountMismatch)
            .with_message(format!("expected {expected} elements, got {actual}")));
    }
    Ok(())
}
