//! Purpose: Group descriptors: namespace lookups, enumeration, definitions and mode control.
//! Exports: `Group`.
//! Role: Root of the resource tree; dimensions, variables and subgroups are reached from here.
//! Invariants: Name lookups return `Ok(None)` on the engine's "not found" status only.
//! Invariants: Parents are held by id, never by reference; `parent()` rebuilds the descriptor.
//! Invariants: Enumeration is two-step: id list first, then one inquiry per id.
use std::sync::Arc;

use super::ApiResult;
use super::attribute::{AttributeProvider, AttributeTarget};
use super::container::{FillMode, Session};
use super::dimension::Dimension;
use super::variable::{TypedVariable, Variable};
use crate::core::error::{Error, ErrorKind};
use crate::core::handle::{DimId, NcId, TypeId};
use crate::core::sys;
use crate::core::types::{ExternalType, NcType};

#[derive(Clone, Debug)]
pub struct Group {
    session: Arc<Session>,
    ncid: NcId,
    name: String,
    parent: Option<NcId>,
}

impl Group {
    pub(crate) fn root(session: Arc<Session>) -> ApiResult<Self> {
        let ncid = session.root();
        Self::from_id(session, ncid)
    }

    fn from_id(session: Arc<Session>, ncid: NcId) -> ApiResult<Self> {
        let name = ncid.inq_grpname()?;
        let parent = ncid.inq_grp_parent().into_result()?;
        Ok(Self {
            session,
            ncid,
            name,
            parent,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> NcId {
        self.ncid
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Unlimited dimensions visible from this group, collected up the parent chain.
    pub(crate) fn unlimited_dimensions(&self) -> ApiResult<Vec<DimId>> {
        let mut unlimited = Vec::new();
        let mut next = Some(self.ncid);
        while let Some(ncid) = next {
            unlimited.extend(ncid.inq_unlimdims()?);
            next = ncid.inq_grp_parent().into_result()?;
        }
        Ok(unlimited)
    }

    /// Rebuild the parent descriptor; `None` for the root.
    pub fn parent(&self) -> ApiResult<Option<Group>> {
        let _open = self.session.check()?;
        match self.parent {
            Some(parent) => Group::from_id(Arc::clone(&self.session), parent).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_group(&self, name: &str) -> ApiResult<Option<Group>> {
        let _open = self.session.check()?;
        match self.ncid.inq_grp_ncid(name).into_result()? {
            Some(ncid) => Ok(Some(Group {
                session: Arc::clone(&self.session),
                ncid,
                name: name.to_string(),
                parent: Some(self.ncid),
            })),
            None => Ok(None),
        }
    }

    pub fn get_groups(&self) -> ApiResult<Vec<Group>> {
        let _open = self.session.check()?;
        self.ncid
            .inq_grps()?
            .into_iter()
            .map(|ncid| {
                Ok(Group {
                    session: Arc::clone(&self.session),
                    ncid,
                    name: ncid.inq_grpname()?,
                    parent: Some(self.ncid),
                })
            })
            .collect()
    }

    pub fn create_group(&self, name: &str) -> ApiResult<Group> {
        let _open = self.session.check()?;
        let ncid = self.ncid.def_grp(name)?;
        Ok(Group {
            session: Arc::clone(&self.session),
            ncid,
            name: name.to_string(),
            parent: Some(self.ncid),
        })
    }

    /// Dimension visible from this group (defined here or in an ancestor).
    pub fn get_dimension(&self, name: &str) -> ApiResult<Option<Dimension>> {
        let _open = self.session.check()?;
        let Some(dimid) = self.ncid.inq_dimid(name).into_result()? else {
            return Ok(None);
        };
        let unlimited = self.unlimited_dimensions()?;
        Dimension::from_id(&self.session, self.ncid, dimid, &unlimited).map(Some)
    }

    /// Dimensions defined in this group, excluding ancestors.
    pub fn get_dimensions(&self) -> ApiResult<Vec<Dimension>> {
        let _open = self.session.check()?;
        let unlimited = self.unlimited_dimensions()?;
        self.ncid
            .inq_dimids(false)?
            .into_iter()
            .map(|dimid| Dimension::from_id(&self.session, self.ncid, dimid, &unlimited))
            .collect()
    }

    /// A length of zero defines an unlimited dimension.
    pub fn create_dimension(&self, name: &str, length: usize) -> ApiResult<Dimension> {
        let _open = self.session.check()?;
        let dimid = self.ncid.def_dim(name, length)?;
        let unlimited = length == sys::NC_UNLIMITED;
        Ok(Dimension::new(&self.session, self.ncid, dimid, name, length, unlimited))
    }

    pub fn create_unlimited_dimension(&self, name: &str) -> ApiResult<Dimension> {
        let _open = self.session.check()?;
        let dimid = self.ncid.def_dim(name, sys::NC_UNLIMITED)?;
        Ok(Dimension::new(&self.session, self.ncid, dimid, name, 0, true))
    }

    pub fn get_variable(&self, name: &str) -> ApiResult<Option<Variable>> {
        let _open = self.session.check()?;
        match self.ncid.inq_varid(name).into_result()? {
            Some(varid) => Variable::from_id(self.clone(), varid).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_variables(&self) -> ApiResult<Vec<Variable>> {
        let _open = self.session.check()?;
        self.ncid
            .inq_varids()?
            .into_iter()
            .map(|varid| Variable::from_id(self.clone(), varid))
            .collect()
    }

    /// Define a variable whose external type follows the host type `T`.
    pub fn create_variable<T: NcType>(
        &self,
        name: &str,
        dimensions: &[Dimension],
    ) -> ApiResult<TypedVariable<T>> {
        let variable = self.create_variable_of(name, T::EXTERNAL, dimensions)?;
        Ok(TypedVariable::new(variable))
    }

    pub fn create_variable_of(
        &self,
        name: &str,
        external: ExternalType,
        dimensions: &[Dimension],
    ) -> ApiResult<Variable> {
        let _open = self.session.check()?;
        if let Some(foreign) = dimensions
            .iter()
            .find(|dim| !Arc::ptr_eq(dim.session(), &self.session))
        {
            return Err(Error::new(ErrorKind::InvalidContainerHandle).with_message(format!(
                "dimension {:?} belongs to another container",
                foreign.name()
            )));
        }
        let dimids: Vec<_> = dimensions.iter().map(Dimension::id).collect();
        let xtype = TypeId::from(external);
        let varid = self.ncid.def_var(name, xtype, &dimids)?;
        Ok(Variable::new(
            self.clone(),
            varid,
            name.to_string(),
            xtype,
            dimensions.to_vec(),
        ))
    }

    /// Re-enter define mode; legal on the root group of a writable container only.
    pub fn redefine(&self) -> ApiResult<()> {
        let _open = self.session.check()?;
        self.ncid.redef()?;
        tracing::debug!(ncid = self.ncid.raw(), "entered define mode");
        Ok(())
    }

    pub fn end_define_mode(&self) -> ApiResult<()> {
        let _open = self.session.check()?;
        self.ncid.enddef()?;
        tracing::debug!(ncid = self.ncid.raw(), "left define mode");
        Ok(())
    }

    pub fn sync(&self) -> ApiResult<()> {
        let _open = self.session.check()?;
        self.ncid.sync()
    }

    /// Returns the previous fill mode.
    pub fn set_fill_mode(&self, mode: FillMode) -> ApiResult<FillMode> {
        let _open = self.session.check()?;
        self.ncid.set_fill(mode.code()).map(FillMode::from_code)
    }

    /// Close the container. Other descriptors of it fail from now on.
    pub fn close(self) -> ApiResult<()> {
        drop(self.session.check()?);
        if !self.is_root() {
            return Err(Error::new(ErrorKind::InvalidGroupHandle)
                .with_message("only the root group can close its container")
                .with_status(sys::NC_EBADGRPID));
        }
        self.session.close()
    }
}

impl AttributeProvider for Group {
    fn attribute_target(&self) -> AttributeTarget {
        AttributeTarget::new(Arc::clone(&self.session), self.ncid.global())
    }
}
