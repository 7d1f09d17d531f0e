//! Purpose: Dimension descriptors with an explicitly refreshed length.
//! Exports: `Dimension`.
//! Role: Axis snapshot used to define variables and describe their shape.
//! Invariants: The unlimited flag comes from the unlimited lists of the group and its ancestors.
//! Invariants: Cached lengths go stale after writes past an unlimited bound until `refresh`.
use std::sync::Arc;

use super::ApiResult;
use super::container::Session;
use crate::core::handle::{DimId, NcId};

#[derive(Clone, Debug)]
pub struct Dimension {
    session: Arc<Session>,
    /// Group the dimension is queried through.
    ncid: NcId,
    dimid: DimId,
    name: String,
    length: usize,
    unlimited: bool,
}

impl Dimension {
    pub(crate) fn new(
        session: &Arc<Session>,
        ncid: NcId,
        dimid: DimId,
        name: &str,
        length: usize,
        unlimited: bool,
    ) -> Self {
        Self {
            session: Arc::clone(session),
            ncid,
            dimid,
            name: name.to_string(),
            length,
            unlimited,
        }
    }

    pub(crate) fn from_id(
        session: &Arc<Session>,
        ncid: NcId,
        dimid: DimId,
        unlimited: &[DimId],
    ) -> ApiResult<Self> {
        let (name, length) = ncid.inq_dim(dimid)?;
        Ok(Self::new(
            session,
            ncid,
            dimid,
            &name,
            length,
            unlimited.contains(&dimid),
        ))
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn id(&self) -> DimId {
        self.dimid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length as of construction or the last `refresh`.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Re-query the current length from the engine.
    pub fn refresh(&mut self) -> ApiResult<()> {
        let _open = self.session.check()?;
        self.length = self.ncid.inq_dimlen(self.dimid)?;
        Ok(())
    }
}
