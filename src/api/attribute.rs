//! Purpose: Attribute access shared by groups (global attributes) and variables.
//! Exports: `Attribute`, `AttributeProvider`, `AttributeTarget`.
//! Role: Name-keyed metadata reads and writes; no persistent attribute handles.
//! Invariants: Every query is a fresh lookup; the attribute count is never cached.
//! Invariants: Reads size their buffer from a fresh inquiry, never from the snapshot.
//! Invariants: Reads into a host type the stored type cannot satisfy yield `Ok(None)`.
//! Invariants: Explicit external types on write must be readable back as the host type.
use std::slice;
use std::sync::Arc;

use super::ApiResult;
use super::container::{OpenGuard, Session};
use crate::core::error::{Error, ErrorKind, Lookup};
use crate::core::handle::{TypeId, VarId};
use crate::core::types::{ExternalType, NcType};

/// Where an object's attributes live: its container session and variable id
/// (`NC_GLOBAL` for groups).
#[derive(Clone, Debug)]
pub struct AttributeTarget {
    session: Arc<Session>,
    var: VarId,
}

impl AttributeTarget {
    pub(crate) fn new(session: Arc<Session>, var: VarId) -> Self {
        Self { session, var }
    }

    fn var(&self) -> ApiResult<(OpenGuard<'_>, VarId)> {
        let open = self.session.check()?;
        Ok((open, self.var))
    }

    fn describe(&self, name: String, xtype: TypeId, length: usize) -> Attribute {
        Attribute {
            session: Arc::clone(&self.session),
            var: self.var,
            name,
            xtype,
            length,
        }
    }
}

/// Snapshot of one attribute's name, type and length. Reads look the attribute up again.
#[derive(Clone, Debug)]
pub struct Attribute {
    session: Arc<Session>,
    var: VarId,
    name: String,
    xtype: TypeId,
    length: usize,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn type_id(&self) -> TypeId {
        self.xtype
    }

    pub fn external_type(&self) -> Option<ExternalType> {
        self.xtype.external()
    }

    /// Read every element as `T`, using the attribute's current type and length.
    /// `None` when that type is not readable as `T`; `AttributeNotFound` once it is deleted.
    pub fn read<T: NcType>(&self) -> ApiResult<Option<Vec<T>>> {
        let _open = self.session.check()?;
        let Some((xtype, length)) = self.var.inq_att(&self.name).into_result()? else {
            return Err(Error::new(ErrorKind::AttributeNotFound)
                .with_message(format!("attribute {:?} no longer exists", self.name)));
        };
        if !xtype.external().is_some_and(T::can_read) {
            return Ok(None);
        }
        self.var.get_att(&self.name, xtype, length).map(Some)
    }

    /// `None` unless the attribute currently holds exactly one element readable as `T`.
    pub fn read_scalar<T: NcType>(&self) -> ApiResult<Option<T>> {
        let values = self.read::<T>()?;
        Ok(values.filter(|values| values.len() == 1).and_then(|values| values.into_iter().next()))
    }
}

pub trait AttributeProvider {
    fn attribute_target(&self) -> AttributeTarget;

    /// Live count; changes as attributes are added or deleted.
    fn number_of_attributes(&self) -> ApiResult<usize> {
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        var.inq_natts()
    }

    fn get_attribute(&self, name: &str) -> ApiResult<Option<Attribute>> {
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        let found = var.inq_att(name).into_result()?;
        Ok(found.map(|(xtype, length)| target.describe(name.to_string(), xtype, length)))
    }

    /// All attributes in definition order.
    fn get_attributes(&self) -> ApiResult<Vec<Attribute>> {
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        (0..var.inq_natts()?)
            .map(|index| {
                let name = var.inq_attname(index)?;
                match var.inq_att(&name) {
                    Lookup::Found((xtype, length)) => Ok(target.describe(name, xtype, length)),
                    Lookup::Missing => Err(Error::new(ErrorKind::AttributeNotFound)
                        .with_message(format!("attribute {name:?} vanished during enumeration"))),
                    Lookup::Failed(err) => Err(err),
                }
            })
            .collect()
    }

    fn set_attribute<T: NcType>(&self, name: &str, value: T) -> ApiResult<()> {
        self.set_attribute_array(name, slice::from_ref(&value))
    }

    fn set_attribute_array<T: NcType>(&self, name: &str, values: &[T]) -> ApiResult<()> {
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        var.put_att(name, TypeId::from(T::EXTERNAL), values)
    }

    /// Store `values` under an explicit external type, e.g. `u8` data as `char`.
    fn set_attribute_as<T: NcType>(
        &self,
        name: &str,
        values: &[T],
        external: ExternalType,
    ) -> ApiResult<()> {
        if !T::can_read(external) {
            return Err(Error::new(ErrorKind::DatatypeNotCompatible).with_message(format!(
                "{} values cannot be stored as {external}",
                T::EXTERNAL
            )));
        }
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        var.put_att(name, TypeId::from(external), values)
    }

    fn delete_attribute(&self, name: &str) -> ApiResult<()> {
        let target = self.attribute_target();
        let (_open, var) = target.var()?;
        var.del_att(name)
    }
}
