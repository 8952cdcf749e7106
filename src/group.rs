/*
 * Copyright (c) 2023. Astraea, Inc. All rights reserved.
 */

use crate::error::{Error, Result};
use gdal::vector::{FieldValue, Geometry, LayerAccess};
use gdal_sys::OGRFieldType;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// How input features are partitioned before union.
///
/// Resolved once at the start of a dissolve; no other runtime dispatch on the
/// grouping mode happens afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupingMode {
    /// All features form one implicit group.
    Ungrouped,
    /// Features are grouped by the value of the named attribute field.
    ByField(String),
}

impl GroupingMode {
    pub fn field(&self) -> Option<&str> {
        match self {
            GroupingMode::Ungrouped => None,
            GroupingMode::ByField(name) => Some(name),
        }
    }
}

/// Hashable form of a group field value.
///
/// `Real` keys compare by bit pattern (`-0.0` normalized to `0.0`), so `NaN`
/// groups with `NaN`; the original [`FieldValue`] is kept alongside for
/// output fidelity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// The single implicit group when no grouping field is given.
    All,
    /// The group of features whose field value is unset.
    Null,
    Int(i64),
    Real(u64),
    Str(String),
}

impl GroupKey {
    /// Derive a key from a feature's field value. Returns `None` for field
    /// value types that cannot serve as group keys.
    pub fn from_field(value: Option<&FieldValue>) -> Option<Self> {
        match value {
            None => Some(GroupKey::Null),
            Some(FieldValue::IntegerValue(v)) => Some(GroupKey::Int(*v as i64)),
            Some(FieldValue::Integer64Value(v)) => Some(GroupKey::Int(*v)),
            Some(FieldValue::RealValue(v)) => {
                // Collapse -0.0 onto 0.0 so the two zeros share a group;
                // other bit patterns (NaN included) key as-is.
                let v = if *v == 0.0 { 0.0 } else { *v };
                Some(GroupKey::Real(v.to_bits()))
            }
            Some(FieldValue::StringValue(s)) => Some(GroupKey::Str(s.clone())),
            Some(_) => None,
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::All => write!(f, "<all>"),
            GroupKey::Null => write!(f, "<null>"),
            GroupKey::Int(v) => write!(f, "{v}"),
            GroupKey::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            GroupKey::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One group's accumulated state: its key, the field value to write on the
/// output feature, and the member geometries awaiting union.
pub struct Group {
    pub key: GroupKey,
    pub value: Option<FieldValue>,
    pub parts: Vec<Geometry>,
}

/// Accumulator mapping group keys to member geometries.
///
/// Groups are created lazily on first encounter of a key, and iteration
/// preserves first-encounter order.
#[derive(Default)]
pub struct GroupTable {
    index: HashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one member geometry to the group identified by `key`, creating the
    /// group if this is the first encounter.
    pub fn accumulate(&mut self, key: GroupKey, value: Option<FieldValue>, geometry: Geometry) {
        match self.index.get(&key) {
            Some(&i) => self.groups[i].parts.push(geometry),
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(Group { key, value, parts: vec![geometry] });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Consume the table, yielding groups in first-encounter order.
    pub fn into_groups(self) -> impl Iterator<Item = Group> {
        self.groups.into_iter()
    }
}

/// Resolve `name` against the layer schema, returning its OGR field type.
///
/// Fails with [`Error::InvalidInput`] when the field is absent or of a type
/// that cannot serve as a group key.
pub fn group_field_type<L: LayerAccess>(layer: &L, name: &str) -> Result<OGRFieldType::Type> {
    let field_type = layer
        .defn()
        .fields()
        .find(|f| f.name() == name)
        .map(|f| f.field_type())
        .ok_or_else(|| {
            Error::InvalidInput(format!("group field `{name}` is not part of the input schema"))
        })?;
    match field_type {
        OGRFieldType::OFTString
        | OGRFieldType::OFTInteger
        | OGRFieldType::OFTInteger64
        | OGRFieldType::OFTReal => Ok(field_type),
        other => Err(Error::InvalidInput(format!(
            "group field `{name}` has unsupported type {}",
            field_type_name(other)
        ))),
    }
}

fn field_type_name(ty: OGRFieldType::Type) -> String {
    unsafe { std::ffi::CStr::from_ptr(gdal_sys::OGR_GetFieldTypeName(ty)) }
        .to_string_lossy()
        .into_owned()
}
