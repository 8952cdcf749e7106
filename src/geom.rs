//! Thin geometry helpers over the GDAL/GEOS surface.

use gdal::vector::Geometry;
use gdal_sys::OGRwkbGeometryType;

/// Extension methods on [`Geometry`] for operations the safe wrapper does not
/// yet cover.
pub trait GeometryEx {
    /// Topological union of `self` and `other` via `OGR_G_Union`.
    ///
    /// Returns `None` when the underlying union fails (e.g. on topology
    /// exceptions raised by GEOS).
    fn union_with(&self, other: &Geometry) -> Option<Geometry>;

    /// An owned deep copy via `OGR_G_Clone`.
    fn duplicate(&self) -> Geometry;

    /// Topological validity per `OGR_G_IsValid`.
    fn is_valid_geometry(&self) -> bool;
}

impl GeometryEx for Geometry {
    fn union_with(&self, other: &Geometry) -> Option<Geometry> {
        self.union(other)
    }

    fn duplicate(&self) -> Geometry {
        self.clone()
    }

    fn is_valid_geometry(&self) -> bool {
        self.is_valid()
    }
}

/// Promote a geometry type to its multi-part family, since a union of
/// disjoint inputs produces multi-part output.
pub fn promote_to_multi(ty: OGRwkbGeometryType::Type) -> OGRwkbGeometryType::Type {
    match ty {
        OGRwkbGeometryType::wkbPoint => OGRwkbGeometryType::wkbMultiPoint,
        OGRwkbGeometryType::wkbLineString => OGRwkbGeometryType::wkbMultiLineString,
        OGRwkbGeometryType::wkbPolygon => OGRwkbGeometryType::wkbMultiPolygon,
        other => other,
    }
}
