/*
 * Copyright (c) 2023. Astraea, Inc. All rights reserved.
 */

//! Core dissolve operation over GDAL vector layers.

use crate::error::{Error, Result};
use crate::geom::GeometryEx;
use crate::group::{group_field_type, GroupKey, GroupTable, GroupingMode};
use gdal::vector::{Feature, FieldValue, Geometry, Layer, LayerAccess};
use tracing::{debug, warn};

/// What to do when the union for a single group fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnionPolicy {
    /// Omit the group's output feature with a warning and continue.
    #[default]
    Skip,
    /// Abort the whole run.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DissolveOptions {
    pub mode: GroupingMode,
    pub on_union_failure: UnionPolicy,
}

impl Default for DissolveOptions {
    fn default() -> Self {
        Self::ungrouped()
    }
}

impl DissolveOptions {
    /// Treat all features as one group.
    pub fn ungrouped() -> Self {
        DissolveOptions {
            mode: GroupingMode::Ungrouped,
            on_union_failure: UnionPolicy::default(),
        }
    }

    /// Group features by the value of the named attribute field.
    pub fn by_field<S: Into<String>>(name: S) -> Self {
        DissolveOptions {
            mode: GroupingMode::ByField(name.into()),
            on_union_failure: UnionPolicy::default(),
        }
    }

    pub fn with_union_policy(mut self, policy: UnionPolicy) -> Self {
        self.on_union_failure = policy;
        self
    }
}

/// Counts reported by a completed [`dissolve`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DissolveSummary {
    /// Features encountered in the input layer.
    pub features_read: usize,
    /// Features skipped for missing, empty, or invalid geometry.
    pub features_skipped: usize,
    /// Output features written (one per surviving group).
    pub groups_written: usize,
    /// Groups omitted because their union failed (under [`UnionPolicy::Skip`]).
    pub union_failures: usize,
}

/// Dissolve `input` into `output`: one output feature per group, carrying the
/// union of the group's member geometries and the group's field value.
///
/// The output layer's schema must already contain the group field when
/// [`GroupingMode::ByField`] is used; [`crate::dissolve_path`] sets this up
/// from the input schema. Groups are emitted in first-encounter order.
pub fn dissolve<I: LayerAccess>(
    input: &mut I,
    output: &mut Layer,
    options: &DissolveOptions,
) -> Result<DissolveSummary> {
    dissolve_with_union(input, output, options, |acc, part| acc.union_with(part))
}

/// [`dissolve`] with the per-group union operation injected, so failure
/// policies can be exercised without constructing a real `OGR_G_Union`
/// failure.
fn dissolve_with_union<I, F>(
    input: &mut I,
    output: &mut Layer,
    options: &DissolveOptions,
    mut union: F,
) -> Result<DissolveSummary>
where
    I: LayerAccess,
    F: FnMut(Geometry, &Geometry) -> Option<Geometry>,
{
    let field = match options.mode.field() {
        None => None,
        Some(name) => {
            group_field_type(input, name)?;
            Some(name)
        }
    };

    let mut summary = DissolveSummary::default();
    let mut table = GroupTable::new();

    for feature in input.features() {
        summary.features_read += 1;
        let geometry = match feature.geometry() {
            Some(g) if !g.is_empty() && g.is_valid_geometry() => g.duplicate(),
            _ => {
                debug!(fid = ?feature.fid(), "skipping feature with missing or invalid geometry");
                summary.features_skipped += 1;
                continue;
            }
        };
        let (key, value) = match field {
            None => (GroupKey::All, None),
            Some(name) => {
                let value = feature.field(name)?;
                let key = GroupKey::from_field(value.as_ref()).ok_or_else(|| {
                    Error::InvalidInput(format!("unsupported value type in group field `{name}`"))
                })?;
                (key, value)
            }
        };
        table.accumulate(key, value, geometry);
    }

    for group in table.into_groups() {
        let Some(geometry) = union_parts(group.parts, &mut union) else {
            match options.on_union_failure {
                UnionPolicy::Abort => return Err(Error::UnionFailure(group.key.to_string())),
                UnionPolicy::Skip => {
                    warn!(group = %group.key, "geometry union failed; omitting group");
                    summary.union_failures += 1;
                    continue;
                }
            }
        };
        write_feature(output, geometry, field, group.value.as_ref())?;
        summary.groups_written += 1;
    }

    Ok(summary)
}

/// Fold the member geometries of one group. Union is commutative and
/// associative, so accumulation order does not affect the result beyond
/// library numerical tolerance.
fn union_parts<F>(parts: Vec<Geometry>, union: &mut F) -> Option<Geometry>
where
    F: FnMut(Geometry, &Geometry) -> Option<Geometry>,
{
    let mut parts = parts.into_iter();
    let mut acc = parts.next()?;
    for part in parts {
        acc = union(acc, &part)?;
    }
    Some(acc)
}

fn write_feature(
    output: &mut Layer,
    geometry: Geometry,
    field: Option<&str>,
    value: Option<&FieldValue>,
) -> Result<()> {
    let write_err = |e: gdal::errors::GdalError| Error::WriteError(e.to_string());
    let mut feature = Feature::new(output.defn()).map_err(write_err)?;
    feature.set_geometry(geometry).map_err(write_err)?;
    // The group field stays unset for ungrouped runs and null-valued keys.
    if let (Some(name), Some(value)) = (field, value) {
        feature.set_field(name, value).map_err(write_err)?;
    }
    feature.create(&*output).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissolved_layers_testkit::*;
    use gdal_sys::{OGRFieldType, OGRwkbGeometryType};

    const ZONE: Option<(&str, OGRFieldType::Type)> = Some(("zone", OGRFieldType::OFTString));

    fn zone_value(name: &str) -> Option<(&str, FieldValue)> {
        Some(("zone", FieldValue::StringValue(name.into())))
    }

    /// Collect `(zone value, geometry area)` pairs from a layer.
    fn read_back<L: LayerAccess>(layer: &mut L, field: Option<&str>) -> Vec<(Option<String>, f64)> {
        layer
            .features()
            .map(|f| {
                let value = field
                    .and_then(|name| f.field(name).unwrap())
                    .and_then(|v| v.into_string());
                let area = f.geometry().map(|g| g.area()).unwrap_or(0.0);
                (value, area)
            })
            .collect()
    }

    #[test]
    fn grouped_by_zone() -> TestResult {
        let mut ds_in = memory_dataset("grouped_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(1.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(10.0, 0.0, 1.0)), zone_value("B"))?;
        add_feature(&layer_in, Some(square(3.0, 0.0, 1.0)), zone_value("A"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("grouped_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;

        let summary = dissolve(&mut layer_in, &mut layer_out, &DissolveOptions::by_field("zone"))?;
        assert_eq!(summary.features_read, 4);
        assert_eq!(summary.features_skipped, 0);
        assert_eq!(summary.groups_written, 2);
        assert_eq!(summary.union_failures, 0);

        // One feature per zone, in key-encounter order.
        let rows = read_back(&mut layer_out, Some("zone"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.as_deref(), Some("A"));
        assert!((rows[0].1 - 3.0).abs() < 1e-9);
        assert_eq!(rows[1].0.as_deref(), Some("B"));
        assert!((rows[1].1 - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn ungrouped_yields_single_multipart_feature() -> TestResult {
        let mut ds_in = memory_dataset("ungrouped_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", None)?;
        for x in [0.0, 3.0, 6.0] {
            add_feature(&layer_in, Some(square(x, 0.0, 1.0)), None)?;
        }
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("ungrouped_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", None)?;

        let summary = dissolve(&mut layer_in, &mut layer_out, &DissolveOptions::ungrouped())?;
        assert_eq!(summary.groups_written, 1);

        let features: Vec<_> = layer_out.features().collect();
        assert_eq!(features.len(), 1);
        let geometry = features[0].geometry().unwrap();
        assert_eq!(geometry.geometry_type(), OGRwkbGeometryType::wkbMultiPolygon);
        assert!((geometry.area() - 3.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn null_geometry_is_skipped_and_counted() -> TestResult {
        let mut ds_in = memory_dataset("nullgeom_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, None, zone_value("A"))?;
        add_feature(&layer_in, Some(square(2.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(4.0, 0.0, 1.0)), zone_value("B"))?;
        add_feature(&layer_in, Some(square(6.0, 0.0, 1.0)), zone_value("B"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("nullgeom_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;

        let summary = dissolve(&mut layer_in, &mut layer_out, &DissolveOptions::by_field("zone"))?;
        assert_eq!(summary.features_read, 5);
        assert_eq!(summary.features_skipped, 1);
        assert_eq!(summary.groups_written, 2);

        let rows = read_back(&mut layer_out, Some("zone"));
        assert_eq!(rows.len(), 2);
        assert!((rows[0].1 - 2.0).abs() < 1e-9, "zone A covers remaining squares");
        assert!((rows[1].1 - 2.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn result_is_invariant_to_feature_order() -> TestResult {
        let orders: [&[usize]; 2] = [&[0, 1, 2, 3], &[3, 1, 0, 2]];
        let zones = ["A", "A", "B", "A"];
        let xs = [0.0, 1.0, 10.0, 3.0];

        let mut areas = Vec::new();
        for (run, order) in orders.iter().enumerate() {
            let mut ds_in = memory_dataset(&format!("order_in_{run}"))?;
            let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
            for &i in order.iter() {
                add_feature(&layer_in, Some(square(xs[i], 0.0, 1.0)), zone_value(zones[i]))?;
            }
            drop(layer_in);

            let mut layer_in = ds_in.layer(0)?;
            let mut ds_out = memory_dataset(&format!("order_out_{run}"))?;
            let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;
            dissolve(&mut layer_in, &mut layer_out, &DissolveOptions::by_field("zone"))?;

            let mut rows = read_back(&mut layer_out, Some("zone"));
            rows.sort_by(|a, b| a.0.cmp(&b.0));
            areas.push(rows);
        }

        assert_eq!(areas[0].len(), areas[1].len());
        for (a, b) in areas[0].iter().zip(areas[1].iter()) {
            assert_eq!(a.0, b.0);
            assert!((a.1 - b.1).abs() < 1e-9, "shuffled input changed group geometry");
        }
        Ok(())
    }

    #[test]
    fn dissolve_is_idempotent() -> TestResult {
        let mut ds_in = memory_dataset("idem_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(1.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(5.0, 0.0, 1.0)), zone_value("B"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_once = memory_dataset("idem_once")?;
        let mut layer_once = polygon_layer(&mut ds_once, "dissolved", ZONE)?;
        let options = DissolveOptions::by_field("zone");
        dissolve(&mut layer_in, &mut layer_once, &options)?;

        let mut ds_twice = memory_dataset("idem_twice")?;
        let mut layer_twice = polygon_layer(&mut ds_twice, "dissolved", ZONE)?;
        let summary = dissolve(&mut layer_once, &mut layer_twice, &options)?;
        assert_eq!(summary.groups_written, 2);

        let first = read_back(&mut layer_once, Some("zone"));
        let second = read_back(&mut layer_twice, Some("zone"));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.0, b.0);
            assert!((a.1 - b.1).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn union_failure_skips_group_and_counts() -> TestResult {
        let mut ds_in = memory_dataset("union_skip_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(1.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(5.0, 0.0, 1.0)), zone_value("B"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("union_skip_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;

        // Zone A needs a union of its two members and fails; zone B is a
        // single geometry and never reaches the union.
        let summary = dissolve_with_union(
            &mut layer_in,
            &mut layer_out,
            &DissolveOptions::by_field("zone"),
            |_, _| None,
        )?;
        assert_eq!(summary.features_read, 3);
        assert_eq!(summary.groups_written, 1);
        assert_eq!(summary.union_failures, 1);

        let rows = read_back(&mut layer_out, Some("zone"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.as_deref(), Some("B"));
        assert!((rows[0].1 - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn union_failure_aborts_under_abort_policy() -> TestResult {
        let mut ds_in = memory_dataset("union_abort_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(1.0, 0.0, 1.0)), zone_value("A"))?;
        add_feature(&layer_in, Some(square(5.0, 0.0, 1.0)), zone_value("B"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("union_abort_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;

        let options =
            DissolveOptions::by_field("zone").with_union_policy(UnionPolicy::Abort);
        let result = dissolve_with_union(&mut layer_in, &mut layer_out, &options, |_, _| None);
        assert!(matches!(result, Err(Error::UnionFailure(_))));
        // The failing group aborts the run before anything is written.
        assert_eq!(layer_out.features().count(), 0);
        Ok(())
    }

    #[test]
    fn missing_group_field_is_invalid_input() -> TestResult {
        let mut ds_in = memory_dataset("missing_field_in")?;
        let layer_in = polygon_layer(&mut ds_in, "polys", ZONE)?;
        add_feature(&layer_in, Some(square(0.0, 0.0, 1.0)), zone_value("A"))?;
        drop(layer_in);

        let mut layer_in = ds_in.layer(0)?;
        let mut ds_out = memory_dataset("missing_field_out")?;
        let mut layer_out = polygon_layer(&mut ds_out, "dissolved", ZONE)?;

        let result = dissolve(
            &mut layer_in,
            &mut layer_out,
            &DissolveOptions::by_field("nonexistent_field"),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        // Nothing was written.
        assert_eq!(layer_out.features().count(), 0);
        Ok(())
    }
}
