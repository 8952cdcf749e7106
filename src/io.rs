/*
 * Copyright (c) 2023. Astraea, Inc. All rights reserved.
 */

//! Path-level orchestration: dataset opening, output driver/schema
//! negotiation, and the end-to-end dissolve entry point used by the CLI.

use crate::dissolve::{dissolve, DissolveOptions, DissolveSummary};
use crate::error::{Error, Result};
use crate::geom::promote_to_multi;
use crate::group::group_field_type;
use gdal::vector::LayerAccess;
use gdal::{Dataset, DriverManager, LayerOptions};
use gdal_sys::OGRwkbGeometryType;
use std::path::Path;

/// Infer the OGR output driver from a path extension.
pub fn driver_for_path(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "shp" => Ok("ESRI Shapefile"),
        "geojson" | "json" => Ok("GeoJSON"),
        "gpkg" => Ok("GPKG"),
        "sqlite" => Ok("SQLite"),
        "fgb" => Ok("FlatGeobuf"),
        "csv" => Ok("CSV"),
        _ => Err(Error::InvalidInput(format!(
            "cannot infer an output driver for `{}`",
            path.display()
        ))),
    }
}

/// Dissolve `input_layer` of the dataset at `input` into a newly created
/// `output_layer` at `output`.
///
/// The group field is validated against the input schema before the output
/// dataset is created, so an invalid field leaves no output behind. The
/// output layer carries the input's spatial reference, the input geometry
/// type promoted to its multi-part family, and (when grouping) the group
/// field with its original type.
pub fn dissolve_path(
    input: &Path,
    input_layer: &str,
    output: &Path,
    output_layer: &str,
    options: &DissolveOptions,
) -> Result<DissolveSummary> {
    let ds_in = Dataset::open(input)
        .map_err(|e| Error::InvalidInput(format!("cannot open `{}`: {e}", input.display())))?;
    let mut layer_in = ds_in.layer_by_name(input_layer).map_err(|e| {
        Error::InvalidInput(format!(
            "no layer `{input_layer}` in `{}`: {e}",
            input.display()
        ))
    })?;

    let field = match options.mode.field() {
        None => None,
        Some(name) => Some((name.to_owned(), group_field_type(&layer_in, name)?)),
    };

    let write_err = |e: gdal::errors::GdalError| Error::WriteError(e.to_string());
    let driver_name = driver_for_path(output)?;
    let driver = DriverManager::get_driver_by_name(driver_name).map_err(write_err)?;
    let mut ds_out = driver.create_vector_only(output).map_err(write_err)?;

    let srs = layer_in.spatial_ref();
    let geometry_type = layer_in
        .defn()
        .geom_fields()
        .next()
        .map(|g| g.field_type())
        .unwrap_or(OGRwkbGeometryType::wkbUnknown);

    let summary = {
        let mut layer_out = ds_out
            .create_layer(LayerOptions {
                name: output_layer,
                srs: srs.as_ref(),
                ty: promote_to_multi(geometry_type),
                ..Default::default()
            })
            .map_err(write_err)?;
        if let Some((name, field_type)) = &field {
            layer_out
                .create_defn_fields(&[(name.as_str(), *field_type)])
                .map_err(write_err)?;
        }
        dissolve(&mut layer_in, &mut layer_out, options)?
    };

    ds_out
        .flush_cache()
        .map_err(|e| Error::WriteError(format!("flush failed: {e}")))?;
    Ok(summary)
}
