use gdal::errors::Result;
use gdal::vector::{Feature, FieldValue, Geometry, Layer, LayerAccess};
use gdal::{Dataset, DriverManager, LayerOptions};
use gdal_sys::{OGRFieldType, OGRwkbGeometryType};
use once_cell::sync::Lazy;
use std::error::Error;
use std::path::PathBuf;

/// Directory for test artifacts, appropriate for writing results.
///
/// Unique per process so parallel test runs do not collide.
pub static SCRATCH_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let dir = std::env::temp_dir().join(format!("dissolved-layers-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch directory");
    dir
});

pub type TestError = Box<dyn Error>;
pub type TestResult = std::result::Result<(), TestError>;

pub fn scratch_path(name: &str) -> PathBuf {
    SCRATCH_DIR.join(name)
}

/// Write `contents` to a file under [`SCRATCH_DIR`] and return its path.
pub fn write_fixture(name: &str, contents: &str) -> PathBuf {
    let path = scratch_path(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// An empty in-memory vector dataset.
pub fn memory_dataset(name: &str) -> Result<Dataset> {
    DriverManager::get_driver_by_name("Memory")?.create_vector_only(name)
}

/// Create a polygon layer, optionally with a single attribute field.
pub fn polygon_layer<'a>(
    ds: &'a mut Dataset,
    name: &str,
    field: Option<(&str, OGRFieldType::Type)>,
) -> Result<Layer<'a>> {
    let layer = ds.create_layer(LayerOptions {
        name,
        ty: OGRwkbGeometryType::wkbPolygon,
        ..Default::default()
    })?;
    if let Some((field_name, field_type)) = field {
        layer.create_defn_fields(&[(field_name, field_type)])?;
    }
    Ok(layer)
}

/// An axis-aligned square with lower-left corner `(x, y)`.
pub fn square(x: f64, y: f64, size: f64) -> Geometry {
    let (x2, y2) = (x + size, y + size);
    Geometry::from_wkt(&format!(
        "POLYGON (({x} {y}, {x2} {y}, {x2} {y2}, {x} {y2}, {x} {y}))"
    ))
    .expect("square wkt")
}

/// Append a feature to `layer`. Passing `None` for `geometry` produces a
/// feature with a null geometry.
pub fn add_feature(
    layer: &Layer,
    geometry: Option<Geometry>,
    field: Option<(&str, FieldValue)>,
) -> Result<()> {
    let mut feature = Feature::new(layer.defn())?;
    if let Some(geometry) = geometry {
        feature.set_geometry(geometry)?;
    }
    if let Some((name, value)) = field {
        feature.set_field(name, &value)?;
    }
    feature.create(layer)
}
