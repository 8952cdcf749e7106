/*
 * Copyright (c) 2023. Astraea, Inc. All rights reserved.
 */

//! Dissolve GDAL vector layers: features sharing the same value of an
//! optional grouping attribute are replaced by a single feature carrying the
//! topological union of their geometries. All geometric computation is
//! delegated to GDAL/GEOS; this crate contributes grouping, schema
//! negotiation, error policy, and I/O plumbing.
//!
//! # Example
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dissolved_layers::{dissolve_path, DissolveOptions};
//! use std::path::Path;
//!
//! let summary = dissolve_path(
//!     Path::new("zones.gpkg"),
//!     "zones",
//!     Path::new("dissolved.gpkg"),
//!     "dissolved",
//!     &DissolveOptions::by_field("zone"),
//! )?;
//! println!("{} groups written", summary.groups_written);
//! # Ok(())
//! # }
//! ```

mod dissolve;
mod geom;
mod group;
mod io;

pub mod error;

pub use dissolve::*;
pub use geom::*;
pub use group::*;
pub use io::*;
