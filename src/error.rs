/*
 * Copyright (c) 2023. Astraea, Inc. All rights reserved.
 */

use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to write output: {0}")]
    WriteError(String),
    #[error("Geometry union failed for group `{0}`")]
    UnionFailure(String),
    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),
}
