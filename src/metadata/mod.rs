// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Querying metadata of the dataset being calibrated: its fields, antennas
//! and spectral windows.
//!
//! The dataset itself is never read here; something else (e.g. a listing
//! tool) describes it in a JSON, YAML or TOML file, which is read into a
//! [`StaticMetadata`].


use std::{fs::File, io::Read, path::Path, str::FromStr};

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::spw::SpectralWindow;

lazy_static::lazy_static! {
    pub(crate) static ref METADATA_FILE_TYPES_COMMA_SEPARATED: String =
        MetadataFileType::iter().join(", ");
}

/// Everything the engine needs to know about a dataset.
pub trait DatasetMetadata {
    /// The names of all fields.
    fn fields(&self) -> &[String];

    /// The names of all antennas.
    fn antennas(&self) -> &[String];

    /// The IDs of the spectral windows a field was observed in, in ascending
    /// order.
    fn spectral_windows_for_field(&self, field: &str) -> Result<Vec<u32>, MetadataError>;

    fn window(&self, id: u32) -> Result<&SpectralWindow, MetadataError>;

    /// The names of all fields observed in a spectral window.
    fn fields_for_window(&self, id: u32) -> Vec<String>;

    /// The frequency bounds \[MHz\], mean channel width \[kHz\] and number
    /// of channels of a window.
    fn window_bounds(&self, id: u32) -> Result<(f64, f64, f64, usize), MetadataError> {
        let w = self.window(id)?;
        Ok((w.min_freq_mhz, w.max_freq_mhz, w.chan_width_khz, w.nchan))
    }

    /// All windows a field was observed in.
    fn windows_for_field(&self, field: &str) -> Result<Vec<SpectralWindow>, MetadataError> {
        self.spectral_windows_for_field(field)?
            .into_iter()
            .map(|id| self.window(id).cloned())
            .collect()
    }

    fn has_field(&self, field: &str) -> bool {
        self.fields().iter().any(|f| f == field)
    }
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(crate) enum MetadataFileType {
    #[strum(serialize = "json")]
    Json,
    #[strum(serialize = "yaml", serialize = "yml")]
    Yaml,
    #[strum(serialize = "toml")]
    Toml,
}

/// The on-disk description of a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFileContents {
    #[serde(default)]
    pub antennas: Vec<String>,

    #[serde(default)]
    pub fields: Vec<FieldEntry>,

    #[serde(default)]
    pub spectral_windows: Vec<WindowEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub spws: Vec<u32>,
}

/// A spectral window as described by metadata files, with frequencies in Hz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowEntry {
    pub id: u32,
    pub nchan: usize,
    pub min_freq_hz: f64,
    pub max_freq_hz: f64,
    pub chan_width_hz: f64,
}

/// Dataset metadata held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    fields: Vec<String>,
    antennas: Vec<String>,
    field_spws: IndexMap<String, Vec<u32>>,
    windows: IndexMap<u32, SpectralWindow>,
}

impl StaticMetadata {
    pub fn builder() -> StaticMetadataBuilder {
        StaticMetadataBuilder::default()
    }

    /// Read metadata from a file. The format is determined by the file's
    /// extension.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<StaticMetadata, MetadataError> {
        Self::read_inner(file.as_ref())
    }

    fn read_inner(file: &Path) -> Result<StaticMetadata, MetadataError> {
        debug!("Reading dataset metadata from {}", file.display());
        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| MetadataFileType::from_str(&e).ok());
        let Some(file_type) = file_type else {
            return Err(MetadataError::UnsupportedExt {
                file: file.display().to_string(),
            });
        };

        let mut contents = String::new();
        File::open(file)?.read_to_string(&mut contents)?;
        let parse_err = |err: String| MetadataError::Parse {
            file: file.display().to_string(),
            err,
        };
        let contents: MetadataFileContents = match file_type {
            MetadataFileType::Json => {
                serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            MetadataFileType::Yaml => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            MetadataFileType::Toml => {
                toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
        };
        StaticMetadata::try_from(contents)
    }
}

impl TryFrom<MetadataFileContents> for StaticMetadata {
    type Error = MetadataError;

    fn try_from(contents: MetadataFileContents) -> Result<Self, Self::Error> {
        let mut builder = StaticMetadata::builder();
        for w in contents.spectral_windows {
            builder = builder.window(SpectralWindow::from_hz(
                w.id,
                w.nchan,
                w.min_freq_hz,
                w.max_freq_hz,
                w.chan_width_hz,
            ));
        }
        for f in &contents.fields {
            builder = builder.field(&f.name, &f.spws);
        }
        for a in &contents.antennas {
            builder = builder.antenna(a);
        }
        let meta = builder.build();

        // Every window referenced by a field must be described.
        for (field, spws) in &meta.field_spws {
            for id in spws {
                if !meta.windows.contains_key(id) {
                    return Err(MetadataError::UndescribedWindow {
                        field: field.clone(),
                        spw: *id,
                    });
                }
            }
        }
        Ok(meta)
    }
}

#[derive(Debug, Default)]
pub struct StaticMetadataBuilder {
    inner: StaticMetadata,
}

impl StaticMetadataBuilder {
    pub fn field(mut self, name: &str, spws: &[u32]) -> Self {
        let mut spws = spws.to_vec();
        spws.sort_unstable();
        spws.dedup();
        if !self.inner.fields.iter().any(|f| f == name) {
            self.inner.fields.push(name.to_string());
        }
        self.inner.field_spws.insert(name.to_string(), spws);
        self
    }

    pub fn antenna(mut self, name: &str) -> Self {
        self.inner.antennas.push(name.to_string());
        self
    }

    pub fn window(mut self, window: SpectralWindow) -> Self {
        self.inner.windows.insert(window.id, window);
        self
    }

    pub fn build(self) -> StaticMetadata {
        self.inner
    }
}

impl DatasetMetadata for StaticMetadata {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    fn antennas(&self) -> &[String] {
        &self.antennas
    }

    fn spectral_windows_for_field(&self, field: &str) -> Result<Vec<u32>, MetadataError> {
        self.field_spws
            .get(field)
            .cloned()
            .ok_or_else(|| MetadataError::UnknownField {
                field: field.to_string(),
            })
    }

    fn window(&self, id: u32) -> Result<&SpectralWindow, MetadataError> {
        self.windows
            .get(&id)
            .ok_or(MetadataError::UnknownWindow { spw: id })
    }

    fn fields_for_window(&self, id: u32) -> Vec<String> {
        self.field_spws
            .iter()
            .filter(|(_, spws)| spws.contains(&id))
            .map(|(f, _)| f.clone())
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Field '{field}' is not in the dataset")]
    UnknownField { field: String },

    #[error("SPW {spw} is not in the dataset")]
    UnknownWindow { spw: u32 },

    #[error("Field '{field}' was observed in SPW {spw}, but that SPW isn't described")]
    UndescribedWindow { field: String, spw: u32 },

    #[error("Metadata file '{file}' doesn't have a recognised file extension! Valid extensions are: {}", *METADATA_FILE_TYPES_COMMA_SEPARATED)]
    UnsupportedExt { file: String },

    #[error("Couldn't decode metadata from {file}:\n{err}")]
    Parse { file: String, err: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
