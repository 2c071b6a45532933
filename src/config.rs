// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, File, FileFormat};
use tracing::info;

mod error;
mod synth;

pub use self::error::ConfigError;
pub use self::synth::Synth;

/// Reads the synth configuration from a YAML file.
pub fn load(path: &Path) -> Result<Synth, ConfigError> {
    let synth: Synth = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(synth)
}

/// Parses the synth configuration from a YAML string.
pub fn parse(yaml: &str) -> Result<Synth, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?)
}

/// Reads the configuration at `path`, or the defaults when there is none.
pub fn load_or_default(path: Option<&Path>) -> Result<Synth, ConfigError> {
    match path {
        Some(path) => load(path),
        None => Ok(Synth::default()),
    }
}
