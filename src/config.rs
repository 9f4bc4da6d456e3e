// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CLI configuration
//!
//! The `psemu-cli` binary optionally reads a `psemu.toml` next to the
//! working directory so the BIOS and disc paths don't have to be repeated
//! on every invocation. Command line flags always win over the file.
//!
//! ```toml
//! bios = "roms/SCPH1001.BIN"
//! disc = "games/game.bin"
//! region = "ntsc"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::{EmulatorError, Result};
use crate::core::gpu::HardwareType;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "psemu.toml";

/// Forced video standard, overriding the disc region detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionOverride {
    Ntsc,
    Pal,
}

impl RegionOverride {
    pub fn hardware_type(self) -> HardwareType {
        match self {
            RegionOverride::Ntsc => HardwareType::Ntsc,
            RegionOverride::Pal => HardwareType::Pal,
        }
    }
}

/// Contents of `psemu.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the 512KB BIOS image
    pub bios: Option<PathBuf>,
    /// Path to a raw BIN disc image
    pub disc: Option<PathBuf>,
    /// Forced video standard
    pub region: Option<RegionOverride>,
}

impl Config {
    /// Parse a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;

        toml::from_str(&text).map_err(|e| EmulatorError::InvalidConfig(e.to_string()))
    }

    /// Load `psemu.toml` from the working directory if it exists
    pub fn load_default() -> Result<Config> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Config::load(DEFAULT_CONFIG_FILE)
        } else {
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bios = \"bios.bin\"").unwrap();
        writeln!(file, "disc = \"game.bin\"").unwrap();
        writeln!(file, "region = \"pal\"").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.bios.unwrap(), PathBuf::from("bios.bin"));
        assert_eq!(config.disc.unwrap(), PathBuf::from("game.bin"));
        assert_eq!(config.region.unwrap(), RegionOverride::Pal);
        assert_eq!(
            RegionOverride::Pal.hardware_type(),
            HardwareType::Pal
        );
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bios = \"bios.bin\"").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert!(config.disc.is_none());
        assert!(config.region.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bios_path = \"bios.bin\"").unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
