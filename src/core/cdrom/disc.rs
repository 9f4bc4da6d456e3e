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

//! Disc image access
//!
//! Discs are raw 2352-byte-per-sector BIN images addressed by MSF
//! (Minute:Second:Frame) BCD triples. Sector 00:02:04 carries the license
//! string which identifies the disc region and therefore the video standard
//! of the console it was made for.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::error::{EmulatorError, Result};
use crate::core::gpu::HardwareType;

/// Size of one raw CD sector in bytes
pub const SECTOR_SIZE: usize = 2352;

/// Sectors per second
const SECTORS_PER_SECOND: u32 = 75;

/// The first 150 sectors (two seconds) are the lead-in and are not stored
/// in BIN images
const LEAD_IN_SECTORS: u32 = 150;

/// CD sector position in Minute:Second:Frame format
///
/// All three components are stored as BCD: minute 0x00-0x99, second
/// 0x00-0x59, frame 0x00-0x74 (75 frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Msf {
    /// Minute (BCD)
    m: u8,
    /// Second (BCD)
    s: u8,
    /// Frame (BCD)
    f: u8,
}

impl Msf {
    /// Position 00:00:00
    pub fn zero() -> Msf {
        Msf { m: 0, s: 0, f: 0 }
    }

    /// Build an MSF from BCD components, validating digits and ranges
    pub fn from_bcd(m: u8, s: u8, f: u8) -> Result<Msf> {
        let valid_bcd = |b: u8| b & 0xF <= 9 && b >> 4 <= 9;

        if !valid_bcd(m) || !valid_bcd(s) || !valid_bcd(f) || m > 0x99 || s > 0x59 || f > 0x74 {
            return Err(EmulatorError::InvalidMsf { m, s, f });
        }

        Ok(Msf { m, s, f })
    }

    /// BCD components (minute, second, frame)
    pub fn into_bcd(self) -> (u8, u8, u8) {
        (self.m, self.s, self.f)
    }

    /// Absolute sector index from the start of the disc (lead-in included)
    pub fn sector_index(self) -> u32 {
        let m = bcd_to_dec(self.m) as u32;
        let s = bcd_to_dec(self.s) as u32;
        let f = bcd_to_dec(self.f) as u32;

        (60 * m + s) * SECTORS_PER_SECOND + f
    }

    /// Position one frame later
    pub fn next(self) -> Result<Msf> {
        if self.f < 0x74 {
            return Ok(Msf {
                f: bcd_inc(self.f),
                ..self
            });
        }

        if self.s < 0x59 {
            return Ok(Msf {
                f: 0,
                s: bcd_inc(self.s),
                ..self
            });
        }

        if self.m < 0x99 {
            return Ok(Msf {
                f: 0,
                s: 0,
                m: bcd_inc(self.m),
            });
        }

        Err(EmulatorError::InvalidMsf {
            m: self.m,
            s: self.s,
            f: self.f,
        })
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{:02x}:{:02x}:{:02x}", self.m, self.s, self.f)
    }
}

/// Convert a valid BCD byte to decimal
fn bcd_to_dec(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0xF)
}

/// Increment a valid BCD byte
fn bcd_inc(b: u8) -> u8 {
    if b & 0xF < 9 {
        b + 1
    } else {
        (b & 0xF0) + 0x10
    }
}

/// Disc region, as encoded in the license string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Japan (NTSC): SCEI
    Japan,
    /// North America (NTSC): SCEA
    NorthAmerica,
    /// Europe (PAL): SCEE
    Europe,
}

impl Region {
    /// Video standard of the console this disc targets
    pub fn hardware_type(self) -> HardwareType {
        match self {
            Region::Japan | Region::NorthAmerica => HardwareType::Ntsc,
            Region::Europe => HardwareType::Pal,
        }
    }

    /// SCEx region character returned by the drive's GetID command
    pub fn scex_byte(self) -> u8 {
        match self {
            Region::Japan => b'I',
            Region::NorthAmerica => b'A',
            Region::Europe => b'E',
        }
    }
}

/// One raw 2352-byte sector
pub struct Sector {
    data: [u8; SECTOR_SIZE],
}

impl Sector {
    /// Full raw payload, sync pattern and headers included
    pub fn raw(&self) -> &[u8; SECTOR_SIZE] {
        &self.data
    }

    /// 2048 bytes of user data of a mode 2 form 1 sector
    pub fn data_2048(&self) -> &[u8] {
        &self.data[24..24 + 2048]
    }

    /// 2340 bytes: everything after the 12-byte sync pattern
    pub fn data_2340(&self) -> &[u8] {
        &self.data[12..12 + 2340]
    }
}

/// A raw BIN disc image with its detected region
pub struct Disc {
    /// BIN file
    file: File,
    /// Number of sectors stored in the image
    sectors: u32,
    /// Region parsed from the license sector
    region: Region,
}

impl Disc {
    /// Open a raw BIN image and identify its region
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Disc> {
        let path = path.as_ref();

        let file = File::open(path)
            .map_err(|_| EmulatorError::DiscNotFound(path.display().to_string()))?;

        let len = file.metadata()?.len();

        if len == 0 || len % SECTOR_SIZE as u64 != 0 {
            return Err(EmulatorError::InvalidDisc(format!(
                "{}: size {} is not a multiple of {} bytes",
                path.display(),
                len,
                SECTOR_SIZE
            )));
        }

        let mut disc = Disc {
            file,
            sectors: (len / SECTOR_SIZE as u64) as u32,
            // Placeholder until the license sector is parsed
            region: Region::NorthAmerica,
        };

        disc.region = disc.extract_region()?;

        log::info!("Disc region: {:?}", disc.region);

        Ok(disc)
    }

    /// Region parsed from the license sector
    pub fn region(&self) -> Region {
        self.region
    }

    /// Read the raw sector at the given MSF
    pub fn read_sector(&mut self, msf: Msf) -> Result<Sector> {
        let index = msf.sector_index();

        // The two-second lead-in is not part of the image
        let index = index
            .checked_sub(LEAD_IN_SECTORS)
            .ok_or(EmulatorError::SectorOutOfRange(index))?;

        if index >= self.sectors {
            return Err(EmulatorError::SectorOutOfRange(index));
        }

        let offset = index as u64 * SECTOR_SIZE as u64;

        self.file.seek(SeekFrom::Start(offset))?;

        let mut sector = Sector {
            data: [0; SECTOR_SIZE],
        };

        self.file.read_exact(&mut sector.data)?;

        Ok(sector)
    }

    /// Parse the license string in sector 00:02:04 to find the region
    fn extract_region(&mut self) -> Result<Region> {
        let msf = Msf::from_bcd(0x00, 0x02, 0x04)?;

        let sector = self.read_sector(msf)?;

        // The license blob starts at the beginning of the user data; keep
        // only the alphanumeric characters to be safe against padding
        let license: String = sector.data_2048()[..76]
            .iter()
            .filter_map(|&b| {
                let c = b as char;
                c.is_alphanumeric().then_some(c)
            })
            .collect();

        if license.contains("America") {
            Ok(Region::NorthAmerica)
        } else if license.contains("Europe") {
            Ok(Region::Europe)
        } else if license.contains("SonyComputerEntertainmentInc") {
            Ok(Region::Japan)
        } else {
            Err(EmulatorError::InvalidDisc(format!(
                "unrecognized license string {:?}",
                license
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // ========== MSF Tests ==========

    #[test]
    fn test_msf_from_bcd_validates() {
        assert!(Msf::from_bcd(0x00, 0x02, 0x04).is_ok());
        assert!(Msf::from_bcd(0x99, 0x59, 0x74).is_ok());

        assert!(Msf::from_bcd(0x0A, 0x00, 0x00).is_err(), "not BCD");
        assert!(Msf::from_bcd(0x00, 0x60, 0x00).is_err(), "second > 59");
        assert!(Msf::from_bcd(0x00, 0x00, 0x75).is_err(), "frame > 74");
    }

    #[test]
    fn test_msf_sector_index() {
        assert_eq!(Msf::zero().sector_index(), 0);
        assert_eq!(Msf::from_bcd(0, 2, 0).unwrap().sector_index(), 150);
        assert_eq!(Msf::from_bcd(0, 2, 4).unwrap().sector_index(), 154);
        // 1 minute = 60 * 75 sectors
        assert_eq!(Msf::from_bcd(1, 0, 0).unwrap().sector_index(), 4500);
        // BCD 0x10 minutes = 10 minutes
        assert_eq!(Msf::from_bcd(0x10, 0, 0).unwrap().sector_index(), 45000);
    }

    #[test]
    fn test_msf_next_increments_sector_index() {
        let mut msf = Msf::zero();

        for expected in 1..=7600 {
            msf = msf.next().unwrap();
            assert_eq!(
                msf.sector_index(),
                expected,
                "next() must advance exactly one frame"
            );
        }
    }

    #[test]
    fn test_msf_next_carries_bcd() {
        let msf = Msf::from_bcd(0x00, 0x09, 0x74).unwrap();
        let next = msf.next().unwrap();

        assert_eq!(next.into_bcd(), (0x00, 0x10, 0x00), "BCD carry over 9");
    }

    #[test]
    fn test_msf_next_saturates_at_disc_end() {
        let msf = Msf::from_bcd(0x99, 0x59, 0x74).unwrap();

        assert!(msf.next().is_err());
    }

    // ========== Disc Tests ==========

    /// Build a synthetic BIN image with `sectors` sectors and the given
    /// license text in the user data of sector 00:02:04
    fn make_test_disc(license: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        let sectors = 10u32;
        let mut image = vec![0u8; sectors as usize * SECTOR_SIZE];

        // Sector 00:02:04 is the 5th stored sector (index 154 - 150)
        let offset = 4 * SECTOR_SIZE + 24;
        image[offset..offset + license.len()].copy_from_slice(license.as_bytes());

        // Tag the first sector so reads can be verified
        image[0] = 0xAB;

        file.write_all(&image).unwrap();
        file.flush().unwrap();

        file
    }

    #[test]
    fn test_disc_region_detection() {
        let cases = [
            (
                "          Licensed  by          Sony Computer Entertainment Amer  ica ",
                Region::NorthAmerica,
            ),
            (
                "          Licensed  by          Sony Computer Entertainment Euro pe",
                Region::Europe,
            ),
            (
                "          Licensed  by          Sony Computer Entertainment Inc.",
                Region::Japan,
            ),
        ];

        for (license, expected) in cases {
            let file = make_test_disc(license);
            let disc = Disc::from_file(file.path()).unwrap();

            assert_eq!(disc.region(), expected);
        }
    }

    #[test]
    fn test_disc_region_hardware_type() {
        assert_eq!(Region::Japan.hardware_type(), HardwareType::Ntsc);
        assert_eq!(Region::NorthAmerica.hardware_type(), HardwareType::Ntsc);
        assert_eq!(Region::Europe.hardware_type(), HardwareType::Pal);
    }

    #[test]
    fn test_disc_read_sector() {
        let file = make_test_disc(
            "          Licensed  by          Sony Computer Entertainment Amer  ica ",
        );
        let mut disc = Disc::from_file(file.path()).unwrap();

        // 00:02:00 is the first stored sector
        let sector = disc
            .read_sector(Msf::from_bcd(0, 2, 0).unwrap())
            .unwrap();

        assert_eq!(sector.raw()[0], 0xAB);
    }

    #[test]
    fn test_disc_read_before_data_area_fails() {
        let file = make_test_disc(
            "          Licensed  by          Sony Computer Entertainment Amer  ica ",
        );
        let mut disc = Disc::from_file(file.path()).unwrap();

        assert!(disc.read_sector(Msf::zero()).is_err());
    }

    #[test]
    fn test_disc_read_past_end_fails() {
        let file = make_test_disc(
            "          Licensed  by          Sony Computer Entertainment Amer  ica ",
        );
        let mut disc = Disc::from_file(file.path()).unwrap();

        // The synthetic image has 10 sectors (00:02:00 to 00:02:09)
        assert!(disc
            .read_sector(Msf::from_bcd(0, 3, 0).unwrap())
            .is_err());
    }

    #[test]
    fn test_disc_rejects_truncated_image() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 1000]).unwrap();

        assert!(Disc::from_file(file.path()).is_err());
    }
}
