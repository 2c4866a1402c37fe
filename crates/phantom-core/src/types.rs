use crate::{Result, constants::MAC_LENGTH, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image resolution in pixels.
///
/// Written on the wire as `<width>x<height>`, e.g. `1920x1080`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    ///
    /// For resolutions that come off the wire use
    /// [`checked_pixel_count`](Self::checked_pixel_count).
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// `width * height`, or `None` if it overflows `usize`.
    #[must_use]
    pub fn checked_pixel_count(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s
            .split_once('x')
            .ok_or_else(|| Error::syntax("expected <width>x<height>", s))?;
        let width = width
            .trim()
            .parse()
            .map_err(|_| Error::syntax("invalid width", width))?;
        let height = height
            .trim()
            .parse()
            .map_err(|_| Error::syntax("invalid height", height))?;
        Ok(Self { width, height })
    }
}

/// Ethernet hardware address.
///
/// Parses from twelve hex digits with optional `:` or `-` separators and an
/// optional `0x` prefix. [`Display`](fmt::Display) writes the compact lowercase
/// form used by the `ximg` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddress([u8; MAC_LENGTH]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; MAC_LENGTH]);

    #[must_use]
    pub const fn new(octets: [u8; MAC_LENGTH]) -> Self {
        Self(octets)
    }

    #[must_use]
    pub fn octets(&self) -> [u8; MAC_LENGTH] {
        self.0
    }

    /// Address as a 48-bit integer, first octet most significant.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    /// Build an address from the low 48 bits of `value`.
    ///
    /// # Errors
    /// Returns `Error::InvalidMacAddress` if `value` has bits set above bit 47.
    pub fn from_u64(value: u64) -> Result<Self> {
        if value >> 48 != 0 {
            return Err(Error::InvalidMacAddress(format!("{value:#x}")));
        }
        let bytes = value.to_be_bytes();
        let mut octets = [0u8; MAC_LENGTH];
        octets.copy_from_slice(&bytes[2..]);
        Ok(Self(octets))
    }

    /// Colon-separated form (`00:1b:21:aa:bb:cc`).
    #[must_use]
    pub fn to_colon_string(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let digits: String = trimmed.chars().filter(|c| *c != ':' && *c != '-').collect();

        if digits.len() != MAC_LENGTH * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }

        let mut octets = [0u8; MAC_LENGTH];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidMacAddress(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

/// Physical network the data channel runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Regular Ethernet: images travel over a secondary TCP connection that the
    /// camera opens back to the controller.
    #[default]
    Ethernet,

    /// 10G interface: images travel as raw Ethernet frames.
    TenGigabit,
}

impl NetworkType {
    /// Single-letter token used on the command line (`e` / `x`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Ethernet => "e",
            NetworkType::TenGigabit => "x",
        }
    }

    /// Resolve a network token, falling back to [`NetworkType::Ethernet`] for
    /// anything unrecognised.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim() {
            "x" | "X" => NetworkType::TenGigabit,
            _ => NetworkType::Ethernet,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor acquisition mode, selected with `iload {mode:<n>}`.
///
/// Switching modes reboots the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionMode {
    #[default]
    Standard,
    StandardBinned,
    HighSpeed,
    HighSpeedBinned,
}

impl AcquisitionMode {
    /// Numeric identifier sent in the `iload` command.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            AcquisitionMode::Standard => 0,
            AcquisitionMode::StandardBinned => 1,
            AcquisitionMode::HighSpeed => 2,
            AcquisitionMode::HighSpeedBinned => 3,
        }
    }

    /// Resolve a mode from its numeric identifier.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(AcquisitionMode::Standard),
            1 => Some(AcquisitionMode::StandardBinned),
            2 => Some(AcquisitionMode::HighSpeed),
            3 => Some(AcquisitionMode::HighSpeedBinned),
            _ => None,
        }
    }

    /// Resolve a mode name, falling back to [`AcquisitionMode::Standard`] for
    /// anything unrecognised.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::str::FromStr for AcquisitionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "s" => Ok(AcquisitionMode::Standard),
            "standard-binned" | "sb" => Ok(AcquisitionMode::StandardBinned),
            "high-speed" | "hs" => Ok(AcquisitionMode::HighSpeed),
            "high-speed-binned" | "hsb" => Ok(AcquisitionMode::HighSpeedBinned),
            _ => Err(Error::InvalidResponse(format!("unknown acquisition mode: {s}"))),
        }
    }
}
