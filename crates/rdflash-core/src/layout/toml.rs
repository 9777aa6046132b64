//! TOML layout file parsing
//!
//! Parses layout files in TOML format:
//!
//! ```toml
//! [layout]
//! name = "RD field units"
//! chip_size = "4 MiB"
//!
//! [[region]]
//! name = "primary"
//! start = 0x000000
//! end = 0x0B0000
//! mask = "55 00 BF FF FF FF FF FF FC 00"
//!
//! [[region]]
//! name = "jump"
//! start = 0x3FF000
//! end = 0x400000
//!
//! [jump]
//! region = "jump"
//! offset = 0xF00
//! target = "golden"
//! ```
//!
//! Region ends are exclusive. A region without `mask` gets the mask derived
//! from the block map.

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use crate::bpr::{BlockMap, ProtectionBitmap};

use super::{JumpLayout, Layout, LayoutError, LayoutSource, Region};

/// TOML layout file structure
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutFile {
    layout: Option<TomlLayoutMeta>,
    region: Vec<TomlRegion>,
    jump: Option<TomlJump>,
}

/// Layout metadata
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutMeta {
    name: Option<String>,
    chip_size: Option<String>,
}

/// Region definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlRegion {
    name: String,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    start: u32,
    #[serde(deserialize_with = "deserialize_hex_u32")]
    end: u32,
    mask: Option<String>,
}

/// Jump page placement in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlJump {
    region: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    offset: Option<u32>,
    target: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

impl HexOrInt {
    fn value(self) -> Result<u32, String> {
        match self {
            HexOrInt::Int(n) => Ok(n),
            HexOrInt::Str(s) => parse_number(&s),
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    HexOrInt::deserialize(deserializer)?
        .value()
        .map_err(serde::de::Error::custom)
}

fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_hex_u32(deserializer).map(Some)
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "4 MiB" or "4096"
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl Layout {
    /// Load a layout from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>, map: &BlockMap) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path).map_err(|_| LayoutError::IoError)?;
        Self::from_toml_str(&content, map)
    }

    /// Parse a layout from a TOML string
    ///
    /// The result is not validated; see [`Layout::validate`].
    pub fn from_toml_str(content: &str, map: &BlockMap) -> Result<Self, LayoutError> {
        let file: TomlLayoutFile = toml::from_str(content).map_err(|e| {
            log::error!("layout: {}", e);
            LayoutError::ParseError
        })?;

        let mut layout = Layout::with_source(LayoutSource::Toml);

        if let Some(meta) = file.layout {
            layout.name = meta.name;
            if let Some(size_str) = meta.chip_size {
                layout.chip_size =
                    Some(parse_size(&size_str).map_err(|_| LayoutError::ParseError)?);
            }
        }

        for r in file.region {
            let protection_mask = match &r.mask {
                Some(text) => ProtectionBitmap::parse_hex(text).ok_or(LayoutError::InvalidMask)?,
                None => map.mask_for(r.start, r.end),
            };
            layout.add_region(Region::new(r.name, r.start, r.end, protection_mask));
        }

        if let Some(jump) = file.jump {
            let defaults = JumpLayout::default();
            layout.jump = JumpLayout {
                region: jump.region.unwrap_or(defaults.region),
                page_offset: jump.offset.unwrap_or(defaults.page_offset),
                default_target: jump.target.unwrap_or(defaults.default_target),
            };
        }

        layout.sort_by_address();
        Ok(layout)
    }

    /// Render the layout as TOML, masks included
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        output.push_str("[layout]\n");
        if let Some(name) = &self.name {
            output.push_str(&format!("name = \"{}\"\n", name));
        }
        if let Some(size) = self.chip_size {
            output.push_str(&format!("chip_size = \"{}\"\n", format_size(size)));
        }
        output.push('\n');

        for region in &self.regions {
            output.push_str("[[region]]\n");
            output.push_str(&format!("name = \"{}\"\n", region.name));
            output.push_str(&format!("start = 0x{:06X}\n", region.start));
            output.push_str(&format!("end = 0x{:06X}\n", region.end));
            let mask: Vec<String> = region
                .protection_mask
                .as_bytes()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect();
            output.push_str(&format!("mask = \"{}\"\n", mask.join(" ")));
            output.push('\n');
        }

        output.push_str("[jump]\n");
        output.push_str(&format!("region = \"{}\"\n", self.jump.region));
        output.push_str(&format!("offset = 0x{:X}\n", self.jump.page_offset));
        output.push_str(&format!("target = \"{}\"\n", self.jump.default_target));

        output
    }
}

/// Format a size as human-readable string
fn format_size(size: u32) -> String {
    if size >= 1024 * 1024 && size.is_multiple_of(1024 * 1024) {
        format!("{} MiB", size / (1024 * 1024))
    } else if size >= 1024 && size.is_multiple_of(1024) {
        format!("{} KiB", size / 1024)
    } else {
        format!("{}", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geometry;
    use crate::layout::presets;
    use std::string::ToString;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("4MiB").unwrap(), 4 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[layout]
name = "Test Layout"
chip_size = "4 MiB"

[[region]]
name = "golden"
start = "0x0B0000"
end = 0x160000

[[region]]
name = "primary"
start = 0
end = 0x0B0000
mask = "55 00 BF FF FF FF FF FF FC 00"

[[region]]
name = "jump"
start = 0x3FF000
end = 0x400000

[jump]
offset = 0xE00
target = "primary"
"#;
        let map = BlockMap::sst26vf032b();
        let layout = Layout::from_toml_str(toml, &map).unwrap();
        assert_eq!(layout.name, Some("Test Layout".to_string()));
        assert_eq!(layout.chip_size, Some(4 * 1024 * 1024));
        assert_eq!(layout.regions.len(), 3);
        assert_eq!(layout.regions[0].name, "primary");
        assert_eq!(
            layout.regions[0].protection_mask,
            ProtectionBitmap::parse_hex("55 00 BF FF FF FF FF FF FC 00").unwrap()
        );
        assert_eq!(
            layout.regions[1].protection_mask,
            map.mask_for(0x0B_0000, 0x16_0000)
        );
        assert_eq!(layout.jump.region, "jump");
        assert_eq!(layout.jump.page_offset, 0xE00);
        assert_eq!(layout.jump.default_target, "primary");
        layout.validate(&Geometry::SST26VF032B).unwrap();
    }

    #[test]
    fn test_bad_mask_is_rejected() {
        let toml = r#"
[[region]]
name = "primary"
start = 0
end = 0x1000
mask = "55 00"
"#;
        let err = Layout::from_toml_str(toml, &BlockMap::default()).unwrap_err();
        assert_eq!(err, LayoutError::InvalidMask);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = Layout::from_toml_str("region = 5", &BlockMap::default()).unwrap_err();
        assert_eq!(err, LayoutError::ParseError);
    }

    #[test]
    fn test_toml_output_parses_back() {
        let map = BlockMap::sst26vf032b();
        let layout = presets::legacy(&map);
        let text = layout.to_toml_string();
        let parsed = Layout::from_toml_str(&text, &map).unwrap();
        assert_eq!(parsed.regions, layout.regions);
        assert_eq!(parsed.jump, layout.jump);
        assert_eq!(parsed.chip_size, layout.chip_size);
    }
}
