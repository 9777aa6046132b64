//! Built-in region tables
//!
//! Two generations of the boot flash layout exist in the field. Both keep the
//! primary image at address zero and the jump page in the last sector; they
//! differ in where the golden image and the user area start.

use alloc::vec::Vec;

use crate::bpr::BlockMap;

use super::{Layout, LayoutSource, Region};

/// Size of the flash both presets are laid out for
pub const CHIP_SIZE: u32 = 0x40_0000;

const PRIMARY: (u32, u32) = (0x00_0000, 0x0B_0000);
const JUMP: (u32, u32) = (0x3F_F000, 0x40_0000);

fn build(
    map: &BlockMap,
    source: LayoutSource,
    name: &str,
    table: &[(&str, u32, u32)],
) -> Layout {
    let mut layout = Layout::with_source(source);
    layout.name = Some(name.into());
    layout.chip_size = Some(CHIP_SIZE);
    layout.regions = table
        .iter()
        .map(|&(name, start, end)| Region::new(name, start, end, map.mask_for(start, end)))
        .collect::<Vec<_>>();
    layout.sort_by_address();
    layout
}

/// Original table with a reserved gap between primary and golden
pub fn legacy(map: &BlockMap) -> Layout {
    build(
        map,
        LayoutSource::Legacy,
        "RD legacy",
        &[
            ("primary", PRIMARY.0, PRIMARY.1),
            ("golden", 0x20_0000, 0x2B_0000),
            ("user", 0x2B_0000, JUMP.0),
            ("jump", JUMP.0, JUMP.1),
        ],
    )
}

/// Packed table: golden directly follows primary
pub fn current(map: &BlockMap) -> Layout {
    build(
        map,
        LayoutSource::Current,
        "RD current",
        &[
            ("primary", PRIMARY.0, PRIMARY.1),
            ("golden", PRIMARY.1, 0x16_0000),
            ("user", 0x16_0000, JUMP.0),
            ("jump", JUMP.0, JUMP.1),
        ],
    )
}

/// Look up a preset by name
pub fn by_name(name: &str, map: &BlockMap) -> Option<Layout> {
    match name.to_ascii_lowercase().as_str() {
        "legacy" => Some(legacy(map)),
        "current" => Some(current(map)),
        _ => None,
    }
}
