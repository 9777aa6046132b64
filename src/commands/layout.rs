//! Layout command implementation

use super::format_size;
use rdflash_core::layout::Layout;

/// Print the active layout as a table or as TOML
pub fn run_layout(layout: &Layout, toml: bool) {
    if toml {
        print!("{}", layout.to_toml_string());
    } else {
        print_layout(layout);
    }
}

/// Print layout information
pub fn print_layout(layout: &Layout) {
    println!("Layout Information");
    println!("==================");

    if let Some(name) = &layout.name {
        println!("Name:   {}", name);
    }
    println!("Source: {}", layout.source);
    if let Some(size) = layout.chip_size {
        println!("Chip:   {} bytes ({})", size, format_size(size));
    }

    println!("\nRegions ({}):", layout.len());
    println!(
        "{:<10} {:>10} {:>10} {:>10}  {}",
        "Name", "Start", "End", "Size", "Protection mask"
    );
    println!("{:-<76}", "");

    for region in &layout.regions {
        println!(
            "{:<10} {:#08X} {:#08X} {:>10}  {}",
            region.name,
            region.start,
            region.end,
            format_size(region.size()),
            region.protection_mask
        );
    }

    let jump = &layout.jump;
    if let Ok(region) = layout.jump_region() {
        println!(
            "\nJump page: 0x{:06X} in {}, default target {}",
            region.start + jump.page_offset,
            jump.region,
            jump.default_target
        );
    }
}
