//! Block protection command implementations

use super::format_size;
use rdflash_core::bpr::{BlockMap, LockFlags, ProtectionBitmap, Reconciliation};
use rdflash_core::flash::FlashSession;
use rdflash_core::layout::Layout;
use rdflash_core::transport::{Delay, Transport};
use std::error::Error;

/// Print the protection register and unlock `regions` if any are named
pub fn run_bpr<T: Transport, D: Delay>(
    session: &mut FlashSession<'_, T, D>,
    regions: &[String],
) -> Result<(), Box<dyn Error>> {
    let config = session.config();
    let selected = regions
        .iter()
        .map(|name| config.layout.region(name))
        .collect::<Result<Vec<_>, _>>()?;

    let result = session.reconcile_protection(&selected)?;
    print_reconciliation(&result);

    let state = if result.needs_write() {
        result.narrowed
    } else {
        result.live
    };
    println!();
    print_block_table(&config.block_map, &config.layout, &state);
    Ok(())
}

/// Summarize what a reconciliation found and did
pub fn print_reconciliation(result: &Reconciliation) {
    println!("BPR live:   {}", result.live);
    if result.needs_write() {
        println!("BPR now:    {}", result.narrowed);
        println!("Cleared {} protection bits", result.cleared().count());
    }
    if result.too_loose {
        println!("Note: protection is looser than requested, power cycle to restore the defaults");
    }
}

fn format_locks(flags: LockFlags) -> &'static str {
    match (
        flags.contains(LockFlags::WRITE),
        flags.contains(LockFlags::READ),
    ) {
        (true, true) => "write+read",
        (true, false) => "write",
        (false, true) => "read",
        (false, false) => "-",
    }
}

/// Print the lock state of every protection block
pub fn print_block_table(map: &BlockMap, layout: &Layout, bitmap: &ProtectionBitmap) {
    println!(
        "{:<19} {:>8} {:>4} {:<11} {}",
        "Block", "Size", "Bit", "Locks", "Regions"
    );
    println!("{:-<60}", "");

    for (block, flags) in map.locks(bitmap) {
        let regions: Vec<&str> = layout
            .regions
            .iter()
            .filter(|r| block.overlaps(r.start, r.end))
            .map(|r| r.name.as_str())
            .collect();
        println!(
            "0x{:06X}-0x{:06X} {:>8} {:>4} {:<11} {}",
            block.start,
            block.end,
            format_size(block.end - block.start),
            block.write_lock,
            format_locks(flags),
            regions.join(",")
        );
    }
}
