//! Info command implementation

use super::bpr::print_block_table;
use rdflash_core::flash::FlashSession;
use rdflash_core::transport::{Delay, Transport};
use std::error::Error;

/// Print identity, firmware version, protection register and jump target
///
/// Nothing is written, so a wrong identity is reported rather than fatal.
pub fn run_info<T: Transport, D: Delay>(
    session: &mut FlashSession<'_, T, D>,
    decode: bool,
) -> Result<(), Box<dyn Error>> {
    let config = session.config();

    let id = session.read_identity()?;
    let expected = config.expected_id;
    println!("RD Board Information");
    println!("====================");
    println!();
    println!("Identity:         {:02X} {:02X} {:02X}", id[0], id[1], id[2]);
    if id != expected {
        println!(
            "                  (expected {:02X} {:02X} {:02X}, writes will be refused)",
            expected[0], expected[1], expected[2]
        );
    }

    let version = session.firmware_version()?;
    println!("Firmware version: {}", version);

    let bpr = session.read_bpr()?;
    println!("BPR:              {}", bpr);

    match session.read_jump_target()? {
        Some(target) => {
            let region = config
                .layout
                .regions
                .iter()
                .find(|r| r.contains(target))
                .map(|r| r.name.as_str())
                .unwrap_or("no region");
            println!("Jump target:      0x{:06X} ({})", target, region);
        }
        None => println!("Jump target:      none"),
    }

    if decode {
        println!();
        print_block_table(&config.block_map, &config.layout, &bpr);
    }

    Ok(())
}
