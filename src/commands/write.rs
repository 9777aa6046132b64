//! Write command implementation
//!
//! Runs the destructive half of an [`OperationPlan`]: every image is loaded
//! first, protection is narrowed once for all touched regions, then each
//! region is erased, programmed and verified in turn. The jump page goes
//! last so that a failed image write never leaves the board pointing at it.

use super::bpr::print_reconciliation;
use super::format_size;
use super::progress::IndicatifProgress;
use rdflash_core::flash::FlashSession;
use rdflash_core::plan::OperationPlan;
use rdflash_core::transport::{Delay, Transport};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

/// Execute the writes and the jump page of `plan`
pub fn run_write<T: Transport, D: Delay>(
    session: &mut FlashSession<'_, T, D>,
    plan: &OperationPlan<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let layout = &session.config().layout;

    let mut images = Vec::with_capacity(plan.writes.len());
    for write in &plan.writes {
        let region = layout.region(&write.region)?;
        let data = fs::read(&write.source)
            .map_err(|e| format!("Failed to read {}: {}", write.source.display(), e))?;
        println!("Read {} bytes from {:?}", data.len(), write.source);
        if data.len() > region.size() as usize {
            println!(
                "Warning: {:?} is larger than {} ({}), the excess is dropped",
                write.source,
                region.name,
                format_size(region.size())
            );
        }
        images.push((region, data));
    }

    let regions = plan.regions_to_unlock(layout)?;
    let result = session.reconcile_protection(&regions)?;
    print_reconciliation(&result);

    let mut progress = IndicatifProgress::new();
    for (region, data) in &images {
        println!(
            "Writing {} (0x{:06X} - 0x{:06X})",
            region.name, region.start, region.end
        );
        session.write_region(region, data, &mut progress)?;
    }

    if let Some(target) = plan.jump {
        session.write_jump_sector(target.address(), &mut progress)?;
        match session.read_jump_target()? {
            Some(addr) => println!("Jump page points at 0x{:06X}", addr),
            None => return Err("Jump page did not decode after writing".into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdflash_core::config::FlashConfig;
    use rdflash_core::flash::NoProgress;
    use rdflash_core::plan::{JumpTarget, WriteRequest};
    use rdflash_core::transport::NoDelay;
    use rdflash_dummy::DummyRd;

    fn request(region: &str, source: PathBuf) -> WriteRequest<PathBuf> {
        WriteRequest {
            region: region.to_string(),
            source,
        }
    }

    #[test]
    fn test_write_regions_and_jump() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.bin");
        let golden = dir.path().join("golden.bin");
        fs::write(&primary, vec![0x11u8; 5000]).unwrap();
        fs::write(&golden, vec![0x22u8; 300]).unwrap();

        let config = FlashConfig::current();
        let mut plan = OperationPlan::new();
        plan.writes.push(request("primary", primary));
        plan.writes.push(request("golden", golden));
        plan.jump = Some(JumpTarget::Default);
        plan.validate(&config.layout).unwrap();

        let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
        run_write(&mut session, &plan).unwrap();

        assert_eq!(session.read_jump_target().unwrap(), Some(0x0B_0000));
        let golden = config.layout.region("golden").unwrap();
        let back = session.read_range(golden.start, 301, &mut NoProgress).unwrap();
        assert!(back[..300].iter().all(|&b| b == 0x22));
        assert_eq!(back[300], 0xFF);

        // user stays locked apart from the block it shares with the jump page
        let (rd, _) = session.into_inner();
        let user = config.layout.region("user").unwrap();
        assert!(config
            .block_map
            .blocks_in(user.start, 0x3F_E000)
            .all(|b| rd.bpr().bit(b.write_lock)));
        assert_eq!(rd.bpr_writes().len(), 1);
    }

    #[test]
    fn test_missing_image_touches_nothing() {
        let config = FlashConfig::current();
        let mut plan = OperationPlan::new();
        plan.writes
            .push(request("primary", PathBuf::from("/nonexistent/rdflash.bin")));

        let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
        assert!(run_write(&mut session, &plan).is_err());

        let (rd, _) = session.into_inner();
        assert!(rd.exchanges().is_empty());
    }
}
