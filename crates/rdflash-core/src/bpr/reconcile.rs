//! Narrowing the live protection bitmap to what a write needs
//!
//! The register can only be narrowed from this path: bits are cleared, never
//! set. Raising protection back requires a power cycle, which restores the
//! power-on defaults of the volatile register.

use crate::error::Result;
use crate::layout::Region;
use crate::protocol;
use crate::transport::Transport;

use super::ProtectionBitmap;

/// Outcome of comparing the live bitmap with the target of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Bitmap read from the device
    pub live: ProtectionBitmap,
    /// Bitmap the selected regions need
    pub target: ProtectionBitmap,
    /// `live & target`, the only bitmap this path may write
    pub narrowed: ProtectionBitmap,
    /// Some bit is set live that the target does not allow
    pub too_tight: bool,
    /// Some bit the target wants set is clear live
    pub too_loose: bool,
}

impl Reconciliation {
    /// Compare `live` against `target`
    pub fn compute(live: ProtectionBitmap, target: ProtectionBitmap) -> Self {
        let narrowed = live & target;
        Self {
            live,
            target,
            narrowed,
            too_tight: !(live & !target).is_empty(),
            too_loose: narrowed != target,
        }
    }

    /// True if the device must be written before the regions can be erased
    pub fn needs_write(&self) -> bool {
        self.too_tight
    }

    /// Bits that the write clears
    pub fn cleared(&self) -> ProtectionBitmap {
        self.live & !self.narrowed
    }
}

/// AND the baseline with the mask of every region about to be written
///
/// Regions that are not written do not contribute, so their protection is
/// preserved.
pub fn target_bitmap(baseline: ProtectionBitmap, regions: &[&Region]) -> ProtectionBitmap {
    regions
        .iter()
        .fold(baseline, |acc, region| acc & region.protection_mask)
}

/// Read the live bitmap and clear whatever blocks `regions` from being written
///
/// With an empty region list the register is only read. The new bitmap is
/// not read back; the identity guard and the device's write-enable latch are
/// trusted.
pub fn reconcile<T: Transport + ?Sized>(
    transport: &mut T,
    baseline: ProtectionBitmap,
    regions: &[&Region],
) -> Result<Reconciliation> {
    let live = protocol::read_bpr(transport)?;
    let target = target_bitmap(baseline, regions);
    let result = Reconciliation::compute(live, target);

    log::debug!("BPR live:   {}", result.live);
    log::debug!("BPR target: {}", result.target);

    if regions.is_empty() {
        return Ok(result);
    }

    if result.too_loose {
        log::warn!("block protection register is not maximally tight");
    }

    if result.too_tight {
        log::info!(
            "Clearing {} block protection bits needed for {}",
            result.cleared().count(),
            RegionNames(regions)
        );
        protocol::write_bpr(transport, &result.narrowed)?;
    } else {
        log::debug!("block protection register already permits the write");
    }

    Ok(result)
}

struct RegionNames<'a>(&'a [&'a Region]);

impl core::fmt::Display for RegionNames<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, region) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", region.name)?;
        }
        Ok(())
    }
}
