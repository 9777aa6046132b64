//! End-to-end runs of the engine against the emulator

use alloc::vec;
use alloc::vec::Vec;

use rdflash_core::bpr::ProtectionBitmap;
use rdflash_core::config::FlashConfig;
use rdflash_core::error::Error;
use rdflash_core::flash::{FlashSession, NoProgress, WriteState};
use rdflash_core::jump;
use rdflash_core::layout::Region;
use rdflash_core::protocol::opcodes;
use rdflash_core::transport::{NoDelay, RecordingDelay};

use crate::{DummyConfig, DummyRd, Faults};

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn region<'a>(config: &'a FlashConfig, name: &str) -> &'a Region {
    config.layout.region(name).unwrap()
}

#[test]
fn test_round_trip_every_region() {
    for config in [FlashConfig::legacy(), FlashConfig::current()] {
        for (seed, r) in config.layout.regions.iter().enumerate() {
            // odd lengths exercise the short final page and chunk
            let len = core::cmp::min(r.size() as usize, 3 * 4096 + 77);
            let data = pattern(len, seed as u8);

            let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
            session.reconcile_protection(&[r]).unwrap();
            let report = session.write_region(r, &data, &mut NoProgress).unwrap();
            assert_eq!(report.written_len, len);

            let back = session.read_region(r, &mut NoProgress).unwrap();
            assert_eq!(&back[..len], &data[..], "region {}", r.name);
            assert!(back[len..].iter().all(|&b| b == 0xFF));
        }
    }
}

#[test]
fn test_oversized_payload_is_truncated() {
    let config = FlashConfig::current();
    let jump = region(&config, "jump");
    let data = pattern(4096 + 300, 9);

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    session.reconcile_protection(&[jump]).unwrap();
    let report = session.write_region(jump, &data, &mut NoProgress).unwrap();
    assert!(report.truncated());
    assert_eq!(report.requested_len, 4396);

    let back = session.read_region(jump, &mut NoProgress).unwrap();
    assert_eq!(back, &data[..4096]);
}

#[test]
fn test_erase_count_matches_length() {
    let config = FlashConfig::current();
    let user = region(&config, "user");

    for len in [1usize, 4095, 4096, 4097, 8192, 40_000] {
        let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
        session.reconcile_protection(&[user]).unwrap();
        let report = session
            .write_region(user, &vec![0xA5; len], &mut NoProgress)
            .unwrap();
        assert_eq!(report.sectors_erased as usize, len.div_ceil(4096));

        let (rd, _) = session.into_inner();
        let erases = rd
            .flash_opcodes()
            .iter()
            .filter(|&&op| op == opcodes::SE)
            .count();
        assert_eq!(erases, len.div_ceil(4096));
    }
}

#[test]
fn test_4096_byte_write_sequence() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");
    let data = pattern(4096, 1);

    let mut rd = DummyRd::new_default();
    rd.set_bpr(ProtectionBitmap::NONE);
    let mut delay = RecordingDelay::default();
    let mut session = FlashSession::new(rd, &mut delay, &config);
    session.verify_identity().unwrap();
    session.transport_mut().clear_log();

    let report = session.write_region(primary, &data, &mut NoProgress).unwrap();
    assert_eq!(report.sectors_erased, 1);
    assert_eq!(report.pages_programmed, 16);
    assert_eq!(report.bytes_verified, 4096);

    let (rd, _) = session.into_inner();
    let log = rd.exchanges();
    let erases: Vec<_> = log.iter().filter(|tx| tx[1] == opcodes::SE).collect();
    assert_eq!(erases.len(), 1);
    assert_eq!(erases[0].as_slice(), &[0x02, 0x20, 0x00, 0x00, 0x00]);

    let programs: Vec<_> = log.iter().filter(|tx| tx[1] == opcodes::PP).collect();
    assert_eq!(programs.len(), 16);
    for (i, tx) in programs.iter().enumerate() {
        let addr = (i * 256) as u32;
        assert_eq!(&tx[2..5], &[(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]);
        assert_eq!(&tx[5..], &data[i * 256..(i + 1) * 256]);
    }

    let read_back: usize = log
        .iter()
        .filter(|tx| tx[1] == opcodes::READ)
        .map(|tx| tx.len() - 5)
        .sum();
    assert_eq!(read_back, 4096);

    // every erase and program is preceded by a write enable
    for (i, tx) in log.iter().enumerate() {
        if tx[1] == opcodes::SE || tx[1] == opcodes::PP {
            assert_eq!(log[i - 1][1], opcodes::WREN);
        }
    }

    assert_eq!(delay.requests.len(), 17);
    assert_eq!(delay.total_us(), 25_000 + 16 * 1_500);
}

#[test]
fn test_identity_guard() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    session.verify_identity().unwrap();

    let bad = DummyRd::new(DummyConfig {
        id: [0xBF, 0x26, 0x41],
        ..DummyConfig::default()
    });
    let mut session = FlashSession::new(bad, NoDelay, &config);
    let err = session.reconcile_protection(&[primary]).unwrap_err();
    assert_eq!(
        err,
        Error::HardwareIdentityMismatch {
            expected: [0xBF, 0x26, 0x42],
            found: [0xBF, 0x26, 0x41],
        }
    );
    let err = session
        .write_region(primary, &[0u8; 16], &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::HardwareIdentityMismatch { .. }));

    let (rd, _) = session.into_inner();
    let ops = rd.flash_opcodes();
    assert!(ops.iter().all(|&op| op == opcodes::RDID));
    assert!(!ops.contains(&opcodes::SE));
}

#[test]
fn test_reconcile_is_idempotent() {
    let config = FlashConfig::legacy();
    let primary = region(&config, "primary");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    let first = session.reconcile_protection(&[primary]).unwrap();
    assert!(first.too_tight);
    let second = session.reconcile_protection(&[primary]).unwrap();
    assert!(!second.too_tight);

    let (rd, _) = session.into_inner();
    assert_eq!(rd.bpr_writes().len(), 1);
    assert_eq!(
        rd.bpr().as_bytes(),
        &[0x55, 0x00, 0xBF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC, 0x00]
    );
}

#[test]
fn test_reconcile_never_sets_bits() {
    let config = FlashConfig::current();
    let golden = region(&config, "golden");
    let jump = region(&config, "jump");

    // a sparse live state with some bits already cleared
    let live = ProtectionBitmap::parse_hex("00 41 0F F0 00 FF 12 34 56 78").unwrap();
    let mut rd = DummyRd::new_default();
    rd.set_bpr(live);

    let mut session = FlashSession::new(rd, NoDelay, &config);
    let result = session.reconcile_protection(&[golden, jump]).unwrap();
    let (rd, _) = session.into_inner();

    for written in rd.bpr_writes() {
        assert!((*written & !live).is_empty());
    }
    assert_eq!(rd.bpr(), result.narrowed);
    assert!(result.too_loose);
}

#[test]
fn test_reconcile_preserves_unselected_regions() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");
    let golden = region(&config, "golden");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    session.reconcile_protection(&[primary]).unwrap();

    // golden stays write-locked
    let err = session
        .write_region(golden, &[0x00; 64], &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::VerificationMismatch { .. }));
    let (rd, _) = session.into_inner();
    assert!(rd.ignored_commands() > 0);
}

#[test]
fn test_report_only_reconcile_does_not_write() {
    let config = FlashConfig::current();
    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    let result = session.reconcile_protection(&[]).unwrap();
    assert!(!result.too_tight);
    let (rd, _) = session.into_inner();
    assert_eq!(rd.flash_opcodes(), vec![opcodes::RBPR]);
}

#[test]
fn test_write_without_unlock_fails_verification() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    let err = session
        .write_region(primary, &pattern(512, 3), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::VerificationMismatch { start: 0, .. }));
    assert_eq!(session.state(), WriteState::Failed);
}

#[test]
fn test_stuck_bit_reports_chunk() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");
    let mut rd = DummyRd::new_default();
    rd.set_faults(Faults {
        stuck_bit_at: Some(0x1234),
        ..Faults::default()
    });

    let mut session = FlashSession::new(rd, NoDelay, &config);
    session.reconcile_protection(&[primary]).unwrap();
    let err = session
        .write_region(primary, &vec![0x00; 8192], &mut NoProgress)
        .unwrap_err();
    assert_eq!(
        err,
        Error::VerificationMismatch {
            start: 0x1000,
            end: 0x1400
        }
    );
}

#[test]
fn test_short_response_aborts_write() {
    let config = FlashConfig::current();
    let primary = region(&config, "primary");
    let mut rd = DummyRd::new_default();
    // identity, RBPR, WREN, WBPR, WREN, SE, then the WREN of the first page
    rd.set_faults(Faults {
        short_response_from: Some(6),
        ..Faults::default()
    });

    let mut session = FlashSession::new(rd, NoDelay, &config);
    session.reconcile_protection(&[primary]).unwrap();
    let err = session
        .write_region(primary, &[0x00; 1024], &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::TransportFailure { .. }));
    assert_eq!(session.state(), WriteState::Failed);

    let (rd, _) = session.into_inner();
    // nothing after the failed exchange
    assert_eq!(rd.exchanges().len(), 7);
}

#[test]
fn test_jump_sector_points_at_golden() {
    let config = FlashConfig::current();
    let jump_region = region(&config, "jump");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    session.reconcile_protection(&[jump_region]).unwrap();
    let report = session.write_jump_sector(None, &mut NoProgress).unwrap();
    assert_eq!(report.start, 0x3F_FF00);
    assert_eq!(session.read_jump_target().unwrap(), Some(0x0B_0000));

    let (rd, _) = session.into_inner();
    let page = &rd.data()[0x3F_FF00..0x40_0000];
    assert_eq!(&page[10..13], &[0x0B, 0x00, 0x00]);
    assert_eq!(page, &jump::encode(0x0B_0000).unwrap()[..]);
    assert!(rd.data()[0x3F_F000..0x3F_FF00].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_jump_sector_legacy_and_explicit_target() {
    let config = FlashConfig::legacy();
    let jump_region = region(&config, "jump");

    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    session.reconcile_protection(&[jump_region]).unwrap();
    session.write_jump_sector(None, &mut NoProgress).unwrap();
    assert_eq!(session.read_jump_target().unwrap(), Some(0x20_0000));

    session
        .write_jump_sector(Some(0x00_0000), &mut NoProgress)
        .unwrap();
    assert_eq!(session.read_jump_target().unwrap(), Some(0));

    assert_eq!(
        session.write_jump_sector(Some(0x40_0000), &mut NoProgress),
        Err(Error::AddressOutOfBounds)
    );
}

#[test]
fn test_blank_chip_has_no_jump_target() {
    let config = FlashConfig::current();
    let mut session = FlashSession::new(DummyRd::new_default(), NoDelay, &config);
    assert_eq!(session.read_jump_target().unwrap(), None);
}

#[test]
fn test_firmware_version_and_identity() {
    let config = FlashConfig::current();
    let rd = DummyRd::new(DummyConfig {
        firmware_version: 12,
        ..DummyConfig::default()
    });
    let mut session = FlashSession::new(rd, NoDelay, &config);
    assert_eq!(session.firmware_version().unwrap(), 12);
    assert_eq!(session.read_identity().unwrap(), [0xBF, 0x26, 0x42]);
}
