//! Erase-program-verify engine

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::bpr::{self, ProtectionBitmap, Reconciliation};
use crate::config::FlashConfig;
use crate::error::{Error, Result};
use crate::identity;
use crate::layout::Region;
use crate::protocol;
use crate::transport::{Delay, Transport};

use super::{WriteProgress, WriteState};

/// Summary of one region write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Name of the region written
    pub region: String,
    /// Absolute address of the first programmed byte
    pub start: u32,
    /// Length of the data handed to the engine
    pub requested_len: usize,
    /// Length actually written (smaller if the data was truncated)
    pub written_len: usize,
    /// Number of sectors erased
    pub sectors_erased: u32,
    /// Number of page program commands issued
    pub pages_programmed: u32,
    /// Number of bytes read back and compared
    pub bytes_verified: usize,
}

impl WriteReport {
    fn empty(region: &Region, start: u32) -> Self {
        Self {
            region: region.name.clone(),
            start,
            requested_len: 0,
            written_len: 0,
            sectors_erased: 0,
            pages_programmed: 0,
            bytes_verified: 0,
        }
    }

    /// True if the data did not fit the region and was cut
    pub fn truncated(&self) -> bool {
        self.written_len < self.requested_len
    }
}

/// Exclusive access to the RD flash through a transport
///
/// A session owns the transport for its lifetime and borrows the
/// configuration. Destructive operations run the identity guard first (once
/// per session); after any failed write the session refuses to write again.
pub struct FlashSession<'c, T: Transport, D: Delay> {
    transport: T,
    delay: D,
    config: &'c FlashConfig,
    state: WriteState,
    identity_verified: bool,
}

impl<'c, T: Transport, D: Delay> FlashSession<'c, T, D> {
    /// Create a session
    pub fn new(transport: T, delay: D, config: &'c FlashConfig) -> Self {
        Self {
            transport,
            delay,
            config,
            state: WriteState::Idle,
            identity_verified: false,
        }
    }

    /// Configuration this session runs with
    pub fn config(&self) -> &'c FlashConfig {
        self.config
    }

    /// Current write state
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport and delay
    pub fn into_inner(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Check that the longest exchange the configuration needs fits the transport
    ///
    /// Call before touching the chip so a too-large `read_chunk` is rejected
    /// before anything is erased.
    pub fn check_exchange_limit(&self) -> Result<()> {
        let header = protocol::opcodes::PREFIX_LEN + protocol::opcodes::ADDR_LEN;
        let needed = header + self.config.read_chunk.max(self.config.geometry.page_size as usize);
        let max = self.transport.max_exchange_len();
        if needed > max {
            log::error!(
                "{}: exchanges of up to {} bytes needed, transport allows {}",
                self.transport.name(),
                needed,
                max
            );
            return Err(Error::ExchangeTooLong { needed, max });
        }
        Ok(())
    }

    /// Read the identity code without judging it
    pub fn read_identity(&mut self) -> Result<[u8; 3]> {
        protocol::read_identity(&mut self.transport)
    }

    /// Run the identity guard
    pub fn verify_identity(&mut self) -> Result<()> {
        identity::verify_identity(&mut self.transport, self.config.expected_id)?;
        self.identity_verified = true;
        Ok(())
    }

    fn ensure_identity(&mut self) -> Result<()> {
        if self.identity_verified {
            return Ok(());
        }
        self.verify_identity()
    }

    /// Read the version of the RD firmware
    pub fn firmware_version(&mut self) -> Result<u8> {
        protocol::read_firmware_version(&mut self.transport)
    }

    /// Read the live protection bitmap
    pub fn read_bpr(&mut self) -> Result<ProtectionBitmap> {
        protocol::read_bpr(&mut self.transport)
    }

    /// Narrow block protection so that `regions` can be written
    ///
    /// An empty list only reads and compares. Otherwise the identity guard
    /// runs before the register is touched.
    pub fn reconcile_protection(&mut self, regions: &[&Region]) -> Result<Reconciliation> {
        if !regions.is_empty() {
            self.ensure_identity()?;
        }
        bpr::reconcile(
            &mut self.transport,
            self.config.block_map.baseline(),
            regions,
        )
    }

    /// Erase, program and verify `data` at the start of `region`
    ///
    /// Data longer than the region is truncated with a warning. Empty data
    /// is a no-op.
    pub fn write_region<P: WriteProgress>(
        &mut self,
        region: &Region,
        data: &[u8],
        progress: &mut P,
    ) -> Result<WriteReport> {
        self.write_at(region, 0, data, progress)
    }

    /// Erase, program and verify `data` at `offset` inside `region`
    ///
    /// `offset` must be page aligned. The sector containing `offset` and as
    /// many following sectors as the data needs are erased.
    pub fn write_at<P: WriteProgress>(
        &mut self,
        region: &Region,
        offset: u32,
        data: &[u8],
        progress: &mut P,
    ) -> Result<WriteReport> {
        let geometry = self.config.geometry;
        if !offset.is_multiple_of(geometry.page_size) {
            return Err(Error::InvalidAlignment);
        }
        if offset >= region.size() {
            return Err(Error::AddressOutOfBounds);
        }
        let start = region.start + offset;

        if data.is_empty() {
            log::warn!("{}: nothing to write", region.name);
            return Ok(WriteReport::empty(region, start));
        }

        let room = (region.size() - offset) as usize;
        let payload = if data.len() > room {
            log::warn!(
                "{}: {} bytes do not fit in {} bytes, truncating",
                region.name,
                data.len(),
                room
            );
            &data[..room]
        } else {
            data
        };

        if self.state == WriteState::Done {
            self.state.advance(WriteState::Idle)?;
        }
        // Failed (or any other leftover) is rejected here
        if self.state != WriteState::Idle {
            return Err(Error::InvalidStateTransition {
                from: self.state,
                to: WriteState::Erasing,
            });
        }

        self.check_exchange_limit()?;
        self.ensure_identity()?;

        let mut report = WriteReport {
            requested_len: data.len(),
            written_len: payload.len(),
            ..WriteReport::empty(region, start)
        };

        match self.run_write(start, payload, &mut report, progress) {
            Ok(()) => {
                log::info!(
                    "{}: wrote and verified {} bytes at 0x{:06X}",
                    region.name,
                    report.written_len,
                    start
                );
                progress.complete(&report);
                Ok(report)
            }
            Err(e) => {
                log::error!("{}: write failed while {}: {}", region.name, self.state, e);
                // Every state run_write leaves behind on error may fail
                debug_assert!(self.state.can_transition(WriteState::Failed));
                self.state = WriteState::Failed;
                Err(e)
            }
        }
    }

    fn run_write<P: WriteProgress>(
        &mut self,
        start: u32,
        payload: &[u8],
        report: &mut WriteReport,
        progress: &mut P,
    ) -> Result<()> {
        let geometry = self.config.geometry;
        let timing = self.config.timing;

        // Step A: erase every sector the payload touches
        self.state.advance(WriteState::Erasing)?;
        let first_sector = start / geometry.sector_size;
        let span = (start % geometry.sector_size) as usize + payload.len();
        let sectors = geometry.sectors_for(span);
        log::debug!(
            "erasing {} sectors from 0x{:06X}",
            sectors,
            first_sector * geometry.sector_size
        );
        progress.erasing(sectors as usize);
        for i in 0..sectors {
            let addr = (first_sector + i) * geometry.sector_size;
            protocol::write_enable(&mut self.transport)?;
            protocol::sector_erase(&mut self.transport, addr)?;
            self.delay.delay_us(timing.sector_erase_us);
            report.sectors_erased += 1;
            progress.erase_progress(report.sectors_erased as usize);
        }

        // Step B: program pages in ascending order
        self.state.advance(WriteState::Programming)?;
        progress.writing(payload.len());
        let mut written = 0usize;
        for (i, chunk) in payload.chunks(geometry.page_size as usize).enumerate() {
            let addr = start + (i as u32) * geometry.page_size;
            protocol::write_enable(&mut self.transport)?;
            protocol::page_program(&mut self.transport, addr, chunk)?;
            self.delay.delay_us(timing.page_program_us);
            report.pages_programmed += 1;
            written += chunk.len();
            progress.write_progress(written);
        }

        // Step C: read back and compare
        self.state.advance(WriteState::Verifying)?;
        report.bytes_verified = self.verify_range(start, payload, progress)?;

        self.state.advance(WriteState::Done)
    }

    /// Read back `expected.len()` bytes at `start` and compare
    ///
    /// Returns the number of bytes compared. The first differing chunk is
    /// reported as [`Error::VerificationMismatch`].
    pub fn verify_range<P: WriteProgress>(
        &mut self,
        start: u32,
        expected: &[u8],
        progress: &mut P,
    ) -> Result<usize> {
        self.check_range(start, expected.len())?;
        let chunk_size = self.config.read_chunk.max(1);
        let mut buf = vec![0u8; chunk_size];
        let mut verified = 0usize;

        progress.reading(expected.len());
        for want in expected.chunks(chunk_size) {
            let addr = start + verified as u32;
            let got = &mut buf[..want.len()];
            protocol::read(&mut self.transport, addr, got)?;
            if got != want {
                let end = addr + want.len() as u32;
                log::error!("verification failed at 0x{:06X}-0x{:06X}", addr, end);
                return Err(Error::VerificationMismatch { start: addr, end });
            }
            verified += want.len();
            progress.read_progress(verified);
        }
        Ok(verified)
    }

    /// Read a whole region in chunks of the configured size
    pub fn read_region<P: WriteProgress>(
        &mut self,
        region: &Region,
        progress: &mut P,
    ) -> Result<Vec<u8>> {
        self.read_range(region.start, region.size() as usize, progress)
    }

    /// Read `len` bytes starting at `start`
    pub fn read_range<P: WriteProgress>(
        &mut self,
        start: u32,
        len: usize,
        progress: &mut P,
    ) -> Result<Vec<u8>> {
        self.check_range(start, len)?;
        let chunk_size = self.config.read_chunk.max(1);
        let mut data = vec![0u8; len];

        progress.reading(len);
        let mut done = 0usize;
        for chunk in data.chunks_mut(chunk_size) {
            protocol::read(&mut self.transport, start + done as u32, chunk)?;
            done += chunk.len();
            progress.read_progress(done);
        }
        Ok(data)
    }

    fn check_range(&self, start: u32, len: usize) -> Result<()> {
        let end = (start as u64) + len as u64;
        if end > self.config.geometry.chip_size as u64 {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::NoProgress;
    use crate::protocol::opcodes;
    use crate::transport::RecordingDelay;

    /// Minimal flash model: array, identity, no protection
    struct Model {
        id: [u8; 3],
        mem: Vec<u8>,
        log: Vec<Vec<u8>>,
        corrupt_at: Option<usize>,
        max_exchange: usize,
    }

    impl Model {
        fn new() -> Self {
            Self {
                id: [0xBF, 0x26, 0x42],
                mem: vec![0xFF; 0x40_0000],
                log: Vec::new(),
                corrupt_at: None,
                max_exchange: usize::MAX,
            }
        }

        fn opcodes(&self) -> Vec<u8> {
            self.log.iter().map(|tx| tx[1]).collect()
        }
    }

    impl Transport for Model {
        fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
            self.log.push(tx.to_vec());
            let mut rx = vec![0u8; tx.len()];
            let addr = || ((tx[2] as usize) << 16) | ((tx[3] as usize) << 8) | tx[4] as usize;
            match tx[1] {
                opcodes::RDID => rx[2..5].copy_from_slice(&self.id),
                opcodes::SE => {
                    let a = addr() & !0xFFF;
                    self.mem[a..a + 0x1000].fill(0xFF);
                }
                opcodes::PP => {
                    let a = addr();
                    for (i, b) in tx[5..].iter().enumerate() {
                        self.mem[a + i] &= *b;
                    }
                    if let Some(bad) = self.corrupt_at {
                        if (a..a + tx.len() - 5).contains(&bad) {
                            self.mem[bad] ^= 0x01;
                        }
                    }
                }
                opcodes::READ => {
                    let a = addr();
                    let n = tx.len() - 5;
                    rx[5..].copy_from_slice(&self.mem[a..a + n]);
                }
                opcodes::RBPR => rx[2..12].fill(0),
                _ => {}
            }
            Ok(rx)
        }

        fn max_exchange_len(&self) -> usize {
            self.max_exchange
        }
    }

    fn region(config: &FlashConfig, name: &str) -> Region {
        config.layout.region(name).unwrap().clone()
    }

    #[test]
    fn test_single_sector_write() {
        let config = FlashConfig::current();
        let primary = region(&config, "primary");
        let data: Vec<u8> = (0..4096u32).map(|i| i as u8).collect();

        let mut delay = RecordingDelay::default();
        let mut session = FlashSession::new(Model::new(), &mut delay, &config);
        let report = session
            .write_region(&primary, &data, &mut NoProgress)
            .unwrap();

        assert_eq!(report.sectors_erased, 1);
        assert_eq!(report.pages_programmed, 16);
        assert_eq!(report.bytes_verified, 4096);
        assert!(!report.truncated());
        assert_eq!(session.state(), WriteState::Done);

        let (model, _) = session.into_inner();
        assert_eq!(&model.mem[..4096], &data[..]);
        let ops = model.opcodes();
        // identity, then WREN+SE, then 16x WREN+PP, then 4 reads
        assert_eq!(ops[0], opcodes::RDID);
        assert_eq!(&ops[1..3], &[opcodes::WREN, opcodes::SE]);
        assert_eq!(ops.iter().filter(|&&o| o == opcodes::PP).count(), 16);
        assert_eq!(ops.iter().filter(|&&o| o == opcodes::READ).count(), 4);
        assert_eq!(delay.requests[0], 25_000);
        assert_eq!(delay.requests.len(), 17);
        assert_eq!(delay.total_us(), 25_000 + 16 * 1_500);
    }

    #[test]
    fn test_short_final_page() {
        let config = FlashConfig::current();
        let golden = region(&config, "golden");
        let data = vec![0x5A; 4096 + 10];

        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        let report = session.write_region(&golden, &data, &mut NoProgress).unwrap();
        assert_eq!(report.sectors_erased, 2);
        assert_eq!(report.pages_programmed, 17);

        let (model, _) = session.into_inner();
        let last = model.log.iter().rev().find(|tx| tx[1] == opcodes::PP).unwrap();
        // header + 10 bytes, no padding
        assert_eq!(last.len(), 5 + 10);
        assert_eq!(&last[2..5], &[0x0B, 0x10, 0x00]);
    }

    #[test]
    fn test_oversized_payload_is_truncated() {
        let config = FlashConfig::current();
        let jump = region(&config, "jump");
        let data = vec![0x00; 5000];

        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        let report = session.write_region(&jump, &data, &mut NoProgress).unwrap();
        assert!(report.truncated());
        assert_eq!(report.requested_len, 5000);
        assert_eq!(report.written_len, 4096);
        assert_eq!(report.sectors_erased, 1);
    }

    #[test]
    fn test_empty_payload_is_noop() {
        let config = FlashConfig::current();
        let primary = region(&config, "primary");
        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        let report = session.write_region(&primary, &[], &mut NoProgress).unwrap();
        assert_eq!(report.sectors_erased, 0);
        let (model, delay) = session.into_inner();
        assert!(model.log.is_empty());
        assert!(delay.requests.is_empty());
    }

    #[test]
    fn test_identity_mismatch_aborts_before_erase() {
        let config = FlashConfig::current();
        let primary = region(&config, "primary");
        let mut model = Model::new();
        model.id = [0xBF, 0x26, 0x41];

        let mut session = FlashSession::new(model, RecordingDelay::default(), &config);
        let err = session
            .write_region(&primary, &[1, 2, 3], &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::HardwareIdentityMismatch { .. }));
        let (model, _) = session.into_inner();
        assert_eq!(model.opcodes(), vec![opcodes::RDID]);
    }

    #[test]
    fn test_mismatch_is_fatal_for_session() {
        let config = FlashConfig::current().with_read_chunk(512);
        let primary = region(&config, "primary");
        let mut model = Model::new();
        model.corrupt_at = Some(700);

        let mut session = FlashSession::new(model, RecordingDelay::default(), &config);
        let err = session
            .write_region(&primary, &[0x00; 2048], &mut NoProgress)
            .unwrap_err();
        assert_eq!(err, Error::VerificationMismatch { start: 512, end: 1024 });
        assert_eq!(session.state(), WriteState::Failed);

        let err = session
            .write_region(&primary, &[0x00; 16], &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_oversized_read_chunk_rejected_before_erase() {
        let config = FlashConfig::current().with_read_chunk(8192);
        let primary = region(&config, "primary");
        let mut model = Model::new();
        model.max_exchange = 4096;

        let mut session = FlashSession::new(model, RecordingDelay::default(), &config);
        let err = session
            .write_region(&primary, &[0x00; 4096], &mut NoProgress)
            .unwrap_err();
        assert_eq!(
            err,
            Error::ExchangeTooLong {
                needed: 8197,
                max: 4096
            }
        );
        assert_eq!(session.state(), WriteState::Idle);
        let (model, delay) = session.into_inner();
        assert!(model.log.is_empty());
        assert!(delay.requests.is_empty());
    }

    #[test]
    fn test_chunk_that_fits_transport_is_accepted() {
        let config = FlashConfig::current().with_read_chunk(4091);
        let mut model = Model::new();
        model.max_exchange = 4096;

        let session = FlashSession::new(model, RecordingDelay::default(), &config);
        assert_eq!(session.check_exchange_limit(), Ok(()));
    }

    #[test]
    fn test_write_at_offset_erases_containing_sector() {
        let config = FlashConfig::current();
        let jump = region(&config, "jump");
        let page = [0xA5; 256];

        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        let report = session.write_at(&jump, 0xF00, &page, &mut NoProgress).unwrap();
        assert_eq!(report.start, 0x3F_FF00);
        assert_eq!(report.sectors_erased, 1);
        assert_eq!(report.pages_programmed, 1);

        let (model, _) = session.into_inner();
        let erase = model.log.iter().find(|tx| tx[1] == opcodes::SE).unwrap();
        assert_eq!(&erase[2..5], &[0x3F, 0xF0, 0x00]);
    }

    #[test]
    fn test_write_at_rejects_unaligned_offset() {
        let config = FlashConfig::current();
        let jump = region(&config, "jump");
        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        assert_eq!(
            session.write_at(&jump, 0x10, &[0], &mut NoProgress),
            Err(Error::InvalidAlignment)
        );
        assert_eq!(
            session.write_at(&jump, 0x1000, &[0], &mut NoProgress),
            Err(Error::AddressOutOfBounds)
        );
    }

    #[test]
    fn test_read_region_chunks() {
        let config = FlashConfig::current().with_read_chunk(1000);
        let jump = region(&config, "jump");
        let mut model = Model::new();
        model.mem[0x3F_F000] = 0x12;
        model.mem[0x3F_FFFF] = 0x34;

        let mut session = FlashSession::new(model, RecordingDelay::default(), &config);
        let data = session.read_region(&jump, &mut NoProgress).unwrap();
        assert_eq!(data.len(), 4096);
        assert_eq!(data[0], 0x12);
        assert_eq!(data[4095], 0x34);

        let (model, _) = session.into_inner();
        // 4 full chunks and one of 96 bytes
        assert_eq!(model.log.len(), 5);
        assert_eq!(model.log[4].len(), 5 + 96);
    }

    #[test]
    fn test_read_past_chip_end() {
        let config = FlashConfig::current();
        let mut session = FlashSession::new(Model::new(), RecordingDelay::default(), &config);
        assert_eq!(
            session.read_range(0x3F_FFFF, 2, &mut NoProgress),
            Err(Error::AddressOutOfBounds)
        );
    }
}
