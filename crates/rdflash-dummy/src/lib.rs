//! rdflash-dummy - In-memory emulator of the RD board
//!
//! This crate provides a [`Transport`] that answers like the RD firmware
//! with an SST26VF032B behind it. It's useful for testing and dry runs
//! without real hardware.
//!
//! The emulated flash behaves like the real part where it matters for the
//! engine: erase and program are ignored without a preceding write enable or
//! when the target block is write-locked, programming can only clear bits,
//! and a page program wraps around at the page boundary. Like the real chip
//! it never reports an error; ignored commands only show up on read-back.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use rdflash_core::bpr::{BlockMap, ProtectionBitmap};
use rdflash_core::error::Result;
use rdflash_core::protocol::opcodes;
use rdflash_core::transport::Transport;

/// Configuration for the emulated board
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Identity code returned by RDID
    pub id: [u8; 3],
    /// Version returned by the firmware version subsystem
    pub firmware_version: u8,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for erase
    pub sector_size: usize,
    /// Protection register after power-on
    pub power_on_bpr: ProtectionBitmap,
}

impl Default for DummyConfig {
    fn default() -> Self {
        let map = BlockMap::sst26vf032b();
        Self {
            id: [0xBF, 0x26, 0x42],
            firmware_version: 3,
            size: 4 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            // Power-on default of the SST26: everything write-locked
            power_on_bpr: map.baseline(),
        }
    }
}

/// Faults the emulator can inject
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Answer short from this exchange on (counted from zero)
    pub short_response_from: Option<usize>,
    /// Address whose lowest bit refuses to be programmed
    pub stuck_bit_at: Option<u32>,
}

/// Emulated RD board
pub struct DummyRd {
    config: DummyConfig,
    block_map: BlockMap,
    data: Vec<u8>,
    bpr: ProtectionBitmap,
    write_enabled: bool,
    faults: Faults,
    exchanges: Vec<Vec<u8>>,
    bpr_writes: Vec<ProtectionBitmap>,
    ignored: usize,
}

impl DummyRd {
    /// Create a new emulator with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        let bpr = config.power_on_bpr;
        Self {
            config,
            block_map: BlockMap::sst26vf032b(),
            data,
            bpr,
            write_enabled: false,
            faults: Faults::default(),
            exchanges: Vec::new(),
            bpr_writes: Vec::new(),
            ignored: 0,
        }
    }

    /// Create a new emulator with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create an emulator with pre-filled flash contents
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut rd = Self::new(config);
        let len = core::cmp::min(initial_data.len(), rd.data.len());
        rd.data[..len].copy_from_slice(&initial_data[..len]);
        rd
    }

    /// Replace the injected faults
    pub fn set_faults(&mut self, faults: Faults) {
        self.faults = faults;
    }

    /// Force the protection register, as a power cycle would
    pub fn set_bpr(&mut self, bpr: ProtectionBitmap) {
        self.bpr = bpr;
    }

    /// Current protection register
    pub fn bpr(&self) -> ProtectionBitmap {
        self.bpr
    }

    /// Every bitmap accepted by a BPR write, in order
    pub fn bpr_writes(&self) -> &[ProtectionBitmap] {
        &self.bpr_writes
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every TX buffer seen so far
    pub fn exchanges(&self) -> &[Vec<u8>] {
        &self.exchanges
    }

    /// Flash opcodes seen so far, in order
    pub fn flash_opcodes(&self) -> Vec<u8> {
        self.exchanges
            .iter()
            .filter(|tx| tx.len() >= 2 && tx[0] == opcodes::SUBSYSTEM_FLASH)
            .map(|tx| tx[1])
            .collect()
    }

    /// Number of erase or program commands the chip ignored
    pub fn ignored_commands(&self) -> usize {
        self.ignored
    }

    /// Forget the exchange log
    pub fn clear_log(&mut self) {
        self.exchanges.clear();
    }

    fn address(tx: &[u8]) -> Option<usize> {
        if tx.len() < 5 {
            return None;
        }
        Some(((tx[2] as usize) << 16) | ((tx[3] as usize) << 8) | tx[4] as usize)
    }

    fn is_write_locked(&self, start: usize, len: usize) -> bool {
        self.block_map
            .blocks_in(start as u32, (start + len) as u32)
            .any(|b| self.bpr.bit(b.write_lock))
    }

    /// Consume the write enable latch, returning whether it was set
    fn take_write_enable(&mut self) -> bool {
        core::mem::replace(&mut self.write_enabled, false)
    }

    fn ignore(&mut self, what: &str, addr: usize) {
        log::warn!("dummy: {} at 0x{:06X} ignored", what, addr);
        self.ignored += 1;
    }

    fn handle_sector_erase(&mut self, tx: &[u8]) {
        let Some(addr) = Self::address(tx) else {
            return;
        };
        let sector = self.config.sector_size;
        let aligned = (addr % self.data.len()) & !(sector - 1);

        if !self.take_write_enable() {
            self.ignore("sector erase without WREN", aligned);
            return;
        }
        if self.is_write_locked(aligned, sector) {
            self.ignore("sector erase of locked block", aligned);
            return;
        }
        self.data[aligned..aligned + sector].fill(0xFF);
    }

    fn handle_page_program(&mut self, tx: &[u8]) {
        let Some(addr) = Self::address(tx) else {
            return;
        };
        let addr = addr % self.data.len();
        let page = self.config.page_size;
        let page_base = addr & !(page - 1);

        if !self.take_write_enable() {
            self.ignore("page program without WREN", addr);
            return;
        }
        if self.is_write_locked(page_base, page) {
            self.ignore("page program of locked block", addr);
            return;
        }

        // Data past the end of the page wraps to its start
        for (i, &byte) in tx[5..].iter().enumerate() {
            let target = page_base + (addr - page_base + i) % page;
            let mut value = byte;
            if self.faults.stuck_bit_at == Some(target as u32) {
                value |= 0x01;
            }
            self.data[target] &= value;
        }
    }

    fn handle_read(&self, tx: &[u8], rx: &mut [u8]) {
        let Some(addr) = Self::address(tx) else {
            return;
        };
        for (i, out) in rx[5..].iter_mut().enumerate() {
            *out = self.data[(addr + i) % self.data.len()];
        }
    }

    fn handle_write_bpr(&mut self, tx: &[u8]) {
        if !self.take_write_enable() {
            self.ignore("BPR write without WREN", 0);
            return;
        }
        match ProtectionBitmap::from_slice(tx.get(2..2 + opcodes::BPR_LEN).unwrap_or(&[])) {
            Some(bpr) => {
                self.bpr = bpr;
                self.bpr_writes.push(bpr);
            }
            None => self.ignore("short BPR write", 0),
        }
    }

    fn handle_flash(&mut self, tx: &[u8], rx: &mut [u8]) {
        match tx[1] {
            opcodes::RDID => {
                if rx.len() >= 5 {
                    rx[2..5].copy_from_slice(&self.config.id);
                }
            }
            opcodes::WREN => self.write_enabled = true,
            opcodes::SE => self.handle_sector_erase(tx),
            opcodes::PP => self.handle_page_program(tx),
            opcodes::READ => self.handle_read(tx, rx),
            opcodes::RBPR => {
                let n = core::cmp::min(rx.len().saturating_sub(2), opcodes::BPR_LEN);
                rx[2..2 + n].copy_from_slice(&self.bpr.as_bytes()[..n]);
            }
            opcodes::WBPR => self.handle_write_bpr(tx),
            other => log::warn!("dummy: unsupported flash opcode 0x{:02X}", other),
        }
    }
}

impl Transport for DummyRd {
    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let index = self.exchanges.len();
        self.exchanges.push(tx.to_vec());
        let mut rx = vec![0u8; tx.len()];

        if tx.len() >= 2 {
            match tx[0] {
                opcodes::SUBSYSTEM_FLASH => self.handle_flash(tx, &mut rx),
                opcodes::SUBSYSTEM_VERSION => rx[1] = self.config.firmware_version,
                other => log::warn!("dummy: unknown subsystem 0x{:02X}", other),
            }
        }

        if self
            .faults
            .short_response_from
            .is_some_and(|from| index >= from)
        {
            rx.truncate(tx.len().saturating_sub(1));
        }
        Ok(rx)
    }

    fn name(&self) -> &'static str {
        "dummy"
    }
}

/// Parse emulator options from a list of key-value pairs
///
/// Recognised keys: `id` (six hex digits), `fw` (firmware version),
/// `bpr` (ten hex bytes, power-on protection).
pub fn parse_options(options: &[(&str, &str)]) -> core::result::Result<DummyConfig, alloc::string::String> {
    use alloc::format;

    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "id" => {
                let raw = u32::from_str_radix(value.trim_start_matches("0x"), 16)
                    .ok()
                    .filter(|v| *v <= 0xFF_FFFF)
                    .ok_or_else(|| format!("Invalid id value: {}", value))?;
                config.id = [(raw >> 16) as u8, (raw >> 8) as u8, raw as u8];
            }
            "fw" => {
                config.firmware_version = value
                    .parse()
                    .map_err(|_| format!("Invalid fw value: {}", value))?;
            }
            "bpr" => {
                config.power_on_bpr = ProtectionBitmap::parse_hex(value)
                    .ok_or_else(|| format!("Invalid bpr value: {}", value))?;
            }
            // handled by the caller
            "image" => {}
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod scenarios;
