//! Read command implementation

use super::progress::IndicatifProgress;
use rdflash_core::flash::FlashSession;
use rdflash_core::plan::DumpRequest;
use rdflash_core::transport::{Delay, Transport};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Dump every requested region (or the whole chip) to its file
pub fn run_read<T: Transport, D: Delay>(
    session: &mut FlashSession<'_, T, D>,
    dumps: &[DumpRequest<PathBuf>],
) -> Result<(), Box<dyn Error>> {
    let config = session.config();

    for dump in dumps {
        let (name, start, len) = match &dump.region {
            Some(name) => {
                let region = config.layout.region(name)?;
                (region.name.as_str(), region.start, region.size() as usize)
            }
            None => ("chip", 0, config.geometry.chip_size as usize),
        };

        println!("Reading {} (0x{:06X}, {} bytes)", name, start, len);
        let mut progress = IndicatifProgress::new();
        let data = session.read_range(start, len, &mut progress)?;
        progress.finish();

        write_dump(&dump.output, name, start, &data, dump.timestamp)?;
        println!("Wrote {} bytes to {:?}", data.len(), dump.output);
    }

    Ok(())
}

/// Header line put in front of timestamped dumps
fn timestamp_line(name: &str, start: u32) -> String {
    format!(
        "# rdflash dump of {} at 0x{:06X}, {}",
        name,
        start,
        chrono::Local::now().to_rfc3339()
    )
}

/// Write `data` to `path`, optionally behind a single timestamp line
pub fn write_dump(
    path: &Path,
    name: &str,
    start: u32,
    data: &[u8],
    timestamp: bool,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    if timestamp {
        writeln!(file, "{}", timestamp_line(name, start))?;
    }
    file.write_all(data)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdflash_core::config::FlashConfig;
    use rdflash_core::transport::NoDelay;
    use rdflash_dummy::{DummyConfig, DummyRd};

    fn dump(region: Option<&str>, output: PathBuf, timestamp: bool) -> DumpRequest<PathBuf> {
        DumpRequest {
            region: region.map(str::to_string),
            output,
            timestamp,
        }
    }

    fn preloaded() -> DummyRd {
        let image: Vec<u8> = (0..0x40_0000u32).map(|i| (i >> 12) as u8).collect();
        DummyRd::with_data(DummyConfig::default(), &image)
    }

    #[test]
    fn test_dump_region_raw() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("golden.bin");
        let config = FlashConfig::current();
        let mut session = FlashSession::new(preloaded(), NoDelay, &config);

        run_read(&mut session, &[dump(Some("golden"), out.clone(), false)]).unwrap();

        let data = std::fs::read(&out).unwrap();
        assert_eq!(data.len(), 0xB_0000);
        assert_eq!(data[0], 0xB0);
        assert_eq!(data[0xA_FFFF], 0x5F);
    }

    #[test]
    fn test_dump_with_timestamp_has_one_header_line() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("jump.bin");
        let config = FlashConfig::legacy();
        let mut session = FlashSession::new(preloaded(), NoDelay, &config);

        run_read(&mut session, &[dump(Some("jump"), out.clone(), true)]).unwrap();

        let data = std::fs::read(&out).unwrap();
        let newline = data.iter().position(|&b| b == b'\n').unwrap();
        let header = std::str::from_utf8(&data[..newline]).unwrap();
        assert!(header.starts_with("# rdflash dump of jump at 0x3FF000, "));
        assert_eq!(data.len() - newline - 1, 4096);
        assert!(data[newline + 1..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_dump_whole_chip() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("all.bin");
        let config = FlashConfig::current().with_read_chunk(4096);
        let mut session = FlashSession::new(preloaded(), NoDelay, &config);

        run_read(&mut session, &[dump(None, out.clone(), false)]).unwrap();

        let (rd, _) = session.into_inner();
        assert_eq!(std::fs::read(&out).unwrap(), rd.data());
    }
}
