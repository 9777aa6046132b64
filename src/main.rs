//! rdflash - RD board boot flash programmer
//!
//! Writes FPGA images into the SST26VF032B behind the RD board's flash
//! controller and maintains its block protection and multiboot jump page.
//!
//! # Architecture
//!
//! Every invocation is turned into an [`OperationPlan`] that is validated
//! against the selected layout before the transport is even opened. The
//! plan then runs on a [`FlashSession`], which enforces the identity check,
//! narrows protection only for the regions being written and verifies
//! everything it programs.

mod cli;
mod commands;
mod transports;

use clap::Parser;
use cli::{Cli, Commands};
use rdflash_core::config::FlashConfig;
use rdflash_core::flash::FlashSession;
use rdflash_core::plan::{DumpRequest, JumpTarget, OperationPlan, WriteRequest};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    build_logger(cli.verbose).init();

    let mut config = FlashConfig::from_layout_arg(&cli.layout)
        .map_err(|e| format!("Failed to load layout {}: {}", cli.layout, e))?;
    if let Some(chunk) = cli.chunk_size {
        config = config.with_read_chunk(chunk as usize);
    }
    log::debug!(
        "Layout {} with {} regions",
        config.layout.name.as_deref().unwrap_or("(unnamed)"),
        config.layout.len()
    );

    if let Commands::Layout { toml } = cli.command {
        commands::layout::run_layout(&config.layout, toml);
        return Ok(());
    }

    let plan = build_plan(&cli.command)?;
    plan.validate(&config.layout)?;

    let opened = transports::open_transport(&cli.transport)?;
    let mut session = FlashSession::new(opened.transport, opened.delay, &config);
    session.check_exchange_limit().map_err(|e| {
        format!(
            "--chunk-size {} does not fit the {} transport: {}",
            config.read_chunk, cli.transport, e
        )
    })?;

    match cli.command {
        Commands::Info { decode } => commands::info::run_info(&mut session, decode),
        Commands::Write { .. } | Commands::Jump { .. } => {
            commands::write::run_write(&mut session, &plan)
        }
        Commands::Read { .. } => commands::read::run_read(&mut session, &plan.dumps),
        Commands::Bpr { regions } => commands::bpr::run_bpr(&mut session, &regions),
        Commands::Layout { .. } => Ok(()),
    }
}

/// Logger honouring `RUST_LOG`, raised to debug by `-v` and trace by `-vv`
fn build_logger(verbose: u8) -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder
}

/// Collect what a command will do into a plan
fn build_plan(command: &Commands) -> Result<OperationPlan<PathBuf>, Box<dyn std::error::Error>> {
    let mut plan = OperationPlan::new();

    match command {
        Commands::Write {
            region,
            input,
            jump,
        } => {
            if region.len() != input.len() {
                return Err(format!(
                    "Every --region needs a matching --input ({} regions, {} inputs)",
                    region.len(),
                    input.len()
                )
                .into());
            }
            plan.writes = region
                .iter()
                .zip(input)
                .map(|(region, source)| WriteRequest {
                    region: region.clone(),
                    source: source.clone(),
                })
                .collect();
            plan.jump = jump.map(jump_target);
        }
        Commands::Jump { target } => {
            plan.jump = Some(jump_target(*target));
        }
        Commands::Read {
            region,
            output,
            timestamp,
            ..
        } => {
            plan.dumps.push(DumpRequest {
                region: region.clone(),
                output: output.clone(),
                timestamp: *timestamp,
            });
        }
        Commands::Info { .. } | Commands::Bpr { .. } | Commands::Layout { .. } => {}
    }

    Ok(plan)
}

fn jump_target(address: Option<u32>) -> JumpTarget {
    address.map_or(JumpTarget::Default, JumpTarget::Address)
}
