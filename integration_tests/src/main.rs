//! Integration tests for the CDC event notifier firmware.
//!
//! Run after flashing the firmware. Drives the CDC-ACM port (control lines
//! and data) and checks the trace text on the debug port.

mod device;

use clap::Parser;
use colored::Colorize;

use device::{resolve_port, CdcClient, DebugMonitor, CDC_INTERFACE, DEBUG_INTERFACE};
use tests::{print_results, run_all_tests, run_silent_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the CDC event notifier firmware")]
struct Args {
    /// CDC-ACM port driven by the tests (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    cdc_port: String,

    /// Debug port carrying trace output (use "auto" to auto-detect)
    #[arg(short, long, default_value = "auto")]
    debug_port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Firmware was built without simulated-hardware; expect no trace output
    #[arg(long)]
    expect_silent: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Resolve ports (auto-detect if "auto")
    let cdc_port = resolve_port(&args.cdc_port, CDC_INTERFACE)?;
    let debug_port = resolve_port(&args.debug_port, DEBUG_INTERFACE)?;

    println!("{}", "CDC Event Notifier Integration Tests".bold());
    println!("CDC port:   {}", cdc_port);
    println!("Debug port: {}", debug_port);
    println!("Baud: {}", args.baud);
    println!();

    println!("Connecting to device...");
    let mut monitor = DebugMonitor::new(&debug_port, args.baud)?;
    let mut cdc = CdcClient::new(&cdc_port, args.baud)?;

    // Opening the CDC port asserts DTR, let that trace arrive then discard it
    std::thread::sleep(std::time::Duration::from_millis(500));
    monitor.drain()?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = if args.expect_silent {
        run_silent_tests(&mut cdc, &mut monitor)
    } else {
        run_all_tests(&mut cdc, &mut monitor)
    };
    print_results(&results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
