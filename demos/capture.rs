//! Capture live traffic and print one line per packet.
//!
//! ```text
//! cargo build --example capture --features capture
//! sudo ./target/debug/examples/capture --interface lo --filter "tcp port 80" --count 5
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use wirelens::capture::{self, CaptureConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Capture packets and print a summary of each")]
struct Args {
    /// Interface to capture on, the default device if not given.
    #[arg(short, long)]
    interface: Option<String>,

    /// BPF filter, e.g. "tcp port 443" or "icmp".
    #[arg(short, long)]
    filter: Option<String>,

    /// Stop after this many packets.
    #[arg(short, long, default_value_t = 10)]
    count: usize,

    /// Stop after this many seconds.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Also save the packets to this pcap file.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let _ = wirelens::register_defaults();

    let config = CaptureConfig {
        interface: args.interface,
        filter: args.filter,
        count: args.count,
        timeout: args.timeout.map(Duration::from_secs),
        output: args.output,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match capture::capture(&config, &mut out) {
        Ok(stats) => {
            eprintln!(
                "{} packets, {} bytes, {} not dissected",
                stats.packets, stats.bytes, stats.undecoded
            );
            if let Some(path) = &config.output {
                eprintln!("saved to {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Capture failed: {}", e);
            std::process::exit(1);
        }
    }
}
