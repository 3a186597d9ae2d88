use std::{error::Error, net::SocketAddr, process};

use clap::Parser;
use log::info;
use querywire::{Compression, Format, TransferConfig, protocol::QueryServer};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connection at address
    address: SocketAddr,
    /// Initial format of every connection
    #[arg(long, default_value = "bson")]
    format: Format,
    /// Initial compression of every connection
    #[arg(long, default_value = "none")]
    compression: Compression,
    /// Refuse uncompressed JSON, the only combination sent as text
    #[arg(long)]
    binary_only: bool,
    /// Number of connection worker threads
    #[arg(long, default_value_t = 15)]
    workers: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = TransferConfig::new(cli.format, cli.compression).with_text_transfer(!cli.binary_only);
    let server = QueryServer::bind(cli.address, config)?.with_workers(cli.workers.max(1))?;

    ctrlc::set_handler(|| {
        info!("interrupted, shutting down");
        process::exit(0);
    })?;

    server.listen()?;
    Ok(())
}
