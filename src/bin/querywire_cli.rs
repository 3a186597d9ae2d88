use std::{
    error::Error,
    io::{self, Write},
    net::SocketAddr,
};

use clap::Parser;
use querywire::{
    Query, QueryType, SessionOptions, TransferConfig,
    cli::{Command, CommandError, prompt},
    protocol::QueryClient,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of a querywire server
    address: SocketAddr,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut client = QueryClient::connect(cli.address, TransferConfig::default())?;

    loop {
        let cmd = match prompt(io::stdin().lock(), io::stdout().lock()) {
            Ok(cmd) => cmd,
            Err(CommandError::Empty) => continue,
            Err(CommandError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        let reply = match cmd {
            Command::Exit => break,
            Command::Ping => client.ping(),
            Command::Format {
                format,
                compression,
            } => client.configure(&SessionOptions {
                format,
                compression,
                ..SessionOptions::default()
            }),
            Command::Statement(statement) => client.statement(&statement),
        };

        match reply {
            Ok(reply) => print_reply(&reply)?,
            Err(e) if e.is_disconnect() => {
                eprintln!("server went away: {e}");
                return Ok(());
            }
            Err(e) => eprintln!("query error: {e}"),
        }
    }

    client.close()?;
    Ok(())
}

fn print_reply(reply: &Query) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match reply.kind {
        QueryType::Result => match reply.result_set() {
            Ok(result) => writeln!(stdout, "{result:#?}"),
            Err(e) => writeln!(stdout, "malformed result: {e}"),
        },
        QueryType::Error => writeln!(
            stdout,
            "server error: {}",
            reply
                .payload
                .as_ref()
                .and_then(|p| p.as_str())
                .unwrap_or("(no message)")
        ),
        kind => writeln!(stdout, "{kind}"),
    }
}
