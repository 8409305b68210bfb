use std::path::PathBuf;
use std::process;

use clap::Parser;
use dakv_logger::prelude::*;
use dakv_logger::set_logger_level;

use mysqlite::Listener;

#[derive(Parser, Debug)]
#[command(name = "mysqlite")]
#[command(version)]
#[command(about = "MySQL 4.1 wire-protocol gateway for read-only SQLite files")]
#[command(long_about = None)]
struct Args {
    /// Filename of the SQLite database
    #[arg(long, value_name = "FILE")]
    filename: PathBuf,

    /// IP address to bind to
    #[arg(long, default_value = "localhost")]
    address: String,

    /// Port number to use for connections
    #[arg(long, default_value_t = 3306)]
    port: u16,

    /// Print packets payload
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    let _logger = set_logger_level(args.debug, None);

    if !args.filename.is_file() {
        eprintln!("mysqlite: {}: file not found", args.filename.display());
        process::exit(1);
    }

    ctrlc::set_handler(|| {
        // interrupt is the normal way to stop the gateway
        process::exit(0);
    })
    .expect("failed to install interrupt handler");

    let mut listener = match Listener::bind((args.address.as_str(), args.port), args.filename) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("mysqlite: {}", err);
            process::exit(1);
        }
    };

    info!("MySQLite {}", env!("CARGO_PKG_VERSION"));
    listener.accept();
}
