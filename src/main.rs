use std::process;

use cypherloop_cli::cli;

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
