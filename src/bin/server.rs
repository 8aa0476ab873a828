use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;

/// Line Reversal Control Protocol server.
#[derive(Parser)]
struct Args {
    /// Address and port to bind the UDP socket on.
    #[arg(long, default_value = "0.0.0.0:10000")]
    bind: SocketAddr,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = lrcp::serve(args.bind) {
        log::error!("lrcp server exited: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
