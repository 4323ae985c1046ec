//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = gtfs_delta_cli::run() {
        eprintln!("gtfs-delta: {err}");
        std::process::exit(1);
    }
}
