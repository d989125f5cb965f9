//! shiftledger main entrypoint.

use shiftledger::run;
use shiftledger::ui::messages::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run() {
        log::debug!("command failed with {}", e.kind());
        error(format!("Error: {}", e));
        std::process::exit(1);
    }
}
