//! `tracing-subscriber` setup. Default level is WARN; `-v` raises it to INFO,
//! `-vv` (or higher) to DEBUG. All diagnostics go to standard error so they
//! never interleave with a command's data output on standard output.

use tracing::Level;

pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
