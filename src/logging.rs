// Logging initialisation.
//
// Writes structured logs to both stdout and `./logs/webdiary.log`.
//
// The level comes from `RUST_LOG` (default `info`, with noisy library
// crates held at `warn`).
//
// To enable debug output:  `RUST_LOG=debug`
// To enable sqlx queries:  `RUST_LOG=info,sqlx=debug`

use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn,tower=warn,h2=warn,reqwest=warn";

// Initialise the global tracing subscriber.
//
// The returned [`WorkerGuard`] must live as long as the program; dropping
// it early loses buffered file output.
pub fn init() -> non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never("./logs", "webdiary.log");
    let (file_writer, guard) = non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = fmt::layer().with_target(true).with_ansi(true);

    // plain text, no ANSI codes in the file
    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
