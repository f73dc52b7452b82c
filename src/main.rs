use anyhow::Result;
use checkers_arena::config::EngineConfig;
use checkers_arena::protocol::CommandHandler;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env();
    tracing::info!(
        tt_capacity = config.tt_capacity,
        quiescence_depth = config.quiescence_depth,
        turn_seconds = config.turn_time.as_secs(),
        opening_book = config.opening_book,
        "checkers arena ready"
    );

    CommandHandler::new(config).run()
}
