use std::io;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const STDOUT_DIRECTIVES: &str = "info,db=warn,sqlx=off";
const FILE_DIRECTIVES: &str = "info,cluster=debug,filter=debug,sqlx=info";

/// `RUST_LOG` replaces the built-in directives when set.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn configure_logging() {
    // Stdout log configuration
    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(env_filter(STDOUT_DIRECTIVES));

    // File log configuration
    let file_appender = rolling::daily("logs", "feedfold.log");
    let file_log = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_filter(env_filter(FILE_DIRECTIVES));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();
}
