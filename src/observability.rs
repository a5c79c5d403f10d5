//! Facilities for observing runtime behavior
#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::io;

use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, EnvFilter, Layer, Registry,
};

use crate::{
    config::{Config, LogConfig, LogFormat},
    error,
};

/// Initialize observability
///
/// Logs are written to stderr so that command output on stdout stays
/// machine-readable.
pub(crate) fn init(config: &Config) -> Result<(), error::Observability> {
    let logs = &config.observability.logs;

    let fmt_layer =
        fmt_layer::<Registry>(logs).with_filter(EnvFilter::from(&logs.filter));

    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Build the stderr formatting layer described by `config`
fn fmt_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.colors);

    if config.timestamp {
        match config.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    } else {
        let layer = layer.without_time();

        match config.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}
