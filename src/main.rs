use std::{process::ExitCode, sync::Arc};

use tracing::info;

mod clap;
mod commands;
mod config;
mod database;
mod error;
mod observability;
mod service;
mod utils;

pub(crate) use config::Config;
pub(crate) use database::KeyValueDatabase;
pub(crate) use service::Services;

/// Returns the current version of the crate with extra info if supplied
///
/// Set the environment variable `DASHTHUMBS_VERSION_EXTRA` to any UTF-8 string
/// to include it in parenthesis after the SemVer version. A common value are
/// git commit hashes.
fn version() -> String {
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    match option_env!("DASHTHUMBS_VERSION_EXTRA") {
        Some(x) => format!("{cargo_pkg_version} ({x})"),
        None => cargo_pkg_version.to_owned(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let Err(e) = try_main().await else {
        return ExitCode::SUCCESS;
    };

    eprintln!(
        "Error: {}",
        error::DisplayWithSources {
            error: &e,
            infix: "\n    Caused by: "
        }
    );

    ExitCode::FAILURE
}

/// Fallible entrypoint
async fn try_main() -> Result<(), error::Main> {
    use error::Main as Error;

    let args = clap::parse();

    let config = config::load(args.config.as_ref()).await?;

    observability::init(&config)?;

    info!("Loading database");
    let db = Arc::new(
        KeyValueDatabase::load_or_create(&config.database)
            .map_err(Error::Database)?,
    );

    let services = Services::build(Arc::clone(&db), &config);
    if args.without_search {
        services.search.set_disabled(true);
    }

    commands::run(&services, args.command).await.map_err(Error::Command)?;

    db.flush().map_err(Error::Database)?;

    Ok(())
}
