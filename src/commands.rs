//! Runs the subcommands of the `dashthumbs` binary

use std::{env, path::PathBuf};

use serde::Serialize;
use tracing::info;

use crate::{
    clap::{Command, ThumbnailTarget},
    error,
    service::{
        search::{GetDashboardTagsQuery, SearchDashboardsQuery},
        thumbnails::{ThumbnailMeta, MANUAL_UPLOAD_DASHBOARD_VERSION},
        Services,
    },
};

type Result<T = (), E = error::Command> = std::result::Result<T, E>;

impl From<ThumbnailTarget> for ThumbnailMeta {
    fn from(target: ThumbnailTarget) -> Self {
        ThumbnailMeta::new(target.dashboard, target.theme, target.kind)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Relative file arguments are taken relative to the working directory
fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }

    let cwd = env::current_dir()
        .map_err(|e| error::Command::ResolvePath(e, path.clone()))?;
    Ok(cwd.join(path))
}

/// Dashboard version to record for an upload
///
/// The command line requires exactly one of `--version` and `--manual`.
fn upload_version(version: Option<i64>, manual: bool) -> i64 {
    match version {
        Some(version) if !manual => version,
        _ => MANUAL_UPLOAD_DASHBOARD_VERSION,
    }
}

#[tracing::instrument(skip(services))]
pub(crate) async fn run(services: &Services, command: Command) -> Result {
    match command {
        Command::Upload {
            target,
            version,
            manual,
            datasources,
            file,
        } => {
            let file = absolute(file)?;
            let id = services
                .thumbnails
                .save_from_file(
                    &file,
                    target.into(),
                    upload_version(version, manual),
                    datasources,
                )
                .await?;

            info!(id, "Thumbnail stored");
            print_json(&id)
        }
        Command::Get {
            target,
            output,
        } => {
            let thumbnail = services.thumbnails.get_thumbnail(target.into())?;

            if let Some(output) = output {
                tokio::fs::write(&output, &thumbnail.image).await.map_err(
                    |e| error::Command::WriteImage(e, output.clone()),
                )?;
                info!(path = %output.display(), "Image written");
            }

            print_json(&thumbnail)
        }
        Command::SetState {
            target,
            state,
        } => {
            services.thumbnails.update_thumbnail_state(state, target.into())?;
            Ok(())
        }
        Command::Stale {
            theme,
            kind,
        } => print_json(
            &services
                .thumbnails
                .find_dashboards_with_stale_thumbnails(theme, kind)?,
        ),
        Command::Exists => {
            print_json(&services.thumbnails.do_thumbnails_exist()?)
        }
        Command::Dashboard {
            uid,
            title,
            version,
            tags,
            folder,
        } => print_json(
            &services.dashboards.upsert(uid, title, version, tags, folder)?,
        ),
        Command::Star {
            user,
            dashboard,
        } => Ok(services.dashboards.star(&user, &dashboard)?),
        Command::Unstar {
            user,
            dashboard,
        } => Ok(services.dashboards.unstar(&user, &dashboard)?),
        Command::Search {
            title,
            tag,
            user,
            starred,
            limit,
        } => print_json(&services.search.search_dashboards(
            &SearchDashboardsQuery {
                title,
                tag,
                user_id: user,
                limit,
                is_starred: starred,
                tags_only: false,
            },
        )?),
        Command::Tags {
            limit,
        } => print_json(
            &services.search.dashboard_tags(&GetDashboardTagsQuery {
                limit,
            })?,
        ),
    }
}
