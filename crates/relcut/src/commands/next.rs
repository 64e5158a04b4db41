//! Next command: preview the version a release would produce.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relcut_core::config::Config;
use relcut_core::manifest::{JsonManifest, VersionStore};
use relcut_core::release::ReleaseSettings;
use relcut_core::version::{self, ReleaseType};

/// Arguments for the `next` subcommand.
#[derive(Args, Debug)]
pub struct NextArgs {
    /// Release type: major, minor, or patch
    #[arg(default_value = "minor")]
    pub release_type: String,

    /// Version record to read (overrides config)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Tag prefix (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub tag_prefix: Option<String>,
}

#[derive(Serialize)]
struct NextVersion {
    release_type: ReleaseType,
    current: String,
    next: String,
    tag: String,
}

/// Print the next version without touching the repository.
#[instrument(name = "cmd_next", skip_all)]
pub fn cmd_next(
    args: NextArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let release_type: ReleaseType = args.release_type.parse()?;
    let path = super::manifest_path(cwd, config, args.manifest.as_deref());
    debug!(%path, %release_type, "executing next command");

    let store = JsonManifest::new(path.clone());
    let current = store.read_version()?;
    let next = version::next_version(&current, release_type)
        .with_context(|| format!("cannot compute next version from {path}"))?;

    let mut settings = ReleaseSettings::from_config(config);
    if let Some(prefix) = args.tag_prefix {
        settings.tag_prefix = prefix;
    }

    let result = NextVersion {
        release_type,
        current,
        tag: settings.tag_for(&next),
        next: next.to_string(),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} → {} {}",
            result.current.dimmed(),
            result.next.green().bold(),
            format!("({}, tag {})", result.release_type, result.tag).dimmed()
        );
    }
    Ok(())
}
