//! Release command: thin CLI layer over `relcut_core::release`.

use std::io::IsTerminal;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relcut_core::config::Config;
use relcut_core::git::SystemGit;
use relcut_core::manifest::JsonManifest;
use relcut_core::publish::{Credential, GitHubPublisher, NoopPublisher, ReleasePublisher};
use relcut_core::release::{ReleaseEvent, ReleaseSettings, Releaser};
use relcut_core::version::ReleaseType;

/// Arguments for the `release` subcommand.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Release type: major, minor, or patch
    #[arg(default_value = "minor")]
    pub release_type: String,

    /// Show what would happen without touching the repository
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Create a remote release record (overrides config)
    #[arg(long, conflicts_with = "no_publish")]
    pub publish: bool,

    /// Do not create a remote release record (overrides config)
    #[arg(long, conflicts_with = "publish")]
    pub no_publish: bool,

    /// Credential for the release API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Publish as a draft (overrides config)
    #[arg(long, conflicts_with = "no_draft")]
    pub draft: bool,

    /// Publish as a final release even if config says draft
    #[arg(long, conflicts_with = "draft")]
    pub no_draft: bool,

    /// Publish as a prerelease (overrides config)
    #[arg(long, conflicts_with = "no_prerelease")]
    pub prerelease: bool,

    /// Publish as a full release even if config says prerelease
    #[arg(long, conflicts_with = "prerelease")]
    pub no_prerelease: bool,

    /// Version record to update (overrides config)
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Remote to push to (overrides config)
    #[arg(long, value_name = "NAME")]
    pub remote: Option<String>,

    /// Tag prefix (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub tag_prefix: Option<String>,
}

impl ReleaseArgs {
    /// Whether publishing is on once flags are applied over config.
    fn publish_enabled(&self, config: &Config) -> bool {
        if self.publish {
            true
        } else if self.no_publish {
            false
        } else {
            config.publish_enabled()
        }
    }

    /// Release settings from config with command-line overrides applied.
    fn settings(&self, config: &Config) -> ReleaseSettings {
        let mut settings = ReleaseSettings::from_config(config);
        if let Some(ref remote) = self.remote {
            settings.remote.clone_from(remote);
        }
        if let Some(ref prefix) = self.tag_prefix {
            settings.tag_prefix.clone_from(prefix);
        }
        if let Some(draft) = flag_pair(self.draft, self.no_draft) {
            settings.draft = draft;
        }
        if let Some(prerelease) = flag_pair(self.prerelease, self.no_prerelease) {
            settings.prerelease = prerelease;
        }
        settings
    }
}

/// Resolve a `--flag`/`--no-flag` pair; `None` leaves the config value.
const fn flag_pair(on: bool, off: bool) -> Option<bool> {
    if on {
        Some(true)
    } else if off {
        Some(false)
    } else {
        None
    }
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        release_type = %args.release_type,
        "executing release command"
    );

    let mut settings = args.settings(config);
    let mut store = JsonManifest::new(super::manifest_path(cwd, config, args.manifest.as_deref()));
    let git = SystemGit::discover(cwd).context("release must run inside a git repository")?;

    let publisher: Box<dyn ReleasePublisher> = if args.publish_enabled(config) {
        let remote_url = git.remote_url(&settings.remote)?;
        let (owner, repo) = config.publish_target(remote_url.as_deref())?;
        settings.owner.clone_from(&owner);
        settings.repo.clone_from(&repo);

        if args.dry_run {
            Box::new(NoopPublisher)
        } else {
            let Some(token) = args.token.as_deref() else {
                bail!("publishing is enabled but no token was given; pass --token or set GITHUB_TOKEN");
            };
            let credential = Credential::new(token)?;
            Box::new(
                GitHubPublisher::with_options(
                    credential,
                    owner,
                    repo,
                    config.api_base(),
                    config.publish_timeout(),
                )
                .context("failed to build release API client")?,
            )
        }
    } else {
        Box::new(NoopPublisher)
    };

    let mut releaser = Releaser::new(&mut store, &git, publisher.as_ref(), settings);

    let release_type: ReleaseType = args
        .release_type
        .parse()
        .context("cannot start release")?;
    let plan = releaser.plan(release_type)?;

    if !global_json {
        if args.dry_run {
            println!("\n{}", "DRY RUN: no changes will be made".yellow().bold());
        }
        println!(
            "\n{}: {} → {} {}",
            "Release".bold(),
            plan.previous.to_string().dimmed(),
            plan.next.to_string().green().bold(),
            format!("({release_type})").dimmed(),
        );
        println!(
            "{}: {} | {}: {} | {}: {}",
            "Tag".dimmed(),
            plan.tag,
            "Remote".dimmed(),
            releaser.settings().remote,
            "Publisher".dimmed(),
            publisher.name(),
        );
        println!();
    }

    if args.dry_run {
        if global_json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        return Ok(());
    }

    if !args.yes && !global_json && std::io::stdin().is_terminal() {
        let confirmed = Confirm::new(&format!("Tag and push {}?", plan.tag))
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let outcome = releaser
        .release(release_type, |event| {
            if !global_json {
                handle_event(event);
            }
        })
        .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        println!(
            "{} Released {} ({} → {})",
            "✓".green().bold(),
            outcome.tag.green().bold(),
            outcome.previous_version,
            outcome.version,
        );
        if let Some(url) = outcome.published.as_ref().and_then(|r| r.url.as_deref()) {
            println!("  {}: {}", "Release".dimmed(), url.cyan());
        }
    }

    Ok(())
}

/// Render a stage event on the terminal.
fn handle_event(event: ReleaseEvent) {
    match event {
        ReleaseEvent::StageStarted(stage) => {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                spinner.set_style(
                    style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                );
            }
            spinner.set_message(format!("{stage}..."));
            // Stages are synchronous; the spinner only marks the transition
            spinner.finish_and_clear();
        }
        ReleaseEvent::StageCompleted(stage, message) => {
            println!(
                "  {} {} {}",
                "✓".green(),
                format!("{stage:<8}").bold(),
                message.dimmed(),
            );
        }
    }
}
