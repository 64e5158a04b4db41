//! Release sequencer.
//!
//! Runs a release in five strictly ordered stages:
//!
//! 1. **Load**: read the stored version.
//! 2. **Compute**: apply the release type.
//! 3. **Tag**: require a clean tree, tag, push the tag, then publish the
//!    remote release record if a publisher is held.
//! 4. **Persist**: write the new version back to the store.
//! 5. **Commit**: stage, commit, and push the updated record.
//!
//! A failing stage stops the sequence. Nothing is rolled back: a tag pushed
//! in stage 3 stays even if stage 5 fails, leaving the tag one release ahead
//! of the committed record until someone pushes the commit by hand.

use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::git::{GitError, Identity, Vcs};
use crate::manifest::{ManifestError, VersionStore};
use crate::publish::{PublishError, PublishedRelease, ReleasePublisher, ReleaseRecord};
use crate::version::{self, ReleaseType, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Stages of a release, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Read the stored version.
    Load,
    /// Compute the next version.
    Compute,
    /// Tag, push the tag, and publish.
    Tag,
    /// Write the new version to the store.
    Persist,
    /// Commit and push the updated record.
    Commit,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::Load,
        Self::Compute,
        Self::Tag,
        Self::Persist,
        Self::Commit,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Compute => write!(f, "compute"),
            Self::Tag => write!(f, "tag"),
            Self::Persist => write!(f, "persist"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// What went wrong during a release.
#[derive(Error, Debug)]
pub enum ReleaseErrorKind {
    /// Release type was not `major`, `minor`, or `patch`.
    #[error("{0}")]
    InvalidReleaseType(VersionError),

    /// Stored version is not `<int>.<int>.<int>`.
    #[error("{0}")]
    InvalidVersionFormat(VersionError),

    /// The version record is missing or unparsable.
    #[error("version record unreadable: {0}")]
    VersionStoreUnreadable(ManifestError),

    /// Tracked files have uncommitted changes.
    #[error("working tree has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree,

    /// Creating or pushing the tag failed.
    #[error("tag or push failed: {0}")]
    TagOrPushFailed(GitError),

    /// The remote release record could not be created. The tag is already pushed.
    #[error("remote release publication failed (tag already pushed): {0}")]
    RemotePublishFailed(PublishError),

    /// Writing the new version failed.
    #[error("version record write failed: {0}")]
    VersionStoreWriteFailed(ManifestError),

    /// Staging, committing, or pushing the record failed. The tag is already pushed.
    #[error("commit or push failed (tag already pushed): {0}")]
    CommitPushFailed(GitError),
}

/// A release failure, tagged with the stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {kind}")]
pub struct ReleaseError {
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying cause.
    pub kind: ReleaseErrorKind,
}

impl ReleaseError {
    const fn new(stage: Stage, kind: ReleaseErrorKind) -> Self {
        Self { stage, kind }
    }

    /// `true` for precondition failures the user can fix and retry
    /// (currently only a dirty working tree).
    pub const fn is_retryable_by_user(&self) -> bool {
        matches!(self.kind, ReleaseErrorKind::DirtyWorkingTree)
    }
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Settings
// ──────────────────────────────────────────────

/// Default tag annotation.
pub const DEFAULT_TAG_MESSAGE: &str = "ci: Release version {version}";
/// Default commit message for the version record.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Bump version to {version}";
/// Default release title.
pub const DEFAULT_RELEASE_TITLE: &str = "{tag}";
/// Default release body.
pub const DEFAULT_RELEASE_BODY: &str = "Release {version}";

/// Everything the sequencer needs besides its collaborators.
///
/// Message fields are templates; see [`interpolate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSettings {
    /// Remote to push the tag and commit to.
    pub remote: String,
    /// Prepended to the version to form the tag name.
    pub tag_prefix: String,
    /// Annotation for the tag.
    pub tag_message: String,
    /// Message for the version-record commit.
    pub commit_message: String,
    /// Identity to configure before tagging; `None` keeps the repository's own.
    pub identity: Option<Identity>,
    /// Remote release title.
    pub release_title: String,
    /// Remote release body.
    pub release_body: String,
    /// Publish the release as a draft.
    pub draft: bool,
    /// Publish the release as a prerelease.
    pub prerelease: bool,
    /// Repository owner, for `{owner}` in templates.
    pub owner: String,
    /// Repository name, for `{repo}` in templates.
    pub repo: String,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            tag_prefix: "v".into(),
            tag_message: DEFAULT_TAG_MESSAGE.into(),
            commit_message: DEFAULT_COMMIT_MESSAGE.into(),
            identity: None,
            release_title: DEFAULT_RELEASE_TITLE.into(),
            release_body: DEFAULT_RELEASE_BODY.into(),
            draft: false,
            prerelease: false,
            owner: String::new(),
            repo: String::new(),
        }
    }
}

impl ReleaseSettings {
    /// Build settings from loaded configuration, falling back to defaults.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let release = config.release.clone().unwrap_or_default();
        let publish = config.publish.clone().unwrap_or_default();

        Self {
            remote: release.remote.unwrap_or(defaults.remote),
            tag_prefix: release.tag_prefix.unwrap_or(defaults.tag_prefix),
            tag_message: release.tag_message.unwrap_or(defaults.tag_message),
            commit_message: release.commit_message.unwrap_or(defaults.commit_message),
            identity: config.identity.clone(),
            release_title: publish.title.unwrap_or(defaults.release_title),
            release_body: publish.body.unwrap_or(defaults.release_body),
            draft: publish.draft.unwrap_or(defaults.draft),
            prerelease: publish.prerelease.unwrap_or(defaults.prerelease),
            owner: publish.owner.unwrap_or_default(),
            repo: publish.repo.unwrap_or_default(),
        }
    }

    /// Tag name for a version.
    pub fn tag_for(&self, version: &Version) -> String {
        format!("{}{version}", self.tag_prefix)
    }
}

/// Values available to message templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    /// The new version, e.g. `1.3.0`.
    pub version: String,
    /// The version being replaced.
    pub prev_version: String,
    /// The tag name, e.g. `v1.3.0`.
    pub tag: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "version" => Some(&self.version),
            "prev_version" => Some(&self.prev_version),
            "tag" => Some(&self.tag),
            "owner" => Some(&self.owner),
            "repo" => Some(&self.repo),
            _ => None,
        }
    }
}

/// Replace `{var}` placeholders with values from `vars`.
///
/// Unknown placeholders are left as-is. Substituted values are never
/// scanned again, so a value containing `{repo}` stays literal.
pub fn interpolate(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        match vars.lookup(&after[..close]) {
            Some(value) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

// ──────────────────────────────────────────────
// Plan, events, outcome
// ──────────────────────────────────────────────

/// The result of running Load and Compute without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// Requested release type.
    pub release_type: ReleaseType,
    /// Version string exactly as stored.
    pub stored: String,
    /// Parsed stored version.
    pub previous: Version,
    /// Version the release will produce.
    pub next: Version,
    /// Tag the release will create.
    pub tag: String,
}

/// Progress notifications emitted while a release runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseEvent {
    /// A stage has started.
    StageStarted(Stage),
    /// A stage finished; the message describes what it did.
    StageCompleted(Stage, String),
}

/// A completed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// Requested release type.
    pub release_type: ReleaseType,
    /// The version that was replaced.
    pub previous_version: Version,
    /// The version that was released.
    pub version: Version,
    /// The tag that was created and pushed.
    pub tag: String,
    /// The remote release record, when a publisher created one.
    pub published: Option<PublishedRelease>,
    /// Short hash of the version-record commit.
    pub commit: String,
}

// ──────────────────────────────────────────────
// Sequencer
// ──────────────────────────────────────────────

/// Runs releases against a store, a repository, and a publisher.
///
/// The collaborators are borrowed so callers can inspect them afterwards.
pub struct Releaser<'a> {
    store: &'a mut dyn VersionStore,
    vcs: &'a dyn Vcs,
    publisher: &'a dyn ReleasePublisher,
    settings: ReleaseSettings,
}

impl<'a> Releaser<'a> {
    /// Assemble a sequencer from its collaborators.
    pub fn new(
        store: &'a mut dyn VersionStore,
        vcs: &'a dyn Vcs,
        publisher: &'a dyn ReleasePublisher,
        settings: ReleaseSettings,
    ) -> Self {
        Self {
            store,
            vcs,
            publisher,
            settings,
        }
    }

    /// Settings in effect.
    pub const fn settings(&self) -> &ReleaseSettings {
        &self.settings
    }

    /// Run Load and Compute only.
    #[instrument(skip(self))]
    pub fn plan(&self, release_type: ReleaseType) -> ReleaseResult<ReleasePlan> {
        let stored = self.load()?;
        self.compute(stored, release_type)
    }

    fn compute(&self, stored: String, release_type: ReleaseType) -> ReleaseResult<ReleasePlan> {
        let previous = version::parse_version(&stored).map_err(|e| {
            ReleaseError::new(Stage::Compute, ReleaseErrorKind::InvalidVersionFormat(e))
        })?;
        let next = version::increment(&previous, release_type).map_err(|e| {
            ReleaseError::new(Stage::Compute, ReleaseErrorKind::InvalidVersionFormat(e))
        })?;
        let tag = self.settings.tag_for(&next);

        debug!(%stored, %previous, %next, %tag, "planned release");
        Ok(ReleasePlan {
            release_type,
            stored,
            previous,
            next,
            tag,
        })
    }

    /// Validate a literal release type, then run the release.
    ///
    /// An unknown type fails before the store or repository are touched.
    pub fn release_named(
        &mut self,
        release_type: &str,
        on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        let release_type: ReleaseType = release_type.parse().map_err(|e| {
            ReleaseError::new(Stage::Compute, ReleaseErrorKind::InvalidReleaseType(e))
        })?;
        self.release(release_type, on_event)
    }

    /// Run all five stages.
    ///
    /// `on_event` is called at stage boundaries so the CLI can show progress.
    #[instrument(skip(self, on_event), fields(publisher = self.publisher.name()))]
    pub fn release(
        &mut self,
        release_type: ReleaseType,
        mut on_event: impl FnMut(ReleaseEvent),
    ) -> ReleaseResult<ReleaseOutcome> {
        // ── Load + Compute ──
        on_event(ReleaseEvent::StageStarted(Stage::Load));
        let stored = self.load()?;
        on_event(ReleaseEvent::StageCompleted(
            Stage::Load,
            format!("stored version {stored}"),
        ));

        on_event(ReleaseEvent::StageStarted(Stage::Compute));
        let plan = self.compute(stored, release_type)?;
        on_event(ReleaseEvent::StageCompleted(
            Stage::Compute,
            format!("{} → {} ({release_type})", plan.previous, plan.next),
        ));
        info!(previous = %plan.previous, next = %plan.next, "computed next version");

        let vars = TemplateVars {
            version: plan.next.to_string(),
            prev_version: plan.previous.to_string(),
            tag: plan.tag.clone(),
            owner: self.settings.owner.clone(),
            repo: self.settings.repo.clone(),
        };

        // ── Tag & Publish ──
        on_event(ReleaseEvent::StageStarted(Stage::Tag));
        let published = self.tag_and_publish(&plan.tag, &vars)?;
        let tag_msg = published.as_ref().map_or_else(
            || format!("tagged and pushed {}", plan.tag),
            |r| match r.url {
                Some(ref url) => format!("tagged {}, published {url}", plan.tag),
                None => format!("tagged {}, published release {}", plan.tag, r.id),
            },
        );
        on_event(ReleaseEvent::StageCompleted(Stage::Tag, tag_msg));

        // ── Persist ──
        on_event(ReleaseEvent::StageStarted(Stage::Persist));
        self.store
            .write_version(&vars.version)
            .map_err(|e| {
                ReleaseError::new(Stage::Persist, ReleaseErrorKind::VersionStoreWriteFailed(e))
            })?;
        on_event(ReleaseEvent::StageCompleted(
            Stage::Persist,
            format!("wrote {} to {}", vars.version, self.store.path()),
        ));

        // ── Commit ──
        on_event(ReleaseEvent::StageStarted(Stage::Commit));
        let commit = self.commit_and_push(&vars).inspect_err(|_| {
            warn!(tag = %plan.tag, "tag is pushed but the version record commit is not");
        })?;
        on_event(ReleaseEvent::StageCompleted(
            Stage::Commit,
            format!("committed {commit}, pushed to {}", self.settings.remote),
        ));

        let outcome = ReleaseOutcome {
            release_type,
            previous_version: plan.previous,
            version: plan.next,
            tag: plan.tag,
            published,
            commit,
        };

        info!(
            version = %outcome.version,
            tag = %outcome.tag,
            published = outcome.published.is_some(),
            "release complete"
        );
        Ok(outcome)
    }

    fn load(&self) -> ReleaseResult<String> {
        self.store.read_version().map_err(|e| {
            ReleaseError::new(Stage::Load, ReleaseErrorKind::VersionStoreUnreadable(e))
        })
    }

    fn tag_and_publish(
        &self,
        tag: &str,
        vars: &TemplateVars,
    ) -> ReleaseResult<Option<PublishedRelease>> {
        let tag_err = |e| ReleaseError::new(Stage::Tag, ReleaseErrorKind::TagOrPushFailed(e));

        if !self.vcs.is_clean().map_err(tag_err)? {
            return Err(ReleaseError::new(
                Stage::Tag,
                ReleaseErrorKind::DirtyWorkingTree,
            ));
        }

        if let Some(ref identity) = self.settings.identity {
            self.vcs.configure_identity(identity).map_err(tag_err)?;
        }

        let message = interpolate(&self.settings.tag_message, vars);
        self.vcs.create_tag(tag, &message).map_err(tag_err)?;
        self.vcs
            .push_tag(&self.settings.remote, tag)
            .map_err(tag_err)?;
        info!(%tag, remote = %self.settings.remote, "tag pushed");

        let record = ReleaseRecord {
            tag: tag.to_string(),
            title: interpolate(&self.settings.release_title, vars),
            body: interpolate(&self.settings.release_body, vars),
            draft: self.settings.draft,
            prerelease: self.settings.prerelease,
        };
        self.publisher.publish(&record).map_err(|e| {
            ReleaseError::new(Stage::Tag, ReleaseErrorKind::RemotePublishFailed(e))
        })
    }

    fn commit_and_push(&self, vars: &TemplateVars) -> ReleaseResult<String> {
        let commit_err =
            |e| ReleaseError::new(Stage::Commit, ReleaseErrorKind::CommitPushFailed(e));

        self.vcs.stage(self.store.path()).map_err(commit_err)?;
        let message = interpolate(&self.settings.commit_message, vars);
        let hash = self.vcs.commit(&message).map_err(commit_err)?;
        self.vcs
            .push_branch(&self.settings.remote)
            .map_err(commit_err)?;
        Ok(hash)
    }
}
