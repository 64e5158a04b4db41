//! Command implementations

pub mod info;

pub mod next;

pub mod release;

use camino::{Utf8Path, Utf8PathBuf};
use relcut_core::config::Config;

/// Locate the version record: an explicit path wins over config.
///
/// Relative paths are resolved against `cwd`.
pub fn manifest_path(cwd: &Utf8Path, config: &Config, explicit: Option<&Utf8Path>) -> Utf8PathBuf {
    let path = explicit.map_or_else(|| config.manifest_path(), Utf8Path::to_path_buf);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_defaults_to_package_json_in_cwd() {
        let path = manifest_path(Utf8Path::new("/work"), &Config::default(), None);
        assert_eq!(path, "/work/package.json");
    }

    #[test]
    fn explicit_manifest_wins() {
        let path = manifest_path(
            Utf8Path::new("/work"),
            &Config::default(),
            Some(Utf8Path::new("web/package.json")),
        );
        assert_eq!(path, "/work/web/package.json");

        let path = manifest_path(
            Utf8Path::new("/work"),
            &Config::default(),
            Some(Utf8Path::new("/elsewhere/package.json")),
        );
        assert_eq!(path, "/elsewhere/package.json");
    }
}
