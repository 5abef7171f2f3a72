//! Finder tag integration for the special folders.
//!
//! Labels are applied through the external `tag` command-line tool
//! (`brew install tag`). Tagging is best-effort decoration: when the tool is
//! missing or fails, the event is logged and the pass carries on untouched.

use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Applies colored Finder labels via the `tag` command.
pub struct TagManager {
    available: bool,
}

impl TagManager {
    /// Probe for the `tag` tool once; availability is fixed afterwards.
    pub fn new() -> Self {
        let available = Command::new("tag")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);

        if !available {
            debug!("'tag' command not found, folder labeling disabled");
        }

        Self { available }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Apply a colored label to a file or folder.
    ///
    /// Any existing label with the same name is removed first so the color
    /// is re-applied consistently. Failures are logged and swallowed.
    pub fn apply(&self, path: &Path, label: &str, color: &str) {
        if !self.available {
            return;
        }

        // Ignore failures here: the label may simply not exist yet.
        let _ = Command::new("tag")
            .args(["-r", label])
            .arg(path)
            .output();

        let result = Command::new("tag")
            .arg("-a")
            .arg(format!("{},{}", label, color))
            .arg(path)
            .output();

        match result {
            Ok(out) if out.status.success() => {
                debug!(path = %path.display(), label, color, "applied folder label");
            }
            Ok(out) => {
                debug!(
                    path = %path.display(),
                    label,
                    status = %out.status,
                    "tag command failed"
                );
            }
            Err(e) => {
                debug!(path = %path.display(), label, error = %e, "could not run tag command");
            }
        }
    }
}

impl Default for TagManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_manager_is_a_noop() {
        let manager = TagManager { available: false };
        // Must not panic or error even on nonsense paths.
        manager.apply(Path::new("/nonexistent/folder"), "Manual", "red");
        assert!(!manager.is_available());
    }

    #[test]
    fn test_probe_does_not_panic() {
        // Whatever the host has installed, construction must succeed.
        let _ = TagManager::new();
    }
}
