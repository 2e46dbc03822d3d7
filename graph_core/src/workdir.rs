//! Scoped working-directory acquisition (spec §5/§6).
//!
//! Every `evaluate`/`load`/`touch` invocation runs with the process's current directory set to
//! the owning graph's working directory, restored on every exit path — including panics — once
//! the call returns.

use std::io;
use std::path::{Path, PathBuf};

/// Restores the previous current directory when dropped.
///
/// Nested guards compose correctly: each records whatever directory was current when it was
/// entered, so restoring happens in the reverse order guards were acquired, matching ordinary
/// stack unwinding.
#[derive(Debug)]
#[must_use = "the working directory is only held while this guard is alive"]
pub struct WorkDirGuard {
    previous: PathBuf,
}

impl WorkDirGuard {
    /// Switches the process's current directory to `dir`, returning a guard that restores the
    /// prior directory when dropped.
    ///
    /// # Errors
    /// Returns an error if either the current directory cannot be read or `dir` cannot be
    /// entered; in the latter case the directory is left unchanged.
    pub fn enter(dir: &Path) -> io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for WorkDirGuard {
    fn drop(&mut self) {
        // Best effort: a failure here means the previous directory vanished underneath us.
        // There is nothing a destructor can usefully do about that.
        let _ = std::env::set_current_dir(&self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_directory_on_drop() {
        let before = std::env::current_dir().unwrap();
        let target = tempfile::tempdir().unwrap();
        {
            let _guard = WorkDirGuard::enter(target.path()).unwrap();
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                target.path().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn nested_guards_restore_in_reverse_order() {
        let before = std::env::current_dir().unwrap();
        let outer_dir = tempfile::tempdir().unwrap();
        let inner_dir = tempfile::tempdir().unwrap();
        {
            let _outer = WorkDirGuard::enter(outer_dir.path()).unwrap();
            {
                let _inner = WorkDirGuard::enter(inner_dir.path()).unwrap();
            }
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                outer_dir.path().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
