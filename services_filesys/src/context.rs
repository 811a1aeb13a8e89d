//! Per-execution-context state
//!
//! Each execution context owns an optional working directory used as the
//! implicit start of relative path resolution. The field is explicit:
//! callers pass the context into every operation instead of the service
//! reading ambient per-thread state.

use crate::directory::DirHandle;

/// Execution context for file-system operations
///
/// The working directory handle is owned here from the successful chdir
/// that installed it until the next successful chdir or until
/// `FilesysService::release_context`. When unset, relative paths start
/// at the root.
#[derive(Debug, Default)]
pub struct ExecContext {
    pub(crate) working_dir: Option<DirHandle>,
}

impl ExecContext {
    /// Creates a context with no working directory set
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a working directory is installed
    pub fn has_working_dir(&self) -> bool {
        self.working_dir.is_some()
    }

    /// Inumber of the installed working directory, if any
    pub fn working_dir_inumber(&self) -> Option<u64> {
        self.working_dir.as_ref().map(|dir| dir.inumber())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_no_working_dir() {
        let ctx = ExecContext::new();
        assert!(!ctx.has_working_dir());
        assert!(ctx.working_dir_inumber().is_none());
    }
}
