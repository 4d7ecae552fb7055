//! File-name rules keyed on an extension.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{FsOpsError, FsOpsResult};

/// Case-insensitive `*.<extension>` match on a file name.
#[derive(Debug, Clone)]
pub struct ExtensionRule {
    matcher: GlobMatcher,
}

impl ExtensionRule {
    /// Compile the rule for `extension` (without the leading dot).
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Glob`] if the pattern cannot be compiled.
    pub fn new(operation: &'static str, extension: &str) -> FsOpsResult<Self> {
        let pattern = format!("*.{extension}");
        let glob = GlobBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| FsOpsError::glob(operation, pattern.clone(), source))?;
        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    /// Whether the final component of `path` carries the extension.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| self.matcher.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn matches_file_name_case_insensitively() -> Result<()> {
        let rule = ExtensionRule::new("stage.compile", "raw")?;
        assert!(rule.matches(Path::new("/in/Run1/Sample.RAW")));
        assert!(rule.matches(Path::new("a.raw")));
        assert!(!rule.matches(Path::new("/in/Run1/a.raw.part")));
        assert!(!rule.matches(Path::new("/in/raw")));
        Ok(())
    }

    #[test]
    fn invalid_extension_is_a_glob_error() {
        let err = ExtensionRule::new("stage.compile", "[").unwrap_err();
        assert!(matches!(err, FsOpsError::Glob { .. }));
    }
}
