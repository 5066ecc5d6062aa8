//! Which files and documents the bridge cares about.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Language ids the bridge registers the server for.
pub const DOCUMENT_LANGUAGES: [&str; 2] = ["pascal", "objectpascal"];

/// Workspace file patterns whose changes are forwarded to the server.
pub const WATCH_GLOBS: [&str; 4] = ["**/*.pas", "**/*.pp", "**/*.inc", "**/*.dpr"];

/// Matcher over [`WATCH_GLOBS`].
///
/// Pascal source trees routinely mix `.pas` and `.PAS`, so matching is
/// case-insensitive.
#[derive(Debug, Clone)]
pub struct SourceWatch {
    set: GlobSet,
}

impl SourceWatch {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in WATCH_GLOBS {
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("static watch globs are valid");
            builder.add(glob);
        }
        let set = builder.build().expect("static watch globs are valid");
        Self { set }
    }

    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }
}

impl Default for SourceWatch {
    fn default() -> Self {
        Self::new()
    }
}
