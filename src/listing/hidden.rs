//! Hidden-file predicates.
//!
//! The listing code never decides on its own what "hidden" means; it is
//! handed a [`HiddenPredicate`] so each platform (or a test) can supply its
//! own rule.

use std::path::Path;
use std::sync::Arc;

/// Shared predicate deciding whether a path is hidden.
pub type HiddenPredicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Unix convention: names beginning with a dot are hidden.
pub fn dotfile_hidden() -> HiddenPredicate {
    Arc::new(|path: &Path| {
        path.file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
    })
}

/// Hidden rule of the platform the binary was built for.
#[cfg(not(windows))]
pub fn platform_hidden() -> HiddenPredicate {
    dotfile_hidden()
}

/// Hidden rule of the platform the binary was built for.
///
/// On Windows an entry is hidden when it carries the hidden file attribute
/// or follows the dotfile convention.
#[cfg(windows)]
pub fn platform_hidden() -> HiddenPredicate {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    let dotfile = dotfile_hidden();
    Arc::new(move |path: &Path| {
        let attribute = std::fs::symlink_metadata(path)
            .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
            .unwrap_or(false);
        attribute || dotfile(path)
    })
}
