use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Extension of the lz4-compressed `docker save` tarballs.
pub const ARCHIVE_EXTENSION: &str = ".tar.lz4";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("static regex"));

/// Filesystem-safe archive file name for an image reference.
///
/// `mumblepins/circleci-dev:foo-bar_1a2b3c` → `mumblepinscircleci-devfoo-bar_1a2b3c.tar.lz4`
pub fn archive_file_name(full_image: &str) -> String {
    let ascii: String = full_image.nfkd().filter(char::is_ascii).collect();
    let stripped = DISALLOWED.replace_all(&ascii, "");
    let lowered = stripped.trim().to_lowercase();
    let collapsed = SEPARATORS.replace_all(&lowered, "-");
    format!(
        "{name}{ARCHIVE_EXTENSION}",
        name = collapsed.trim_matches('-')
    )
}
