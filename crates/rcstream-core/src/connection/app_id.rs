//! App id parsing.

use regex::Regex;
use std::sync::LazyLock;

/// `<prefix>:<project number>:<platform>:<hex hash>`; group 1 is the project number.
static APP_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:]+:([0-9]+):(android|ios|web):([0-9a-f]+)$").expect("valid app id pattern")
});

/// Extract the numeric project identifier from an app id, or `None` if the
/// id does not have the expected shape.
pub fn extract_project_number(app_id: &str) -> Option<&str> {
    APP_ID_PATTERN
        .captures(app_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}
