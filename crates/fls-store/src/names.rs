//! Branch name rules.
//!
//! Branch names are keys in the project record and appear in CLI output, so
//! they follow git-style conventions:
//! - non-empty, no whitespace or control characters
//! - none of `~ ^ : ? * [ \`
//! - no `..` and no `@{`
//! - no leading or trailing `.` or `/`, no empty `/` components
//! - components do not start with `.`

use crate::error::{StoreError, StoreResult};

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Validate a branch name, returning `Ok(())` if it can be used.
pub fn validate_branch_name(name: &str) -> StoreResult<()> {
    let reject = |reason: String| {
        Err(StoreError::InvalidBranchName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("branch name must not be empty".into());
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    for pattern in ["..", "@{"] {
        if name.contains(pattern) {
            return reject(format!("must not contain {pattern:?}"));
        }
    }
    if name.starts_with(['.', '/']) || name.ends_with(['.', '/']) {
        return reject("must not start or end with '.' or '/'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return reject("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return reject(format!("component must not start with '.': {component:?}"));
        }
    }
    Ok(())
}
