//! Import resolution (spec.md §4.1, component **I**): mapping a
//! source-written import string to a canonical module key and, for the
//! local/remote categories, a filesystem path.

use crate::module::{Category, ModuleKey};

/// Git hosts recognized as the leading segment of a remote import.
const REMOTE_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org", "sr.ht"];

/// The fixed standard-library namespace (spec.md §4.1).
const BUILTIN_MODULES: &[&str] = &["std", "math", "io", "os", "net", "http", "json", "time"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Local,
    Builtin,
    Remote,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("import '{0}' does not match any known module category")]
    NotFound(String),
    #[error("{0}")]
    PolicyDenied(String),
    #[error("malformed import path '{0}'")]
    Malformed(String),
}

/// `host/owner/repo[@version][/sub/path...]` split apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub version: String,
    pub sub_path: Vec<String>,
}

impl RemoteRef {
    /// The canonical key, independent of any requested sub-path:
    /// `host/owner/repo@version`.
    pub fn repo_key(&self) -> ModuleKey {
        ModuleKey::new(format!("{}/{}/{}@{}", self.host, self.owner, self.repo, self.version))
    }

    /// The full canonical key including sub-path, used to key the specific
    /// file this import resolves to.
    pub fn full_key(&self) -> ModuleKey {
        if self.sub_path.is_empty() {
            self.repo_key()
        } else {
            ModuleKey::new(format!("{}/{}", self.repo_key(), self.sub_path.join("/")))
        }
    }
}

/// Classifies an import path without resolving it (spec.md §4.1:
/// `classify(import_path, project_name)`).
pub fn classify(import_path: &str, project_name: &str) -> Classification {
    let mut segments = import_path.split('/').filter(|s| !s.is_empty());
    let Some(first) = segments.next() else {
        return Classification::Unknown;
    };

    if REMOTE_HOSTS.contains(&first) {
        return Classification::Remote;
    }
    if BUILTIN_MODULES.contains(&first) {
        return Classification::Builtin;
    }
    if first == project_name {
        return Classification::Local;
    }
    Classification::Unknown
}

/// Parses a `host/owner/repo[@version][/sub/path]` import string. Assumes
/// the caller has already classified it as [`Classification::Remote`].
fn parse_remote(import_path: &str) -> Result<RemoteRef, ResolveError> {
    let mut segments = import_path.split('/').filter(|s| !s.is_empty());
    let host = segments.next().ok_or_else(|| ResolveError::Malformed(import_path.to_string()))?;
    let owner = segments.next().ok_or_else(|| ResolveError::Malformed(import_path.to_string()))?;
    let repo_segment = segments.next().ok_or_else(|| ResolveError::Malformed(import_path.to_string()))?;

    let (repo, version) = match repo_segment.split_once('@') {
        Some((repo, version)) => (repo.to_string(), normalize_version(version)),
        None => (repo_segment.to_string(), "latest".to_string()),
    };

    Ok(RemoteRef {
        host: host.to_string(),
        owner: owner.to_string(),
        repo,
        version,
        sub_path: segments.map(|s| s.to_string()).collect(),
    })
}

/// Rewrites an import found inside a cached remote tree whose leading
/// segment equals the containing repo's own directory name into a
/// repo-internal local import (spec.md §4.1 "Remote cache layout").
pub fn rewrite_repo_internal(import_path: &str, containing_repo: &RemoteRef) -> Option<RemoteRef> {
    let mut segments = import_path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    if first != containing_repo.repo {
        return None;
    }
    Some(RemoteRef {
        host: containing_repo.host.clone(),
        owner: containing_repo.owner.clone(),
        repo: containing_repo.repo.clone(),
        version: containing_repo.version.clone(),
        sub_path: segments.map(|s| s.to_string()).collect(),
    })
}

/// Policy inputs the resolver needs but doesn't own: the project's
/// manifest-declared settings (spec.md §4.1 "Policy").
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub remote_enabled: bool,
}

/// What a remote module's own manifest says about letting others depend on
/// it (spec.md §4.1: "Each remote module may carry its own `remote.share`
/// flag").
pub fn check_share_policy(remote_share: bool, import_path: &str) -> Result<(), ResolveError> {
    if remote_share {
        Ok(())
    } else {
        Err(ResolveError::PolicyDenied(format!(
            "module '{import_path}' does not allow being imported (remote.share = false)"
        )))
    }
}

/// Resolves a classified import path to its canonical module key. The
/// filesystem-path half of spec.md's `resolve` signature is the dependency
/// manager's job (out of scope here, per spec.md §1); callers that need a
/// concrete path extend this with their own cache-root join.
pub fn resolve(
    import_path: &str,
    project_name: &str,
    policy: Policy,
) -> Result<ModuleKey, ResolveError> {
    match classify(import_path, project_name) {
        Classification::Unknown => Err(ResolveError::NotFound(import_path.to_string())),
        Classification::Builtin => Ok(ModuleKey::new(import_path.to_string())),
        Classification::Local => {
            let rest = import_path.splitn(2, '/').nth(1).unwrap_or("");
            Ok(ModuleKey::new(rest.to_string()))
        }
        Classification::Remote => {
            if !policy.remote_enabled {
                return Err(ResolveError::PolicyDenied(format!(
                    "remote imports are disabled; cannot resolve '{import_path}'"
                )));
            }
            let remote = parse_remote(import_path)?;
            Ok(remote.full_key())
        }
    }
}

pub fn category_of(classification: Classification) -> Option<Category> {
    match classification {
        Classification::Local => Some(Category::Local),
        Classification::Builtin => Some(Category::Builtin),
        Classification::Remote => Some(Category::Remote),
        Classification::Unknown => None,
    }
}

/// Normalizes a version string: ensures a leading `v` when the remainder
/// looks like a dotted numeric sequence; `latest` passes through unchanged.
pub fn normalize_version(version: &str) -> String {
    if version == "latest" {
        return version.to_string();
    }
    if let Some(stripped) = version.strip_prefix('v') {
        if looks_semver(stripped) {
            return version.to_string();
        }
    }
    if looks_semver(version) {
        return format!("v{version}");
    }
    version.to_string()
}

fn looks_semver(s: &str) -> bool {
    let core = s.split('-').next().unwrap_or(s);
    !core.is_empty() && core.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Splits a normalized version into its numeric release components and an
/// optional pre-release suffix.
fn split_release(version: &str) -> Option<(Vec<u64>, Option<&str>)> {
    let stripped = version.strip_prefix('v').unwrap_or(version);
    let (core, prerelease) = match stripped.split_once('-') {
        Some((core, suffix)) => (core, Some(suffix)),
        None => (stripped, None),
    };
    let mut parts = Vec::new();
    for part in core.split('.') {
        parts.push(part.parse::<u64>().ok()?);
    }
    if parts.is_empty() {
        return None;
    }
    Some((parts, prerelease))
}

/// Total order on normalized version strings (spec.md §4.1 "Version
/// policy"). `latest` is treated as a bare tag, compared like any other
/// non-semver string once both sides fail semver parsing against it.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (split_release(a), split_release(b)) {
        (Some((a_parts, a_pre)), Some((b_parts, b_pre))) => {
            let len = a_parts.len().max(b_parts.len());
            for i in 0..len {
                let ac = a_parts.get(i).copied().unwrap_or(0);
                let bc = b_parts.get(i).copied().unwrap_or(0);
                match ac.cmp(&bc) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            match (a_pre, b_pre) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(y),
            }
        }
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_by_leading_segment() {
        assert_eq!(classify("github.com/acme/widgets", "myproj"), Classification::Remote);
        assert_eq!(classify("std/strings", "myproj"), Classification::Builtin);
        assert_eq!(classify("myproj/util/list", "myproj"), Classification::Local);
        assert_eq!(classify("mystery/thing", "myproj"), Classification::Unknown);
    }

    #[test]
    fn remote_defaults_to_latest_and_splits_sub_path() {
        let remote = parse_remote("github.com/acme/widgets/sub/a").unwrap();
        assert_eq!(
            remote,
            RemoteRef {
                host: "github.com".to_string(),
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                version: "latest".to_string(),
                sub_path: vec!["sub".to_string(), "a".to_string()],
            }
        );
        assert_eq!(remote.repo_key(), ModuleKey::new("github.com/acme/widgets@latest"));
    }

    #[test]
    fn remote_version_is_normalized_with_leading_v() {
        let remote = parse_remote("github.com/acme/widgets@1.2.3").unwrap();
        assert_eq!(remote.version, "v1.2.3");
    }

    #[test]
    fn repo_internal_import_rewrites_to_containing_remote() {
        let containing = parse_remote("github.com/acme/widgets@v1.0.0").unwrap();
        let rewritten = rewrite_repo_internal("widgets/helpers/list", &containing).unwrap();
        assert_eq!(rewritten.full_key(), ModuleKey::new("github.com/acme/widgets@v1.0.0/helpers/list"));
    }

    #[test]
    fn version_comparison_is_numeric_with_zero_pad() {
        assert_eq!(compare_versions("v1.2", "v1.2.0"), std::cmp::Ordering::Equal);
        assert_eq!(compare_versions("v1.9.0", "v1.10.0"), std::cmp::Ordering::Less);
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert_eq!(compare_versions("v1.0.0-alpha", "v1.0.0"), std::cmp::Ordering::Less);
        assert_eq!(compare_versions("v1.0.0-alpha", "v1.0.0-beta"), std::cmp::Ordering::Less);
    }

    #[test]
    fn non_semver_tag_falls_back_to_lexicographic() {
        assert_eq!(compare_versions("release-2024", "release-2025"), std::cmp::Ordering::Less);
    }

    #[test]
    fn remote_import_denied_when_disabled() {
        let err = resolve(
            "github.com/acme/widgets",
            "myproj",
            Policy { remote_enabled: false },
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::PolicyDenied(_)));
    }
}
