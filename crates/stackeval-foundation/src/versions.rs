//! Version sets and constraint translation.
//!
//! Module calls carry version constraints in the older Ruby-style syntax
//! (`~> 1.2`, `>= 1.0, != 1.3.0`). Everything downstream works with a
//! [`VersionSet`] instead; [`version_set_for_constraints`] is the single
//! place where one vocabulary is translated to the other.

use crate::error::VersionError;
use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use std::collections::BTreeSet;
use std::fmt;

/// A set of acceptable versions.
///
/// Prerelease versions are members only when a constraint names the same
/// `major.minor.patch` with a prerelease suffix, so the default set is
/// "every released version".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    req: VersionReq,
    excluded: Vec<Version>,
    source: String,
}

impl VersionSet {
    /// Every released (non-prerelease) version.
    pub fn released() -> Self {
        Self {
            req: VersionReq::STAR,
            excluded: Vec::new(),
            source: String::new(),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.req.matches(version) && !self.excluded.contains(version)
    }

    /// Selects the newest member of `available` that is in this set.
    pub fn newest_in<'a>(&self, available: &'a BTreeSet<Version>) -> Option<&'a Version> {
        available.iter().rev().find(|v| self.contains(v))
    }
}

impl Default for VersionSet {
    fn default() -> Self {
        Self::released()
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            f.write_str("any released version")
        } else {
            f.write_str(&self.source)
        }
    }
}

/// Translates a comma-separated Ruby-style constraint string into the
/// equivalent [`VersionSet`].
///
/// Accepted operators are `=` (or none), `!=`, `>`, `>=`, `<`, `<=` and the
/// pessimistic `~>`. Versions may be partial (`1`, `1.2`); missing parts
/// are zero, except that for `~>` the number of parts given decides which
/// part is allowed to grow:
///
/// | constraint  | equivalent              |
/// |-------------|-------------------------|
/// | `~> 1`      | `>= 1.0.0, < 2.0.0`     |
/// | `~> 1.2`    | `>= 1.2.0, < 2.0.0`     |
/// | `~> 1.2.3`  | `>= 1.2.3, < 1.3.0`     |
///
/// An empty string yields [`VersionSet::released`].
pub fn version_set_for_constraints(constraints: &str) -> Result<VersionSet, VersionError> {
    let trimmed = constraints.trim();
    if trimmed.is_empty() {
        return Ok(VersionSet::released());
    }

    let mut comparators = Vec::new();
    let mut excluded = Vec::new();

    for part in trimmed.split(',') {
        let part = part.trim();
        let invalid = |reason: String| VersionError::InvalidConstraint {
            constraint: constraints.to_string(),
            reason,
        };
        if part.is_empty() {
            return Err(invalid("empty constraint between commas".to_string()));
        }

        let (op, rest) = split_operator(part);
        let partial = parse_partial(rest.trim()).map_err(|reason| invalid(reason))?;

        match op {
            "~>" => {
                if !partial.pre.is_empty() && partial.given < 3 {
                    return Err(invalid("prerelease versions must have three parts".to_string()));
                }
                comparators.push(comparator(Op::GreaterEq, &partial.full()));
                let upper = match partial.given {
                    1 | 2 => partial.major.checked_add(1).map(|major| Version::new(major, 0, 0)),
                    _ => partial
                        .minor
                        .checked_add(1)
                        .map(|minor| Version::new(partial.major, minor, 0)),
                };
                let Some(upper) = upper else {
                    return Err(invalid("version has no upper bound".to_string()));
                };
                comparators.push(comparator(Op::Less, &upper));
            }
            "!=" => excluded.push(partial.full()),
            "=" | "" => comparators.push(comparator(Op::Exact, &partial.full())),
            ">" => comparators.push(comparator(Op::Greater, &partial.full())),
            ">=" => comparators.push(comparator(Op::GreaterEq, &partial.full())),
            "<" => comparators.push(comparator(Op::Less, &partial.full())),
            "<=" => comparators.push(comparator(Op::LessEq, &partial.full())),
            other => return Err(invalid(format!("unsupported operator {other:?}"))),
        }
    }

    Ok(VersionSet {
        req: VersionReq { comparators },
        excluded,
        source: trimmed.to_string(),
    })
}

/// Parses an exact version, accepting an optional leading `v`.
pub fn parse_version(s: &str) -> Result<Version, VersionError> {
    Version::parse(s.trim().trim_start_matches('v')).map_err(|e| VersionError::InvalidVersion {
        version: s.to_string(),
        reason: e.to_string(),
    })
}

fn split_operator(part: &str) -> (&str, &str) {
    for op in ["~>", "!=", ">=", "<=", ">", "<", "="] {
        if let Some(rest) = part.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", part)
}

struct PartialVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Prerelease,
    given: usize,
}

impl PartialVersion {
    fn full(&self) -> Version {
        let mut v = Version::new(self.major, self.minor, self.patch);
        v.pre = self.pre.clone();
        v
    }
}

fn parse_partial(s: &str) -> Result<PartialVersion, String> {
    let s = s.trim_start_matches('v');
    let (core, pre) = match s.split_once('-') {
        Some((core, pre)) => (core, Prerelease::new(pre).map_err(|e| e.to_string())?),
        None => (s, Prerelease::EMPTY),
    };

    let nums = core
        .split('.')
        .map(|n| n.parse::<u64>().map_err(|_| format!("{s:?} is not a valid version")))
        .collect::<Result<Vec<_>, _>>()?;
    if nums.is_empty() || nums.len() > 3 {
        return Err(format!("{s:?} is not a valid version"));
    }
    if !pre.is_empty() && nums.len() < 3 {
        return Err(format!("{s:?}: prerelease versions must have three parts"));
    }

    Ok(PartialVersion {
        major: nums[0],
        minor: nums.get(1).copied().unwrap_or(0),
        patch: nums.get(2).copied().unwrap_or(0),
        pre,
        given: nums.len(),
    })
}

fn comparator(op: Op, v: &Version) -> Comparator {
    Comparator {
        op,
        major: v.major,
        minor: Some(v.minor),
        patch: Some(v.patch),
        pre: v.pre.clone(),
    }
}
