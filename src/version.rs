//! Package version parsing, comparison, and rendering.
//!
//! A version has the wire form `[epoch:]c1.c2.…cn-release`: an optional
//! non-negative `epoch`, a dot-separated sequence of upstream `components`
//! (each either an integer or an alphanumeric string), and a strictly
//! positive `release` (the packaging iteration). This module implements the
//! exact parse/compare/render algebra the write-ahead log depends on to
//! validate `update-package` monotonicity.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

/// A single upstream version component: either a parsed integer or an
/// opaque alphanumeric token.
///
/// Components compare numerically when both sides are `Int`, lexically when
/// both sides are `Str`, and otherwise `Int` is always less than `Str`
/// (e.g. `1.0-1 < 1.a-1`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    /// A token that parsed cleanly as an integer.
    Int(u64),
    /// A token that did not parse as an integer, kept verbatim.
    Str(String),
}

impl Component {
    fn parse(token: &str) -> Self {
        match token.parse::<u64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(token.to_string()),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Int(_), Self::Str(_)) => Ordering::Less,
            (Self::Str(_), Self::Int(_)) => Ordering::Greater,
        }
    }
}

/// A parsed package version: `[epoch:]components-release`.
///
/// Ordering is total: epoch dominates, then components compare
/// element-wise (shorter-with-equal-prefix sorts first), then release.
#[derive(Clone, Debug, Eq)]
pub struct Version {
    epoch: Option<u64>,
    components: Vec<Component>,
    release: u32,
}

impl Version {
    /// Parse a version string of the form `[epoch:]c1.c2.…cn-release`.
    ///
    /// # Errors
    /// Returns [`Error::VersionSyntax`] when the upstream portion is empty,
    /// the release is missing, non-numeric, or not strictly positive, or
    /// the epoch prefix is present but not a non-negative integer.
    pub fn parse(s: &str) -> Result<Self> {
        let syntax_err = || Error::VersionSyntax(s.to_string());

        let (epoch, rest) = match s.split_once(':') {
            Some((epoch_str, rest)) => {
                let epoch = epoch_str.parse::<u64>().map_err(|_| syntax_err())?;
                (Some(epoch), rest)
            }
            None => (None, s),
        };

        let (upstream, release_str) = rest.rsplit_once('-').ok_or_else(syntax_err)?;
        if upstream.is_empty() {
            return Err(syntax_err());
        }
        let release: u32 = release_str.parse().map_err(|_| syntax_err())?;
        if release < 1 {
            return Err(syntax_err());
        }

        let components = upstream.split('.').map(Component::parse).collect();

        Ok(Self {
            epoch,
            components,
            release,
        })
    }

    /// Render the version back to its wire form. Inverse of [`Version::parse`]
    /// with no zero-padding.
    #[must_use]
    pub fn render(&self) -> String {
        let components = self
            .components
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match self.epoch {
            Some(epoch) => format!("{epoch}:{components}-{}", self.release),
            None => format!("{components}-{}", self.release),
        }
    }

    /// The epoch, if present.
    #[must_use]
    pub const fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// The parsed upstream components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The packaging release/iteration.
    #[must_use]
    pub const fn release(&self) -> u32 {
        self.release
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch
            && self.components == other.components
            && self.release == other.release
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let epoch_ord = match (self.epoch, other.epoch) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        };
        if epoch_ord != Ordering::Equal {
            return epoch_ord;
        }

        let len_cmp = self.components.len().cmp(&other.components.len());
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        if len_cmp != Ordering::Equal {
            return len_cmp;
        }

        self.release.cmp(&other.release)
    }
}
