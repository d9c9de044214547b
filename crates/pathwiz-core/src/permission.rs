//! POSIX permission bitmasks and mismatch reports.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

const TRIAD_SHIFTS: [u32; 3] = [6, 3, 0];
const TRIAD_LETTERS: [(u32, char); 3] = [(0b100, 'r'), (0b010, 'w'), (0b001, 'x')];

/// Owner/group/other read/write/execute bits, always within `0..=0o777`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PermissionSpec(u32);

impl PermissionSpec {
    /// Largest valid bitmask.
    pub const MAX: u32 = 0o777;

    /// Validate and wrap a bitmask.
    pub fn new(bits: u32) -> FsResult<Self> {
        if bits > Self::MAX {
            return Err(FsError::InvalidPermissionSpec {
                value: format!("{bits:#o}"),
            });
        }
        Ok(Self(bits))
    }

    /// Extract the permission bits from a full `st_mode`, dropping file type
    /// and setuid/setgid/sticky bits.
    pub fn from_mode(mode: u32) -> Self {
        Self(mode & Self::MAX)
    }

    /// The raw bitmask.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Render as the 9-character symbolic form, e.g. `rwxr-xr-x`.
    pub fn to_rwx(self) -> String {
        let mut out = String::with_capacity(9);
        for shift in TRIAD_SHIFTS {
            let digit = (self.0 >> shift) & 0o7;
            for (mask, letter) in TRIAD_LETTERS {
                out.push(if digit & mask != 0 { letter } else { '-' });
            }
        }
        out
    }

    /// Parse the 9-character symbolic form.
    pub fn from_rwx(text: &str) -> FsResult<Self> {
        let invalid = || FsError::InvalidPermissionSpec {
            value: text.to_string(),
        };

        if text.chars().count() != 9 {
            return Err(invalid());
        }

        let mut bits = 0;
        for (i, c) in text.chars().enumerate() {
            let (_, letter) = TRIAD_LETTERS[i % 3];
            let bit = 1 << (8 - i);
            match c {
                '-' => {}
                c if c == letter => bits |= bit,
                _ => return Err(invalid()),
            }
        }
        Ok(Self(bits))
    }
}

impl TryFrom<u32> for PermissionSpec {
    type Error = FsError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<PermissionSpec> for u32 {
    fn from(spec: PermissionSpec) -> Self {
        spec.0
    }
}

impl fmt::Display for PermissionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0o{:03o}", self.0)
    }
}

impl FromStr for PermissionSpec {
    type Err = FsError;

    /// Accepts `755`, `0755`, `0o755` or `rwxr-xr-x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 9 && !s.chars().all(|c| c.is_ascii_digit()) {
            return Self::from_rwx(s);
        }

        let digits = s.strip_prefix("0o").unwrap_or(s);
        let bits = u32::from_str_radix(digits, 8).map_err(|_| FsError::InvalidPermissionSpec {
            value: s.to_string(),
        })?;
        Self::new(bits)
    }
}

/// Outcome of attempting to fix a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Only reported; nothing was changed.
    NotAttempted,
    /// The expected bits were applied.
    Resolved,
    /// Applying the expected bits failed.
    Failed,
}

/// Progress of a single permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Unchecked,
    Compared,
    Matched,
    MismatchReported,
    MismatchResolved,
    ResolutionFailed,
}

impl CheckState {
    /// Derive the terminal state from the result of a permission check.
    ///
    /// Errors that carry no mismatch never reached the comparison and map to
    /// `Unchecked`.
    pub fn of(outcome: &FsResult<Option<PermissionMismatch>>) -> Self {
        match outcome {
            Ok(None) => Self::Matched,
            Ok(Some(report)) => report.state(),
            Err(err) => err
                .mismatch()
                .map(PermissionMismatch::state)
                .unwrap_or(Self::Unchecked),
        }
    }
}

/// Observed permissions that differ from the expected ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMismatch {
    /// Path that was checked.
    pub path: PathBuf,
    /// Permissions the caller asked for.
    pub expected: PermissionSpec,
    /// Permissions found on disk.
    pub observed: PermissionSpec,
    /// Whether the mismatch was fixed.
    pub resolution: Resolution,
}

impl PermissionMismatch {
    /// Create an unresolved mismatch report.
    pub fn new(path: impl Into<PathBuf>, expected: PermissionSpec, observed: PermissionSpec) -> Self {
        Self {
            path: path.into(),
            expected,
            observed,
            resolution: Resolution::NotAttempted,
        }
    }

    /// Mark the mismatch as fixed.
    pub fn resolved(mut self) -> Self {
        self.resolution = Resolution::Resolved;
        self
    }

    /// Mark the fix attempt as failed.
    pub fn failed(mut self) -> Self {
        self.resolution = Resolution::Failed;
        self
    }

    /// Bits that differ between expected and observed.
    pub fn differing_bits(&self) -> u32 {
        self.expected.bits() ^ self.observed.bits()
    }

    /// Terminal check state this report represents.
    pub fn state(&self) -> CheckState {
        match self.resolution {
            Resolution::NotAttempted => CheckState::MismatchReported,
            Resolution::Resolved => CheckState::MismatchResolved,
            Resolution::Failed => CheckState::ResolutionFailed,
        }
    }
}

impl fmt::Display for PermissionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {} ({}), found {} ({})",
            self.path.display(),
            self.expected,
            self.expected.to_rwx(),
            self.observed,
            self.observed.to_rwx()
        )
    }
}
