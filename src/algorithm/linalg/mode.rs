//! QR mode policy table
//!
//! Maps a QR mode to the contract its result follows: which outputs exist, their
//! shapes, and whether the explicit `Q` has to be extracted from the reflectors.

use std::fmt;
use std::str::FromStr;

/// What a QR call returns
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum QrMode {
    /// `(Q, R)` with `Q: m×k`, `R: k×n`
    #[default]
    Reduced,
    /// `(Q, R)` with `Q: m×m`, `R: m×n`
    Complete,
    /// `R: k×n` only
    R,
    /// `(H, tau)`: the packed reflectors as an `n×m` buffer and their `k` scalar factors
    Raw,
}

/// Why a mode string was rejected
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeRejection {
    /// A legacy spelling that is recognized but not supported
    Legacy(&'static str),
    /// Not a QR mode at all
    Unknown,
}

impl fmt::Display for ModeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(replacement) => write!(
                f,
                "legacy mode is not supported, use '{replacement}' instead"
            ),
            Self::Unknown => f.write_str("expected one of 'reduced', 'complete', 'r', 'raw'"),
        }
    }
}

/// Every recognized mode spelling
const MODE_TABLE: &[(&str, Result<QrMode, ModeRejection>)] = &[
    ("reduced", Ok(QrMode::Reduced)),
    ("complete", Ok(QrMode::Complete)),
    ("r", Ok(QrMode::R)),
    ("raw", Ok(QrMode::Raw)),
    ("full", Err(ModeRejection::Legacy("reduced"))),
    ("f", Err(ModeRejection::Legacy("reduced"))),
    ("economic", Err(ModeRejection::Legacy("r"))),
    ("e", Err(ModeRejection::Legacy("r"))),
];

impl QrMode {
    /// Canonical mode string
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reduced => "reduced",
            Self::Complete => "complete",
            Self::R => "r",
            Self::Raw => "raw",
        }
    }

    /// Result contract of this mode for an `m×n` input
    pub const fn policy(self, m: usize, n: usize) -> ModePolicy {
        let k = if m < n { m } else { n };
        let q_cols = match self {
            Self::Complete if m > n => m,
            _ => k,
        };
        ModePolicy {
            mode: self,
            m,
            n,
            k,
            q_cols,
        }
    }
}

impl FromStr for QrMode {
    type Err = ModeRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MODE_TABLE
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, entry)| entry.clone())
            .unwrap_or(Err(ModeRejection::Unknown))
    }
}

impl fmt::Display for QrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result contract of one QR call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModePolicy {
    mode: QrMode,
    m: usize,
    n: usize,
    k: usize,
    q_cols: usize,
}

impl ModePolicy {
    /// Mode this policy was derived from
    #[inline]
    pub const fn mode(&self) -> QrMode {
        self.mode
    }

    /// Number of reflectors, `min(m, n)`
    #[inline]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Whether the explicit `Q` has to be formed from the reflectors
    #[inline]
    pub const fn extracts_q(&self) -> bool {
        matches!(self.mode, QrMode::Reduced | QrMode::Complete)
    }

    /// Columns of the explicit `Q` (`mc`): `m` for complete mode on tall input, else `k`
    #[inline]
    pub const fn q_cols(&self) -> usize {
        self.q_cols
    }

    /// Shape of `Q`, if the mode returns it
    pub const fn q_shape(&self) -> Option<[usize; 2]> {
        if self.extracts_q() {
            Some([self.m, self.q_cols])
        } else {
            None
        }
    }

    /// Shape of `R`, if the mode returns it
    pub const fn r_shape(&self) -> Option<[usize; 2]> {
        match self.mode {
            QrMode::R | QrMode::Reduced => Some([self.k, self.n]),
            QrMode::Complete => Some([self.q_cols, self.n]),
            QrMode::Raw => None,
        }
    }

    /// Shapes of `(H, tau)`, if the mode returns them
    pub const fn raw_shapes(&self) -> Option<([usize; 2], [usize; 1])> {
        match self.mode {
            QrMode::Raw => Some(([self.n, self.m], [self.k])),
            _ => None,
        }
    }
}
