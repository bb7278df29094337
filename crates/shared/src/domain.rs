use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ApiException, ErrorCode};

/// Analysis identifier as it appears in `/view/{id}` and `/api/analysis/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(String);

impl AnalysisId {
    /// Accepts the same alphabet as the server routes: `[-a-zA-Z0-9]+`.
    pub fn parse(raw: &str) -> Result<Self, ApiException> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ApiException::new(
                ErrorCode::Validation,
                "analysis id must not be empty",
            ));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(ApiException::new(
                ErrorCode::Validation,
                format!("invalid character {bad:?} in analysis id {raw:?}"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AnalysisId {
    type Err = ApiException;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisStatus {
    NotExists,
    Pending,
    Running,
    Finished,
    Error,
    Canceled,
    Timeout,
    Unknown(i32),
}

impl AnalysisStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::NotExists,
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Finished,
            3 => Self::Error,
            4 => Self::Canceled,
            5 => Self::Timeout,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::NotExists => -1,
            Self::Pending => 0,
            Self::Running => 1,
            Self::Finished => 2,
            Self::Error => 3,
            Self::Canceled => 4,
            Self::Timeout => 5,
            Self::Unknown(code) => code,
        }
    }

    /// Finished and timed-out analyses both carry a result tree.
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Finished | Self::Timeout)
    }

    /// No further status change is expected from the server.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Error | Self::Canceled | Self::Timeout | Self::NotExists
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotExists => "Analysis does not exist",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Error => "Error",
            Self::Canceled => "Canceled",
            Self::Timeout => "Timeout",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    BootstrapOnly,
    PhymlSms,
    FastTree,
    Unknown(i32),
}

impl Workflow {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::BootstrapOnly,
            8 => Self::PhymlSms,
            9 => Self::FastTree,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::BootstrapOnly => -1,
            Self::PhymlSms => 8,
            Self::FastTree => 9,
            Self::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BootstrapOnly => "Bootstrap alone",
            Self::PhymlSms => "PhyML-SMS",
            Self::FastTree => "FastTree",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl FromStr for Workflow {
    type Err = ApiException;

    /// Only the tree-building workflows can be requested by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PhyML-SMS" => Ok(Self::PhymlSms),
            "FastTree" => Ok(Self::FastTree),
            other => Err(ApiException::new(
                ErrorCode::Validation,
                format!("Phylogenetic workflow does not exist: {other}"),
            )),
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    AminoAcids,
    Nucleotides,
}

impl Alphabet {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::AminoAcids),
            1 => Some(Self::Nucleotides),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AminoAcids => "amino acids",
            Self::Nucleotides => "nucleotides",
        }
    }
}

macro_rules! path_segment_enum {
    ($name:ident, $what:literal, { $($variant:ident => $segment:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn segment(self) -> &'static str {
                match self {
                    $($name::$variant => $segment),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.segment())
            }
        }

        impl FromStr for $name {
            type Err = ApiException;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($segment => Ok($name::$variant),)+
                    other => Err(ApiException::new(
                        ErrorCode::Validation,
                        format!(concat!($what, " not recognized: {}"), other),
                    )),
                }
            }
        }
    };
}

path_segment_enum!(TreeLayout, "Tree layout", {
    Radial => "radial",
    Circular => "circular",
    Normal => "normal",
});

path_segment_enum!(SupportAlgorithm, "Support algorithm", {
    Tbe => "tbe",
    Fbp => "fbp",
});

path_segment_enum!(ImageFormat, "Image format", {
    Svg => "svg",
    Png => "png",
});

impl Default for TreeLayout {
    fn default() -> Self {
        Self::Normal
    }
}

impl Default for SupportAlgorithm {
    fn default() -> Self {
        Self::Tbe
    }
}

/// Branches with support below this percentage are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollapseThreshold(u8);

impl CollapseThreshold {
    pub const MAX: u8 = 100;
    pub const DEFAULT: u8 = 80;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Support cutoff in `[0, 1]`, the scale the server draws with.
    pub fn cutoff(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl Default for CollapseThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for CollapseThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
