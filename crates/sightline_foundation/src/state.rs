//! Ordered state ladders.
//!
//! Variants are declared in ascending order so the derived `Ord` matches the
//! ladder: a greater [`VisibilityState`] is more detectable, a greater
//! [`CoverState`] is more obstructive, a greater [`IlluminationLevel`] is
//! brighter.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

macro_rules! ladder_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants from lowest to highest.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Lowercase name of the state.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(Error::new(ErrorKind::Internal(format!(
                        "unknown {}: {other}",
                        stringify!($ty)
                    )))),
                }
            }
        }
    };
}

/// How detectable a target is to an observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VisibilityState {
    /// The observer does not know where the target is.
    Undetected,
    /// The observer knows the target's square but cannot see it.
    Hidden,
    /// The target is seen but obscured.
    Concealed,
    /// The target is plainly seen.
    #[default]
    Observed,
}

ladder_names!(VisibilityState {
    Undetected => "undetected",
    Hidden => "hidden",
    Concealed => "concealed",
    Observed => "observed",
});

/// How obstructed a target is from an observer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CoverState {
    /// Nothing in the way.
    #[default]
    None,
    /// Partial obstruction, typically another creature.
    Lesser,
    /// Solid obstruction such as a wall corner.
    Standard,
    /// Almost complete obstruction.
    Greater,
}

ladder_names!(CoverState {
    None => "none",
    Lesser => "lesser",
    Standard => "standard",
    Greater => "greater",
});

impl CoverState {
    /// Armor class bonus granted by this cover.
    #[must_use]
    pub const fn ac_bonus(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Lesser => 1,
            Self::Standard => 2,
            Self::Greater => 4,
        }
    }
}

/// Categorical amount of light at a point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IlluminationLevel {
    /// No usable light.
    #[default]
    Darkness,
    /// Dim light.
    Dim,
    /// Bright light.
    Bright,
}

ladder_names!(IlluminationLevel {
    Darkness => "darkness",
    Dim => "dim",
    Bright => "bright",
});
