//! Tokens and the actor data the engine reads from them.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{LightId, Point, Rect, TokenId};

use crate::scene::LightSource;

// =============================================================================
// Actor data
// =============================================================================

/// Which side of the table an actor is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Alliance {
    /// Player characters and their allies.
    Party,
    /// Enemies of the party.
    Opposition,
    /// Everyone else.
    #[default]
    Neutral,
}

/// Creature size category, smallest first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SizeCategory {
    /// Tiny.
    Tiny,
    /// Small.
    Small,
    /// Medium.
    #[default]
    Medium,
    /// Large.
    Large,
    /// Huge.
    Huge,
    /// Gargantuan.
    Gargantuan,
}

impl SizeCategory {
    /// Position on the size ladder, tiny = 0.
    #[must_use]
    pub const fn rank(self) -> i32 {
        self as i32
    }

    /// Approximate creature height in scene units (feet).
    #[must_use]
    pub const fn height(self) -> f64 {
        match self {
            Self::Tiny => 2.5,
            Self::Small | Self::Medium => 5.0,
            Self::Large => 10.0,
            Self::Huge => 15.0,
            Self::Gargantuan => 20.0,
        }
    }
}

/// Kinds of sense relevant to visibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SenseKind {
    /// Sees in darkness.
    Darkvision,
    /// Sees in darkness, including magical darkness.
    GreaterDarkvision,
    /// Treats dim light as bright.
    LowLightVision,
    /// Perceives invisible creatures.
    SeeInvisibility,
}

/// A sense with an optional range in scene units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sense {
    /// Which sense.
    pub kind: SenseKind,
    /// Range limit; `None` is unlimited.
    pub range: Option<f64>,
}

impl Sense {
    /// A sense with no range limit.
    #[must_use]
    pub const fn unlimited(kind: SenseKind) -> Self {
        Self { kind, range: None }
    }

    /// A sense limited to `range` scene units.
    #[must_use]
    pub const fn ranged(kind: SenseKind, range: f64) -> Self {
        Self {
            kind,
            range: Some(range),
        }
    }
}

/// Conditions that change how an actor perceives or is perceived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Condition {
    /// Cannot see at all.
    Blinded,
    /// Everything appears concealed.
    Dazzled,
    /// Cannot be seen without special senses.
    Invisible,
}

/// Character-sheet data the engine reads.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActorData {
    /// Whether the actor perceives through vision at all.
    pub has_vision: bool,
    /// Senses granted by ancestry, feats, or effects.
    pub senses: Vec<Sense>,
    /// Active conditions.
    pub conditions: BTreeSet<Condition>,
    /// Table side.
    pub alliance: Alliance,
    /// Size category.
    pub size: SizeCategory,
    /// Whether the actor is dead.
    pub dead: bool,
    /// Whether the actor is prone.
    pub prone: bool,
}

impl Default for ActorData {
    fn default() -> Self {
        Self {
            has_vision: true,
            senses: Vec::new(),
            conditions: BTreeSet::new(),
            alliance: Alliance::default(),
            size: SizeCategory::default(),
            dead: false,
            prone: false,
        }
    }
}

impl ActorData {
    /// Returns the first sense of the given kind.
    #[must_use]
    pub fn sense(&self, kind: SenseKind) -> Option<&Sense> {
        self.senses.iter().find(|s| s.kind == kind)
    }

    /// Returns true if the condition is active.
    #[must_use]
    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    /// Builder method to add a sense.
    #[must_use]
    pub fn with_sense(mut self, sense: Sense) -> Self {
        self.senses.push(sense);
        self
    }

    /// Builder method to add a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.insert(condition);
        self
    }

    /// Builder method to set alliance.
    #[must_use]
    pub fn with_alliance(mut self, alliance: Alliance) -> Self {
        self.alliance = alliance;
        self
    }

    /// Builder method to set size.
    #[must_use]
    pub fn with_size(mut self, size: SizeCategory) -> Self {
        self.size = size;
        self
    }
}

// =============================================================================
// Token
// =============================================================================

/// Light emitted by a token, in scene units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightEmission {
    /// Bright radius.
    pub bright: f64,
    /// Dim radius (the full extent of the light).
    pub dim: f64,
    /// True if the token sheds darkness instead of light.
    pub negative: bool,
}

impl LightEmission {
    /// A light with the given bright and dim radii.
    #[must_use]
    pub const fn new(bright: f64, dim: f64) -> Self {
        Self {
            bright,
            dim,
            negative: false,
        }
    }

    /// Returns true if the emission reaches any distance.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.bright > 0.0 || self.dim > 0.0
    }
}

/// A positioned game piece with an owning actor.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token {
    /// Token identity.
    pub id: TokenId,
    /// Footprint on the canvas, in pixels.
    pub bounds: Rect,
    /// Elevation in scene units.
    pub elevation: f64,
    /// Owning actor's data.
    pub actor: ActorData,
    /// Light emitted by the token, if any.
    pub light: Option<LightEmission>,
    /// Set while a sneak-style action is in progress.
    pub concealing: bool,
}

impl Token {
    /// Creates a token at the given footprint with default actor data.
    #[must_use]
    pub fn new(id: impl Into<TokenId>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            bounds,
            elevation: 0.0,
            actor: ActorData::default(),
            light: None,
            concealing: false,
        }
    }

    /// Center of the footprint.
    #[must_use]
    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    /// Builder method to set actor data.
    #[must_use]
    pub fn with_actor(mut self, actor: ActorData) -> Self {
        self.actor = actor;
        self
    }

    /// Builder method to set emitted light.
    #[must_use]
    pub fn with_light(mut self, light: LightEmission) -> Self {
        self.light = Some(light);
        self
    }

    /// Builder method to set elevation.
    #[must_use]
    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    /// Vertical extent `(bottom, top)` in scene units.
    #[must_use]
    pub fn vertical_span(&self) -> (f64, f64) {
        (self.elevation, self.elevation + self.actor.size.height())
    }

    /// The light source this token anchors, if it emits any.
    #[must_use]
    pub fn light_source(&self) -> Option<LightSource> {
        let emission = self.light.filter(LightEmission::is_lit)?;
        Some(LightSource {
            id: LightId::new(format!("token:{}", self.id)),
            position: self.center(),
            bright: emission.bright,
            dim: emission.dim,
            negative: emission.negative,
            hidden: false,
            shape: None,
        })
    }
}
