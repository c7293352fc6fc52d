//! Scene snapshots with structural sharing.
//!
//! The `Scene` is the engine's read model of the host scene. It uses
//! persistent data structures so snapshots are O(1) to clone; every mutation
//! returns a new scene and leaves the old one untouched.

use im::{OrdMap, Vector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{
    Error, LightId, Point, Polygon, RegionId, Result, Segment, TokenId, WallId,
};

use crate::token::Token;

// =============================================================================
// Grid
// =============================================================================

/// Grid geometry used to convert scene units to canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridConfig {
    /// Size of one grid square in pixels.
    pub size_px: f64,
    /// Size of one grid square in scene units (feet).
    pub distance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size_px: 100.0,
            distance: 5.0,
        }
    }
}

impl GridConfig {
    /// Pixels per scene unit.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is not a positive finite number.
    pub fn pixels_per_unit(&self) -> Result<f64> {
        if !(self.size_px.is_finite() && self.size_px > 0.0) {
            return Err(Error::invalid_scene(format!(
                "grid size must be positive, got {}",
                self.size_px
            )));
        }
        if !(self.distance.is_finite() && self.distance > 0.0) {
            return Err(Error::invalid_scene(format!(
                "grid distance must be positive, got {}",
                self.distance
            )));
        }
        Ok(self.size_px / self.distance)
    }
}

// =============================================================================
// Light sources
// =============================================================================

/// A scene light or darkness source. Radii are in scene units.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightSource {
    /// Source identity.
    pub id: LightId,
    /// Position on the canvas.
    pub position: Point,
    /// Bright radius.
    pub bright: f64,
    /// Dim radius (the full extent of the source).
    pub dim: f64,
    /// True if the source imposes darkness.
    pub negative: bool,
    /// Hidden sources shed no light, but hidden darkness still applies.
    pub hidden: bool,
    /// Precise illuminated area after wall occlusion, when the host provides it.
    pub shape: Option<Polygon>,
}

impl LightSource {
    /// Creates an illuminating source.
    #[must_use]
    pub fn new(id: impl Into<LightId>, position: Point, bright: f64, dim: f64) -> Self {
        Self {
            id: id.into(),
            position,
            bright,
            dim,
            negative: false,
            hidden: false,
            shape: None,
        }
    }

    /// Creates a darkness-imposing source.
    #[must_use]
    pub fn darkness(id: impl Into<LightId>, position: Point, bright: f64, dim: f64) -> Self {
        Self {
            negative: true,
            ..Self::new(id, position, bright, dim)
        }
    }

    /// Builder method to attach a precise shape.
    #[must_use]
    pub fn with_shape(mut self, shape: Polygon) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Builder method to set the hidden flag.
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

// =============================================================================
// Regions
// =============================================================================

/// How a region's darkness value combines with scene darkness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DarknessMode {
    /// Replace scene darkness.
    Absolute,
    /// Add to scene darkness.
    Additive,
    /// Multiply scene darkness.
    Multiplicative,
}

/// A darkness-level override carried by a region.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DarknessOverride {
    /// Combination mode.
    pub mode: DarknessMode,
    /// Override value.
    pub value: f64,
}

impl DarknessOverride {
    /// Applies the override to a scene darkness level, clamped to `[0, 1]`.
    #[must_use]
    pub fn apply(&self, scene_darkness: f64) -> f64 {
        let raw = match self.mode {
            DarknessMode::Absolute => self.value,
            DarknessMode::Additive => scene_darkness + self.value,
            DarknessMode::Multiplicative => scene_darkness * self.value,
        };
        raw.clamp(0.0, 1.0)
    }
}

/// A 2-D area of the scene.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Region identity.
    pub id: RegionId,
    /// Area covered.
    pub shape: Polygon,
    /// Optional darkness override.
    pub darkness: Option<DarknessOverride>,
}

impl Region {
    /// Creates a region with a darkness override.
    #[must_use]
    pub fn with_darkness(
        id: impl Into<RegionId>,
        shape: Polygon,
        mode: DarknessMode,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            shape,
            darkness: Some(DarknessOverride { mode, value }),
        }
    }
}

// =============================================================================
// Walls
// =============================================================================

/// Door state of a wall segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DoorState {
    /// Not a door.
    #[default]
    None,
    /// Closed door.
    Closed,
    /// Open door; blocks nothing.
    Open,
    /// Locked door.
    Locked,
}

/// A wall segment.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wall {
    /// Wall identity.
    pub id: WallId,
    /// Geometry.
    pub segment: Segment,
    /// Blocks sight.
    pub blocks_sight: bool,
    /// Blocks movement and therefore grants cover.
    pub provides_cover: bool,
    /// Door state.
    pub door: DoorState,
}

impl Wall {
    /// Creates a solid wall that blocks sight and grants cover.
    #[must_use]
    pub fn solid(id: impl Into<WallId>, a: Point, b: Point) -> Self {
        Self {
            id: id.into(),
            segment: Segment::new(a, b),
            blocks_sight: true,
            provides_cover: true,
            door: DoorState::None,
        }
    }

    /// Builder method to set the door state.
    #[must_use]
    pub fn with_door(mut self, door: DoorState) -> Self {
        self.door = door;
        self
    }

    /// Returns true if the wall currently blocks sight.
    #[must_use]
    pub fn blocks_sight_now(&self) -> bool {
        self.blocks_sight && self.door != DoorState::Open
    }

    /// Returns true if the wall currently grants cover.
    #[must_use]
    pub fn provides_cover_now(&self) -> bool {
        self.provides_cover && self.door != DoorState::Open
    }
}

// =============================================================================
// Scene
// =============================================================================

/// Immutable scene snapshot.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scene {
    /// Global darkness level in `[0, 1]`.
    pub darkness: f64,
    /// Whether global illumination is enabled.
    pub global_illumination: bool,
    /// Grid geometry.
    pub grid: GridConfig,
    tokens: OrdMap<TokenId, Token>,
    lights: OrdMap<LightId, LightSource>,
    walls: OrdMap<WallId, Wall>,
    regions: Vector<Region>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}

impl Scene {
    /// Creates an empty, fully lit scene.
    #[must_use]
    pub fn new(grid: GridConfig) -> Self {
        Self {
            darkness: 0.0,
            global_illumination: true,
            grid,
            tokens: OrdMap::new(),
            lights: OrdMap::new(),
            walls: OrdMap::new(),
            regions: Vector::new(),
        }
    }

    /// Checks scene-wide settings are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if darkness is not finite or the grid is invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.darkness.is_finite() {
            return Err(Error::invalid_scene(format!(
                "darkness must be finite, got {}",
                self.darkness
            )));
        }
        for region in &self.regions {
            if let Some(darkness) = region.darkness {
                if !darkness.value.is_finite() {
                    return Err(Error::invalid_scene(format!(
                        "region '{}' darkness override must be finite, got {}",
                        region.id, darkness.value
                    )));
                }
            }
        }
        self.grid.pixels_per_unit().map(|_| ())
    }

    /// Returns a copy with a new darkness level.
    #[must_use]
    pub fn with_darkness(&self, darkness: f64) -> Scene {
        let mut next = self.clone();
        next.darkness = darkness;
        next
    }

    /// Returns a copy with global illumination toggled.
    #[must_use]
    pub fn with_global_illumination(&self, enabled: bool) -> Scene {
        let mut next = self.clone();
        next.global_illumination = enabled;
        next
    }

    // --- tokens ---

    /// Returns a copy with the token inserted or replaced.
    #[must_use]
    pub fn with_token(&self, token: Token) -> Scene {
        let mut next = self.clone();
        next.tokens.insert(token.id.clone(), token);
        next
    }

    /// Returns a copy without the token.
    #[must_use]
    pub fn without_token(&self, id: &TokenId) -> Scene {
        let mut next = self.clone();
        next.tokens.remove(id);
        next
    }

    /// Looks up a token.
    #[must_use]
    pub fn token(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Looks up a token, failing if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not in the scene.
    pub fn require_token(&self, id: &TokenId) -> Result<&Token> {
        self.token(id)
            .ok_or_else(|| Error::token_not_found(id.clone()))
    }

    /// Iterates tokens in id order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> + '_ {
        self.tokens.values()
    }

    /// Number of tokens.
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Moves a token so its footprint's top-left corner is at `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not in the scene.
    pub fn move_token(&self, id: &TokenId, to: Point) -> Result<Scene> {
        let mut token = self.require_token(id)?.clone();
        token.bounds.x = to.x;
        token.bounds.y = to.y;
        Ok(self.with_token(token))
    }

    /// Sets the concealing flag, the one token field the engine writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not in the scene.
    pub fn set_concealing(&self, id: &TokenId, concealing: bool) -> Result<Scene> {
        let mut token = self.require_token(id)?.clone();
        token.concealing = concealing;
        Ok(self.with_token(token))
    }

    // --- lights ---

    /// Returns a copy with the light inserted or replaced.
    #[must_use]
    pub fn with_light(&self, light: LightSource) -> Scene {
        let mut next = self.clone();
        next.lights.insert(light.id.clone(), light);
        next
    }

    /// Returns a copy without the light.
    #[must_use]
    pub fn without_light(&self, id: &LightId) -> Scene {
        let mut next = self.clone();
        next.lights.remove(id);
        next
    }

    /// Iterates scene lights in id order. Token lights are not included.
    pub fn lights(&self) -> impl Iterator<Item = &LightSource> + '_ {
        self.lights.values()
    }

    // --- walls ---

    /// Returns a copy with the wall inserted or replaced.
    #[must_use]
    pub fn with_wall(&self, wall: Wall) -> Scene {
        let mut next = self.clone();
        next.walls.insert(wall.id.clone(), wall);
        next
    }

    /// Returns a copy without the wall.
    #[must_use]
    pub fn without_wall(&self, id: &WallId) -> Scene {
        let mut next = self.clone();
        next.walls.remove(id);
        next
    }

    /// Iterates walls in id order.
    pub fn walls(&self) -> impl Iterator<Item = &Wall> + '_ {
        self.walls.values()
    }

    // --- regions ---

    /// Returns a copy with the region appended, or replaced in place if a
    /// region with the same id exists.
    #[must_use]
    pub fn with_region(&self, region: Region) -> Scene {
        let mut next = self.clone();
        if let Some(index) = next.regions.iter().position(|r| r.id == region.id) {
            next.regions.set(index, region);
        } else {
            next.regions.push_back(region);
        }
        next
    }

    /// Returns a copy without the region.
    #[must_use]
    pub fn without_region(&self, id: &RegionId) -> Scene {
        let mut next = self.clone();
        next.regions.retain(|r| &r.id != id);
        next
    }

    /// Iterates regions in priority order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter()
    }
}
