//! Illumination at a point.
//!
//! Evaluation order:
//! 1. Effective darkness from the first region with a darkness override
//!    containing the point, else scene darkness
//! 2. Base illumination from global light
//! 3. Scene light sources, then token-emitted light
//!
//! A darkness source covering the point wins outright and short-circuits the
//! scan. Otherwise the brightest band reached decides the level.

use std::rc::Rc;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{
    Clock, Error, ErrorContext, IlluminationLevel, LightId, Point, Result, TtlCache,
};
use sightline_storage::{LightSource, Scene, Token};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for the lighting calculator.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightingConfig {
    /// How long the token-light scan stays valid.
    pub token_light_ttl_ms: u64,
    /// Base illumination at or above this is bright.
    pub bright_threshold: f64,
    /// Base illumination at or above this is dim.
    pub dim_threshold: f64,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            token_light_ttl_ms: 250,
            bright_threshold: 0.75,
            dim_threshold: 0.25,
        }
    }
}

impl LightingConfig {
    /// Builder method to set the token-light cache TTL.
    #[must_use]
    pub fn with_token_light_ttl(mut self, ttl_ms: u64) -> Self {
        self.token_light_ttl_ms = ttl_ms;
        self
    }

    /// Builder method to set the base-illumination thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, bright: f64, dim: f64) -> Self {
        self.bright_threshold = bright;
        self.dim_threshold = dim;
        self
    }

    /// Categorizes a numeric illumination value.
    #[must_use]
    pub fn level_for(&self, numeric: f64) -> IlluminationLevel {
        if numeric >= self.bright_threshold {
            IlluminationLevel::Bright
        } else if numeric >= self.dim_threshold {
            IlluminationLevel::Dim
        } else {
            IlluminationLevel::Darkness
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// Illumination at a point.
#[derive(Clone, Debug, PartialEq)]
pub struct Illumination {
    /// Categorical level.
    pub level: IlluminationLevel,
    /// Numeric illumination in `[0, 1]`.
    pub numeric: f64,
    /// The darkness source that forced the result, if any.
    pub forced_by: Option<LightId>,
}

impl Illumination {
    fn forced_dark(by: LightId) -> Self {
        Self {
            level: IlluminationLevel::Darkness,
            numeric: 0.0,
            forced_by: Some(by),
        }
    }
}

/// Which band of a source a point falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Band {
    Outside,
    Dim,
    Bright,
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes illumination at points of a scene.
pub struct LightingCalculator {
    config: LightingConfig,
    clock: Rc<dyn Clock>,
    token_lights: TtlCache<(), Arc<Vec<LightSource>>>,
}

impl std::fmt::Debug for LightingCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightingCalculator")
            .field("config", &self.config)
            .field("cached_token_lights", &!self.token_lights.is_empty())
            .finish_non_exhaustive()
    }
}

impl LightingCalculator {
    /// Creates a calculator.
    #[must_use]
    pub fn new(config: LightingConfig, clock: Rc<dyn Clock>) -> Self {
        let token_lights = TtlCache::new(config.token_light_ttl_ms);
        Self {
            config,
            clock,
            token_lights,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// Drops the token-light scan. Call whenever any token's emission changes.
    pub fn invalidate_light_cache(&mut self) {
        self.token_lights.clear();
        tracing::trace!("token light cache invalidated");
    }

    /// Light sources anchored to tokens, rescanned at most once per TTL.
    pub fn token_light_sources(&mut self, scene: &Scene) -> Arc<Vec<LightSource>> {
        let now = self.clock.now();
        let scanned = self.token_lights.get_or_try_insert_with((), now, || {
            let lights: Vec<LightSource> = scene.tokens().filter_map(Token::light_source).collect();
            tracing::trace!(count = lights.len(), "rescanned token lights");
            Ok::<_, Error>(Arc::new(lights))
        });
        match scanned {
            Ok(lights) => Arc::clone(lights),
            Err(_) => Arc::new(Vec::new()),
        }
    }

    /// Darkness level in effect at a point.
    ///
    /// The first region with a darkness override that contains the point
    /// decides; regions whose shape cannot be evaluated are skipped.
    #[must_use]
    pub fn effective_darkness(scene: &Scene, point: Point) -> f64 {
        for region in scene.regions() {
            let Some(darkness) = region.darkness else {
                continue;
            };
            match region.shape.contains(point) {
                Ok(true) => return darkness.apply(scene.darkness),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(region = %region.id, error = %e, "skipping unreadable region");
                }
            }
        }
        scene.darkness.clamp(0.0, 1.0)
    }

    /// Illumination at a point.
    ///
    /// # Errors
    ///
    /// Returns an error if scene-wide settings are unusable. Per-source shape
    /// failures fall back to the radius test and never surface.
    pub fn illumination_at(&mut self, scene: &Scene, point: Point) -> Result<Illumination> {
        scene
            .validate()
            .map_err(|e| e.with_context(ErrorContext::new().with_operation("illumination_at")))?;
        if !point.is_finite() {
            return Err(Error::invalid_geometry("illumination query at non-finite point"));
        }
        let pixels_per_unit = scene.grid.pixels_per_unit()?;

        let base = if scene.global_illumination {
            1.0 - Self::effective_darkness(scene, point)
        } else {
            0.0
        };
        let mut numeric = base;
        let mut level = self.config.level_for(base);

        let token_lights = self.token_light_sources(scene);
        for light in scene.lights().chain(token_lights.iter()) {
            if light.hidden && !light.negative {
                continue;
            }
            let band = Self::band_at(light, point, pixels_per_unit);
            if band == Band::Outside {
                continue;
            }
            if light.negative {
                tracing::trace!(source = %light.id, "darkness source forces darkness");
                return Ok(Illumination::forced_dark(light.id.clone()));
            }
            match band {
                Band::Bright => {
                    level = IlluminationLevel::Bright;
                    numeric = 1.0;
                }
                Band::Dim => {
                    level = level.max(IlluminationLevel::Dim);
                    numeric = numeric.max(0.5);
                }
                Band::Outside => {}
            }
        }

        Ok(Illumination {
            level,
            numeric,
            forced_by: None,
        })
    }

    /// Illumination at a token's center.
    ///
    /// # Errors
    ///
    /// See [`LightingCalculator::illumination_at`].
    pub fn illumination_for_token(&mut self, scene: &Scene, token: &Token) -> Result<Illumination> {
        self.illumination_at(scene, token.center())
    }

    fn band_at(light: &LightSource, point: Point, pixels_per_unit: f64) -> Band {
        let radial = Self::radial_band(light, point, pixels_per_unit);
        let Some(shape) = &light.shape else {
            return radial;
        };
        match shape.contains(point) {
            // Inside the precise area the radius only picks the band.
            Ok(true) if radial == Band::Bright => Band::Bright,
            Ok(true) => Band::Dim,
            Ok(false) => Band::Outside,
            Err(e) => {
                tracing::debug!(source = %light.id, error = %e, "light shape unusable, using radius");
                radial
            }
        }
    }

    fn radial_band(light: &LightSource, point: Point, pixels_per_unit: f64) -> Band {
        let distance_sq = light.position.distance_squared(point);
        let bright_px = light.bright.max(0.0) * pixels_per_unit;
        let dim_px = light.dim.max(light.bright).max(0.0) * pixels_per_unit;

        if light.bright > 0.0 && distance_sq <= bright_px * bright_px {
            Band::Bright
        } else if dim_px > 0.0 && distance_sq <= dim_px * dim_px {
            Band::Dim
        } else {
            Band::Outside
        }
    }
}
