//! Vision capabilities, line of sight, and the lighting-to-visibility table.

use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{
    Clock, IlluminationLevel, Result, Segment, TokenId, TtlCache, VisibilityState,
};
use sightline_storage::{Condition, Scene, SenseKind, Token};

/// What an actor can perceive, derived from its character data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisionCapability {
    /// Perceives through vision at all.
    pub has_vision: bool,
    /// Sees in darkness.
    pub has_darkvision: bool,
    /// Darkvision range in scene units; `None` is unlimited.
    pub darkvision_range: Option<f64>,
    /// Treats dim light as bright.
    pub has_low_light_vision: bool,
    /// Low-light range in scene units; `None` is unlimited.
    pub low_light_range: Option<f64>,
    /// Perceives invisible creatures.
    pub sees_invisible: bool,
    /// Cannot see.
    pub is_blinded: bool,
    /// Everything appears concealed.
    pub is_dazzled: bool,
}

impl VisionCapability {
    /// Reads capabilities from a token's actor data.
    #[must_use]
    pub fn from_token(token: &Token) -> Self {
        let actor = &token.actor;
        let darkvision = actor
            .sense(SenseKind::GreaterDarkvision)
            .or_else(|| actor.sense(SenseKind::Darkvision));
        let low_light = actor.sense(SenseKind::LowLightVision);

        Self {
            has_vision: actor.has_vision,
            has_darkvision: darkvision.is_some(),
            darkvision_range: darkvision.and_then(|s| s.range),
            has_low_light_vision: low_light.is_some(),
            low_light_range: low_light.and_then(|s| s.range),
            sees_invisible: actor.sense(SenseKind::SeeInvisibility).is_some(),
            is_blinded: actor.has_condition(Condition::Blinded),
            is_dazzled: actor.has_condition(Condition::Dazzled),
        }
    }

    /// Capabilities that still apply to a target `distance` scene units away.
    #[must_use]
    pub fn at_distance(&self, distance: f64) -> Self {
        let in_range = |range: Option<f64>| range.is_none_or(|r| distance <= r);
        Self {
            has_darkvision: self.has_darkvision && in_range(self.darkvision_range),
            has_low_light_vision: self.has_low_light_vision && in_range(self.low_light_range),
            ..self.clone()
        }
    }
}

/// Tuning for the vision analyzer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VisionConfig {
    /// How long a capability profile stays cached.
    pub capability_ttl_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            capability_ttl_ms: 5_000,
        }
    }
}

/// The host's richer visibility test, if it offers one.
pub trait HostVisibility {
    /// Returns true if `observer` can see `target`.
    ///
    /// # Errors
    ///
    /// Any error makes the analyzer fall back to raw wall geometry.
    fn test_visibility(&self, scene: &Scene, observer: &Token, target: &Token) -> Result<bool>;
}

/// Resolves vision capabilities and line of sight.
pub struct VisionAnalyzer {
    config: VisionConfig,
    clock: Rc<dyn Clock>,
    capabilities: TtlCache<TokenId, VisionCapability>,
    host: Option<Box<dyn HostVisibility>>,
}

impl std::fmt::Debug for VisionAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionAnalyzer")
            .field("config", &self.config)
            .field("cached", &self.capabilities.len())
            .field("host", &self.host.is_some())
            .finish_non_exhaustive()
    }
}

impl VisionAnalyzer {
    /// Creates an analyzer using raw geometry for line of sight.
    #[must_use]
    pub fn new(config: VisionConfig, clock: Rc<dyn Clock>) -> Self {
        let capabilities = TtlCache::new(config.capability_ttl_ms);
        Self {
            config,
            clock,
            capabilities,
            host: None,
        }
    }

    /// Builder method to plug in a host visibility test.
    #[must_use]
    pub fn with_host(mut self, host: Box<dyn HostVisibility>) -> Self {
        self.host = Some(host);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Capability profile for a token, served from cache while fresh.
    pub fn capabilities_of(&mut self, token: &Token) -> VisionCapability {
        let now = self.clock.now();
        if let Some(cached) = self.capabilities.get(&token.id, now) {
            return cached.clone();
        }
        let capability = VisionCapability::from_token(token);
        self.capabilities
            .insert(token.id.clone(), capability.clone(), now);
        capability
    }

    /// Drops cached capabilities for one token, or all of them.
    pub fn invalidate_vision_cache(&mut self, token: Option<&TokenId>) {
        match token {
            Some(id) => {
                self.capabilities.invalidate(id);
            }
            None => self.capabilities.clear(),
        }
        tracing::trace!(token = ?token, "vision cache invalidated");
    }

    /// Line of sight between token centers.
    ///
    /// Concealing tokens always use raw wall geometry. Otherwise the host test
    /// is used when present, falling back to raw geometry if it fails.
    #[must_use]
    pub fn has_line_of_sight(&self, scene: &Scene, observer: &Token, target: &Token) -> bool {
        if observer.concealing || target.concealing {
            return Self::raw_line_of_sight(scene, observer, target);
        }
        let Some(host) = &self.host else {
            return Self::raw_line_of_sight(scene, observer, target);
        };
        match host.test_visibility(scene, observer, target) {
            Ok(visible) => visible,
            Err(e) => {
                tracing::debug!(
                    observer = %observer.id,
                    target = %target.id,
                    error = %e,
                    "host visibility test failed, using wall geometry"
                );
                Self::raw_line_of_sight(scene, observer, target)
            }
        }
    }

    /// Straight center-to-center test against sight-blocking walls.
    #[must_use]
    pub fn raw_line_of_sight(scene: &Scene, observer: &Token, target: &Token) -> bool {
        let sight = Segment::new(observer.center(), target.center());
        !scene
            .walls()
            .filter(|w| w.blocks_sight_now())
            .any(|w| w.segment.intersects(&sight))
    }

    /// Visibility under plain lighting rules.
    #[must_use]
    pub fn visibility_from_lighting(
        level: IlluminationLevel,
        capability: &VisionCapability,
    ) -> VisibilityState {
        if capability.is_blinded {
            return VisibilityState::Hidden;
        }
        if capability.is_dazzled {
            return VisibilityState::Concealed;
        }
        match level {
            IlluminationLevel::Bright => VisibilityState::Observed,
            IlluminationLevel::Dim
                if capability.has_low_light_vision || capability.has_darkvision =>
            {
                VisibilityState::Observed
            }
            IlluminationLevel::Dim => VisibilityState::Concealed,
            IlluminationLevel::Darkness if capability.has_darkvision => VisibilityState::Observed,
            IlluminationLevel::Darkness => VisibilityState::Hidden,
        }
    }
}
