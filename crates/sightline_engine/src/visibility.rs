//! Per-direction visibility.
//!
//! Evaluation order for one (observer, target) direction:
//!
//! 1. Same token is always observed
//! 2. Override precedence (point-out, seek, pinned)
//! 3. A blinded observer sees nothing: hidden
//! 4. An observer without vision ignores lighting and line of sight
//! 5. No line of sight: hidden
//! 6. Lighting at the target, with senses limited by range
//! 7. Invisibility collapses the lighting result to hidden or undetected

use std::fmt;
use std::rc::Rc;

use sightline_foundation::{
    Clock, ErrorContext, IlluminationLevel, Result, TokenId, VisibilityState,
};
use sightline_storage::{OverrideSource, Scene, Token};

use crate::invisibility::InvisibilityResolver;
use crate::lighting::{LightingCalculator, LightingConfig};
use crate::overrides::{ManualOverrideDetector, OverrideCheck, OverrideDecision};
use crate::vision::{HostVisibility, VisionAnalyzer, VisionConfig};

/// Which rule decided a visibility result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilityReason {
    /// Observer and target are the same token.
    SameToken,
    /// An override decided or pinned the state.
    Override(OverrideSource),
    /// The observer is blinded.
    Blinded,
    /// The observer does not rely on vision.
    NoVision,
    /// Walls block the line of sight.
    NoLineOfSight,
    /// The target is invisible to the observer.
    Invisible,
    /// Plain lighting rules.
    Lighting(IlluminationLevel),
}

impl fmt::Display for VisibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameToken => f.write_str("same token"),
            Self::Override(source) => write!(f, "{source} override"),
            Self::Blinded => f.write_str("observer blinded"),
            Self::NoVision => f.write_str("observer has no vision"),
            Self::NoLineOfSight => f.write_str("no line of sight"),
            Self::Invisible => f.write_str("target invisible"),
            Self::Lighting(level) => write!(f, "{level} light"),
        }
    }
}

/// A visibility result with the rule that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityOutcome {
    /// The state.
    pub state: VisibilityState,
    /// Why.
    pub reason: VisibilityReason,
}

impl VisibilityOutcome {
    fn new(state: VisibilityState, reason: VisibilityReason) -> Self {
        Self { state, reason }
    }
}

/// Combines lighting, vision, invisibility, and overrides.
#[derive(Debug)]
pub struct VisibilityCalculator {
    lighting: LightingCalculator,
    vision: VisionAnalyzer,
    invisibility: InvisibilityResolver,
}

impl VisibilityCalculator {
    /// Creates a calculator with its own lighting and vision services.
    #[must_use]
    pub fn new(lighting: LightingConfig, vision: VisionConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            lighting: LightingCalculator::new(lighting, Rc::clone(&clock)),
            vision: VisionAnalyzer::new(vision, clock),
            invisibility: InvisibilityResolver::new(),
        }
    }

    /// Builder method to plug in a host visibility test.
    #[must_use]
    pub fn with_host(mut self, host: Box<dyn HostVisibility>) -> Self {
        self.vision = self.vision.with_host(host);
        self
    }

    /// The lighting service.
    pub fn lighting(&mut self) -> &mut LightingCalculator {
        &mut self.lighting
    }

    /// The vision service.
    pub fn vision(&mut self) -> &mut VisionAnalyzer {
        &mut self.vision
    }

    /// The invisibility rules.
    #[must_use]
    pub fn invisibility(&self) -> &InvisibilityResolver {
        &self.invisibility
    }

    /// Visibility of `target` to `observer`, honoring `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if either token is missing or lighting cannot be
    /// evaluated for this scene.
    pub fn calculate(
        &mut self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
        overrides: &OverrideCheck,
    ) -> Result<VisibilityOutcome> {
        if observer == target {
            return Ok(VisibilityOutcome::new(
                VisibilityState::Observed,
                VisibilityReason::SameToken,
            ));
        }
        let context = || {
            ErrorContext::new()
                .with_operation("calculate_visibility")
                .with_token(observer.clone())
                .with_token(target.clone())
        };
        let observer = scene.require_token(observer).map_err(|e| e.with_context(context()))?;
        let target = scene.require_token(target).map_err(|e| e.with_context(context()))?;

        let invisible = self.invisibility.is_invisible_to(observer, target);
        match ManualOverrideDetector::decide(overrides, invisible) {
            OverrideDecision::Continue => {}
            OverrideDecision::Return(state, source) => {
                return Ok(VisibilityOutcome::new(state, VisibilityReason::Override(source)));
            }
            OverrideDecision::Pinned(state, source) => {
                let state = if invisible {
                    self.invisibility
                        .resolve_invisibility_state(observer, target, |_, _| Some(state), false)
                } else {
                    state
                };
                return Ok(VisibilityOutcome::new(state, VisibilityReason::Override(source)));
            }
        }

        self.automatic(scene, observer, target, invisible)
            .map_err(|e| e.with_context(context()))
    }

    /// Visibility ignoring every override.
    ///
    /// # Errors
    ///
    /// See [`VisibilityCalculator::calculate`].
    pub fn automatic_visibility(
        &mut self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
    ) -> Result<VisibilityOutcome> {
        self.calculate(scene, observer, target, &OverrideCheck::none())
    }

    /// Line-of-sight-only approximation used when lighting is unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error if either token is missing.
    pub fn approximate(
        &self,
        scene: &Scene,
        observer: &TokenId,
        target: &TokenId,
    ) -> Result<VisibilityState> {
        if observer == target {
            return Ok(VisibilityState::Observed);
        }
        let observer = scene.require_token(observer)?;
        let target = scene.require_token(target)?;
        if VisionAnalyzer::raw_line_of_sight(scene, observer, target) {
            Ok(VisibilityState::Observed)
        } else {
            Ok(VisibilityState::Hidden)
        }
    }

    fn automatic(
        &mut self,
        scene: &Scene,
        observer: &Token,
        target: &Token,
        invisible: bool,
    ) -> Result<VisibilityOutcome> {
        let capability = self.vision.capabilities_of(observer);

        if capability.is_blinded {
            return Ok(VisibilityOutcome::new(
                VisibilityState::Hidden,
                VisibilityReason::Blinded,
            ));
        }

        if !capability.has_vision {
            if invisible {
                let state = self.invisibility.resolve_invisibility_state(
                    observer,
                    target,
                    |_, _| None,
                    true,
                );
                return Ok(VisibilityOutcome::new(state, VisibilityReason::Invisible));
            }
            return Ok(VisibilityOutcome::new(
                VisibilityState::Observed,
                VisibilityReason::NoVision,
            ));
        }

        if !self.vision.has_line_of_sight(scene, observer, target) {
            return Ok(VisibilityOutcome::new(
                VisibilityState::Hidden,
                VisibilityReason::NoLineOfSight,
            ));
        }

        let illumination = self.lighting.illumination_for_token(scene, target)?;
        let distance = observer.center().distance(target.center()) / scene.grid.pixels_per_unit()?;
        let in_range = capability.at_distance(distance);
        let normal = VisionAnalyzer::visibility_from_lighting(illumination.level, &in_range);

        if invisible {
            let state = self.invisibility.resolve_invisibility_state(
                observer,
                target,
                |_, _| None,
                normal == VisibilityState::Observed,
            );
            return Ok(VisibilityOutcome::new(state, VisibilityReason::Invisible));
        }

        Ok(VisibilityOutcome::new(
            normal,
            VisibilityReason::Lighting(illumination.level),
        ))
    }
}
