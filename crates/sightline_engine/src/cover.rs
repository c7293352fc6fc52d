//! Cover between two tokens.
//!
//! Walls are evaluated first. If walls yield anything other than no cover,
//! that is the answer and blocking tokens are never considered. Otherwise the
//! filtered blocker set decides. A manual per-pair cover replaces the result
//! last.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sightline_foundation::{CoverState, ErrorContext, Point, Rect, Result, Segment, TokenId};
use sightline_storage::{Alliance, Scene, Token};

// =============================================================================
// Configuration
// =============================================================================

/// How wall and token geometry is sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IntersectionMode {
    /// The center line crossing any blocker counts.
    #[default]
    Any,
    /// Best attacker corner, counting blocked lines to target corners.
    Tactical,
    /// Fraction of sample rays blocked.
    Coverage,
}

/// Which tokens may act as blockers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockerFilter {
    /// Skip tokens the attacker has not detected.
    pub ignore_undetected: bool,
    /// Skip dead tokens.
    pub ignore_dead: bool,
    /// Skip tokens on the attacker's side.
    pub ignore_allies: bool,
    /// Skip prone tokens.
    pub ignore_prone: bool,
    /// Skip tokens entirely above or below the line of attack.
    pub use_elevation: bool,
}

impl Default for BlockerFilter {
    fn default() -> Self {
        Self {
            ignore_undetected: true,
            ignore_dead: true,
            ignore_allies: false,
            ignore_prone: true,
            use_elevation: true,
        }
    }
}

/// Tuning for the cover detector.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverConfig {
    /// Default intersection mode.
    pub mode: IntersectionMode,
    /// Default blocker filter.
    pub filter: BlockerFilter,
    /// Blocked fraction at or above which coverage yields standard.
    pub standard_threshold: f64,
    /// Blocked fraction at or above which coverage yields greater.
    pub greater_threshold: f64,
    /// Sample points per side of the target footprint in coverage mode.
    pub coverage_samples: usize,
    /// Pixels footprints are shrunk by before sampling corners.
    pub corner_inset_px: f64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            mode: IntersectionMode::default(),
            filter: BlockerFilter::default(),
            standard_threshold: 0.5,
            greater_threshold: 0.95,
            coverage_samples: 3,
            corner_inset_px: 1.0,
        }
    }
}

impl CoverConfig {
    /// Builder method to set the intersection mode.
    #[must_use]
    pub fn with_mode(mut self, mode: IntersectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to set the blocker filter.
    #[must_use]
    pub fn with_filter(mut self, filter: BlockerFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Per-call options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverOptions {
    /// Intersection mode.
    pub mode: IntersectionMode,
    /// Blocker filter.
    pub filter: BlockerFilter,
    /// Replaces the computed result when set.
    pub manual_override: Option<CoverState>,
    /// Tokens the attacker has not detected.
    pub undetected: BTreeSet<TokenId>,
}

impl CoverOptions {
    /// Options taken from configuration defaults.
    #[must_use]
    pub fn from_config(config: &CoverConfig) -> Self {
        Self {
            mode: config.mode,
            filter: config.filter,
            ..Self::default()
        }
    }

    /// Builder method to set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: IntersectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to set the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: BlockerFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Builder method to set a manual override.
    #[must_use]
    pub fn with_manual_override(mut self, cover: CoverState) -> Self {
        self.manual_override = Some(cover);
        self
    }

    /// Builder method to mark a token as undetected by the attacker.
    #[must_use]
    pub fn with_undetected(mut self, token: TokenId) -> Self {
        self.undetected.insert(token);
        self
    }
}

// =============================================================================
// Report
// =============================================================================

/// Breakdown of one cover evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverReport {
    /// Cover from walls.
    pub wall: CoverState,
    /// Cover from blocking tokens, `None` when walls decided.
    pub token: CoverState,
    /// Final result.
    pub result: CoverState,
    /// Blockers that survived filtering.
    pub blockers: Vec<TokenId>,
    /// True if a manual override replaced the computed value.
    pub manual: bool,
}

impl CoverReport {
    fn uncovered() -> Self {
        Self {
            wall: CoverState::None,
            token: CoverState::None,
            result: CoverState::None,
            blockers: Vec::new(),
            manual: false,
        }
    }
}

// =============================================================================
// Detector
// =============================================================================

/// Computes cover from wall and blocker geometry.
#[derive(Clone, Debug, Default)]
pub struct CoverDetector {
    config: CoverConfig,
}

impl CoverDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(config: CoverConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    /// Default options for this detector.
    #[must_use]
    pub fn default_options(&self) -> CoverOptions {
        CoverOptions::from_config(&self.config)
    }

    /// Cover of `target` against attacks from `attacker`.
    ///
    /// Never fails: any evaluation error yields no cover.
    #[must_use]
    pub fn detect_between_tokens(
        &self,
        scene: &Scene,
        attacker: &TokenId,
        target: &TokenId,
        options: &CoverOptions,
    ) -> CoverState {
        match self.try_detect(scene, attacker, target, options) {
            Ok(report) => report.result,
            Err(e) => {
                tracing::warn!(%attacker, %target, error = %e, "cover evaluation failed, assuming none");
                CoverState::None
            }
        }
    }

    /// Cover evaluation with a full breakdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene is unusable or a token is missing.
    pub fn try_detect(
        &self,
        scene: &Scene,
        attacker: &TokenId,
        target: &TokenId,
        options: &CoverOptions,
    ) -> Result<CoverReport> {
        if attacker == target {
            return Ok(CoverReport::uncovered());
        }
        let context = || {
            ErrorContext::new()
                .with_operation("detect_cover")
                .with_token(attacker.clone())
                .with_token(target.clone())
        };
        scene.validate().map_err(|e| e.with_context(context()))?;
        let attacker_token = scene.require_token(attacker).map_err(|e| e.with_context(context()))?;
        let target_token = scene.require_token(target).map_err(|e| e.with_context(context()))?;

        let wall = self.wall_cover(scene, attacker_token, target_token, options.mode);
        let (token, blockers) = if wall == CoverState::None {
            let blockers = self.eligible_blockers(scene, attacker_token, target_token, options);
            let token = self.token_cover(attacker_token, target_token, &blockers, options.mode);
            (token, blockers.iter().map(|b| b.id.clone()).collect())
        } else {
            (CoverState::None, Vec::new())
        };

        let computed = combine(wall, token);
        let result = options.manual_override.unwrap_or(computed);
        tracing::trace!(%attacker, %target, %wall, %token, %result, "cover evaluated");
        Ok(CoverReport {
            wall,
            token,
            result,
            blockers,
            manual: options.manual_override.is_some(),
        })
    }

    /// Tokens eligible to block attacks from `attacker` on `target`.
    #[must_use]
    pub fn eligible_blockers<'s>(
        &self,
        scene: &'s Scene,
        attacker: &Token,
        target: &Token,
        options: &CoverOptions,
    ) -> Vec<&'s Token> {
        let lines = self.candidate_lines(attacker, target);
        let filter = options.filter;
        let low = attacker.elevation.min(target.elevation);
        let high = attacker.elevation.max(target.elevation);

        scene
            .tokens()
            .filter(|t| t.id != attacker.id && t.id != target.id)
            .filter(|t| {
                let body = t.bounds.inset(self.config.corner_inset_px);
                lines.iter().any(|line| body.intersects_segment(line))
            })
            .filter(|t| !(filter.ignore_undetected && options.undetected.contains(&t.id)))
            .filter(|t| !(filter.ignore_dead && t.actor.dead))
            .filter(|t| !(filter.ignore_allies && same_side(attacker, t)))
            .filter(|t| !(filter.ignore_prone && t.actor.prone))
            .filter(|t| {
                if !filter.use_elevation {
                    return true;
                }
                let (bottom, top) = t.vertical_span();
                top > low && bottom <= high
            })
            .collect()
    }

    /// Cover from walls alone.
    #[must_use]
    pub fn wall_cover(
        &self,
        scene: &Scene,
        attacker: &Token,
        target: &Token,
        mode: IntersectionMode,
    ) -> CoverState {
        let walls: Vec<Segment> = scene
            .walls()
            .filter(|w| w.provides_cover_now())
            .map(|w| w.segment)
            .collect();
        if walls.is_empty() {
            return CoverState::None;
        }
        let blocked = |line: &Segment| walls.iter().any(|w| w.intersects(line));

        match mode {
            IntersectionMode::Any => {
                if blocked(&Segment::new(attacker.center(), target.center())) {
                    CoverState::Standard
                } else {
                    CoverState::None
                }
            }
            IntersectionMode::Tactical => {
                let from = self.corners(attacker);
                let to = self.corners(target);
                let fewest_blocked = from
                    .iter()
                    .map(|&a| to.iter().filter(|&&b| blocked(&Segment::new(a, b))).count())
                    .min()
                    .unwrap_or(0);
                from_corner_count(fewest_blocked)
            }
            IntersectionMode::Coverage => {
                let rays = self.sample_rays(attacker, target);
                let hits = rays.iter().filter(|&r| blocked(r)).count();
                self.from_fraction(fraction(hits, rays.len()))
            }
        }
    }

    /// Cover from a filtered blocker set.
    ///
    /// Any blocker gives lesser cover; a blocker two or more sizes larger than
    /// the target gives standard. Coverage mode grades by blocked fraction and
    /// reaches greater only behind such a large blocker.
    #[must_use]
    pub fn token_cover(
        &self,
        attacker: &Token,
        target: &Token,
        blockers: &[&Token],
        mode: IntersectionMode,
    ) -> CoverState {
        if blockers.is_empty() {
            return CoverState::None;
        }
        let target_rank = target.actor.size.rank();
        let towering = blockers
            .iter()
            .any(|b| b.actor.size.rank() - target_rank >= 2);

        match mode {
            IntersectionMode::Any | IntersectionMode::Tactical => {
                if towering {
                    CoverState::Standard
                } else {
                    CoverState::Lesser
                }
            }
            IntersectionMode::Coverage => {
                let bodies: Vec<Rect> = blockers
                    .iter()
                    .map(|b| b.bounds.inset(self.config.corner_inset_px))
                    .collect();
                let rays = self.sample_rays(attacker, target);
                let hits = rays
                    .iter()
                    .filter(|&r| bodies.iter().any(|body| body.intersects_segment(r)))
                    .count();
                let graded = self.from_fraction(fraction(hits, rays.len()));
                let cap = if towering {
                    CoverState::Greater
                } else {
                    CoverState::Standard
                };
                graded.min(cap)
            }
        }
    }

    fn corners(&self, token: &Token) -> [Point; 4] {
        token.bounds.inset(self.config.corner_inset_px).corners()
    }

    fn candidate_lines(&self, attacker: &Token, target: &Token) -> Vec<Segment> {
        let from = self.corners(attacker);
        let to = self.corners(target);
        let mut lines = vec![Segment::new(attacker.center(), target.center())];
        lines.extend(from.iter().zip(to.iter()).map(|(&a, &b)| Segment::new(a, b)));
        lines
    }

    /// Rays from the attacker's center to a grid of points across the target.
    #[allow(clippy::cast_precision_loss)]
    fn sample_rays(&self, attacker: &Token, target: &Token) -> Vec<Segment> {
        let n = self.config.coverage_samples.max(1);
        let body = target.bounds.inset(self.config.corner_inset_px);
        let origin = attacker.center();
        let step = |i: usize| {
            if n == 1 {
                0.5
            } else {
                i as f64 / (n - 1) as f64
            }
        };

        let mut rays = Vec::with_capacity(n * n);
        for row in 0..n {
            for col in 0..n {
                let point = Point::new(
                    body.x + body.width * step(col),
                    body.y + body.height * step(row),
                );
                rays.push(Segment::new(origin, point));
            }
        }
        rays
    }

    fn from_fraction(&self, blocked: f64) -> CoverState {
        if blocked <= 0.0 {
            CoverState::None
        } else if blocked < self.config.standard_threshold {
            CoverState::Lesser
        } else if blocked < self.config.greater_threshold {
            CoverState::Standard
        } else {
            CoverState::Greater
        }
    }
}

/// Wall cover wins whenever it is anything but none.
#[must_use]
pub fn combine(wall: CoverState, token: CoverState) -> CoverState {
    if wall == CoverState::None { token } else { wall }
}

fn from_corner_count(blocked: usize) -> CoverState {
    match blocked {
        0 => CoverState::None,
        1 => CoverState::Lesser,
        2 | 3 => CoverState::Standard,
        _ => CoverState::Greater,
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn same_side(attacker: &Token, other: &Token) -> bool {
    attacker.actor.alliance != Alliance::Neutral && attacker.actor.alliance == other.actor.alliance
}
