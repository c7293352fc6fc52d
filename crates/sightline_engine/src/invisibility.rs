//! Invisibility rules.
//!
//! An invisible target is never observed. It collapses to hidden when the
//! observer could otherwise perceive it normally, and stays undetected
//! otherwise. A pinned sneak result for the exact direction takes precedence.

use sightline_foundation::VisibilityState;
use sightline_storage::{Condition, SenseKind, Token};

/// Resolves what invisibility does to a relationship.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvisibilityResolver;

impl InvisibilityResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns true if `target` is invisible and `observer` has no sense
    /// that pierces it.
    #[must_use]
    pub fn is_invisible_to(&self, observer: &Token, target: &Token) -> bool {
        target.actor.has_condition(Condition::Invisible)
            && observer.actor.sense(SenseKind::SeeInvisibility).is_none()
    }

    /// State an invisible target collapses to.
    ///
    /// `sneak_override` is only consulted for the observer-to-target
    /// direction; a pinned state is honored but can never make the target
    /// more detectable than hidden.
    pub fn resolve_invisibility_state(
        &self,
        observer: &Token,
        target: &Token,
        sneak_override: impl FnOnce(&Token, &Token) -> Option<VisibilityState>,
        can_see_normally: bool,
    ) -> VisibilityState {
        if let Some(pinned) = sneak_override(observer, target) {
            let state = pinned.min(VisibilityState::Hidden);
            tracing::trace!(
                observer = %observer.id,
                target = %target.id,
                %state,
                "invisible target pinned by sneak"
            );
            return state;
        }
        if can_see_normally {
            VisibilityState::Hidden
        } else {
            VisibilityState::Undetected
        }
    }
}
