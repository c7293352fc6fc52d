//! World-change events and the hub that routes them.
//!
//! The host publishes events into an [`EventHub`]. Subscribers register for
//! the kinds they care about and drain their own queue; events of other kinds
//! are never queued for them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use sightline_foundation::{
    CoverState, LightId, Millis, Point, RegionId, TokenId, VisibilityState, WallId,
};
use sightline_storage::{OverrideRecord, OverrideSource};

// =============================================================================
// Narrative actions
// =============================================================================

/// Narrative actions whose results pin relationships.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Seek.
    Seek,
    /// Hide.
    Hide,
    /// Sneak.
    Sneak,
    /// Point Out.
    PointOut,
    /// A hand edit of the relationship.
    ManualEdit,
    /// Clears whatever override exists for the pair.
    Cleared,
}

impl ActionKind {
    /// The override source this action creates, if it creates one.
    #[must_use]
    pub fn source(self) -> Option<OverrideSource> {
        match self {
            Self::Seek => Some(OverrideSource::Seek),
            Self::Hide => Some(OverrideSource::Hide),
            Self::Sneak => Some(OverrideSource::Sneak),
            Self::PointOut => Some(OverrideSource::PointOut),
            Self::ManualEdit => Some(OverrideSource::ManualEdit),
            Self::Cleared => None,
        }
    }
}

/// The result of a narrative action for one direction of a pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Which action.
    pub action: ActionKind,
    /// The perceiving token.
    pub observer: TokenId,
    /// The perceived token.
    pub target: TokenId,
    /// Resulting visibility.
    pub state: VisibilityState,
    /// Resulting cover, if the action fixes one.
    pub cover: Option<CoverState>,
    /// How long the result holds, if not indefinitely.
    pub duration_ms: Option<u64>,
    /// The result holds only while the target keeps cover.
    pub requires_cover: bool,
    /// The result holds only while the target stays concealed.
    pub requires_concealment: bool,
}

impl ActionOutcome {
    /// An outcome with no cover, duration, or requirements.
    #[must_use]
    pub fn new(
        action: ActionKind,
        observer: impl Into<TokenId>,
        target: impl Into<TokenId>,
        state: VisibilityState,
    ) -> Self {
        Self {
            action,
            observer: observer.into(),
            target: target.into(),
            state,
            cover: None,
            duration_ms: None,
            requires_cover: false,
            requires_concealment: false,
        }
    }

    /// Builder method to pin cover.
    #[must_use]
    pub fn with_cover(mut self, cover: CoverState) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Builder method to limit the duration.
    #[must_use]
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    /// Builder method to set validation requirements.
    #[must_use]
    pub fn requiring(mut self, cover: bool, concealment: bool) -> Self {
        self.requires_cover = cover;
        self.requires_concealment = concealment;
        self
    }

    /// The override record this outcome creates at `now`, if any.
    #[must_use]
    pub fn to_record(&self, now: Millis) -> Option<OverrideRecord> {
        let source = self.action.source()?;
        let mut record = OverrideRecord::new(
            self.observer.clone(),
            self.target.clone(),
            source,
            self.state,
            now,
        )
        .with_requirements(self.requires_cover, self.requires_concealment);
        if let Some(cover) = self.cover {
            record = record.with_cover(cover);
        }
        if let Some(duration) = self.duration_ms {
            record = record.with_expiry(now + duration);
        }
        Some(record)
    }
}

// =============================================================================
// World events
// =============================================================================

/// How a scene object changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Added.
    Created,
    /// Edited.
    Updated,
    /// Removed.
    Deleted,
}

/// Coarse event categories used for subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Token movement, creation, deletion, or light.
    Token,
    /// Scene light sources.
    Light,
    /// Walls.
    Wall,
    /// Regions.
    Region,
    /// Scene-wide settings.
    Scene,
    /// Actor data.
    Actor,
    /// Blocking configuration dialogs.
    ConfigDialog,
    /// Narrative action results.
    Action,
}

impl EventKind {
    /// Every kind.
    pub const ALL: [EventKind; 8] = [
        Self::Token,
        Self::Light,
        Self::Wall,
        Self::Region,
        Self::Scene,
        Self::Actor,
        Self::ConfigDialog,
        Self::Action,
    ];
}

/// Something changed in the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A token moved. Positions are footprint centers.
    TokenMoved {
        /// The token.
        id: TokenId,
        /// Where it was.
        from: Point,
        /// Where it is now.
        to: Point,
    },
    /// A token was placed.
    TokenCreated(TokenId),
    /// A token was removed.
    TokenDeleted(TokenId),
    /// A token's emitted light changed.
    TokenLightChanged(TokenId),
    /// A scene light changed.
    LightChanged {
        /// The light.
        id: LightId,
        /// How.
        change: ChangeKind,
    },
    /// A wall changed.
    WallChanged {
        /// The wall.
        id: WallId,
        /// How.
        change: ChangeKind,
    },
    /// A region changed.
    RegionChanged {
        /// The region.
        id: RegionId,
        /// How.
        change: ChangeKind,
    },
    /// Scene darkness changed.
    SceneDarknessChanged,
    /// Grid or global illumination changed.
    SceneConfigChanged,
    /// An actor's conditions or senses changed.
    ActorChanged(TokenId),
    /// A blocking configuration dialog opened.
    ConfigDialogOpened(String),
    /// A blocking configuration dialog closed.
    ConfigDialogClosed(String),
    /// A narrative action resolved.
    Action(ActionOutcome),
}

impl WorldEvent {
    /// The event's category.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TokenMoved { .. }
            | Self::TokenCreated(_)
            | Self::TokenDeleted(_)
            | Self::TokenLightChanged(_) => EventKind::Token,
            Self::LightChanged { .. } => EventKind::Light,
            Self::WallChanged { .. } => EventKind::Wall,
            Self::RegionChanged { .. } => EventKind::Region,
            Self::SceneDarknessChanged | Self::SceneConfigChanged => EventKind::Scene,
            Self::ActorChanged(_) => EventKind::Actor,
            Self::ConfigDialogOpened(_) | Self::ConfigDialogClosed(_) => EventKind::ConfigDialog,
            Self::Action(_) => EventKind::Action,
        }
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Handle for one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone, Debug)]
struct Subscription {
    kinds: BTreeSet<EventKind>,
    queue: VecDeque<WorldEvent>,
}

/// Routes published events to per-subscriber queues.
#[derive(Clone, Debug, Default)]
pub struct EventHub {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_id: u64,
}

impl EventHub {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the given kinds.
    pub fn subscribe(&mut self, kinds: impl IntoIterator<Item = EventKind>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(
            id,
            Subscription {
                kinds: kinds.into_iter().collect(),
                queue: VecDeque::new(),
            },
        );
        id
    }

    /// Drops a subscription and anything still queued for it.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Queues an event for every interested subscriber.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&mut self, event: WorldEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for subscription in self.subscriptions.values_mut() {
            if subscription.kinds.contains(&kind) {
                subscription.queue.push_back(event.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Removes and returns every event queued for a subscriber, oldest first.
    pub fn drain(&mut self, id: SubscriptionId) -> Vec<WorldEvent> {
        self.subscriptions
            .get_mut(&id)
            .map(|s| s.queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Events waiting for a subscriber.
    #[must_use]
    pub fn pending(&self, id: SubscriptionId) -> usize {
        self.subscriptions.get(&id).map_or(0, |s| s.queue.len())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}
