use crate::host::{ActorHandle, ActorView, HostApi, Observer};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const FOCUS_ON_DELAY: Duration = Duration::from_millis(250);
pub const FOCUS_GRACE: Duration = Duration::from_millis(1500);
pub const MAX_FOCUS_DISTANCE: f32 = 300.0;
pub const LOOK_COS_THRESHOLD: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionState {
    Idle,
    Acquiring { since: Instant, target: ActorHandle },
    Listening { target: ActorHandle },
    Losing { since: Instant, target: ActorHandle },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttentionInputs {
    pub dialogue_open: bool,
    pub voice_open_enabled: bool,
    pub paused: bool,
    pub candidate: Option<ActorHandle>,
}

/// Focus detector with an acquire delay and a loss grace period.
///
/// `update` returns the `LISTEN` value to send, if the tick changed it.
#[derive(Debug)]
pub struct Attention {
    state: AttentionState,
}

impl Default for Attention {
    fn default() -> Self {
        Self::new()
    }
}

impl Attention {
    pub fn new() -> Self {
        Self {
            state: AttentionState::Idle,
        }
    }

    pub fn state(&self) -> AttentionState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(
            self.state,
            AttentionState::Listening { .. } | AttentionState::Losing { .. }
        )
    }

    /// The actor the player was last seen addressing. Cleared only when the
    /// grace period runs out.
    pub fn focus_target(&self) -> Option<ActorHandle> {
        match self.state {
            AttentionState::Idle => None,
            AttentionState::Acquiring { target, .. }
            | AttentionState::Listening { target }
            | AttentionState::Losing { target, .. } => Some(target),
        }
    }

    /// Drops straight to `Idle`, bypassing delay and grace.
    pub fn force_idle(&mut self) -> Option<bool> {
        if self.state == AttentionState::Idle {
            return None;
        }
        self.state = AttentionState::Idle;
        info!(target: "voicelink::attention", "focus reset");
        Some(false)
    }

    pub fn update(&mut self, inputs: AttentionInputs, now: Instant) -> Option<bool> {
        if inputs.dialogue_open || !inputs.voice_open_enabled {
            return self.force_idle();
        }
        if inputs.paused {
            return None;
        }

        let (next, emit) = match (self.state, inputs.candidate) {
            (AttentionState::Idle, None) => (AttentionState::Idle, None),
            (AttentionState::Idle, Some(target)) => {
                debug!(target: "voicelink::attention", actor = target, "focus acquired");
                (AttentionState::Acquiring { since: now, target }, None)
            }
            (AttentionState::Acquiring { since, .. }, Some(target)) => {
                if now.duration_since(since) >= FOCUS_ON_DELAY {
                    info!(target: "voicelink::attention", actor = target, "listening");
                    (AttentionState::Listening { target }, Some(true))
                } else {
                    (AttentionState::Acquiring { since, target }, None)
                }
            }
            (AttentionState::Acquiring { .. }, None) => {
                debug!(target: "voicelink::attention", "focus lost before listening");
                (AttentionState::Idle, None)
            }
            (AttentionState::Listening { .. }, Some(target))
            | (AttentionState::Losing { .. }, Some(target)) => {
                (AttentionState::Listening { target }, None)
            }
            (AttentionState::Listening { target }, None) => {
                debug!(target: "voicelink::attention", actor = target, "focus lost");
                (AttentionState::Losing { since: now, target }, None)
            }
            (AttentionState::Losing { since, target }, None) => {
                if now.duration_since(since) >= FOCUS_GRACE {
                    info!(target: "voicelink::attention", "grace elapsed, stop listening");
                    (AttentionState::Idle, Some(false))
                } else {
                    (AttentionState::Losing { since, target }, None)
                }
            }
        };
        self.state = next;
        emit
    }
}

/// Nearest living, non-hostile actor within `max_distance` whose horizontal
/// direction lies inside the observer's forward cone. On equal distance the
/// first one found wins.
pub fn select_candidate(
    observer: &Observer,
    actors: &[ActorView],
    max_distance: f32,
    cos_threshold: f32,
) -> Option<(ActorHandle, f32)> {
    let look = (observer.yaw.sin(), observer.yaw.cos());
    let mut best: Option<(ActorHandle, f32)> = None;

    for actor in actors {
        if actor.is_observer || actor.dead || actor.hostile {
            continue;
        }
        let dist = observer.position.distance(actor.position);
        if dist > max_distance || dist <= f32::EPSILON {
            continue;
        }
        if best.is_some_and(|(_, best_dist)| dist >= best_dist) {
            continue;
        }
        let dir = (
            (actor.position.x - observer.position.x) / dist,
            (actor.position.y - observer.position.y) / dist,
        );
        if look.0 * dir.0 + look.1 * dir.1 < cos_threshold {
            continue;
        }
        best = Some((actor.handle, dist));
    }
    best
}

pub fn find_candidate(host: &dyn HostApi) -> Option<ActorHandle> {
    let observer = host.observer()?;
    select_candidate(
        &observer,
        &host.nearby_actors(),
        MAX_FOCUS_DISTANCE,
        LOOK_COS_THRESHOLD,
    )
    .map(|(handle, _)| handle)
}

/// The retained focus target is only acted on if it is still alive and in
/// range at the moment the command arrives.
pub fn revalidate_target(host: &dyn HostApi, target: ActorHandle) -> Option<ActorView> {
    let observer = host.observer()?;
    let actor = host.actor(target)?;
    if actor.dead {
        return None;
    }
    let dist = observer.position.distance(actor.position);
    if dist > MAX_FOCUS_DISTANCE {
        debug!(target: "voicelink::attention", actor = target, dist, "focus target out of range");
        return None;
    }
    Some(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Vec3;

    fn inputs(candidate: Option<ActorHandle>) -> AttentionInputs {
        AttentionInputs {
            dialogue_open: false,
            voice_open_enabled: true,
            paused: false,
            candidate,
        }
    }

    fn actor(handle: ActorHandle, x: f32, y: f32) -> ActorView {
        ActorView {
            handle,
            name: format!("npc{handle}"),
            position: Vec3::new(x, y, 0.0),
            dead: false,
            hostile: false,
            is_observer: false,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn held_249ms_never_listens() {
        let t0 = Instant::now();
        let mut a = Attention::new();
        assert_eq!(a.update(inputs(Some(7)), t0), None);
        assert_eq!(a.update(inputs(Some(7)), t0 + ms(249)), None);
        assert_eq!(a.update(inputs(None), t0 + ms(300)), None);
        assert_eq!(a.state(), AttentionState::Idle);
    }

    #[test]
    fn held_251ms_listens_then_grace_expires_once() {
        let t0 = Instant::now();
        let mut a = Attention::new();
        a.update(inputs(Some(7)), t0);
        assert_eq!(a.update(inputs(Some(7)), t0 + ms(251)), Some(true));
        assert_eq!(a.update(inputs(None), t0 + ms(300)), None);
        assert_eq!(a.focus_target(), Some(7));
        assert_eq!(a.update(inputs(None), t0 + ms(1799)), None);
        assert_eq!(a.update(inputs(None), t0 + ms(1800)), Some(false));
        assert_eq!(a.update(inputs(None), t0 + ms(4000)), None);
        assert_eq!(a.focus_target(), None);
    }

    #[test]
    fn reacquired_within_grace_keeps_listening_silently() {
        let t0 = Instant::now();
        let mut a = Attention::new();
        a.update(inputs(Some(7)), t0);
        a.update(inputs(Some(7)), t0 + ms(300));
        a.update(inputs(None), t0 + ms(450));
        assert_eq!(a.update(inputs(Some(9)), t0 + ms(1200)), None);
        assert_eq!(a.state(), AttentionState::Listening { target: 9 });
    }

    #[test]
    fn dialogue_forces_idle_immediately() {
        let t0 = Instant::now();
        let mut a = Attention::new();
        a.update(inputs(Some(7)), t0);
        a.update(inputs(Some(7)), t0 + ms(300));
        let mut open = inputs(Some(7));
        open.dialogue_open = true;
        assert_eq!(a.update(open, t0 + ms(301)), Some(false));
        assert_eq!(a.update(open, t0 + ms(450)), None);
    }

    #[test]
    fn paused_freezes_state() {
        let t0 = Instant::now();
        let mut a = Attention::new();
        a.update(inputs(Some(7)), t0);
        let mut paused = inputs(None);
        paused.paused = true;
        assert_eq!(a.update(paused, t0 + ms(500)), None);
        assert!(matches!(a.state(), AttentionState::Acquiring { .. }));
    }

    #[test]
    fn candidate_is_nearest_inside_cone() {
        let observer = Observer {
            position: Vec3::default(),
            yaw: 0.0,
        };
        let mut hostile = actor(1, 0.0, 50.0);
        hostile.hostile = true;
        let mut dead = actor(2, 0.0, 60.0);
        dead.dead = true;
        let behind = actor(3, 0.0, -40.0);
        let off_axis = actor(4, 100.0, 100.0);
        let far = actor(5, 0.0, 250.0);
        let near = actor(6, 10.0, 120.0);
        let out_of_range = actor(7, 0.0, 301.0);

        let actors = vec![hostile, dead, behind, off_axis, far, near, out_of_range];
        let best = select_candidate(&observer, &actors, MAX_FOCUS_DISTANCE, LOOK_COS_THRESHOLD);
        assert_eq!(best.map(|(h, _)| h), Some(6));
    }

    #[test]
    fn exact_tie_keeps_first_found() {
        let observer = Observer {
            position: Vec3::default(),
            yaw: 0.0,
        };
        let actors = vec![actor(1, 5.0, 100.0), actor(2, -5.0, 100.0)];
        let best = select_candidate(&observer, &actors, MAX_FOCUS_DISTANCE, LOOK_COS_THRESHOLD);
        assert_eq!(best.map(|(h, _)| h), Some(1));
    }
}
