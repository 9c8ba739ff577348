use crate::actions;
use crate::attention::{find_candidate, AttentionInputs};
use crate::client::{schedule_scan, Shared};
use crate::host::HostContext;
use crate::protocol::{ConnectionTransition, InboundEvent, Trigger, CLOSE_REQUEST_INDEX};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lets the dialogue menu settle before a selection is applied.
pub const SELECT_SETTLE_DELAY: Duration = Duration::from_millis(120);

/// One poll tick: attention, at most one inbound event, at most one
/// connection transition, then the dialogue option list.
pub(crate) fn tick(shared: &Arc<Shared>, now: Instant) {
    update_attention(shared, now);

    if let Some(event) = shared.inbound.pop() {
        route_event(shared, event);
    }

    if let Some(transition) = shared.transitions.take() {
        on_transition(shared, transition);
    }

    if shared.is_dialogue_open() {
        refresh_dialogue_options(shared);
    }
}

fn update_attention(shared: &Shared, now: Instant) {
    let settings = shared.settings.get();
    let dialogue_open = shared.is_dialogue_open();
    let paused = shared.host.is_paused();
    let wants_candidate =
        shared.is_game_loaded() && settings.enable_voice_open && !dialogue_open && !paused;
    let candidate = if wants_candidate {
        find_candidate(shared.host.as_ref())
    } else {
        None
    };

    let inputs = AttentionInputs {
        dialogue_open,
        voice_open_enabled: settings.enable_voice_open,
        paused,
        candidate,
    };
    if let Some(on) = shared.attention().update(inputs, now) {
        shared.sync.push_listen(on);
    }
}

fn route_event(shared: &Arc<Shared>, event: InboundEvent) {
    match event {
        InboundEvent::Result { index, score } => on_result(shared, index, score),
        InboundEvent::Trigger(trigger) => on_trigger(shared, trigger),
        InboundEvent::DebugText { text } => shared.notify(&text),
        // Status lines are logged and dropped by the connection thread.
        InboundEvent::RawStatus { .. } => {}
    }
}

fn on_trigger(shared: &Arc<Shared>, trigger: Trigger) {
    let outcome = match trigger {
        Trigger::Open { .. } => {
            actions::open(shared);
            Ok(())
        }
        Trigger::Shout {
            plugin,
            form_id,
            power,
            ..
        } => actions::shout(shared, &plugin, &form_id, power),
        Trigger::Power { form_id, .. } => actions::power(shared, &form_id),
        Trigger::Item { item, form_id, .. } => actions::item(shared, item, &form_id),
        Trigger::Other { name, .. } => {
            debug!(target: "voicelink::dispatch", kind = %name, "trigger kind not handled");
            Ok(())
        }
    };
    if let Err(e) = outcome {
        warn!(target: "voicelink::actions", error = %e, "trigger rejected");
    }
}

fn on_result(shared: &Arc<Shared>, index: i32, score: f32) {
    if !shared.is_dialogue_open() {
        debug!(target: "voicelink::dispatch", index, "result outside dialogue ignored");
        return;
    }
    let settings = shared.settings.get();
    if !settings.enable_dialogue_select {
        debug!(target: "voicelink::dispatch", "dialogue select disabled, result ignored");
        return;
    }

    if index == CLOSE_REQUEST_INDEX {
        if !settings.enable_voice_close {
            debug!(target: "voicelink::dispatch", "voice close disabled, close request ignored");
            return;
        }
        info!(target: "voicelink::dispatch", score, "close request");
        shared.host.schedule(Box::new(|ctx: &dyn HostContext| {
            if !ctx.close_dialogue() {
                warn!(target: "voicelink::dispatch", "dialogue close failed");
            }
        }));
        return;
    }

    let Ok(option) = usize::try_from(index) else {
        info!(target: "voicelink::dispatch", score, "no match");
        return;
    };
    select_option(shared, option, score);
}

fn select_option(shared: &Arc<Shared>, option: usize, score: f32) {
    if shared.dialogue.select_in_flight.swap(true, Ordering::SeqCst) {
        debug!(target: "voicelink::dispatch", option, "select already in flight, dropped");
        return;
    }
    info!(target: "voicelink::dispatch", option, score, "select");

    let dialogue = shared.dialogue.generation.current();
    let timer_shared = Arc::clone(shared);
    shared.timer.after(
        SELECT_SETTLE_DELAY,
        Box::new(move || {
            let task_shared = Arc::clone(&timer_shared);
            timer_shared.host.schedule(Box::new(move |ctx: &dyn HostContext| {
                // A later dialogue owns the in-flight flag now.
                if !dialogue.is_current() {
                    debug!(target: "voicelink::dispatch", option, "dialogue changed before select");
                    return;
                }
                if !ctx.select_dialogue_option(option) {
                    warn!(target: "voicelink::dispatch", option, "select failed");
                }
                task_shared
                    .dialogue
                    .select_in_flight
                    .store(false, Ordering::SeqCst);
            }));
        }),
    );
}

fn on_transition(shared: &Arc<Shared>, transition: ConnectionTransition) {
    match transition {
        ConnectionTransition::Connected => {
            let restarted = shared.ever_connected.swap(true, Ordering::SeqCst);
            let text = if restarted {
                "Runtime restarted"
            } else {
                "Runtime connected"
            };
            info!(target: "voicelink::dispatch", restarted, "server connected");
            shared.notify(text);

            if !shared.is_game_loaded() {
                return;
            }
            let settings = shared.settings.get();
            shared.push_all_config(&settings);
            if shared.attention().is_listening() {
                shared.sync.push_listen(true);
            }
            // The new server knows nothing about the open dialogue.
            shared.dialogue_options().clear();
            schedule_scan(shared, true, settings.enable_voice_shouts && !shared.is_dialogue_open());
        }
        ConnectionTransition::Disconnected => {
            info!(target: "voicelink::dispatch", "server disconnected");
            shared.notify("Runtime disconnected");
        }
    }
}

/// Pushes the open dialogue's options when they differ from the last push.
pub(crate) fn refresh_dialogue_options(shared: &Shared) {
    let options: Vec<String> = shared
        .host
        .dialogue_options()
        .into_iter()
        .filter(|o| !o.is_empty())
        .collect();
    let mut cached = shared.dialogue_options();
    if *cached == options {
        return;
    }
    debug!(target: "voicelink::dispatch", count = options.len(), "dialogue options changed");
    *cached = options.clone();
    drop(cached);
    if !options.is_empty() {
        shared.sync.push_options(options);
    }
}
