use crate::attention::revalidate_target;
use crate::client::Shared;
use crate::error::ActionError;
use crate::host::{FormKind, HostContext, PluginSlot};
use crate::protocol::{FormId, ItemKind};
use crate::tasks::mute_poll_offsets;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gap between equipping a shout and pressing the key, so the engine sees the
/// new selection.
pub const SHOUT_KEY_DELAY: Duration = Duration::from_millis(100);

/// Runtime form id of a plugin-relative `base` id.
pub fn compose_runtime_form_id(slot: PluginSlot, base: FormId) -> FormId {
    match slot {
        PluginSlot::Full(index) => FormId((u32::from(index) << 24) | (base.0 & 0x00FF_FFFF)),
        PluginSlot::Light(index) => {
            FormId(0xFE00_0000 | ((u32::from(index) & 0xFFF) << 12) | (base.0 & 0xFFF))
        }
    }
}

pub fn clamp_power(power: i32) -> u8 {
    power.clamp(1, 3) as u8
}

fn parse_form_id(raw: &str) -> Result<FormId, ActionError> {
    FormId::parse_hex(raw).ok_or_else(|| ActionError::BadFormId(raw.to_string()))
}

fn expect_kind(ctx: &dyn HostContext, form: FormId, kind: FormKind, what: &str) -> Result<(), ActionError> {
    if ctx.form_kind(form) == Some(kind) {
        Ok(())
    } else {
        Err(ActionError::NotFound(format!("{what} {form}")))
    }
}

fn label(ctx: &dyn HostContext, form: FormId) -> String {
    ctx.display_name(form).unwrap_or_else(|| form.to_string())
}

/// Runs `action` on the host thread and logs how it went.
fn run_on_host<F>(shared: &Shared, what: &'static str, action: F)
where
    F: FnOnce(&dyn HostContext) -> Result<String, ActionError> + Send + 'static,
{
    shared.host.schedule(Box::new(move |ctx: &dyn HostContext| match action(ctx) {
        Ok(name) => info!(target: "voicelink::actions", action = what, name = %name, "done"),
        Err(e) => warn!(target: "voicelink::actions", action = what, error = %e, "failed"),
    }));
}

/// Talk to the NPC the player is facing.
pub(crate) fn open(shared: &Arc<Shared>) {
    if !shared.settings.get().enable_voice_open {
        debug!(target: "voicelink::actions", "voice open disabled, trigger ignored");
        return;
    }
    let Some(target) = shared.attention().focus_target() else {
        debug!(target: "voicelink::actions", "no focus target, trigger ignored");
        return;
    };
    let Some(actor) = revalidate_target(shared.host.as_ref(), target) else {
        info!(target: "voicelink::actions", actor = target, "focus target no longer valid");
        return;
    };

    shared.attention().force_idle();
    shared.sync.push_listen(false);
    shared.sync.push_listen_shouts(false);

    let name = actor.name;
    run_on_host(shared, "activate", move |ctx| {
        if ctx.activate(target) {
            Ok(name)
        } else {
            Err(ActionError::HostUnavailable("activate"))
        }
    });
}

pub(crate) fn shout(shared: &Arc<Shared>, plugin: &str, form_id: &str, power: i32) -> Result<(), ActionError> {
    if !shared.settings.get().enable_voice_shouts {
        debug!(target: "voicelink::actions", "shouts disabled, trigger ignored");
        return Ok(());
    }
    let base = parse_form_id(form_id)?;
    let power = clamp_power(power);
    let generation = shared.shout_generation.advance();
    let plugin = plugin.to_string();

    let task_shared = Arc::clone(shared);
    shared.host.schedule(Box::new(move |ctx: &dyn HostContext| {
        let shout = match equip_shout(ctx, &plugin, base, power) {
            Ok(id) => id,
            Err(e) => {
                warn!(target: "voicelink::actions", action = "shout", error = %e, "failed");
                return;
            }
        };
        info!(target: "voicelink::actions", shout = %shout, power, "shout equipped");

        let timer_shared = Arc::clone(&task_shared);
        task_shared.timer.after(
            SHOUT_KEY_DELAY,
            Box::new(move || {
                if !generation.is_current() {
                    debug!(target: "voicelink::actions", "shout superseded before key press");
                    return;
                }
                let key_shared = Arc::clone(&timer_shared);
                timer_shared.host.schedule(Box::new(move |ctx: &dyn HostContext| {
                    if !generation.is_current() {
                        return;
                    }
                    if !ctx.press_shout_key(power) {
                        warn!(target: "voicelink::actions", power, "shout key dispatch failed");
                        return;
                    }
                    info!(target: "voicelink::actions", power, "shout key pressed");
                    if key_shared.settings.get().mute_shout_voice_line {
                        start_mute_window(&key_shared, ctx);
                    }
                }));
            }),
        );
    }));
    Ok(())
}

fn equip_shout(ctx: &dyn HostContext, plugin: &str, base: FormId, power: u8) -> Result<FormId, ActionError> {
    let slot = ctx
        .plugin_slot(plugin)
        .ok_or_else(|| ActionError::PluginNotLoaded(plugin.to_string()))?;
    let id = compose_runtime_form_id(slot, base);
    expect_kind(ctx, id, FormKind::Shout, "shout")?;
    if !ctx.knows_shout(id, power) {
        return Err(ActionError::NotKnown(format!("shout {id} at power {power}")));
    }
    if !ctx.equip_shout(id) {
        return Err(ActionError::HostUnavailable("equip shout"));
    }
    Ok(id)
}

pub(crate) fn power(shared: &Arc<Shared>, form_id: &str) -> Result<(), ActionError> {
    if !shared.settings.get().powers_active() {
        debug!(target: "voicelink::actions", "powers disabled, trigger ignored");
        return Ok(());
    }
    let id = parse_form_id(form_id)?;
    run_on_host(shared, "power", move |ctx| {
        expect_kind(ctx, id, FormKind::Power, "power")?;
        if !ctx.knows_spell(id) {
            return Err(ActionError::NotKnown(format!("power {id}")));
        }
        if !ctx.equip_power(id) {
            return Err(ActionError::HostUnavailable("equip power"));
        }
        if !ctx.press_shout_key(1) {
            return Err(ActionError::HostUnavailable("shout key"));
        }
        Ok(label(ctx, id))
    });
    Ok(())
}

pub(crate) fn item(shared: &Arc<Shared>, item: ItemKind, form_id: &str) -> Result<(), ActionError> {
    let settings = shared.settings.get();
    let enabled = match item {
        ItemKind::Weapon => settings.enable_weapons,
        ItemKind::Spell => settings.enable_spells,
        ItemKind::Potion => settings.enable_potions,
    };
    if !enabled {
        debug!(target: "voicelink::actions", kind = %item, "category disabled, trigger ignored");
        return Ok(());
    }
    let id = parse_form_id(form_id)?;
    run_on_host(shared, item.wire_name(), move |ctx| {
        if !ctx.form_kind(id).is_some_and(|k| k.matches_item(item)) {
            return Err(ActionError::NotFound(format!("{item} {id}")));
        }
        let done = match item {
            ItemKind::Weapon => {
                if ctx.item_count(id) == 0 {
                    return Err(ActionError::NotOwned(format!("weapon {id}")));
                }
                ctx.equip_weapon(id)
            }
            ItemKind::Spell => {
                if !ctx.knows_spell(id) {
                    return Err(ActionError::NotKnown(format!("spell {id}")));
                }
                ctx.equip_spell(id)
            }
            ItemKind::Potion => {
                if ctx.item_count(id) == 0 {
                    return Err(ActionError::NotOwned(format!("potion {id}")));
                }
                ctx.consume_potion(id)
            }
        };
        if !done {
            return Err(ActionError::HostUnavailable("equip manager"));
        }
        Ok(label(ctx, id))
    });
    Ok(())
}

/// Stops the player's voice line now and keeps stopping it for a short
/// window. A newer window makes the pending polls of this one no-ops.
pub(crate) fn start_mute_window(shared: &Arc<Shared>, ctx: &dyn HostContext) {
    let generation = shared.mute_generation.advance();
    let stopped = ctx.stop_observer_voice();
    debug!(target: "voicelink::actions", stopped, "mute window opened");

    for offset in mute_poll_offsets() {
        let generation = generation.clone();
        let timer_shared = Arc::clone(shared);
        shared.timer.after(
            offset,
            Box::new(move || {
                if !generation.is_current() || !timer_shared.settings.get().mute_shout_voice_line {
                    return;
                }
                timer_shared.host.schedule(Box::new(move |ctx: &dyn HostContext| {
                    if generation.is_current() {
                        ctx.stop_observer_voice();
                    }
                }));
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_ids_for_full_and_light_plugins() {
        assert_eq!(
            compose_runtime_form_id(PluginSlot::Full(0x00), FormId(0x0001_3E09)),
            FormId(0x0001_3E09)
        );
        assert_eq!(
            compose_runtime_form_id(PluginSlot::Full(0x02), FormId(0x0100_7CB6)),
            FormId(0x0200_7CB6)
        );
        assert_eq!(
            compose_runtime_form_id(PluginSlot::Light(0x01A), FormId(0x0000_0805)),
            FormId(0xFE01_A805)
        );
    }

    #[test]
    fn power_is_clamped() {
        assert_eq!(clamp_power(0), 1);
        assert_eq!(clamp_power(2), 2);
        assert_eq!(clamp_power(9), 3);
        assert_eq!(clamp_power(-4), 1);
    }
}
