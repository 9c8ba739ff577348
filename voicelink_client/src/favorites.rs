use crate::host::{FormKind, HostContext};
use crate::protocol::{FavoriteEntry, FavoritesSnapshot};
use crate::settings::Settings;
use tracing::{debug, info};

/// Reads the five favorites categories from the host, leaving disabled
/// categories empty, and returns them in canonical order. Entries without a
/// display name are skipped.
pub fn collect(ctx: &dyn HostContext, settings: &Settings) -> FavoritesSnapshot {
    let mut snapshot = FavoritesSnapshot::default();

    if settings.enable_voice_shouts {
        snapshot.shouts = ctx
            .favorite_shouts()
            .into_iter()
            .filter(|shout| has_name(&shout.name))
            .collect();
    }

    if settings.powers_active() || settings.enable_spells {
        for magic in ctx.favorite_magic() {
            if !has_name(&magic.name) {
                continue;
            }
            let entry = FavoriteEntry {
                form_id: magic.form_id,
                name: magic.name,
            };
            if magic.is_power {
                if settings.powers_active() {
                    snapshot.powers.push(entry);
                }
            } else if settings.enable_spells {
                snapshot.spells.push(entry);
            }
        }
    }

    if settings.enable_weapons || settings.enable_potions {
        for item in ctx.favorite_items() {
            if item.count == 0 || !has_name(&item.name) {
                continue;
            }
            let list = match item.kind {
                FormKind::Weapon if settings.enable_weapons => &mut snapshot.weapons,
                FormKind::Potion if settings.enable_potions => &mut snapshot.potions,
                _ => continue,
            };
            list.push(FavoriteEntry {
                form_id: item.form_id,
                name: item.name,
            });
        }
    }

    snapshot.canonical()
}

fn has_name(name: &str) -> bool {
    !name.trim().is_empty()
}

/// Remembers the last scan so unchanged favorites produce no traffic.
#[derive(Debug, Default)]
pub struct FavoritesDiff {
    last: Option<FavoritesSnapshot>,
}

impl FavoritesDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the batch to send, if any. The new snapshot is retained either
    /// way.
    pub fn consider(&mut self, snapshot: FavoritesSnapshot, force: bool) -> Option<FavoritesSnapshot> {
        let changed = self.last.as_ref() != Some(&snapshot);
        let [shouts, powers, weapons, spells, potions] = snapshot.counts();
        if changed {
            info!(
                target: "voicelink::favorites",
                shouts, powers, weapons, spells, potions, force,
                "favorites changed"
            );
        } else {
            debug!(target: "voicelink::favorites", force, "favorites unchanged");
        }
        self.last = Some(snapshot.clone());
        (changed || force).then_some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FormId;

    fn spells(ids: &[u32]) -> FavoritesSnapshot {
        FavoritesSnapshot {
            spells: ids
                .iter()
                .map(|id| FavoriteEntry {
                    form_id: FormId(*id),
                    name: format!("spell {id:X}"),
                })
                .collect(),
            ..Default::default()
        }
        .canonical()
    }

    #[test]
    fn repeat_scan_without_change_is_silent() {
        let mut diff = FavoritesDiff::new();
        assert!(diff.consider(spells(&[0x12, 0x2F]), true).is_some());
        assert!(diff.consider(spells(&[0x2F, 0x12]), false).is_none());
    }

    #[test]
    fn forced_scan_always_sends() {
        let mut diff = FavoritesDiff::new();
        diff.consider(spells(&[0x12]), false);
        assert_eq!(diff.consider(spells(&[0x12]), true), Some(spells(&[0x12])));
    }

    #[test]
    fn unsent_snapshot_still_becomes_last() {
        let mut diff = FavoritesDiff::new();
        diff.consider(spells(&[0x12]), false);
        diff.consider(spells(&[0x13]), false);
        assert!(diff.consider(spells(&[0x13]), false).is_none());
    }
}
