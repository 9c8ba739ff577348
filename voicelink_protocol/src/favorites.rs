use crate::FormId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShoutEntry {
    pub plugin: String,
    /// Plugin-relative id; the server resolves the load slot itself.
    pub form_id: FormId,
    pub name: String,
    pub editor_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEntry {
    pub form_id: FormId,
    pub name: String,
}

/// The five allow-lists the server builds its command grammar from.
///
/// Equality is element-wise, so callers must [`canonicalize`](Self::canonicalize)
/// before comparing two scans.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FavoritesSnapshot {
    pub shouts: Vec<ShoutEntry>,
    pub powers: Vec<FavoriteEntry>,
    pub weapons: Vec<FavoriteEntry>,
    pub spells: Vec<FavoriteEntry>,
    pub potions: Vec<FavoriteEntry>,
}

impl FavoritesSnapshot {
    /// Sorts every category by its key (plugin then id for shouts, id for the
    /// rest) and drops duplicate keys, keeping the first.
    pub fn canonicalize(&mut self) {
        self.shouts.sort_by(|a, b| {
            a.plugin
                .cmp(&b.plugin)
                .then(a.form_id.cmp(&b.form_id))
        });
        self.shouts
            .dedup_by(|a, b| a.plugin == b.plugin && a.form_id == b.form_id);

        for list in [
            &mut self.powers,
            &mut self.weapons,
            &mut self.spells,
            &mut self.potions,
        ] {
            list.sort_by_key(|e| e.form_id);
            list.dedup_by_key(|e| e.form_id);
        }
    }

    pub fn canonical(mut self) -> Self {
        self.canonicalize();
        self
    }

    /// `[shouts, powers, weapons, spells, potions]`
    pub fn counts(&self) -> [usize; 5] {
        [
            self.shouts.len(),
            self.powers.len(),
            self.weapons.len(),
            self.spells.len(),
            self.potions.len(),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.counts().iter().all(|n| *n == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u32, name: &str) -> FavoriteEntry {
        FavoriteEntry {
            form_id: FormId(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn canonical_order_is_independent_of_scan_order() {
        let a = FavoritesSnapshot {
            spells: vec![item(0x2F, "Flames"), item(0x12, "Healing"), item(0x2F, "Flames")],
            ..Default::default()
        };
        let b = FavoritesSnapshot {
            spells: vec![item(0x12, "Healing"), item(0x2F, "Flames")],
            ..Default::default()
        };
        assert_eq!(a.canonical(), b.clone().canonical());
    }

    #[test]
    fn shouts_sort_by_plugin_before_id() {
        let shout = |plugin: &str, id: u32| ShoutEntry {
            plugin: plugin.to_string(),
            form_id: FormId(id),
            name: String::new(),
            editor_id: String::new(),
        };
        let snap = FavoritesSnapshot {
            shouts: vec![shout("Skyrim.esm", 0x01), shout("Dawnguard.esm", 0x50)],
            ..Default::default()
        }
        .canonical();
        assert_eq!(snap.shouts[0].plugin, "Dawnguard.esm");
    }
}
