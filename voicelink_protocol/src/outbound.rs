use crate::{
    flag, parse_flag, sanitize_field, sanitize_line, FavoriteEntry, FavoritesSnapshot, FormId,
    ShoutEntry,
};
use serde::{Deserialize, Serialize};

/// Server-side feature toggles mirrored by `CFG|<NAME>|<0|1>`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfigFlag {
    Open,
    Close,
    Shouts,
    Debug,
    SaveWav,
    DialogueSelect,
    Weapons,
    Spells,
    Powers,
    Potions,
}

impl ConfigFlag {
    /// Emission order within a sync pass.
    pub const ALL: [ConfigFlag; 10] = [
        ConfigFlag::Open,
        ConfigFlag::Close,
        ConfigFlag::Shouts,
        ConfigFlag::Debug,
        ConfigFlag::SaveWav,
        ConfigFlag::DialogueSelect,
        ConfigFlag::Weapons,
        ConfigFlag::Spells,
        ConfigFlag::Powers,
        ConfigFlag::Potions,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            ConfigFlag::Open => "OPEN",
            ConfigFlag::Close => "CLOSE",
            ConfigFlag::Shouts => "SHOUTS",
            ConfigFlag::Debug => "DEBUG",
            ConfigFlag::SaveWav => "SAVE_WAV",
            ConfigFlag::DialogueSelect => "DIALOGUE_SELECT",
            ConfigFlag::Weapons => "WEAPONS",
            ConfigFlag::Spells => "SPELLS",
            ConfigFlag::Powers => "POWERS",
            ConfigFlag::Potions => "POTIONS",
        }
    }

    pub fn from_wire(name: &str) -> Option<ConfigFlag> {
        ConfigFlag::ALL
            .iter()
            .copied()
            .find(|f| f.wire_name() == name)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutboundCommand {
    Lang { code: String },
    Options { options: Vec<String> },
    Close,
    Listen { on: bool },
    ListenShouts { on: bool },
    Config { flag: ConfigFlag, on: bool },
    Favorites { snapshot: FavoritesSnapshot },
}

impl OutboundCommand {
    /// Encodes the command as one or more protocol lines (without the trailing `\n`).
    pub fn encode(&self) -> Vec<String> {
        match self {
            OutboundCommand::Lang { code } => vec![format!("LANG|{}", sanitize_line(code))],
            OutboundCommand::Options { options } => {
                let mut lines = Vec::with_capacity(options.len() + 2);
                lines.push(format!("OPEN|{}", options.len()));
                lines.extend(options.iter().map(|o| format!("OPT|{}", sanitize_line(o))));
                lines.push("END".to_string());
                lines
            }
            OutboundCommand::Close => vec!["CLOSE".to_string()],
            OutboundCommand::Listen { on } => vec![format!("LISTEN|{}", flag(*on))],
            OutboundCommand::ListenShouts { on } => vec![format!("LISTEN|SHOUTS|{}", flag(*on))],
            OutboundCommand::Config { flag: f, on } => {
                vec![format!("CFG|{}|{}", f.wire_name(), flag(*on))]
            }
            OutboundCommand::Favorites { snapshot } => encode_favorites(snapshot),
        }
    }
}

fn encode_favorites(snapshot: &FavoritesSnapshot) -> Vec<String> {
    let [s, p, w, sp, po] = snapshot.counts();
    let mut lines = Vec::with_capacity(2 + s + p + w + sp + po);
    lines.push("FAV|BEGIN".to_string());
    for e in &snapshot.shouts {
        lines.push(format!(
            "FAV|SHOUT|{}|{}|{}|{}",
            sanitize_field(&e.plugin),
            e.form_id,
            sanitize_field(&e.name),
            sanitize_field(&e.editor_id)
        ));
    }
    let items = [
        ("POWER", &snapshot.powers),
        ("WEAPON", &snapshot.weapons),
        ("SPELL", &snapshot.spells),
        ("POTION", &snapshot.potions),
    ];
    for (tag, entries) in items {
        for e in entries {
            lines.push(format!("FAV|{tag}|{}|{}", e.form_id, sanitize_field(&e.name)));
        }
    }
    lines.push("FAV|END".to_string());
    lines
}

enum Pending {
    None,
    Options { expected: usize, options: Vec<String> },
    Favorites(FavoritesSnapshot),
}

/// Reassembles outbound lines into commands on the receiving end.
///
/// Multi-line messages (`OPEN..END`, `FAV|BEGIN..FAV|END`) are buffered until
/// their terminator arrives. Lines that do not belong to any known message are
/// dropped.
pub struct CommandAssembler {
    pending: Pending,
}

impl Default for CommandAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandAssembler {
    pub fn new() -> Self {
        Self {
            pending: Pending::None,
        }
    }

    pub fn feed(&mut self, line: &str) -> Option<OutboundCommand> {
        let line = line.trim_end_matches(['\r', '\n']);

        match &mut self.pending {
            Pending::Options { expected, options } => {
                if line == "END" {
                    let options = std::mem::take(options);
                    let expected = *expected;
                    self.pending = Pending::None;
                    if options.len() != expected {
                        return None;
                    }
                    return Some(OutboundCommand::Options { options });
                }
                if let Some(text) = line.strip_prefix("OPT|") {
                    options.push(text.to_string());
                }
                return None;
            }
            Pending::Favorites(snapshot) => {
                if line == "FAV|END" {
                    let snapshot = std::mem::take(snapshot);
                    self.pending = Pending::None;
                    return Some(OutboundCommand::Favorites { snapshot });
                }
                parse_favorite_line(line, snapshot);
                return None;
            }
            Pending::None => {}
        }

        if line == "CLOSE" {
            return Some(OutboundCommand::Close);
        }
        if line == "FAV|BEGIN" {
            self.pending = Pending::Favorites(FavoritesSnapshot::default());
            return None;
        }
        if let Some(code) = line.strip_prefix("LANG|") {
            return Some(OutboundCommand::Lang {
                code: code.to_string(),
            });
        }
        if let Some(n) = line.strip_prefix("OPEN|") {
            let expected = n.trim().parse().unwrap_or(0);
            self.pending = Pending::Options {
                expected,
                options: Vec::with_capacity(expected),
            };
            return None;
        }
        if let Some(v) = line.strip_prefix("LISTEN|SHOUTS|") {
            return parse_flag(v).map(|on| OutboundCommand::ListenShouts { on });
        }
        if let Some(v) = line.strip_prefix("LISTEN|") {
            return parse_flag(v).map(|on| OutboundCommand::Listen { on });
        }
        if let Some(rest) = line.strip_prefix("CFG|") {
            let (name, v) = rest.split_once('|')?;
            let flag = ConfigFlag::from_wire(name)?;
            return parse_flag(v).map(|on| OutboundCommand::Config { flag, on });
        }
        None
    }
}

fn parse_favorite_line(line: &str, snapshot: &mut FavoritesSnapshot) {
    let Some(rest) = line.strip_prefix("FAV|") else {
        return;
    };
    let Some((tag, fields)) = rest.split_once('|') else {
        return;
    };

    if tag == "SHOUT" {
        let parts: Vec<&str> = fields.splitn(4, '|').collect();
        let [plugin, id, name, editor_id] = parts.as_slice() else {
            return;
        };
        let Some(form_id) = FormId::parse_hex(id) else {
            return;
        };
        snapshot.shouts.push(ShoutEntry {
            plugin: plugin.to_string(),
            form_id,
            name: name.to_string(),
            editor_id: editor_id.to_string(),
        });
        return;
    }

    let list = match tag {
        "POWER" => &mut snapshot.powers,
        "WEAPON" => &mut snapshot.weapons,
        "SPELL" => &mut snapshot.spells,
        "POTION" => &mut snapshot.potions,
        _ => return,
    };
    let Some((id, name)) = fields.split_once('|') else {
        return;
    };
    let Some(form_id) = FormId::parse_hex(id) else {
        return;
    };
    list.push(FavoriteEntry {
        form_id,
        name: name.to_string(),
    });
}
