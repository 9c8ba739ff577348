use serde::{Deserialize, Serialize};
use std::fmt;

/// `RES` index the server sends when the user asked to leave the dialogue.
pub const CLOSE_REQUEST_INDEX: i32 = -2;
/// Fallback index for unmatched or unparsable results.
pub const NO_MATCH_INDEX: i32 = -1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Spell,
    Potion,
}

impl ItemKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Spell => "spell",
            ItemKind::Potion => "potion",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Trigger {
    Open {
        score: f32,
        text: String,
    },
    Shout {
        plugin: String,
        form_id: String,
        power: i32,
        score: f32,
        text: String,
    },
    Power {
        form_id: String,
        score: f32,
        text: String,
    },
    Item {
        item: ItemKind,
        form_id: String,
        score: f32,
        text: String,
    },
    /// A kind this client does not act on; kept so it can be logged.
    Other {
        name: String,
        score: f32,
        text: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum InboundEvent {
    Result { index: i32, score: f32 },
    Trigger(Trigger),
    DebugText { text: String },
    RawStatus { text: String },
}

impl InboundEvent {
    /// Server-side encoding; the mock server uses it to script replies.
    pub fn encode(&self) -> String {
        match self {
            InboundEvent::Result { index, score } => format!("RES|{index}|{score:.3}"),
            InboundEvent::Trigger(t) => match t {
                Trigger::Open { score, text } => format!("TRIG|open|{score:.3}|{text}"),
                Trigger::Shout {
                    plugin,
                    form_id,
                    power,
                    score,
                    text,
                } => format!("TRIG|shout|{plugin}|{form_id}|{power}|{score:.3}|{text}"),
                Trigger::Power {
                    form_id,
                    score,
                    text,
                } => format!("TRIG|power|{form_id}|{score:.3}|{text}"),
                Trigger::Item {
                    item,
                    form_id,
                    score,
                    text,
                } => format!("TRIG|{item}|{form_id}|{score:.3}|{text}"),
                Trigger::Other { name, score, text } => format!("TRIG|{name}|{score:.3}|{text}"),
            },
            InboundEvent::DebugText { text } => format!("DBG|{text}"),
            InboundEvent::RawStatus { text } => text.clone(),
        }
    }
}

/// Decodes one complete line (without its terminator).
///
/// Never fails: garbled numeric fields fall back to `index = -1` / `score = 0`
/// and lines with an unknown prefix become [`InboundEvent::RawStatus`].
pub fn decode_line(line: &str) -> InboundEvent {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix("RES|") {
        return decode_result(rest);
    }
    if let Some(rest) = line.strip_prefix("TRIG|") {
        return InboundEvent::Trigger(decode_trigger(rest));
    }
    if let Some(text) = line.strip_prefix("DBG|") {
        return InboundEvent::DebugText {
            text: text.to_string(),
        };
    }
    InboundEvent::RawStatus {
        text: line.to_string(),
    }
}

fn decode_result(rest: &str) -> InboundEvent {
    let parsed = rest.split_once('|').and_then(|(index, score)| {
        let index = index.trim().parse::<i32>().ok()?;
        let score = score.trim().parse::<f32>().ok()?;
        Some((index, score))
    });
    let (index, score) = parsed.unwrap_or((NO_MATCH_INDEX, 0.0));
    InboundEvent::Result { index, score }
}

fn parse_score(raw: Option<&str>) -> f32 {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|s| s.is_finite())
        .unwrap_or(0.0)
}

fn owned(raw: Option<&str>) -> String {
    raw.unwrap_or_default().to_string()
}

fn decode_trigger(rest: &str) -> Trigger {
    let (kind, fields) = rest.split_once('|').unwrap_or((rest, ""));

    match kind {
        "shout" => {
            let mut it = fields.splitn(5, '|');
            let plugin = owned(it.next());
            let form_id = owned(it.next());
            let power = it
                .next()
                .and_then(|p| p.trim().parse::<i32>().ok())
                .unwrap_or(0);
            let score = parse_score(it.next());
            let text = owned(it.next());
            Trigger::Shout {
                plugin,
                form_id,
                power,
                score,
                text,
            }
        }
        "power" => {
            let mut it = fields.splitn(3, '|');
            Trigger::Power {
                form_id: owned(it.next()),
                score: parse_score(it.next()),
                text: owned(it.next()),
            }
        }
        "weapon" | "spell" | "potion" => {
            let item = match kind {
                "weapon" => ItemKind::Weapon,
                "spell" => ItemKind::Spell,
                _ => ItemKind::Potion,
            };
            let mut it = fields.splitn(3, '|');
            Trigger::Item {
                item,
                form_id: owned(it.next()),
                score: parse_score(it.next()),
                text: owned(it.next()),
            }
        }
        _ => {
            let mut it = fields.splitn(2, '|');
            let score = parse_score(it.next());
            let text = owned(it.next());
            if kind == "open" {
                Trigger::Open { score, text }
            } else {
                Trigger::Other {
                    name: kind.to_string(),
                    score,
                    text,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbled_result_falls_back() {
        assert_eq!(
            decode_line("RES|abc|xyz"),
            InboundEvent::Result {
                index: -1,
                score: 0.0
            }
        );
        assert_eq!(
            decode_line("RES|"),
            InboundEvent::Result {
                index: -1,
                score: 0.0
            }
        );
    }

    #[test]
    fn result_with_close_request() {
        assert_eq!(
            decode_line("RES|-2|0.910"),
            InboundEvent::Result {
                index: CLOSE_REQUEST_INDEX,
                score: 0.91
            }
        );
    }

    #[test]
    fn shout_trigger_fields() {
        let ev = decode_line("TRIG|shout|Skyrim.esm|0x13E09|2|0.870|yol toor");
        assert_eq!(
            ev,
            InboundEvent::Trigger(Trigger::Shout {
                plugin: "Skyrim.esm".into(),
                form_id: "0x13E09".into(),
                power: 2,
                score: 0.87,
                text: "yol toor".into(),
            })
        );
    }

    #[test]
    fn shout_trigger_with_bad_power_keeps_other_fields() {
        match decode_line("TRIG|shout|Skyrim.esm|0x13E09|x|0.5|fus") {
            InboundEvent::Trigger(Trigger::Shout { power, score, text, .. }) => {
                assert_eq!(power, 0);
                assert_eq!(score, 0.5);
                assert_eq!(text, "fus");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn item_and_open_triggers() {
        assert_eq!(
            decode_line("TRIG|potion|0x3EADE|0.700|drink healing"),
            InboundEvent::Trigger(Trigger::Item {
                item: ItemKind::Potion,
                form_id: "0x3EADE".into(),
                score: 0.7,
                text: "drink healing".into(),
            })
        );
        assert_eq!(
            decode_line("TRIG|open|nan-ish|hello there"),
            InboundEvent::Trigger(Trigger::Open {
                score: 0.0,
                text: "hello there".into()
            })
        );
    }

    #[test]
    fn unknown_prefix_is_raw_status() {
        assert_eq!(
            decode_line("effective: dialog=0 focus=1"),
            InboundEvent::RawStatus {
                text: "effective: dialog=0 focus=1".into()
            }
        );
    }
}
