use voicelink_protocol::{
    decode_line, CommandAssembler, ConfigFlag, FavoriteEntry, FavoritesSnapshot, FormId,
    InboundEvent, ItemKind, OutboundCommand, ShoutEntry, Trigger,
};

fn assemble(lines: &[String]) -> Vec<OutboundCommand> {
    let mut asm = CommandAssembler::new();
    lines.iter().filter_map(|l| asm.feed(l)).collect()
}

#[test]
fn favorite_names_are_sanitized_and_keep_their_field_count() {
    let snapshot = FavoritesSnapshot {
        shouts: vec![ShoutEntry {
            plugin: "Skyrim.esm".to_string(),
            form_id: FormId(0x0001_3E09),
            name: "Fire|Breath\nline".to_string(),
            editor_id: "VoiceFire|Breath".to_string(),
        }],
        ..Default::default()
    };
    let lines = OutboundCommand::Favorites {
        snapshot: snapshot.clone(),
    }
    .encode();

    assert_eq!(lines.first().map(String::as_str), Some("FAV|BEGIN"));
    assert_eq!(lines.last().map(String::as_str), Some("FAV|END"));
    let shout_line = &lines[1];
    assert!(!shout_line.contains('\n'));
    let fields: Vec<&str> = shout_line.split('|').collect();
    assert_eq!(&fields[..2], &["FAV", "SHOUT"]);
    assert_eq!(fields.len() - 2, 4);

    let decoded = assemble(&lines);
    let [OutboundCommand::Favorites { snapshot: got }] = decoded.as_slice() else {
        panic!("expected one favorites batch, got {decoded:?}");
    };
    assert_eq!(got.shouts[0].name, "Fire Breath line");
    assert_eq!(got.shouts[0].editor_id, "VoiceFire Breath");
    assert_eq!(got.shouts[0].form_id, FormId(0x13E09));
}

#[test]
fn fire_breath_batch_line() {
    let snapshot = FavoritesSnapshot {
        shouts: vec![ShoutEntry {
            plugin: "Skyrim.esm".to_string(),
            form_id: FormId(0x0001_3E09),
            name: "Fire Breath".to_string(),
            editor_id: "VoiceFireBreath".to_string(),
        }],
        potions: vec![FavoriteEntry {
            form_id: FormId(0x3EADE),
            name: "Potion of Healing".to_string(),
        }],
        ..Default::default()
    };
    let lines = OutboundCommand::Favorites { snapshot }.encode();
    assert_eq!(
        lines,
        vec![
            "FAV|BEGIN",
            "FAV|SHOUT|Skyrim.esm|0x13E09|Fire Breath|VoiceFireBreath",
            "FAV|POTION|0x3EADE|Potion of Healing",
            "FAV|END",
        ]
    );
}

#[test]
fn options_block_roundtrip() {
    let cmd = OutboundCommand::Options {
        options: vec!["What's going on?".to_string(), "Tell me\nmore".to_string()],
    };
    let lines = cmd.encode();
    assert_eq!(lines[0], "OPEN|2");
    assert_eq!(lines[2], "OPT|Tell me more");
    assert_eq!(lines[3], "END");

    let decoded = assemble(&lines);
    assert_eq!(
        decoded,
        vec![OutboundCommand::Options {
            options: vec!["What's going on?".to_string(), "Tell me more".to_string()],
        }]
    );
}

#[test]
fn single_line_commands_roundtrip() {
    let cmds = vec![
        OutboundCommand::Lang {
            code: "en".to_string(),
        },
        OutboundCommand::Close,
        OutboundCommand::Listen { on: true },
        OutboundCommand::ListenShouts { on: false },
        OutboundCommand::Config {
            flag: ConfigFlag::DialogueSelect,
            on: true,
        },
        OutboundCommand::Config {
            flag: ConfigFlag::SaveWav,
            on: false,
        },
    ];
    let lines: Vec<String> = cmds.iter().flat_map(|c| c.encode()).collect();
    assert_eq!(
        lines,
        vec![
            "LANG|en",
            "CLOSE",
            "LISTEN|1",
            "LISTEN|SHOUTS|0",
            "CFG|DIALOGUE_SELECT|1",
            "CFG|SAVE_WAV|0",
        ]
    );
    assert_eq!(assemble(&lines), cmds);
}

#[test]
fn scripted_inbound_lines_decode_back() {
    let events = vec![
        InboundEvent::Result {
            index: 1,
            score: 0.75,
        },
        InboundEvent::Trigger(Trigger::Item {
            item: ItemKind::Weapon,
            form_id: "0x1359D".to_string(),
            score: 0.5,
            text: "equip iron sword".to_string(),
        }),
        InboundEvent::DebugText {
            text: "heard: fus ro dah".to_string(),
        },
    ];
    for ev in events {
        assert_eq!(decode_line(&ev.encode()), ev);
    }
}
