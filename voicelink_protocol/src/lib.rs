//! Line protocol spoken between the in-game client and the recognition server.
//!
//! One message per `\n`-terminated UTF-8 line, fields separated by `|`.
//! This crate does no I/O: it only turns commands into lines and lines into
//! events, in both directions, so the client and the mock server share it.

mod favorites;
mod form_id;
mod inbound;
mod outbound;

pub use favorites::{FavoriteEntry, FavoritesSnapshot, ShoutEntry};
pub use form_id::FormId;
pub use inbound::{decode_line, InboundEvent, ItemKind, Trigger, CLOSE_REQUEST_INDEX, NO_MATCH_INDEX};
pub use outbound::{CommandAssembler, ConfigFlag, OutboundCommand};

pub const FIELD_SEPARATOR: char = '|';

/// Replaces line breaks so a value can never split a message in two.
pub fn sanitize_line(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Like [`sanitize_line`], but also removes the field separator. Used for
/// values that sit in the middle of a `|`-delimited record.
pub fn sanitize_field(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c == '\n' || c == '\r' || c == FIELD_SEPARATOR {
                ' '
            } else {
                c
            }
        })
        .collect()
}

pub(crate) fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_line_keeps_pipes() {
        assert_eq!(sanitize_line("a|b\nc\rd"), "a|b c d");
    }

    #[test]
    fn sanitize_field_strips_pipes_and_breaks() {
        assert_eq!(sanitize_field("Fire|Breath\n"), "Fire Breath ");
    }
}
