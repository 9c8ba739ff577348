/// Reported by the connection thread through a single-slot cell; a newer
/// transition overwrites an unread older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
    Connected,
    Disconnected,
}

pub use voicelink_protocol::{
    decode_line, sanitize_line, ConfigFlag, FavoriteEntry, FavoritesSnapshot, FormId,
    InboundEvent, ItemKind, OutboundCommand, ShoutEntry, Trigger, CLOSE_REQUEST_INDEX,
};
