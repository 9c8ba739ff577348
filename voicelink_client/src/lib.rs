mod actions;
mod attention;
mod channel;
mod client;
mod config;
mod dispatch;
mod error;
mod favorites;
mod host;
mod language;
pub mod logging;
mod net;
mod notify;
mod protocol;
mod runtime;
mod settings;
mod sync;
mod tasks;

pub use crate::actions::{clamp_power, compose_runtime_form_id, SHOUT_KEY_DELAY};
pub use crate::attention::{
    select_candidate, AttentionState, FOCUS_GRACE, FOCUS_ON_DELAY, LOOK_COS_THRESHOLD,
    MAX_FOCUS_DISTANCE,
};
pub use crate::channel::{Duplex, LineChannel, LineSink, PeekDuplex, PeekStream};
pub use crate::client::Client;
pub use crate::config::{
    ClientConfig, Endpoint, DEFAULT_PIPE_NAME, IDLE_SLEEP, INBOUND_CAP, POLL_INTERVAL,
    RECONNECT_BACKOFF,
};
pub use crate::dispatch::SELECT_SETTLE_DELAY;
pub use crate::error::{ActionError, ChannelError, SettingsError};
pub use crate::host::{
    ActorHandle, ActorView, FavoriteItem, FavoriteMagic, FormKind, HostApi, HostContext,
    HostTask, Observer, PluginSlot, Vec3,
};
pub use crate::language::{detect_language, normalize_language, GameLanguage};
pub use crate::notify::{NOTIFY_BURST, NOTIFY_PREFIX, NOTIFY_RATE_PER_SEC};
pub use crate::net::{ConnectionThread, InboundQueue, TransitionSlot};
pub use crate::protocol::*;
pub use crate::runtime::{PollThread, VoiceLinkRuntime};
pub use crate::settings::{Settings, SETTINGS_RECORD_VERSION};
pub use crate::sync::SyncHandle;
pub use crate::tasks::{mute_poll_offsets, ThreadTimer, Timer, TimerJob};
