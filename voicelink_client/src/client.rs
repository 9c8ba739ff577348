use crate::attention::Attention;
use crate::config::ClientConfig;
use crate::favorites::{self, FavoritesDiff};
use crate::host::{HostApi, HostContext};
use crate::language::{detect_language, normalize_language, GameLanguage};
use crate::net::{InboundQueue, TransitionSlot};
use crate::notify::Notifier;
use crate::protocol::{sanitize_line, ConfigFlag};
use crate::settings::{Settings, SettingsCell};
use crate::sync::SyncHandle;
use crate::tasks::{GenerationCounter, Timer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Default)]
pub(crate) struct DialogueState {
    pub open: AtomicBool,
    pub options: Mutex<Vec<String>>,
    pub select_in_flight: AtomicBool,
    /// Advanced on every open and close so delayed selects can tell which
    /// dialogue they belong to.
    pub generation: GenerationCounter,
}

/// State shared by the poll loop, the connection thread, timer jobs and host
/// tasks. There is one per client.
pub(crate) struct Shared {
    pub host: Arc<dyn HostApi>,
    pub timer: Arc<dyn Timer>,
    pub sync: SyncHandle,
    pub settings: SettingsCell,
    pub inbound: InboundQueue,
    pub transitions: TransitionSlot,
    pub game_loaded: AtomicBool,
    pub ever_connected: AtomicBool,
    pub dialogue: DialogueState,
    pub attention: Mutex<Attention>,
    pub favorites: Mutex<FavoritesDiff>,
    pub notifier: Notifier,
    pub shout_generation: GenerationCounter,
    pub mute_generation: GenerationCounter,
}

impl Shared {
    pub fn attention(&self) -> MutexGuard<'_, Attention> {
        self.attention.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn dialogue_options(&self) -> MutexGuard<'_, Vec<String>> {
        self.dialogue.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_game_loaded(&self) -> bool {
        self.game_loaded.load(Ordering::SeqCst)
    }

    pub fn is_dialogue_open(&self) -> bool {
        self.dialogue.open.load(Ordering::SeqCst)
    }

    pub fn push_all_config(&self, settings: &Settings) {
        for flag in ConfigFlag::ALL {
            self.sync.set_config(flag, settings.config_value(flag));
        }
    }

    /// Shows `text` on screen when debug is on and the rate limit allows.
    pub fn notify(&self, text: &str) {
        if !self.settings.get().debug {
            return;
        }
        let Some(message) = self.notifier.admit(text) else {
            debug!(target: "voicelink::dispatch", text = %text, "notification rate limited");
            return;
        };
        self.host.schedule(Box::new(move |ctx: &dyn HostContext| ctx.notify(&message)));
    }

    /// Reads favorites on the host thread and queues a batch if needed.
    pub fn scan_favorites(&self, ctx: &dyn HostContext, force: bool) {
        let settings = self.settings.get();
        let snapshot = favorites::collect(ctx, &settings);
        let batch = self
            .favorites
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .consider(snapshot, force);
        if let Some(batch) = batch {
            self.sync.push_favorites(batch);
        }
    }
}

/// Schedules a favorites scan on the host thread, optionally re-enabling
/// shout listening after it. Nothing happens before a game is loaded.
pub(crate) fn schedule_scan(shared: &Arc<Shared>, force: bool, listen_shouts_after: bool) {
    if !shared.is_game_loaded() {
        debug!(target: "voicelink::favorites", "scan skipped, no game loaded");
        return;
    }
    let task_shared = Arc::clone(shared);
    shared.host.schedule(Box::new(move |ctx: &dyn HostContext| {
        task_shared.scan_favorites(ctx, force);
        if listen_shouts_after {
            task_shared.sync.push_listen_shouts(true);
        }
    }));
}

/// The client without its threads: every hook the host calls plus the poll
/// tick. [`crate::VoiceLinkRuntime`] drives it in production; tests drive it
/// by hand.
#[derive(Clone)]
pub struct Client {
    pub(crate) shared: Arc<Shared>,
}

impl Client {
    pub fn new(config: &ClientConfig, host: Arc<dyn HostApi>, timer: Arc<dyn Timer>) -> Self {
        Self::with_settings(config, host, timer, Settings::default())
    }

    pub fn with_settings(
        config: &ClientConfig,
        host: Arc<dyn HostApi>,
        timer: Arc<dyn Timer>,
        settings: Settings,
    ) -> Self {
        let shared = Shared {
            host,
            timer,
            sync: SyncHandle::new(),
            settings: SettingsCell::new(settings),
            inbound: InboundQueue::new(config.inbound_capacity),
            transitions: TransitionSlot::default(),
            game_loaded: AtomicBool::new(false),
            ever_connected: AtomicBool::new(false),
            dialogue: DialogueState::default(),
            attention: Mutex::new(Attention::new()),
            favorites: Mutex::new(FavoritesDiff::new()),
            notifier: Notifier::default(),
            shout_generation: GenerationCounter::default(),
            mute_generation: GenerationCounter::default(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.shared.sync
    }

    pub fn inbound(&self) -> &InboundQueue {
        &self.shared.inbound
    }

    pub fn transitions(&self) -> &TransitionSlot {
        &self.shared.transitions
    }

    pub fn settings(&self) -> Settings {
        self.shared.settings.get()
    }

    pub fn attention_state(&self) -> crate::attention::AttentionState {
        self.shared.attention().state()
    }

    pub fn apply_settings(&self, next: Settings, from_user: bool) {
        let shared = &self.shared;
        let prev = shared.settings.replace(next);
        info!(target: "voicelink::settings", ?next, from_user, "settings applied");

        if shared.is_game_loaded() {
            shared.push_all_config(&next);
            if prev.enable_voice_shouts && !next.enable_voice_shouts {
                shared.sync.push_listen_shouts(false);
            }
        }

        if prev.enable_voice_open && !next.enable_voice_open {
            shared.attention().force_idle();
            shared.sync.push_listen(false);
        }

        if from_user && next.favorites_scope_differs(&prev) {
            schedule_scan(shared, true, next.enable_voice_shouts);
        }
    }

    /// Restores a persisted settings record. A bad record is logged and the
    /// current settings stay in place.
    pub fn load_settings_record(&self, raw: &str) {
        match Settings::from_record(raw) {
            Ok(settings) => self.apply_settings(settings, false),
            Err(e) => warn!(target: "voicelink::settings", error = %e, "settings record ignored"),
        }
    }

    pub fn settings_record(&self) -> Option<String> {
        match self.settings().to_record() {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(target: "voicelink::settings", error = %e, "settings record not written");
                None
            }
        }
    }

    pub fn on_game_loaded(&self, new_game: bool) {
        if new_game {
            self.apply_settings(Settings::default(), false);
        }
        let shared = &self.shared;
        shared.game_loaded.store(true, Ordering::SeqCst);
        let settings = shared.settings.get();
        info!(target: "voicelink::settings", new_game, "game loaded");
        shared.push_all_config(&settings);
        schedule_scan(shared, true, settings.enable_voice_shouts);
    }

    pub fn set_game_language(&self, language: &GameLanguage) {
        let code = sanitize_line(language.code);
        if code.is_empty() {
            return;
        }
        info!(target: "voicelink::settings", raw = %language.raw, code = %code, label = language.label, "game language");
        self.shared.sync.set_language(code);
    }

    /// Normalizes a raw language value and, if recognized, mirrors it.
    pub fn set_game_language_raw(&self, raw: &str) -> Option<GameLanguage> {
        let Some(language) = normalize_language(raw) else {
            warn!(target: "voicelink::settings", raw = %raw, "unknown game language, not sent");
            return None;
        };
        self.set_game_language(&language);
        Some(language)
    }

    pub fn detect_game_language(&self, host_value: Option<&str>, ini_files: &[&str]) -> Option<GameLanguage> {
        let language = detect_language(host_value, ini_files)?;
        self.set_game_language(&language);
        Some(language)
    }

    pub fn on_dialogue_opened(&self) {
        let shared = &self.shared;
        shared.dialogue.open.store(true, Ordering::SeqCst);
        shared.dialogue.generation.advance();
        shared.dialogue.select_in_flight.store(false, Ordering::SeqCst);
        shared.dialogue_options().clear();
        shared.sync.push_listen_shouts(false);
        info!(target: "voicelink::dispatch", "dialogue opened");
        crate::dispatch::refresh_dialogue_options(shared);
    }

    pub fn on_dialogue_closed(&self) {
        let shared = &self.shared;
        shared.dialogue.open.store(false, Ordering::SeqCst);
        shared.dialogue.generation.advance();
        shared.dialogue.select_in_flight.store(false, Ordering::SeqCst);
        shared.dialogue_options().clear();
        shared.sync.push_close();
        if shared.settings.get().enable_voice_shouts {
            shared.sync.push_listen_shouts(true);
        }
        info!(target: "voicelink::dispatch", "dialogue closed");
    }

    /// Favorites or magic menu closed: rescan, sending only if something
    /// changed.
    pub fn on_favorites_changed(&self) {
        schedule_scan(&self.shared, false, false);
    }

    pub fn request_favorites_scan(&self, force: bool) {
        schedule_scan(&self.shared, force, false);
    }

    pub fn tick(&self, now: Instant) {
        crate::dispatch::tick(&self.shared, now);
    }
}
