use crate::channel::LineSink;
use crate::error::ChannelError;
use crate::protocol::{ConfigFlag, FavoritesSnapshot, OutboundCommand};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A value the server mirrors: resent only when it changes or after a reconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct Sticky<T> {
    desired: Option<T>,
    last_sent: Option<T>,
}

impl<T> Default for Sticky<T> {
    fn default() -> Self {
        Self {
            desired: None,
            last_sent: None,
        }
    }
}

impl<T: Clone + PartialEq> Sticky<T> {
    pub fn set(&mut self, value: T) {
        self.desired = Some(value);
    }

    pub fn desired(&self) -> Option<&T> {
        self.desired.as_ref()
    }

    pub fn pending(&self) -> Option<&T> {
        match &self.desired {
            Some(v) if self.last_sent.as_ref() != Some(v) => Some(v),
            _ => None,
        }
    }

    fn mark_sent(&mut self, value: T) {
        self.last_sent = Some(value);
    }

    fn forget_sent(&mut self) {
        self.last_sent = None;
    }
}

/// Desired outbound state shared by the poll loop (writer) and the
/// connection thread (reader).
#[derive(Debug, Default)]
pub struct OutboundState {
    language: Sticky<String>,
    options: Option<Vec<String>>,
    close: bool,
    favorites: Option<FavoritesSnapshot>,
    listen: Option<bool>,
    config: [Sticky<bool>; 10],
    listen_shouts: Option<bool>,
}

impl OutboundState {
    /// Moves every one-shot out and copies every pending sticky value, in
    /// emission order.
    fn take_pending(&mut self) -> Vec<OutboundCommand> {
        let mut steps = Vec::new();
        if let Some(code) = self.language.pending() {
            steps.push(OutboundCommand::Lang { code: code.clone() });
        }
        if let Some(options) = self.options.take() {
            steps.push(OutboundCommand::Options { options });
        }
        if std::mem::take(&mut self.close) {
            steps.push(OutboundCommand::Close);
        }
        if let Some(snapshot) = self.favorites.take() {
            steps.push(OutboundCommand::Favorites { snapshot });
        }
        if let Some(on) = self.listen.take() {
            steps.push(OutboundCommand::Listen { on });
        }
        for flag in ConfigFlag::ALL {
            if let Some(on) = self.config[flag.index()].pending() {
                steps.push(OutboundCommand::Config { flag, on: *on });
            }
        }
        // Must trail CFG|SHOUTS or the server ignores the enable.
        if let Some(on) = self.listen_shouts.take() {
            steps.push(OutboundCommand::ListenShouts { on });
        }
        steps
    }

    fn commit(&mut self, step: &OutboundCommand) {
        match step {
            OutboundCommand::Lang { code } => self.language.mark_sent(code.clone()),
            OutboundCommand::Config { flag, on } => self.config[flag.index()].mark_sent(*on),
            _ => {}
        }
    }

    /// Puts back one-shots that never reached the wire unless a newer value
    /// was queued meanwhile.
    fn requeue(&mut self, unsent: Vec<OutboundCommand>) {
        for step in unsent {
            match step {
                OutboundCommand::Options { options } => {
                    self.options.get_or_insert(options);
                }
                OutboundCommand::Close => self.close = true,
                OutboundCommand::Favorites { snapshot } => {
                    self.favorites.get_or_insert(snapshot);
                }
                OutboundCommand::Listen { on } => {
                    self.listen.get_or_insert(on);
                }
                OutboundCommand::ListenShouts { on } => {
                    self.listen_shouts.get_or_insert(on);
                }
                OutboundCommand::Lang { .. } | OutboundCommand::Config { .. } => {}
            }
        }
    }

    fn forget_sent(&mut self) {
        self.language.forget_sent();
        for v in &mut self.config {
            v.forget_sent();
        }
    }
}

#[derive(Clone, Default)]
pub struct SyncHandle {
    state: Arc<Mutex<OutboundState>>,
}

impl SyncHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OutboundState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_language(&self, code: impl Into<String>) {
        self.lock().language.set(code.into());
    }

    pub fn set_config(&self, flag: ConfigFlag, on: bool) {
        self.lock().config[flag.index()].set(on);
    }

    pub fn config(&self, flag: ConfigFlag) -> Option<bool> {
        self.lock().config[flag.index()].desired().copied()
    }

    pub fn push_options(&self, options: Vec<String>) {
        self.lock().options = Some(options);
    }

    pub fn push_close(&self) {
        self.lock().close = true;
    }

    pub fn push_favorites(&self, snapshot: FavoritesSnapshot) {
        self.lock().favorites = Some(snapshot);
    }

    pub fn push_listen(&self, on: bool) {
        self.lock().listen = Some(on);
    }

    pub fn push_listen_shouts(&self, on: bool) {
        self.lock().listen_shouts = Some(on);
    }

    /// Every sticky value goes out again on the next connection.
    pub fn on_disconnected(&self) {
        self.lock().forget_sent();
    }

    /// Writes the pending deltas in emission order and returns how many lines
    /// were written. The first failed write aborts the pass.
    ///
    /// The lock is never held across a write.
    pub fn flush(&self, sink: &mut dyn LineSink) -> Result<usize, ChannelError> {
        let mut steps = self.lock().take_pending().into_iter();
        let mut written = 0;

        while let Some(step) = steps.next() {
            for line in step.encode() {
                if let Err(e) = sink.write_line(&line) {
                    let mut state = self.lock();
                    state.requeue(std::iter::once(step).chain(steps).collect());
                    return Err(e);
                }
                debug!(target: "voicelink::sync", line = %line, "sent");
                written += 1;
            }
            self.lock().commit(&step);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        fail_after: Option<usize>,
    }

    impl LineSink for Recorder {
        fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
            if self.fail_after.is_some_and(|n| self.lines.len() >= n) {
                return Err(ChannelError::Closed);
            }
            self.lines.push(line.to_string());
            Ok(())
        }
    }

    fn flush(sync: &SyncHandle) -> Vec<String> {
        let mut rec = Recorder::default();
        sync.flush(&mut rec).unwrap();
        rec.lines
    }

    #[test]
    fn cfg_shouts_precedes_listen_shouts() {
        let sync = SyncHandle::new();
        sync.push_listen_shouts(true);
        sync.set_config(ConfigFlag::Potions, false);
        sync.set_config(ConfigFlag::Shouts, true);
        sync.push_listen(true);
        sync.set_language("en");

        assert_eq!(
            flush(&sync),
            vec![
                "LANG|en",
                "LISTEN|1",
                "CFG|SHOUTS|1",
                "CFG|POTIONS|0",
                "LISTEN|SHOUTS|1"
            ]
        );
    }

    #[test]
    fn unchanged_sticky_values_are_not_resent() {
        let sync = SyncHandle::new();
        sync.set_config(ConfigFlag::Debug, true);
        assert_eq!(flush(&sync), vec!["CFG|DEBUG|1"]);
        sync.set_config(ConfigFlag::Debug, true);
        assert!(flush(&sync).is_empty());
        sync.set_config(ConfigFlag::Debug, false);
        assert_eq!(flush(&sync), vec!["CFG|DEBUG|0"]);
    }

    #[test]
    fn disconnect_forces_full_resend() {
        let sync = SyncHandle::new();
        sync.set_language("de");
        sync.set_config(ConfigFlag::Open, true);
        sync.set_config(ConfigFlag::SaveWav, false);
        flush(&sync);

        sync.on_disconnected();
        assert_eq!(
            flush(&sync),
            vec!["LANG|de", "CFG|OPEN|1", "CFG|SAVE_WAV|0"]
        );
    }

    #[test]
    fn failed_write_keeps_unsent_state_for_next_pass() {
        let sync = SyncHandle::new();
        sync.set_config(ConfigFlag::Open, true);
        sync.set_config(ConfigFlag::Close, true);
        sync.push_listen_shouts(true);

        let mut rec = Recorder {
            fail_after: Some(1),
            ..Default::default()
        };
        assert!(sync.flush(&mut rec).is_err());
        assert_eq!(rec.lines, vec!["CFG|OPEN|1"]);

        assert_eq!(flush(&sync), vec!["CFG|CLOSE|1", "LISTEN|SHOUTS|1"]);
    }

    #[test]
    fn newer_one_shot_wins_over_requeued_one() {
        let sync = SyncHandle::new();
        sync.push_listen(true);
        let steps = sync.lock().take_pending();
        sync.push_listen(false);
        sync.lock().requeue(steps);
        assert_eq!(flush(&sync), vec!["LISTEN|0"]);
    }
}
