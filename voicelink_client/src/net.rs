use crate::channel::LineChannel;
use crate::config::ClientConfig;
use crate::protocol::{decode_line, ConnectionTransition, InboundEvent, Trigger};
use crate::sync::SyncHandle;
use crate::tasks::sleep_unless_shutdown;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Bounded FIFO of decoded events. When full, the oldest event is dropped to
/// make room: a stale recognition result is worth less than a fresh one.
#[derive(Clone)]
pub struct InboundQueue {
    tx: Sender<InboundEvent>,
    rx: Receiver<InboundEvent>,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    pub fn push(&self, event: InboundEvent) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if let Ok(dropped) = self.rx.try_recv() {
                        debug!(target: "voicelink::net", ?dropped, "inbound queue full, dropped oldest");
                    }
                    event = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn pop(&self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Single-slot cell holding the latest unread connection transition.
#[derive(Clone, Default)]
pub struct TransitionSlot {
    slot: Arc<Mutex<Option<ConnectionTransition>>>,
}

impl TransitionSlot {
    pub fn set(&self, t: ConnectionTransition) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(t);
    }

    pub fn take(&self) -> Option<ConnectionTransition> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

pub struct ConnectionThread {
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionThread {
    pub fn spawn(
        config: ClientConfig,
        sync: SyncHandle,
        inbound: InboundQueue,
        transitions: TransitionSlot,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);

        let join_handle = thread::spawn(move || {
            run_connection(config, sync, inbound, transitions, shutdown_for_thread)
        });

        Self {
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for ConnectionThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_connection(
    config: ClientConfig,
    sync: SyncHandle,
    inbound: InboundQueue,
    transitions: TransitionSlot,
    shutdown: Arc<AtomicBool>,
) {
    let mut channel = LineChannel::new();

    while !shutdown.load(Ordering::Relaxed) {
        if !channel.is_connected() {
            match config.endpoint.connect() {
                Ok(duplex) => {
                    channel.attach(duplex);
                    info!(target: "voicelink::net", endpoint = ?config.endpoint, "connected");
                    transitions.set(ConnectionTransition::Connected);
                }
                Err(e) => {
                    debug!(target: "voicelink::net", error = %e, "connect failed, retrying");
                    sleep_unless_shutdown(config.reconnect_backoff, &shutdown);
                    continue;
                }
            }
        }

        let written = match sync.flush(&mut channel) {
            Ok(n) => n,
            Err(e) => {
                warn!(target: "voicelink::net", error = %e, "write failed");
                on_lost(&mut channel, &sync, &transitions);
                sleep_unless_shutdown(config.reconnect_backoff, &shutdown);
                continue;
            }
        };

        let mut lost = false;
        loop {
            match channel.try_read_line() {
                Ok(Some(line)) => handle_line(&inbound, &line),
                Ok(None) => break,
                Err(e) => {
                    warn!(target: "voicelink::net", error = %e, "read failed");
                    lost = true;
                    break;
                }
            }
        }
        if lost {
            on_lost(&mut channel, &sync, &transitions);
            sleep_unless_shutdown(config.reconnect_backoff, &shutdown);
            continue;
        }

        if written == 0 {
            thread::sleep(config.idle_sleep);
        }
    }

    channel.close();
}

fn on_lost(channel: &mut LineChannel, sync: &SyncHandle, transitions: &TransitionSlot) {
    channel.close();
    sync.on_disconnected();
    transitions.set(ConnectionTransition::Disconnected);
    info!(target: "voicelink::net", "disconnected");
}

fn handle_line(inbound: &InboundQueue, line: &str) {
    let event = decode_line(line);
    match &event {
        InboundEvent::Result { index, score } => {
            info!(target: "voicelink::net", index, score, "recv result");
        }
        InboundEvent::Trigger(t) => log_trigger(t),
        InboundEvent::DebugText { text } => {
            info!(target: "voicelink::net", text = %text, "recv debug");
        }
        InboundEvent::RawStatus { text } => {
            if text.starts_with("effective:") {
                info!(target: "voicelink::net", status = %text, "listen status");
            } else {
                debug!(target: "voicelink::net", line = %text, "unrecognized line dropped");
            }
            return;
        }
    }
    inbound.push(event);
}

fn log_trigger(t: &Trigger) {
    match t {
        Trigger::Open { score, text } => {
            info!(target: "voicelink::net", kind = "open", score, text = %text, "recv trigger");
        }
        Trigger::Shout {
            plugin,
            form_id,
            power,
            score,
            text,
        } => {
            info!(
                target: "voicelink::net",
                kind = "shout",
                plugin = %plugin,
                form_id = %form_id,
                power,
                score,
                text = %text,
                "recv trigger"
            );
        }
        Trigger::Power {
            form_id,
            score,
            text,
        } => {
            info!(target: "voicelink::net", kind = "power", form_id = %form_id, score, text = %text, "recv trigger");
        }
        Trigger::Item {
            item,
            form_id,
            score,
            text,
        } => {
            info!(target: "voicelink::net", kind = %item, form_id = %form_id, score, text = %text, "recv trigger");
        }
        Trigger::Other { name, score, text } => {
            info!(target: "voicelink::net", kind = %name, score, text = %text, "recv trigger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_oldest() {
        let q = InboundQueue::new(2);
        for index in 0..3 {
            q.push(InboundEvent::Result { index, score: 0.5 });
        }
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(InboundEvent::Result { index: 1, score: 0.5 }));
        assert_eq!(q.pop(), Some(InboundEvent::Result { index: 2, score: 0.5 }));
        assert!(q.pop().is_none());
    }

    #[test]
    fn transition_slot_keeps_latest() {
        let slot = TransitionSlot::default();
        slot.set(ConnectionTransition::Connected);
        slot.set(ConnectionTransition::Disconnected);
        assert_eq!(slot.take(), Some(ConnectionTransition::Disconnected));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn status_lines_are_not_queued() {
        let q = InboundQueue::new(4);
        handle_line(&q, "effective: dialog=0 focus=1");
        handle_line(&q, "RES|abc|xyz");
        assert_eq!(q.pop(), Some(InboundEvent::Result { index: -1, score: 0.0 }));
        assert!(q.is_empty());
    }
}
