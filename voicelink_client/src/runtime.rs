use crate::client::Client;
use crate::config::ClientConfig;
use crate::host::HostApi;
use crate::logging::{self, LogConfig};
use crate::net::ConnectionThread;
use crate::settings::Settings;
use crate::tasks::{sleep_unless_shutdown, ThreadTimer, Timer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

/// Calls [`Client::tick`] at a fixed interval until shut down.
pub struct PollThread {
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollThread {
    pub fn spawn(client: Client, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);

        let join_handle = thread::spawn(move || {
            while !shutdown_for_thread.load(Ordering::Relaxed) {
                client.tick(Instant::now());
                sleep_unless_shutdown(interval, &shutdown_for_thread);
            }
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

impl Drop for PollThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A running client: the connection thread, the poll thread and the delay
/// timer, wired to one [`Client`]. Host hooks go through [`Self::client`].
pub struct VoiceLinkRuntime {
    client: Client,
    poll: PollThread,
    connection: ConnectionThread,
    timer: Arc<ThreadTimer>,
}

impl VoiceLinkRuntime {
    pub fn start(config: ClientConfig, host: Arc<dyn HostApi>, settings: Settings) -> Self {
        if let Some(log) = &config.log {
            logging::init(&LogConfig {
                debug: log.debug || settings.debug,
                ..log.clone()
            });
        }
        let timer = Arc::new(ThreadTimer::spawn());
        let client = Client::with_settings(&config, host, Arc::clone(&timer) as Arc<dyn Timer>, settings);

        let connection = ConnectionThread::spawn(
            config.clone(),
            client.sync().clone(),
            client.inbound().clone(),
            client.transitions().clone(),
        );
        let poll = PollThread::spawn(client.clone(), config.poll_interval);
        info!(target: "voicelink::net", endpoint = ?config.endpoint, "runtime started");

        Self {
            client,
            poll,
            connection,
            timer,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Stops ticking first so no new work is queued, then the connection,
    /// then the timer. Pending timer jobs are dropped.
    pub fn shutdown(&self) {
        self.poll.shutdown();
        self.connection.shutdown();
        self.timer.shutdown();
        info!(target: "voicelink::net", "runtime stopped");
    }
}

impl Drop for VoiceLinkRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
