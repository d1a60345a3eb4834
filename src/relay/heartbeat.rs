//! Periodic keep-alive markers for idle subscribers.

use crate::events::shaper;
use crate::publisher::Publisher;
use crate::types::TenantKey;
use crossbeam_channel::{select, tick, unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread publishing heartbeats for one tenant.
///
/// Fires once on start, then every `interval`. Ticks missed while a publish
/// was running are skipped, not queued.
pub struct Heartbeat {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start(
        tenant: TenantKey,
        publishers: Vec<Arc<dyn Publisher>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = unbounded::<()>();

        let thread = thread::Builder::new()
            .name("relay-heartbeat".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                let tenants = [tenant];
                loop {
                    for publisher in &publishers {
                        publisher.publish(&tenants, shaper::heartbeat());
                    }

                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {}
                    }
                }
                tracing::debug!(tenant = %tenants[0], "Heartbeat stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        // Closing the channel wakes the select.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
