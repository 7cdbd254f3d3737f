//! Async session runtime pump.
//!
//! Bridges the driver to the host transport: one spawned task drains the
//! inbound frame channel and drives periodic frame ticks. Inbound dispatch
//! runs on this task, which is what makes blocking round trips issued from
//! the frame-loop side answerable (see [`crate::roundtrip`]).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::SessionDriver;

pub struct SessionRuntime {
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl SessionRuntime {
    /// Spawn the pump. Ticks at the driver's configured interval; exits when
    /// cancelled or when the inbound channel closes.
    pub fn spawn(driver: SessionDriver, mut inbound: mpsc::UnboundedReceiver<String>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tick = std::time::Duration::from_millis(driver.config().tick_interval_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!("Session runtime cancelled");
                        break;
                    }
                    frame = inbound.recv() => match frame {
                        Some(text) => driver.handle_message(&text).await,
                        None => {
                            debug!("Inbound channel closed, stopping runtime");
                            break;
                        }
                    },
                    _ = ticker.tick() => driver.frame_tick().await,
                }
            }
            info!("Session runtime stopped");
        });

        Self { handle, cancel }
    }

    /// Stop the pump and wait for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
