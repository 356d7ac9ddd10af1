use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

/// Tracks how many times the operator has asked us to stop, so a second
/// Ctrl-C escalates from graceful to immediate instead of being swallowed.
#[derive(Debug, Default)]
pub struct ShutdownController {
    requests: AtomicU8,
}

#[derive(Debug, Clone, Copy)]
pub enum ShutdownEvent {
    /// Stop accepting new work; let in-flight jobs finish.
    Graceful,
    /// Stop now, in-flight jobs be damned.
    Immediate,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u8 {
        self.requests.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub fn spawn_ctrl_c_handler(
    controller: Arc<ShutdownController>,
    events: mpsc::UnboundedSender<ShutdownEvent>,
) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let event = if controller.bump() == 1 {
                ShutdownEvent::Graceful
            } else {
                ShutdownEvent::Immediate
            };
            let escalate = matches!(event, ShutdownEvent::Immediate);
            if events.send(event).is_err() || escalate {
                return;
            }
        }
    });
}
