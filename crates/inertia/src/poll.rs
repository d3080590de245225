//! Periodic background reloads.

use crate::sync::lock;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Every running poll loop. A non-partial protocol response stops them all.
#[derive(Debug, Default)]
pub struct PollRegistry {
    loops: Mutex<Vec<CancellationToken>>,
}

impl PollRegistry {
    pub fn register(&self) -> PollHandle {
        let token = CancellationToken::new();
        let mut loops = lock(&self.loops);
        loops.retain(|running| !running.is_cancelled());
        loops.push(token.clone());
        PollHandle { token }
    }

    /// Stop every loop.
    pub fn clear(&self) {
        let stopped: Vec<CancellationToken> = lock(&self.loops).drain(..).collect();
        for token in stopped {
            token.cancel();
        }
    }

    /// Loops still running.
    pub fn len(&self) -> usize {
        lock(&self.loops)
            .iter()
            .filter(|token| !token.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to one poll loop started by [`Router::poll`](crate::router::Router::poll).
#[derive(Clone, Debug)]
pub struct PollHandle {
    token: CancellationToken,
}

impl PollHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
