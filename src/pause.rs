// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

/// The two signals a pause source emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseEvent {
    Paused,
    Resumed,
}

impl fmt::Display for PauseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseEvent::Paused => write!(f, "paused"),
            PauseEvent::Resumed => write!(f, "resumed"),
        }
    }
}

/// Identifies one subscription to a pause source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type PauseCallback = Arc<dyn Fn() + Send + Sync>;

/// Something that reports when the simulation pauses and resumes.
pub trait PauseSource: Send + Sync {
    /// Registers a callback for the given signal.
    fn subscribe(&self, event: PauseEvent, callback: PauseCallback) -> SubscriptionId;

    /// Removes a callback. Returns false if it wasn't subscribed.
    fn unsubscribe(&self, event: PauseEvent, id: SubscriptionId) -> bool;
}

/// The host's pause state. Fires callbacks only when the state actually changes.
#[derive(Default)]
pub struct GamePause {
    paused: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, PauseEvent, PauseCallback)>>,
}

impl GamePause {
    pub fn new() -> GamePause {
        GamePause::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Pauses the simulation. Does nothing if already paused.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::Relaxed) {
            self.fire(PauseEvent::Paused);
        }
    }

    /// Resumes the simulation. Does nothing if not paused.
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::Relaxed) {
            self.fire(PauseEvent::Resumed);
        }
    }

    /// The number of live subscriptions across both signals.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn fire(&self, event: PauseEvent) {
        // Callbacks are cloned out so they can unsubscribe while firing.
        let callbacks: Vec<PauseCallback> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, subscribed, _)| *subscribed == event)
            .map(|(_, _, callback)| callback.clone())
            .collect();

        info!(%event, listeners = callbacks.len(), "Game pause state changed.");
        for callback in callbacks {
            callback();
        }
    }
}

impl PauseSource for GamePause {
    fn subscribe(&self, event: PauseEvent, callback: PauseCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, event, callback));
        debug!(%event, ?id, "Subscribed to pause source.");
        id
    }

    fn unsubscribe(&self, event: PauseEvent, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, subscribed, _)| !(*existing == id && *subscribed == event));
        before != listeners.len()
    }
}
