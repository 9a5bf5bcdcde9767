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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::effects::{
    EffectError, EffectHandler, EffectSuite, MultiSaberModeOwner, Operation,
};
use crate::saber::{Saber, SaberId, SaberPair};

/// A single call made into a recording handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register(&'static str, SaberId),
    Unregister(&'static str, SaberId),
    ChangeColor(&'static str, SaberId),
    Initialize(&'static str, Option<SaberId>, Option<SaberId>),
}

/// Calls from every handler, in the order they happened.
pub type Journal = Arc<Mutex<Vec<Call>>>;

/// An effect handler that writes every call to a shared journal.
pub struct RecordingHandler {
    name: &'static str,
    journal: Journal,
    fail_on: Mutex<Option<Operation>>,
    multi_saber_mode: AtomicBool,
}

impl RecordingHandler {
    /// Handler names in dispatch order, as built by [`recording_suite`].
    pub const NAMES: [&'static str; 4] = ["clash", "area", "sparkles", "obstacles"];

    pub fn new(name: &'static str, journal: Journal) -> RecordingHandler {
        RecordingHandler {
            name,
            journal,
            fail_on: Mutex::new(None),
            multi_saber_mode: AtomicBool::new(false),
        }
    }

    /// Makes every future call of the given operation fail without being recorded.
    pub fn fail_on(&self, operation: Operation) {
        *self.fail_on.lock() = Some(operation);
    }

    fn record(
        &self,
        operation: Operation,
        saber: Option<SaberId>,
        call: Call,
    ) -> Result<(), EffectError> {
        if *self.fail_on.lock() == Some(operation) {
            return Err(EffectError::handler(
                self.name,
                operation,
                saber,
                "injected failure",
            ));
        }
        self.journal.lock().push(call);
        Ok(())
    }
}

impl EffectHandler for RecordingHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.record(
            Operation::Register,
            Some(saber.id()),
            Call::Register(self.name, saber.id()),
        )
    }

    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.record(
            Operation::Unregister,
            Some(saber.id()),
            Call::Unregister(self.name, saber.id()),
        )
    }

    fn change_color(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.record(
            Operation::ChangeColor,
            Some(saber.id()),
            Call::ChangeColor(self.name, saber.id()),
        )
    }

    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError> {
        self.record(
            Operation::Initialize,
            None,
            Call::Initialize(
                self.name,
                pair.left().map(|s| s.id()),
                pair.right().map(|s| s.id()),
            ),
        )
    }
}

impl MultiSaberModeOwner for RecordingHandler {
    fn multi_saber_mode(&self) -> bool {
        self.multi_saber_mode.load(Ordering::Relaxed)
    }

    fn set_multi_saber_mode(&self, enabled: bool) {
        self.multi_saber_mode.store(enabled, Ordering::Relaxed);
    }
}

/// Builds a suite of four recording handlers sharing one journal. The first
/// handler stands in for the clash checker.
pub fn recording_suite() -> (EffectSuite, Journal, [Arc<RecordingHandler>; 4]) {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let handlers =
        RecordingHandler::NAMES.map(|name| Arc::new(RecordingHandler::new(name, journal.clone())));
    let suite = EffectSuite::new(
        handlers[0].clone(),
        handlers[1].clone(),
        handlers[2].clone(),
        handlers[3].clone(),
    );
    (suite, journal, handlers)
}
