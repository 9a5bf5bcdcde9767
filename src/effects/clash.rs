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
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{EffectError, EffectHandler, MultiSaberModeOwner};
use crate::saber::{Saber, SaberId, SaberPair};

#[derive(Default)]
struct ClashState {
    /// Sabers registered through the effect manager.
    sabers: Vec<Arc<Saber>>,
    /// The canonical pair as of the last initialize.
    left: Option<Arc<Saber>>,
    right: Option<Arc<Saber>>,
    multi_saber_mode: bool,
}

/// Decides which sabers are tested against each other for clashes. The
/// geometry itself is left to the host; this only tracks membership.
#[derive(Default)]
pub struct SaberClashChecker {
    state: Mutex<ClashState>,
}

impl SaberClashChecker {
    pub fn new() -> SaberClashChecker {
        SaberClashChecker::default()
    }

    /// Returns the IDs of the sabers registered with the checker, in registration order.
    pub fn registered(&self) -> Vec<SaberId> {
        self.state.lock().sabers.iter().map(|s| s.id()).collect()
    }

    /// Returns the saber pairs a clash pass would test. Outside of multi-saber
    /// mode this is just the canonical pair.
    pub fn candidate_pairs(&self) -> Vec<(SaberId, SaberId)> {
        let state = self.state.lock();

        if !state.multi_saber_mode {
            return match (&state.left, &state.right) {
                (Some(left), Some(right)) => vec![(left.id(), right.id())],
                _ => Vec::new(),
            };
        }

        let mut everyone: Vec<&Arc<Saber>> = Vec::new();
        for saber in [&state.left, &state.right]
            .into_iter()
            .flatten()
            .chain(state.sabers.iter())
        {
            if !everyone.iter().any(|seen| Arc::ptr_eq(seen, saber)) {
                everyone.push(saber);
            }
        }

        let mut pairs = Vec::new();
        for (i, a) in everyone.iter().enumerate() {
            for b in everyone.iter().skip(i + 1) {
                pairs.push((a.id(), b.id()));
            }
        }
        pairs
    }
}

impl EffectHandler for SaberClashChecker {
    fn name(&self) -> &'static str {
        "clash-checker"
    }

    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        let mut state = self.state.lock();
        if !state.sabers.iter().any(|s| Arc::ptr_eq(s, saber)) {
            state.sabers.push(saber.clone());
        }
        Ok(())
    }

    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.state.lock().sabers.retain(|s| !Arc::ptr_eq(s, saber));
        Ok(())
    }

    fn change_color(&self, _saber: &Arc<Saber>) -> Result<(), EffectError> {
        // Clash detection doesn't depend on color.
        Ok(())
    }

    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError> {
        let mut state = self.state.lock();
        state.left = pair.left();
        state.right = pair.right();
        debug!(
            left = ?state.left.as_ref().map(|s| s.id()),
            right = ?state.right.as_ref().map(|s| s.id()),
            "Clash checker initialized."
        );
        Ok(())
    }
}

impl MultiSaberModeOwner for SaberClashChecker {
    fn multi_saber_mode(&self) -> bool {
        self.state.lock().multi_saber_mode
    }

    fn set_multi_saber_mode(&self, enabled: bool) {
        self.state.lock().multi_saber_mode = enabled;
    }
}
