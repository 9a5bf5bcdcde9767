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

//! Effect handlers: the subsystems that react to saber lifecycle and color events.

use std::fmt;
use std::sync::Arc;

use crate::saber::{Saber, SaberId, SaberPair};

mod burn_marks;
mod clash;
mod sparkles;

pub use burn_marks::{BurnMarkArea, BurnMarkSparkles};
pub use clash::SaberClashChecker;
pub use sparkles::ObstacleSparkles;

/// The handler operation that was running when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Unregister,
    ChangeColor,
    Initialize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Register => write!(f, "register saber"),
            Operation::Unregister => write!(f, "unregister saber"),
            Operation::ChangeColor => write!(f, "change color"),
            Operation::Initialize => write!(f, "initialize"),
        }
    }
}

/// Errors raised by effect handlers.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("{handler} failed to {operation} (saber {saber:?}): {reason}")]
    Handler {
        handler: &'static str,
        operation: Operation,
        saber: Option<SaberId>,
        reason: String,
    },
}

impl EffectError {
    pub fn handler(
        handler: &'static str,
        operation: Operation,
        saber: Option<SaberId>,
        reason: impl Into<String>,
    ) -> EffectError {
        EffectError::Handler {
            handler,
            operation,
            saber,
            reason: reason.into(),
        }
    }
}

/// A visual or physical effect that tracks sabers.
///
/// Handlers are called synchronously from the host's event thread. They may
/// call back into the effect manager.
pub trait EffectHandler: Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Starts tracking the given saber.
    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError>;

    /// Stops tracking the given saber. Unknown sabers must be ignored.
    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError>;

    /// Picks up the current color of the given saber.
    fn change_color(&self, saber: &Arc<Saber>) -> Result<(), EffectError>;

    /// Rebuilds any state keyed off the canonical left/right pair.
    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError>;
}

/// Owns the flag that marks the switch from the default two sabers to an
/// arbitrary number of sabers.
pub trait MultiSaberModeOwner: Send + Sync {
    fn multi_saber_mode(&self) -> bool;

    fn set_multi_saber_mode(&self, enabled: bool);
}

/// The fixed set of effect handlers the manager drives.
pub struct EffectSuite {
    clash_checker: Arc<dyn EffectHandler>,
    mode_owner: Arc<dyn MultiSaberModeOwner>,
    burn_mark_area: Arc<dyn EffectHandler>,
    burn_mark_sparkles: Arc<dyn EffectHandler>,
    obstacle_sparkles: Arc<dyn EffectHandler>,
}

impl EffectSuite {
    /// Creates a new suite. The clash checker also owns the multi-saber mode flag.
    pub fn new<C>(
        clash_checker: Arc<C>,
        burn_mark_area: Arc<dyn EffectHandler>,
        burn_mark_sparkles: Arc<dyn EffectHandler>,
        obstacle_sparkles: Arc<dyn EffectHandler>,
    ) -> EffectSuite
    where
        C: EffectHandler + MultiSaberModeOwner + 'static,
    {
        EffectSuite {
            clash_checker: clash_checker.clone(),
            mode_owner: clash_checker,
            burn_mark_area,
            burn_mark_sparkles,
            obstacle_sparkles,
        }
    }

    pub fn clash_checker(&self) -> &Arc<dyn EffectHandler> {
        &self.clash_checker
    }

    /// Splits the suite into the ordered dispatch list and the mode flag owner.
    pub(crate) fn into_parts(
        self,
    ) -> (Vec<Arc<dyn EffectHandler>>, Arc<dyn MultiSaberModeOwner>) {
        (
            vec![
                self.clash_checker,
                self.burn_mark_area,
                self.burn_mark_sparkles,
                self.obstacle_sparkles,
            ],
            self.mode_owner,
        )
    }
}
