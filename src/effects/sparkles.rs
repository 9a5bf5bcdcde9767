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

use super::{EffectError, EffectHandler};
use crate::saber::{Color, Saber, SaberId, SaberPair};

struct SparkleEffect {
    saber: Arc<Saber>,
    color: Color,
}

#[derive(Default)]
struct ObstacleState {
    effects: Vec<SparkleEffect>,
    initialized_with: Option<(Option<SaberId>, Option<SaberId>)>,
}

/// Sparkles emitted where a saber cuts through an obstacle. One effect per
/// saber, in registration order.
#[derive(Default)]
pub struct ObstacleSparkles {
    state: Mutex<ObstacleState>,
}

impl ObstacleSparkles {
    pub fn new() -> ObstacleSparkles {
        ObstacleSparkles::default()
    }

    pub fn effect_color(&self, id: SaberId) -> Option<Color> {
        self.state
            .lock()
            .effects
            .iter()
            .find(|effect| effect.saber.id() == id)
            .map(|effect| effect.color)
    }

    pub fn effect_count(&self) -> usize {
        self.state.lock().effects.len()
    }

    /// The left/right IDs from the last initialize, if any.
    pub fn initialized_with(&self) -> Option<(Option<SaberId>, Option<SaberId>)> {
        self.state.lock().initialized_with
    }
}

impl EffectHandler for ObstacleSparkles {
    fn name(&self) -> &'static str {
        "obstacle-sparkles"
    }

    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        let mut state = self.state.lock();
        let color = saber.color();
        match state
            .effects
            .iter_mut()
            .find(|effect| Arc::ptr_eq(&effect.saber, saber))
        {
            Some(effect) => effect.color = color,
            None => state.effects.push(SparkleEffect {
                saber: saber.clone(),
                color,
            }),
        }
        Ok(())
    }

    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.state
            .lock()
            .effects
            .retain(|effect| !Arc::ptr_eq(&effect.saber, saber));
        Ok(())
    }

    fn change_color(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        if let Some(effect) = self
            .state
            .lock()
            .effects
            .iter_mut()
            .find(|effect| Arc::ptr_eq(&effect.saber, saber))
        {
            effect.color = saber.color();
        }
        Ok(())
    }

    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError> {
        let left = pair.left();
        let right = pair.right();
        for saber in [&left, &right].into_iter().flatten() {
            self.register_saber(saber)?;
        }
        self.state.lock().initialized_with =
            Some((left.map(|s| s.id()), right.map(|s| s.id())));
        Ok(())
    }
}
