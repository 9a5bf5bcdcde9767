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

struct Slot {
    saber: Arc<Saber>,
    color: Color,
    /// Held by a register call.
    registered: bool,
    /// Held by the pair the effect was last initialized with.
    seeded: bool,
}

/// Per-saber colored slots shared by the burn mark effects. Sabers are told
/// apart by identity, not by ID.
#[derive(Default)]
struct ColorSlots {
    slots: Mutex<Vec<Slot>>,
}

impl ColorSlots {
    fn insert(&self, saber: &Arc<Saber>) {
        let mut slots = self.slots.lock();
        match slot_for(&mut slots, saber) {
            Some(slot) => {
                slot.registered = true;
                slot.color = saber.color();
            }
            None => slots.push(Slot {
                saber: saber.clone(),
                color: saber.color(),
                registered: true,
                seeded: false,
            }),
        }
    }

    fn remove(&self, saber: &Arc<Saber>) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slot_for(&mut slots, saber) {
            slot.registered = false;
        }
        slots.retain(|slot| slot.registered || slot.seeded);
    }

    /// Refreshes the color of a known saber. Unknown sabers are ignored.
    fn refresh(&self, saber: &Arc<Saber>) {
        if let Some(slot) = slot_for(&mut self.slots.lock(), saber) {
            slot.color = saber.color();
        }
    }

    /// Moves the seeded slots over to the given pair. Slots seeded for the
    /// previous pair go away unless their saber is registered.
    fn seed(&self, pair: &SaberPair) {
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            slot.seeded = false;
        }
        for saber in [pair.left(), pair.right()].into_iter().flatten() {
            match slot_for(&mut slots, &saber) {
                Some(slot) => {
                    slot.seeded = true;
                    slot.color = saber.color();
                }
                None => slots.push(Slot {
                    color: saber.color(),
                    saber,
                    registered: false,
                    seeded: true,
                }),
            }
        }
        slots.retain(|slot| slot.registered || slot.seeded);
    }

    /// Returns the color of the first slot held for a saber with this ID.
    fn get(&self, id: SaberId) -> Option<Color> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.saber.id() == id)
            .map(|slot| slot.color)
    }

    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

fn slot_for<'a>(slots: &'a mut [Slot], saber: &Arc<Saber>) -> Option<&'a mut Slot> {
    slots.iter_mut().find(|slot| Arc::ptr_eq(&slot.saber, saber))
}

/// The floor area that sabers leave burn trails on.
#[derive(Default)]
pub struct BurnMarkArea {
    trails: ColorSlots,
}

impl BurnMarkArea {
    pub fn new() -> BurnMarkArea {
        BurnMarkArea::default()
    }

    /// Returns the color of the trail drawn for the given saber.
    pub fn trail_color(&self, id: SaberId) -> Option<Color> {
        self.trails.get(id)
    }

    pub fn trail_count(&self) -> usize {
        self.trails.len()
    }
}

impl EffectHandler for BurnMarkArea {
    fn name(&self) -> &'static str {
        "burn-mark-area"
    }

    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.trails.insert(saber);
        Ok(())
    }

    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.trails.remove(saber);
        Ok(())
    }

    fn change_color(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.trails.refresh(saber);
        Ok(())
    }

    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError> {
        self.trails.seed(pair);
        Ok(())
    }
}

/// The sparkles emitted where a saber touches the floor.
#[derive(Default)]
pub struct BurnMarkSparkles {
    emitters: ColorSlots,
}

impl BurnMarkSparkles {
    pub fn new() -> BurnMarkSparkles {
        BurnMarkSparkles::default()
    }

    pub fn emitter_color(&self, id: SaberId) -> Option<Color> {
        self.emitters.get(id)
    }
}

impl EffectHandler for BurnMarkSparkles {
    fn name(&self) -> &'static str {
        "burn-mark-sparkles"
    }

    fn register_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.emitters.insert(saber);
        Ok(())
    }

    fn unregister_saber(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.emitters.remove(saber);
        Ok(())
    }

    fn change_color(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        self.emitters.refresh(saber);
        Ok(())
    }

    fn initialize(&self, pair: &SaberPair) -> Result<(), EffectError> {
        self.emitters.seed(pair);
        Ok(())
    }
}
