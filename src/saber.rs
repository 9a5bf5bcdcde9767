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
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;

/// Identifies a saber within a session.
pub type SaberId = u32;

/// Which hand a saber belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaberType {
    Left,
    Right,
}

impl fmt::Display for SaberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaberType::Left => write!(f, "left"),
            SaberType::Right => write!(f, "right"),
        }
    }
}

/// An RGBA color with components in the range 0.0 to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }
}

impl From<[f32; 4]> for Color {
    fn from(rgba: [f32; 4]) -> Self {
        Color::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({:.2}, {:.2}, {:.2}, {:.2})",
            self.r, self.g, self.b, self.a
        )
    }
}

/// The engine-side object that renders a saber. Owns the visibility flag.
#[derive(Debug)]
struct Presentation {
    active: bool,
}

/// A handheld saber owned by the host. Sabers are shared as `Arc<Saber>` and
/// compared by identity, never by value.
pub struct Saber {
    id: SaberId,
    saber_type: SaberType,
    color: Mutex<Color>,
    presentation: Mutex<Option<Presentation>>,
}

impl Saber {
    /// Creates a new, visible saber.
    pub fn new(id: SaberId, saber_type: SaberType, color: Color) -> Arc<Saber> {
        Arc::new(Saber {
            id,
            saber_type,
            color: Mutex::new(color),
            presentation: Mutex::new(Some(Presentation { active: true })),
        })
    }

    pub fn id(&self) -> SaberId {
        self.id
    }

    pub fn saber_type(&self) -> SaberType {
        self.saber_type
    }

    pub fn color(&self) -> Color {
        *self.color.lock()
    }

    /// Sets the color. Effects only pick this up once they are told about the change.
    pub fn set_color(&self, color: Color) {
        *self.color.lock() = color;
    }

    /// Returns true while the presentation object still exists.
    pub fn has_presentation(&self) -> bool {
        self.presentation.lock().is_some()
    }

    /// Removes the presentation object, as when the engine destroys it out from
    /// under the saber.
    pub fn detach_presentation(&self) {
        *self.presentation.lock() = None;
    }

    /// Returns the visibility flag, or None if the presentation object is gone.
    pub fn is_active(&self) -> Option<bool> {
        self.presentation.lock().as_ref().map(|p| p.active)
    }

    /// Sets the visibility flag. Returns false if there is no presentation object.
    pub fn set_active(&self, active: bool) -> bool {
        match self.presentation.lock().as_mut() {
            Some(presentation) => {
                presentation.active = active;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Saber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Saber")
            .field("id", &self.id)
            .field("saber_type", &self.saber_type)
            .field("color", &self.color())
            .field("active", &self.is_active())
            .finish()
    }
}

impl fmt::Display for Saber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} saber {}", self.saber_type, self.id)
    }
}

/// Holds the canonical left and right sabers of the default two-saber setup.
#[derive(Default)]
pub struct SaberPair {
    sabers: RwLock<(Option<Arc<Saber>>, Option<Arc<Saber>>)>,
}

impl SaberPair {
    pub fn new(left: Option<Arc<Saber>>, right: Option<Arc<Saber>>) -> SaberPair {
        SaberPair {
            sabers: RwLock::new((left, right)),
        }
    }

    pub fn left(&self) -> Option<Arc<Saber>> {
        self.sabers.read().0.clone()
    }

    pub fn right(&self) -> Option<Arc<Saber>> {
        self.sabers.read().1.clone()
    }

    /// Overwrites both slots at once.
    pub fn set(&self, left: Option<Arc<Saber>>, right: Option<Arc<Saber>>) {
        *self.sabers.write() = (left, right);
    }

    /// Returns true if the given saber currently occupies either slot.
    pub fn contains(&self, saber: &Arc<Saber>) -> bool {
        let sabers = self.sabers.read();
        let held = [&sabers.0, &sabers.1]
            .into_iter()
            .flatten()
            .any(|held| Arc::ptr_eq(held, saber));
        held
    }
}

impl fmt::Debug for SaberPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sabers = self.sabers.read();
        f.debug_struct("SaberPair")
            .field("left", &sabers.0.as_ref().map(|s| s.id()))
            .field("right", &sabers.1.as_ref().map(|s| s.id()))
            .finish()
    }
}
