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
use std::collections::HashSet;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use super::error::ConfigError;
use crate::saber::{Color, SaberId, SaberType};

/// A saber the host will own during the session.
#[derive(Deserialize, Clone, Debug)]
pub struct SaberDefinition {
    /// The saber's ID. Must be unique within the session.
    id: SaberId,
    /// The hand the saber belongs to.
    #[serde(rename = "type")]
    saber_type: SaberType,
    /// The starting color as [r, g, b, a].
    color: Color,
}

impl SaberDefinition {
    pub fn new(id: SaberId, saber_type: SaberType, color: Color) -> SaberDefinition {
        SaberDefinition {
            id,
            saber_type,
            color,
        }
    }

    pub fn id(&self) -> SaberId {
        self.id
    }

    pub fn saber_type(&self) -> SaberType {
        self.saber_type
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Something the host does during a session.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostEvent {
    /// The host reports a new saber. Omitting the saber sends an empty notification.
    Created { saber: Option<SaberId> },
    /// The host reports a destroyed saber.
    Destroyed { saber: SaberId },
    /// The host reports a color change. Omitting the saber sends an empty notification.
    Color { saber: Option<SaberId> },
    /// The host changes a saber's color without reporting it.
    Recolor { saber: SaberId, color: Color },
    /// The engine destroys a saber's presentation object.
    Detach { saber: SaberId },
    /// The host reaches the point where effects are safe to wire up.
    Initialize,
    Pause,
    Resume,
}

impl HostEvent {
    /// The saber the event refers to, if any.
    pub fn saber(&self) -> Option<SaberId> {
        match self {
            HostEvent::Created { saber } | HostEvent::Color { saber } => *saber,
            HostEvent::Destroyed { saber }
            | HostEvent::Recolor { saber, .. }
            | HostEvent::Detach { saber } => Some(*saber),
            HostEvent::Initialize | HostEvent::Pause | HostEvent::Resume => None,
        }
    }
}

fn default_pause_source() -> bool {
    true
}

/// The configuration for a scripted host session.
#[derive(Deserialize, Clone, Debug)]
pub struct Session {
    /// The sabers in the session. The first left and first right saber form the default pair.
    sabers: Vec<SaberDefinition>,
    /// Whether the host provides a pause source.
    #[serde(default = "default_pause_source")]
    pause_source: bool,
    /// The events to replay, in order.
    #[serde(default)]
    events: Vec<HostEvent>,
}

impl Session {
    pub fn new(sabers: Vec<SaberDefinition>, pause_source: bool, events: Vec<HostEvent>) -> Session {
        Session {
            sabers,
            pause_source,
            events,
        }
    }

    /// Parses and validates a session from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Session, ConfigError> {
        let session = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Session>()?;
        session.validate()?;
        Ok(session)
    }

    /// Parses and validates a session from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Session, ConfigError> {
        let session = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Session>()?;
        session.validate()?;
        Ok(session)
    }

    /// Checks that saber IDs are unique and that every event refers to a defined saber.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for saber in &self.sabers {
            if !ids.insert(saber.id) {
                return Err(ConfigError::DuplicateSaber(saber.id));
            }
        }

        for (event, saber) in self
            .events
            .iter()
            .enumerate()
            .filter_map(|(i, event)| event.saber().map(|saber| (i, saber)))
        {
            if !ids.contains(&saber) {
                return Err(ConfigError::UnknownSaber { event, saber });
            }
        }
        Ok(())
    }

    pub fn sabers(&self) -> &[SaberDefinition] {
        &self.sabers
    }

    pub fn pause_source(&self) -> bool {
        self.pause_source
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }
}
