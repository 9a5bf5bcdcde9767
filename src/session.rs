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

//! Plays the host's side of a session against an effect manager.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, span, warn, Level, Span};

use crate::config::{self, ConfigError, HostEvent};
use crate::effects::{
    BurnMarkArea, BurnMarkSparkles, EffectError, EffectSuite, ObstacleSparkles,
    SaberClashChecker,
};
use crate::manager::EffectManager;
use crate::pause::{GamePause, PauseSource};
use crate::saber::{Saber, SaberId, SaberPair, SaberType};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up effects: {0}")]
    Setup(EffectError),

    #[error("Event {event} failed: {source}")]
    Effect {
        event: usize,
        #[source]
        source: EffectError,
    },
}

/// The state of a session after its events have been replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The number of events replayed.
    pub events: usize,
    /// Managed saber IDs in creation order.
    pub managed: Vec<SaberId>,
    pub multi_saber_mode: bool,
    /// The saber pairs the clash checker would test.
    pub clash_pairs: Vec<(SaberId, SaberId)>,
    /// Pause listeners left after teardown, if the host had a pause source.
    pub pause_listeners: Option<usize>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Events replayed: {}", self.events)?;
        writeln!(f, "Managed sabers: {:?}", self.managed)?;
        writeln!(f, "Multi-saber mode: {}", self.multi_saber_mode)?;
        writeln!(f, "Clash pairs: {:?}", self.clash_pairs)?;
        match self.pause_listeners {
            Some(count) => write!(f, "Pause listeners after teardown: {}", count),
            None => write!(f, "Pause listeners after teardown: no pause source"),
        }
    }
}

/// A host with a set of sabers, a pause signal and the four effect handlers,
/// all wired to one effect manager.
pub struct HostSession {
    sabers: HashMap<SaberId, Arc<Saber>>,
    pause: Option<Arc<GamePause>>,
    clash_checker: Arc<SaberClashChecker>,
    burn_mark_area: Arc<BurnMarkArea>,
    burn_mark_sparkles: Arc<BurnMarkSparkles>,
    obstacle_sparkles: Arc<ObstacleSparkles>,
    manager: EffectManager,
    events: Vec<HostEvent>,
    span: Span,
}

impl HostSession {
    /// Creates the session's sabers and effects from the given configuration.
    pub fn new(config: &config::Session) -> Result<HostSession, SessionError> {
        config.validate()?;
        let span = span!(Level::INFO, "session");

        let sabers: HashMap<SaberId, Arc<Saber>> = config
            .sabers()
            .iter()
            .map(|def| (def.id(), Saber::new(def.id(), def.saber_type(), def.color())))
            .collect();

        let first_of = |saber_type: SaberType| {
            config
                .sabers()
                .iter()
                .find(|def| def.saber_type() == saber_type)
                .and_then(|def| sabers.get(&def.id()).cloned())
        };
        let pair = Arc::new(SaberPair::new(
            first_of(SaberType::Left),
            first_of(SaberType::Right),
        ));

        let pause = config.pause_source().then(|| Arc::new(GamePause::new()));
        let clash_checker = Arc::new(SaberClashChecker::new());
        let burn_mark_area = Arc::new(BurnMarkArea::new());
        let burn_mark_sparkles = Arc::new(BurnMarkSparkles::new());
        let obstacle_sparkles = Arc::new(ObstacleSparkles::new());

        let suite = EffectSuite::new(
            clash_checker.clone(),
            burn_mark_area.clone(),
            burn_mark_sparkles.clone(),
            obstacle_sparkles.clone(),
        );
        let pause_source = pause
            .clone()
            .map(|pause| pause as Arc<dyn PauseSource>);
        let manager = EffectManager::new(suite, pair, pause_source)
            .map_err(SessionError::Setup)?;

        {
            let _enter = span.enter();
            info!(
                sabers = sabers.len(),
                pause_source = config.pause_source(),
                events = config.events().len(),
                "Session created."
            );
        }

        Ok(HostSession {
            sabers,
            pause,
            clash_checker,
            burn_mark_area,
            burn_mark_sparkles,
            obstacle_sparkles,
            manager,
            events: config.events().to_vec(),
            span,
        })
    }

    /// Applies a single host event.
    pub fn apply(&self, event: &HostEvent) -> Result<(), EffectError> {
        match event {
            HostEvent::Created { saber } => self.manager.saber_created(self.lookup(*saber)),
            HostEvent::Destroyed { saber } => match self.saber(*saber) {
                Some(saber) => self.manager.saber_destroyed(&saber),
                None => Ok(()),
            },
            HostEvent::Color { saber } => self.manager.change_color(self.lookup(*saber)),
            HostEvent::Recolor { saber, color } => {
                if let Some(saber) = self.saber(*saber) {
                    saber.set_color(*color);
                }
                Ok(())
            }
            HostEvent::Detach { saber } => {
                if let Some(saber) = self.saber(*saber) {
                    saber.detach_presentation();
                }
                Ok(())
            }
            HostEvent::Initialize => self.manager.initialize(),
            HostEvent::Pause => {
                match &self.pause {
                    Some(pause) => pause.pause(),
                    None => warn!("Pause requested without a pause source."),
                }
                Ok(())
            }
            HostEvent::Resume => {
                match &self.pause {
                    Some(pause) => pause.resume(),
                    None => warn!("Resume requested without a pause source."),
                }
                Ok(())
            }
        }
    }

    /// Replays every configured event in order, then tears the manager down.
    pub fn run(self) -> Result<Report, SessionError> {
        let _enter = self.span.enter();

        for (i, event) in self.events.iter().enumerate() {
            info!(event = i, ?event, "Applying host event.");
            if let Err(source) = self.apply(event) {
                self.manager.dispose();
                return Err(SessionError::Effect { event: i, source });
            }
        }
        self.manager.dispose();

        let report = Report {
            events: self.events.len(),
            managed: self.manager.managed_sabers().iter().map(|s| s.id()).collect(),
            multi_saber_mode: self.manager.multi_saber_mode(),
            clash_pairs: self.clash_checker.candidate_pairs(),
            pause_listeners: self.pause.as_ref().map(|pause| pause.listener_count()),
        };
        info!(managed = report.managed.len(), "Session finished.");
        Ok(report)
    }

    pub fn manager(&self) -> &EffectManager {
        &self.manager
    }

    pub fn saber(&self, id: SaberId) -> Option<Arc<Saber>> {
        let saber = self.sabers.get(&id).cloned();
        if saber.is_none() {
            warn!(saber = id, "Unknown saber.");
        }
        saber
    }

    pub fn clash_checker(&self) -> &SaberClashChecker {
        &self.clash_checker
    }

    pub fn burn_mark_area(&self) -> &BurnMarkArea {
        &self.burn_mark_area
    }

    pub fn burn_mark_sparkles(&self) -> &BurnMarkSparkles {
        &self.burn_mark_sparkles
    }

    pub fn obstacle_sparkles(&self) -> &ObstacleSparkles {
        &self.obstacle_sparkles
    }

    fn lookup(&self, id: Option<SaberId>) -> Option<Arc<Saber>> {
        id.and_then(|id| self.saber(id))
    }
}
