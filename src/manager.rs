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

//! Routes saber lifecycle events from the host to every effect handler.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::effects::{
    EffectError, EffectHandler, EffectSuite, MultiSaberModeOwner, Operation,
};
use crate::pause::{PauseCallback, PauseEvent, PauseSource, SubscriptionId};
use crate::saber::{Saber, SaberPair};

type Subscriptions = (SubscriptionId, SubscriptionId);

/// Mutable manager state. The lock is never held while a handler runs.
#[derive(Default)]
struct State {
    /// Set once by initialize and never cleared.
    ready: bool,
    /// Sabers registered with every handler, in creation order.
    managed: Vec<Arc<Saber>>,
    /// Creation events received before initialize.
    pending_created: VecDeque<Option<Arc<Saber>>>,
    /// Color events received before initialize.
    pending_colors: VecDeque<Option<Arc<Saber>>>,
    /// Pause and resume subscriptions, while subscribed.
    subscriptions: Option<Subscriptions>,
}

struct Inner {
    /// Dispatch order: clash checker, burn mark area, burn mark sparkles, obstacle sparkles.
    handlers: Vec<Arc<dyn EffectHandler>>,
    mode_owner: Arc<dyn MultiSaberModeOwner>,
    pair: Arc<SaberPair>,
    pause: Option<Arc<dyn PauseSource>>,
    state: Mutex<State>,
    span: Span,
}

/// Coordinates the effect handlers for a session.
///
/// Creation and color events that arrive before [`EffectManager::initialize`]
/// are queued and replayed in order once it runs. Handlers may call back into
/// the manager from any callback. Cloning yields another handle to the same
/// manager.
#[derive(Clone)]
pub struct EffectManager {
    inner: Arc<Inner>,
}

impl EffectManager {
    /// Creates a new manager. The clash checker is initialized with the pair
    /// before anything else happens.
    pub fn new(
        suite: EffectSuite,
        pair: Arc<SaberPair>,
        pause: Option<Arc<dyn PauseSource>>,
    ) -> Result<EffectManager, EffectError> {
        suite.clash_checker().initialize(&pair)?;
        let (handlers, mode_owner) = suite.into_parts();

        Ok(EffectManager {
            inner: Arc::new(Inner {
                handlers,
                mode_owner,
                pair,
                pause,
                state: Mutex::new(State::default()),
                span: span!(Level::INFO, "effect_manager"),
            }),
        })
    }

    /// Marks the manager ready, replays queued events and subscribes to the
    /// pause source. Queued creations are replayed before queued color changes.
    pub fn initialize(&self) -> Result<(), EffectError> {
        let _enter = self.inner.span.enter();
        let (created, colors) = {
            let mut state = self.inner.state.lock();
            if !state.ready {
                info!("Effect manager ready.");
            }
            state.ready = true;
            (
                mem::take(&mut state.pending_created),
                mem::take(&mut state.pending_colors),
            )
        };

        if !created.is_empty() || !colors.is_empty() {
            info!(
                created = created.len(),
                colors = colors.len(),
                "Replaying queued saber events."
            );
        }

        let mut created = created.into_iter();
        let mut colors = colors.into_iter();
        while let Some(saber) = created.next() {
            if let Err(e) = self.inner.saber_created(saber) {
                warn!(
                    dropped = created.len() + colors.len(),
                    "Abandoning queued saber events."
                );
                return Err(e);
            }
        }
        while let Some(saber) = colors.next() {
            if let Err(e) = self.inner.change_color(saber) {
                warn!(dropped = colors.len(), "Abandoning queued color events.");
                return Err(e);
            }
        }

        self.subscribe();
        Ok(())
    }

    /// Releases the pause subscriptions. Safe to call more than once.
    pub fn dispose(&self) {
        let _enter = self.inner.span.enter();
        let subscriptions = self.inner.state.lock().subscriptions.take();
        self.inner.unsubscribe(subscriptions);
    }

    /// Registers a saber with every handler, or queues it until initialize.
    /// The first call of all switches on multi-saber mode and repatches the
    /// default pair, whether the saber was registered, queued or `None`.
    pub fn saber_created(&self, saber: impl Into<Option<Arc<Saber>>>) -> Result<(), EffectError> {
        let _enter = self.inner.span.enter();
        self.inner.saber_created(saber.into())
    }

    /// Unregisters a saber from every handler. Unknown sabers are not an error.
    pub fn saber_destroyed(&self, saber: &Arc<Saber>) -> Result<(), EffectError> {
        let _enter = self.inner.span.enter();
        self.inner
            .state
            .lock()
            .managed
            .retain(|managed| !Arc::ptr_eq(managed, saber));

        self.inner
            .dispatch(Operation::Unregister, saber, |handler, saber| {
                handler.unregister_saber(saber)
            })
    }

    /// Tells every handler that the saber's color changed.
    pub fn change_color(&self, saber: impl Into<Option<Arc<Saber>>>) -> Result<(), EffectError> {
        let _enter = self.inner.span.enter();
        let saber = saber.into();
        {
            let mut state = self.inner.state.lock();
            if !state.ready {
                state.pending_colors.push_back(saber);
                return Ok(());
            }
        }
        self.inner.change_color(saber)
    }

    /// Replaces the pair's left and right sabers and re-initializes every
    /// handler with it.
    pub fn repatch_default(
        &self,
        left: Option<Arc<Saber>>,
        right: Option<Arc<Saber>>,
        pair: &SaberPair,
    ) -> Result<(), EffectError> {
        let _enter = self.inner.span.enter();
        self.inner.repatch_default(left, right, pair)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    /// Returns the managed sabers in creation order.
    pub fn managed_sabers(&self) -> Vec<Arc<Saber>> {
        self.inner.state.lock().managed.clone()
    }

    /// The number of creation events waiting for initialize.
    pub fn pending_created(&self) -> usize {
        self.inner.state.lock().pending_created.len()
    }

    /// The number of color events waiting for initialize.
    pub fn pending_colors(&self) -> usize {
        self.inner.state.lock().pending_colors.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.state.lock().subscriptions.is_some()
    }

    pub fn multi_saber_mode(&self) -> bool {
        self.inner.mode_owner.multi_saber_mode()
    }

    pub fn pair(&self) -> &Arc<SaberPair> {
        &self.inner.pair
    }

    fn subscribe(&self) {
        let Some(pause) = &self.inner.pause else {
            debug!("No pause source, pause handling disabled.");
            return;
        };
        if self.inner.state.lock().subscriptions.is_some() {
            return;
        }

        // Weak so the pause source doesn't keep a disposed manager alive.
        let weak = Arc::downgrade(&self.inner);
        let on_pause: PauseCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.did_pause();
            }
        });
        let weak = Arc::downgrade(&self.inner);
        let on_resume: PauseCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.did_resume();
            }
        });

        // The source may fire while subscribing, so the state lock is not held.
        let subscriptions = (
            pause.subscribe(PauseEvent::Paused, on_pause),
            pause.subscribe(PauseEvent::Resumed, on_resume),
        );
        self.inner.state.lock().subscriptions = Some(subscriptions);
        info!("Subscribed to pause source.");
    }
}

impl Inner {
    fn saber_created(&self, saber: Option<Arc<Saber>>) -> Result<(), EffectError> {
        let ready = {
            let mut state = self.state.lock();
            if !state.ready {
                debug!(saber = ?saber.as_ref().map(|s| s.id()), "Queueing saber creation.");
                state.pending_created.push_back(saber.clone());
            }
            state.ready
        };

        if ready {
            self.register(saber)?;
        }
        self.check_multi_saber_mode()
    }

    fn register(&self, saber: Option<Arc<Saber>>) -> Result<(), EffectError> {
        let Some(saber) = saber else {
            debug!("Dropping creation event without a saber.");
            return Ok(());
        };
        if self.is_managed(&saber) {
            debug!(saber = saber.id(), "Saber already managed, ignoring.");
            return Ok(());
        }

        self.dispatch(Operation::Register, &saber, |handler, saber| {
            handler.register_saber(saber)
        })?;
        info!(saber = saber.id(), kind = %saber.saber_type(), "Saber registered.");

        // A handler may have created the same saber while we were dispatching.
        let mut state = self.state.lock();
        if !state.managed.iter().any(|m| Arc::ptr_eq(m, &saber)) {
            state.managed.push(saber);
        }
        Ok(())
    }

    fn is_managed(&self, saber: &Arc<Saber>) -> bool {
        self.state
            .lock()
            .managed
            .iter()
            .any(|managed| Arc::ptr_eq(managed, saber))
    }

    /// Flips multi-saber mode on the first creation event and repatches the
    /// default pair. Later calls do nothing.
    fn check_multi_saber_mode(&self) -> Result<(), EffectError> {
        if self.mode_owner.multi_saber_mode() {
            return Ok(());
        }
        self.mode_owner.set_multi_saber_mode(true);
        info!("Switching to multi-saber mode.");
        self.repatch_default(self.pair.left(), self.pair.right(), &self.pair)
    }

    fn change_color(&self, saber: Option<Arc<Saber>>) -> Result<(), EffectError> {
        match saber {
            Some(saber) => self.dispatch(Operation::ChangeColor, &saber, |handler, saber| {
                handler.change_color(saber)
            }),
            None => {
                debug!("Dropping color event without a saber.");
                Ok(())
            }
        }
    }

    fn repatch_default(
        &self,
        left: Option<Arc<Saber>>,
        right: Option<Arc<Saber>>,
        pair: &SaberPair,
    ) -> Result<(), EffectError> {
        info!(
            left = ?left.as_ref().map(|s| s.id()),
            right = ?right.as_ref().map(|s| s.id()),
            "Repatching default sabers."
        );
        pair.set(left, right);
        for handler in &self.handlers {
            if let Err(e) = handler.initialize(pair) {
                error!(handler = handler.name(), err = %e, "Effect handler failed to initialize.");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Calls every handler in order, stopping at the first failure.
    fn dispatch<F>(
        &self,
        operation: Operation,
        saber: &Arc<Saber>,
        call: F,
    ) -> Result<(), EffectError>
    where
        F: Fn(&dyn EffectHandler, &Arc<Saber>) -> Result<(), EffectError>,
    {
        debug!(saber = saber.id(), %operation, "Dispatching to effect handlers.");
        for handler in &self.handlers {
            if let Err(e) = call(handler.as_ref(), saber) {
                error!(
                    handler = handler.name(),
                    saber = saber.id(),
                    %operation,
                    err = %e,
                    "Effect handler failed."
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Hides every managed saber and lets the handlers freeze its color.
    fn did_pause(&self) {
        let _enter = self.span.enter();
        let sabers = self.state.lock().managed.clone();
        debug!(sabers = sabers.len(), "Hiding sabers for pause.");

        for saber in sabers {
            if !saber.set_active(false) {
                continue;
            }
            if let Err(e) = self.change_color(Some(saber)) {
                error!(err = %e, "Error freezing saber colors on pause.");
                return;
            }
        }
    }

    /// Shows every managed saber again. Colors are left as they were frozen.
    fn did_resume(&self) {
        let _enter = self.span.enter();
        let sabers = self.state.lock().managed.clone();
        debug!(sabers = sabers.len(), "Showing sabers after resume.");

        for saber in sabers {
            saber.set_active(true);
        }
    }

    fn unsubscribe(&self, subscriptions: Option<Subscriptions>) {
        let (Some(pause), Some((paused, resumed))) = (&self.pause, subscriptions) else {
            return;
        };
        pause.unsubscribe(PauseEvent::Paused, paused);
        pause.unsubscribe(PauseEvent::Resumed, resumed);
        info!("Unsubscribed from pause source.");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let subscriptions = self.state.get_mut().subscriptions.take();
        self.unsubscribe(subscriptions);
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::effects::SaberClashChecker;
    use crate::pause::GamePause;
    use crate::saber::{Color, SaberType};
    use crate::testutil::{recording_suite, Call, Journal, RecordingHandler};

    const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);

    struct Fixture {
        manager: EffectManager,
        journal: Journal,
        handlers: [Arc<RecordingHandler>; 4],
        pause: Arc<GamePause>,
        left: Arc<Saber>,
        right: Arc<Saber>,
    }

    impl Fixture {
        fn new(with_pause: bool) -> Result<Fixture, Box<dyn Error>> {
            let left = Saber::new(1, SaberType::Left, RED);
            let right = Saber::new(2, SaberType::Right, BLUE);
            let pair = Arc::new(SaberPair::new(Some(left.clone()), Some(right.clone())));
            let pause = Arc::new(GamePause::new());
            let (suite, journal, handlers) = recording_suite();
            let pause_source: Option<Arc<dyn PauseSource>> = if with_pause {
                Some(pause.clone())
            } else {
                None
            };
            let manager = EffectManager::new(suite, pair, pause_source)?;
            // Drop the clash checker's construction-time initialize.
            journal.lock().clear();

            Ok(Fixture {
                manager,
                journal,
                handlers,
                pause,
                left,
                right,
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.journal.lock().clone()
        }

        fn clear(&self) {
            self.journal.lock().clear();
        }
    }

    fn registers(ids: &[u32]) -> Vec<Call> {
        ids.iter()
            .flat_map(|id| RecordingHandler::NAMES.map(|name| Call::Register(name, *id)))
            .collect()
    }

    fn initializes(left: u32, right: u32) -> Vec<Call> {
        RecordingHandler::NAMES
            .map(|name| Call::Initialize(name, Some(left), Some(right)))
            .to_vec()
    }

    fn ids(sabers: &[Arc<Saber>]) -> Vec<u32> {
        sabers.iter().map(|s| s.id()).collect()
    }

    #[test]
    fn test_new_initializes_clash_checker() -> Result<(), Box<dyn Error>> {
        let pair = Arc::new(SaberPair::new(
            Some(Saber::new(1, SaberType::Left, RED)),
            Some(Saber::new(2, SaberType::Right, BLUE)),
        ));
        let (suite, journal, _) = recording_suite();
        let manager = EffectManager::new(suite, pair, None)?;

        assert_eq!(
            *journal.lock(),
            vec![Call::Initialize("clash", Some(1), Some(2))]
        );
        assert!(!manager.is_ready());
        assert!(!manager.multi_saber_mode());
        Ok(())
    }

    #[test]
    fn test_queued_creations_replay_in_order() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        let a = Saber::new(10, SaberType::Left, RED);
        let b = Saber::new(11, SaberType::Right, BLUE);

        f.manager.saber_created(a.clone())?;
        f.manager.saber_created(b.clone())?;
        // Only the repatch from the first creation reaches the handlers.
        assert_eq!(f.calls(), initializes(1, 2));
        assert_eq!(f.manager.pending_created(), 2);
        assert!(f.manager.multi_saber_mode());

        f.manager.initialize()?;

        let mut expected = initializes(1, 2);
        expected.extend(registers(&[10, 11]));
        assert_eq!(f.calls(), expected);

        assert_eq!(f.manager.pending_created(), 0);
        assert_eq!(ids(&f.manager.managed_sabers()), vec![10, 11]);
        assert!(f.manager.multi_saber_mode());
        Ok(())
    }

    #[test]
    fn test_queued_colors_replay_after_creations() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let a = Saber::new(10, SaberType::Left, RED);

        f.manager.change_color(a.clone())?;
        f.manager.saber_created(a.clone())?;
        assert_eq!(f.manager.pending_colors(), 1);
        f.manager.initialize()?;

        let calls = f.calls();
        assert_eq!(calls[..4].to_vec(), initializes(1, 2));
        assert_eq!(calls[4], Call::Register("clash", 10));
        assert_eq!(
            calls[calls.len() - 4..].to_vec(),
            RecordingHandler::NAMES
                .map(|name| Call::ChangeColor(name, 10))
                .to_vec()
        );
        assert_eq!(f.manager.pending_colors(), 0);
        Ok(())
    }

    #[test]
    fn test_initialize_twice() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        f.manager.saber_created(Saber::new(10, SaberType::Left, RED))?;
        f.manager.initialize()?;
        f.clear();

        f.manager.initialize()?;
        assert!(f.calls().is_empty());
        assert_eq!(ids(&f.manager.managed_sabers()), vec![10]);
        assert_eq!(f.pause.listener_count(), 2);
        Ok(())
    }

    #[test]
    fn test_ready_events_dispatch_immediately() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.initialize()?;
        assert!(f.manager.is_ready());

        let a = Saber::new(10, SaberType::Left, RED);
        f.manager.saber_created(a.clone())?;
        f.manager.change_color(a.clone())?;

        let mut expected = registers(&[10]);
        expected.extend(initializes(1, 2));
        expected.extend(RecordingHandler::NAMES.map(|name| Call::ChangeColor(name, 10)));
        assert_eq!(f.calls(), expected);
        assert_eq!(f.manager.pending_created(), 0);
        assert_eq!(f.manager.pending_colors(), 0);
        Ok(())
    }

    #[test]
    fn test_repatch_fires_once() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.initialize()?;

        for id in 10..15 {
            f.manager.saber_created(Saber::new(id, SaberType::Left, RED))?;
        }

        let initialize_calls = f
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Initialize(..)))
            .count();
        assert_eq!(initialize_calls, 4);
        Ok(())
    }

    #[test]
    fn test_queued_creation_flips_mode() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.saber_created(Saber::new(10, SaberType::Left, RED))?;

        assert!(!f.manager.is_ready());
        assert!(f.manager.multi_saber_mode());
        assert_eq!(f.calls(), initializes(1, 2));
        assert_eq!(f.manager.pending_created(), 1);
        assert!(f.manager.managed_sabers().is_empty());
        Ok(())
    }

    #[test]
    fn test_repatch_fires_once_across_queue_and_replay() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.saber_created(Saber::new(10, SaberType::Left, RED))?;
        f.manager.saber_created(Saber::new(11, SaberType::Right, BLUE))?;
        f.manager.initialize()?;
        f.manager.saber_created(Saber::new(12, SaberType::Left, BLUE))?;

        let mut expected = initializes(1, 2);
        expected.extend(registers(&[10, 11, 12]));
        assert_eq!(f.calls(), expected);
        assert_eq!(ids(&f.manager.managed_sabers()), vec![10, 11, 12]);
        Ok(())
    }

    #[test]
    fn test_repatch_uses_current_pair() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let replacement = Saber::new(3, SaberType::Left, RED);
        f.manager
            .pair()
            .set(Some(replacement.clone()), Some(f.right.clone()));
        f.manager.initialize()?;

        f.manager.saber_created(Saber::new(10, SaberType::Left, RED))?;
        assert!(f.calls().contains(&Call::Initialize("obstacles", Some(3), Some(2))));
        assert!(f.manager.pair().contains(&replacement));
        assert!(!f.manager.pair().contains(&f.left));
        Ok(())
    }

    #[test]
    fn test_null_saber() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;

        f.manager.saber_created(None)?;
        f.manager.change_color(None)?;
        assert_eq!(f.manager.pending_created(), 1);
        assert_eq!(f.manager.pending_colors(), 1);
        // Queued, but it still flips the mode.
        assert!(f.manager.multi_saber_mode());
        assert_eq!(f.calls(), initializes(1, 2));

        f.manager.initialize()?;
        assert_eq!(f.calls(), initializes(1, 2));
        assert!(f.manager.managed_sabers().is_empty());
        assert!(f.manager.multi_saber_mode());
        Ok(())
    }

    #[test]
    fn test_managed_set_semantics() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.initialize()?;
        let a = Saber::new(10, SaberType::Left, RED);
        let b = Saber::new(11, SaberType::Right, BLUE);
        let c = Saber::new(12, SaberType::Left, BLUE);

        f.manager.saber_created(a.clone())?;
        f.manager.saber_created(b.clone())?;
        f.manager.saber_created(a.clone())?;
        assert_eq!(ids(&f.manager.managed_sabers()), vec![10, 11]);

        f.manager.saber_destroyed(&c)?;
        assert_eq!(ids(&f.manager.managed_sabers()), vec![10, 11]);

        f.manager.saber_destroyed(&a)?;
        f.manager.saber_created(c.clone())?;
        assert_eq!(ids(&f.manager.managed_sabers()), vec![11, 12]);

        let register_a = f
            .calls()
            .into_iter()
            .filter(|call| *call == Call::Register("clash", 10))
            .count();
        assert_eq!(register_a, 1, "duplicates aren't registered twice");
        Ok(())
    }

    #[test]
    fn test_destroying_queued_saber() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let a = Saber::new(10, SaberType::Left, RED);

        f.manager.saber_created(a.clone())?;
        f.manager.saber_destroyed(&a)?;

        // Destruction is never queued; handlers are told regardless.
        let mut expected = initializes(1, 2);
        expected.extend(RecordingHandler::NAMES.map(|name| Call::Unregister(name, 10)));
        assert_eq!(f.calls(), expected);
        assert_eq!(f.manager.pending_created(), 1);
        assert!(f.manager.managed_sabers().is_empty());
        Ok(())
    }

    #[test]
    fn test_pause_and_resume() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        f.manager.initialize()?;
        let a = Saber::new(10, SaberType::Left, RED);
        let b = Saber::new(11, SaberType::Right, BLUE);
        let detached = Saber::new(12, SaberType::Left, BLUE);
        f.manager.saber_created(a.clone())?;
        f.manager.saber_created(b.clone())?;
        f.manager.saber_created(detached.clone())?;
        detached.detach_presentation();
        f.clear();

        f.pause.pause();
        assert_eq!(a.is_active(), Some(false));
        assert_eq!(b.is_active(), Some(false));
        assert_eq!(detached.is_active(), None);
        let mut expected: Vec<Call> = RecordingHandler::NAMES
            .map(|name| Call::ChangeColor(name, 10))
            .to_vec();
        expected.extend(RecordingHandler::NAMES.map(|name| Call::ChangeColor(name, 11)));
        assert_eq!(f.calls(), expected);
        f.clear();

        f.pause.resume();
        assert_eq!(a.is_active(), Some(true));
        assert_eq!(b.is_active(), Some(true));
        assert!(f.calls().is_empty(), "resume doesn't recolor");
        Ok(())
    }

    #[test]
    fn test_pause_with_no_sabers() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        f.manager.initialize()?;
        f.pause.pause();
        f.pause.resume();
        assert!(f.calls().is_empty());
        Ok(())
    }

    #[test]
    fn test_no_pause_source() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.initialize()?;
        assert!(!f.manager.is_subscribed());

        let a = Saber::new(10, SaberType::Left, RED);
        f.manager.saber_created(a.clone())?;
        f.pause.pause();
        assert_eq!(a.is_active(), Some(true));
        f.manager.dispose();
        Ok(())
    }

    #[test]
    fn test_dispose_unsubscribes() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        assert_eq!(f.pause.listener_count(), 0);
        f.manager.initialize()?;
        assert!(f.manager.is_subscribed());
        assert_eq!(f.pause.listener_count(), 2);

        let a = Saber::new(10, SaberType::Left, RED);
        f.manager.saber_created(a.clone())?;
        f.clear();

        f.manager.dispose();
        f.manager.dispose();
        assert!(!f.manager.is_subscribed());
        assert_eq!(f.pause.listener_count(), 0);

        f.pause.pause();
        f.pause.resume();
        assert!(f.calls().is_empty());
        assert_eq!(a.is_active(), Some(true));
        Ok(())
    }

    #[test]
    fn test_drop_releases_subscriptions() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        f.manager.initialize()?;
        assert_eq!(f.pause.listener_count(), 2);

        let pause = f.pause.clone();
        drop(f);
        assert_eq!(pause.listener_count(), 0);
        pause.pause();
        Ok(())
    }

    #[test]
    fn test_handler_failure_aborts_fan_out() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        f.manager.initialize()?;
        f.handlers[1].fail_on(Operation::Register);

        let a = Saber::new(10, SaberType::Left, RED);
        let err = f.manager.saber_created(a.clone()).unwrap_err();
        assert!(err.to_string().contains("area"));

        assert_eq!(f.calls(), vec![Call::Register("clash", 10)]);
        assert!(f.manager.managed_sabers().is_empty());
        assert!(!f.manager.multi_saber_mode());
        Ok(())
    }

    #[test]
    fn test_handler_failure_during_replay() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(true)?;
        f.handlers[0].fail_on(Operation::Register);

        f.manager.saber_created(Saber::new(10, SaberType::Left, RED))?;
        f.manager.saber_created(Saber::new(11, SaberType::Left, RED))?;
        f.manager.change_color(Saber::new(12, SaberType::Left, RED))?;

        assert!(f.manager.initialize().is_err());
        assert!(f.manager.is_ready());
        assert_eq!(f.manager.pending_created(), 0);
        assert_eq!(f.manager.pending_colors(), 0);
        assert!(!f.manager.is_subscribed());
        Ok(())
    }

    #[test]
    fn test_explicit_repatch() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let x = Saber::new(20, SaberType::Left, RED);
        let y = Saber::new(21, SaberType::Right, BLUE);

        let other = SaberPair::default();
        f.manager.repatch_default(Some(x.clone()), Some(y.clone()), &other)?;
        assert_eq!(f.calls(), initializes(20, 21));
        assert!(other.contains(&x) && other.contains(&y));
        // Only the given holder is touched.
        assert!(f.manager.pair().contains(&f.left));
        Ok(())
    }

    #[test]
    fn test_with_bookkeeping_clash_checker() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let clash = Arc::new(SaberClashChecker::new());
        let suite = EffectSuite::new(
            clash.clone(),
            f.handlers[1].clone(),
            f.handlers[2].clone(),
            f.handlers[3].clone(),
        );
        let manager = EffectManager::new(
            suite,
            Arc::new(SaberPair::new(Some(f.left.clone()), Some(f.right.clone()))),
            None,
        )?;
        assert_eq!(clash.candidate_pairs(), vec![(1, 2)]);

        manager.initialize()?;
        manager.saber_created(Saber::new(10, SaberType::Left, RED))?;
        assert!(clash.multi_saber_mode());
        assert_eq!(clash.candidate_pairs(), vec![(1, 2), (1, 10), (2, 10)]);
        Ok(())
    }

    /// Queries the manager from inside every callback.
    #[derive(Default)]
    struct QueryingHandler {
        manager: Mutex<Option<EffectManager>>,
        seen: Mutex<Vec<(Operation, usize)>>,
    }

    impl QueryingHandler {
        fn query(&self, operation: Operation) -> Result<(), EffectError> {
            let manager = self.manager.lock().clone();
            if let Some(manager) = manager {
                let managed = manager.managed_sabers().len();
                manager.is_ready();
                manager.pending_created();
                self.seen.lock().push((operation, managed));
            }
            Ok(())
        }
    }

    impl EffectHandler for QueryingHandler {
        fn name(&self) -> &'static str {
            "querying"
        }

        fn register_saber(&self, _: &Arc<Saber>) -> Result<(), EffectError> {
            self.query(Operation::Register)
        }

        fn unregister_saber(&self, _: &Arc<Saber>) -> Result<(), EffectError> {
            self.query(Operation::Unregister)
        }

        fn change_color(&self, _: &Arc<Saber>) -> Result<(), EffectError> {
            self.query(Operation::ChangeColor)
        }

        fn initialize(&self, _: &SaberPair) -> Result<(), EffectError> {
            self.query(Operation::Initialize)
        }
    }

    #[test]
    fn test_handlers_can_call_back_into_manager() -> Result<(), Box<dyn Error>> {
        let f = Fixture::new(false)?;
        let querying = Arc::new(QueryingHandler::default());
        let suite = EffectSuite::new(
            f.handlers[0].clone(),
            f.handlers[1].clone(),
            f.handlers[2].clone(),
            querying.clone(),
        );
        let pause_source: Option<Arc<dyn PauseSource>> = Some(f.pause.clone());
        let manager = EffectManager::new(
            suite,
            Arc::new(SaberPair::new(Some(f.left.clone()), Some(f.right.clone()))),
            pause_source,
        )?;
        *querying.manager.lock() = Some(manager.clone());

        // Run on another thread so a lock held across the fan-out fails the
        // test instead of hanging it.
        let (tx, rx) = mpsc::channel();
        let worker = manager.clone();
        let pause = f.pause.clone();
        thread::spawn(move || {
            let result = (|| -> Result<(), EffectError> {
                worker.saber_created(Saber::new(10, SaberType::Left, RED))?;
                worker.initialize()?;
                worker.saber_created(Saber::new(11, SaberType::Right, BLUE))?;
                pause.pause();
                worker.saber_destroyed(&Saber::new(12, SaberType::Left, RED))?;
                Ok(())
            })();
            let _ = tx.send(result.is_ok());
        });
        let completed = rx.recv_timeout(Duration::from_secs(5));
        querying.manager.lock().take();
        assert!(completed?);

        assert_eq!(
            *querying.seen.lock(),
            vec![
                (Operation::Initialize, 0),
                (Operation::Register, 0),
                (Operation::Register, 1),
                (Operation::ChangeColor, 2),
                (Operation::ChangeColor, 2),
                (Operation::Unregister, 2),
            ]
        );
        assert_eq!(ids(&manager.managed_sabers()), vec![10, 11]);
        Ok(())
    }
}
