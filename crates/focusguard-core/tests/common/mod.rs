//! Shared wiring for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use focusguard_core::dispatch::{LogNotifier, MutedSurfaceFactory};
use focusguard_core::{
    AlarmScheduler, CoreError, Dispatcher, ManualClock, MemoryRuleSink, Notification, Notifier,
    RuleSink, SessionEngine, Store, StoreAlarms,
};

pub const T0: i64 = 1_700_000_000_000;

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), CoreError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<dyn Store>,
    pub alarms: Arc<StoreAlarms>,
    pub sink: Arc<MemoryRuleSink>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Arc<SessionEngine>,
}

impl Harness {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        Self::with_notifier(store, notifier.clone(), notifier)
    }

    pub fn with_notifier(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        recorder: Arc<RecordingNotifier>,
    ) -> Self {
        let alarms = Arc::new(StoreAlarms::new(store.clone()));
        let sink = Arc::new(MemoryRuleSink::new());
        let clock = Arc::new(ManualClock::at_ms(T0));
        let engine = engine_over(store.clone(), alarms.clone(), sink.clone(), clock.clone(), notifier);
        Self {
            store,
            alarms,
            sink,
            clock,
            notifier: recorder,
            engine: Arc::new(engine),
        }
    }
}

pub fn engine_over(
    store: Arc<dyn Store>,
    alarms: Arc<dyn AlarmScheduler>,
    sink: Arc<dyn RuleSink>,
    clock: Arc<ManualClock>,
    notifier: Arc<dyn Notifier>,
) -> SessionEngine {
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        notifier,
        Arc::new(MutedSurfaceFactory),
    ));
    SessionEngine::new(store, alarms, sink, dispatcher).with_clock(clock)
}

pub fn quiet_engine(
    store: Arc<dyn Store>,
    alarms: Arc<dyn AlarmScheduler>,
    sink: Arc<dyn RuleSink>,
    clock: Arc<ManualClock>,
) -> SessionEngine {
    engine_over(store, alarms, sink, clock, Arc::new(LogNotifier))
}

pub fn sites(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
