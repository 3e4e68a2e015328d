//! Wiring shared by every command: config, store, engine.

use std::sync::Arc;

use focusguard_core::dispatch::LogNotifier;
use focusguard_core::{
    Config, Dispatcher, JsonRuleSink, Notifier, SessionEngine, SqliteStore, Store, StoreAlarms,
};

use crate::playback::{PlayerFactory, TerminalNotifier};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub struct App {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub alarms: StoreAlarms,
    pub sink: Arc<JsonRuleSink>,
    pub dispatcher: Arc<Dispatcher>,
    pub engine: Arc<SessionEngine>,
}

impl App {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.db_path()?)?);
        let alarms = StoreAlarms::new(store.clone());
        let sink = Arc::new(JsonRuleSink::new(config.rules_path()?));

        let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
            Arc::new(TerminalNotifier)
        } else {
            Arc::new(LogNotifier)
        };
        let factory = Arc::new(PlayerFactory::new(
            config.sound.player.clone(),
            config.assets_dir()?,
        ));
        let dispatcher = Arc::new(
            Dispatcher::new(store.clone(), notifier, factory).with_icon(config.notifications.icon.clone()),
        );

        let engine = SessionEngine::new(
            store.clone(),
            Arc::new(alarms.clone()),
            sink.clone(),
            dispatcher.clone(),
        )
        .with_compile_options(config.compile_options());

        Ok(Self {
            config,
            store,
            alarms,
            sink,
            dispatcher,
            engine: Arc::new(engine),
        })
    }
}
