//! The dispatcher: wires the registry, catalog, flags, and sinks to the
//! assistant state machine and drives it from a tick loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use hark_commands::{all_keywords, combine, create_all, BuiltinCatalog, CommandRegistry, ListenerId};
use hark_config::HarkConfig;
use hark_core::{
    flag_keys, AckSink, Acknowledgment, Command, FlagSource, KeywordSink, PhraseEvent, RosterEvent,
    RosterObserver,
};
use hark_logging::{CommandOrigin, DispatchEvent, DispatchEventLogger};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assistant::{Assistant, AssistantControl, AssistantSettings, PhraseOutcome};
use crate::debounce::RebuildDebounce;
use crate::state::{AssistantState, Transition};

// ---------------------------------------------------------------------------
// Settings and collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub assistant: AssistantSettings,
    pub tick_interval: Duration,
    pub rebuild_debounce: Duration,
    pub seal_window: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            assistant: AssistantSettings::default(),
            tick_interval: Duration::from_millis(50),
            rebuild_debounce: Duration::from_millis(250),
            seal_window: Duration::from_millis(1500),
        }
    }
}

impl DispatcherSettings {
    pub fn from_config(config: &HarkConfig) -> Self {
        Self {
            assistant: AssistantSettings {
                awake_window: config.awake_window(),
                command_cooldown: config.command_cooldown(),
                wake_words: config.wake_words(),
                quick_prefix: config.quick_command_prefix(),
                latency_compensation: config.latency_compensation(),
            },
            tick_interval: config.tick_interval(),
            rebuild_debounce: config.rebuild_debounce(),
            seal_window: config.seal_window(),
        }
    }
}

/// Output channels owned by the host.
#[derive(Clone)]
pub struct DispatchSinks {
    /// Recognizer for wake words and full command keywords.
    pub main: Arc<dyn KeywordSink>,
    /// Recognizer for prefixed quick-command phrases.
    pub quick: Arc<dyn KeywordSink>,
    pub acks: Arc<dyn AckSink>,
}

/// Event sources consumed by [`Dispatcher::run`].
pub struct DispatchInputs {
    pub phrases: mpsc::Receiver<PhraseEvent>,
    pub quick_phrases: mpsc::Receiver<PhraseEvent>,
    pub roster: mpsc::Receiver<RosterEvent>,
    /// Applied in order for every roster event.
    pub roster_observers: Vec<Arc<dyn RosterObserver>>,
}

/// Drops acknowledgments while the notifications flag is off.
struct GatedAcks {
    inner: Arc<dyn AckSink>,
    flags: Arc<dyn FlagSource>,
}

impl AckSink for GatedAcks {
    fn acknowledge(&self, ack: Acknowledgment) {
        if self.flags.is_enabled(flag_keys::NOTIFICATIONS) {
            self.inner.acknowledge(ack);
        } else {
            debug!(?ack, "Notifications disabled, acknowledgment suppressed");
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    settings: DispatcherSettings,
    registry: CommandRegistry,
    catalog: BuiltinCatalog,
    flags: Arc<dyn FlagSource>,
    assistant: Mutex<Assistant>,
    debounce: Arc<Mutex<RebuildDebounce>>,
    listener: ListenerId,
    events: DispatchEventLogger,
}

impl Dispatcher {
    /// Seal the registry (after its grace window), assemble the catalog, and
    /// start the assistant asleep.
    ///
    /// The change listener is attached before sealing so registrations that
    /// land after the seal snapshot still schedule a rebuild. Anything armed
    /// during the seal window is left armed; at worst that costs one
    /// redundant rebuild.
    pub async fn start(
        settings: DispatcherSettings,
        registry: CommandRegistry,
        catalog: BuiltinCatalog,
        flags: Arc<dyn FlagSource>,
        sinks: DispatchSinks,
        control: AssistantControl,
        cancel: &CancellationToken,
    ) -> Self {
        let debounce = Arc::new(Mutex::new(RebuildDebounce::new(settings.rebuild_debounce)));
        let armed = debounce.clone();
        let listener = registry.subscribe_fn(move || {
            armed.lock().arm(Instant::now());
            Ok(())
        });

        let sealed = registry.seal_and_snapshot(settings.seal_window, cancel).await;
        let commands = combine(catalog.load(), sealed);

        let acks: Arc<dyn AckSink> = Arc::new(GatedAcks {
            inner: sinks.acks,
            flags: flags.clone(),
        });
        let quick_enabled = flags.is_enabled(flag_keys::QUICK_COMMANDS);
        let events = DispatchEventLogger;
        events.log(DispatchEvent::CatalogRebuilt {
            commands: commands.len(),
            keywords: all_keywords(&commands).len(),
        });
        info!(commands = commands.len(), quick_enabled, "Dispatcher started");

        let assistant = Assistant::new(
            settings.assistant.clone(),
            commands,
            sinks.main,
            sinks.quick,
            acks,
            control,
            quick_enabled,
        );

        Self {
            settings,
            registry,
            catalog,
            flags,
            assistant: Mutex::new(assistant),
            debounce,
            listener,
            events,
        }
    }

    // -----------------------------------------------------------------------
    // Phrases
    // -----------------------------------------------------------------------

    pub fn handle_phrase(&self, phrase: &PhraseEvent) -> PhraseOutcome {
        self.handle_phrase_at(phrase, Instant::now())
    }

    pub fn handle_phrase_at(&self, phrase: &PhraseEvent, now: Instant) -> PhraseOutcome {
        let outcome = self.assistant.lock().handle_phrase(&phrase.text, now);
        self.follow_up(&outcome, phrase, CommandOrigin::Main);
        outcome
    }

    pub fn handle_quick_phrase(&self, phrase: &PhraseEvent) -> PhraseOutcome {
        self.handle_quick_phrase_at(phrase, Instant::now())
    }

    pub fn handle_quick_phrase_at(&self, phrase: &PhraseEvent, now: Instant) -> PhraseOutcome {
        let outcome = self.assistant.lock().handle_quick_phrase(&phrase.text, now);
        self.follow_up(&outcome, phrase, CommandOrigin::Quick);
        outcome
    }

    fn follow_up(&self, outcome: &PhraseOutcome, phrase: &PhraseEvent, origin: CommandOrigin) {
        match outcome {
            PhraseOutcome::Woke => self.events.log(DispatchEvent::Woke {
                phrase: phrase.text.clone(),
            }),
            PhraseOutcome::Execute(command) => self.execute(command, phrase, origin),
            PhraseOutcome::Ignored(_) | PhraseOutcome::NoMatch => {}
        }
    }

    /// Run the action with no lock held, then report back to the assistant.
    fn execute(&self, command: &Command, phrase: &PhraseEvent, origin: CommandOrigin) {
        let started = Instant::now();
        let result = command.invoke();
        let elapsed = started.elapsed();

        match &result {
            Ok(()) => self.events.log(DispatchEvent::CommandExecuted {
                command: command.name().to_string(),
                origin,
                elapsed_ms: elapsed.as_millis() as u64,
            }),
            Err(e) => self.events.log(DispatchEvent::CommandFailed {
                command: command.name().to_string(),
                origin,
                error: e.to_string(),
            }),
        }

        let latency = phrase.latency(Utc::now());
        self.assistant
            .lock()
            .complete_execution(command, result, latency, Instant::now());
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    pub fn tick(&self) -> Vec<Transition> {
        self.tick_at(Instant::now())
    }

    /// Fire a due rebuild, sync the quick-command flag, flush settings, then
    /// advance the state machine.
    pub fn tick_at(&self, now: Instant) -> Vec<Transition> {
        let rebuild_due = self.debounce.lock().fire_if_due(now);
        if rebuild_due {
            self.rebuild();
        }

        let quick_enabled = self.flags.is_enabled(flag_keys::QUICK_COMMANDS);
        self.flags.flush_if_due(now);

        let transitions = {
            let mut assistant = self.assistant.lock();
            assistant.set_quick_commands_enabled(quick_enabled);
            assistant.tick(now)
        };

        for t in &transitions {
            if t.to == AssistantState::Sleeping {
                self.events.log(DispatchEvent::Slept {
                    reason: t.reason.as_str().to_string(),
                });
            }
        }
        transitions
    }

    /// Reassemble the catalog and push it into the assistant.
    pub fn rebuild(&self) {
        let commands = create_all(&self.catalog, &self.registry);
        let count = commands.len();
        let keywords = all_keywords(&commands).len();
        self.assistant.lock().refresh_commands(commands);

        self.events.log(DispatchEvent::CatalogRebuilt {
            commands: count,
            keywords,
        });
        info!(commands = count, "Rebuilt commands");
    }

    pub fn is_rebuild_pending(&self) -> bool {
        self.debounce.lock().is_armed()
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Drive the dispatcher until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut inputs: DispatchInputs, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = self.settings.tick_interval.as_millis() as u64, "Dispatch loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
                Some(phrase) = inputs.phrases.recv() => {
                    self.handle_phrase(&phrase);
                }
                Some(phrase) = inputs.quick_phrases.recv() => {
                    self.handle_quick_phrase(&phrase);
                }
                Some(event) = inputs.roster.recv() => {
                    debug!(?event, "Roster event");
                    for observer in &inputs.roster_observers {
                        observer.apply(&event);
                    }
                }
            }
        }

        self.flags.flush();
        info!("Dispatch loop stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn state(&self) -> AssistantState {
        self.assistant.lock().state()
    }

    /// Copy of the assistant's current command list.
    pub fn commands(&self) -> Vec<Command> {
        self.assistant.lock().commands().to_vec()
    }

    pub fn quick_keywords(&self) -> Vec<String> {
        self.assistant.lock().quick_keywords().to_vec()
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.listener);
    }
}
