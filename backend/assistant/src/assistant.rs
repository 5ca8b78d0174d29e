//! The assistant state machine.
//!
//! Time is always passed in explicitly (`now: Instant`) so every transition is
//! deterministic under test. The machine never runs command actions itself: a
//! matched phrase yields [`PhraseOutcome::Execute`], the caller invokes the
//! action without holding any lock, then reports back through
//! [`Assistant::complete_execution`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hark_commands::{all_keywords, normalize, try_find_by_recognized_text};
use hark_core::{AckSink, Acknowledgment, Command, KeywordSink};
use tracing::{debug, error, info};

use crate::state::{AssistantState, Transition, TransitionReason};

const FALLBACK_WAKE_WORD: &str = "hey hark";

const WAKE_MESSAGES: [&str; 3] = ["How can I help?", "I'm here!", "What's up?"];

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// How long the assistant stays awake after waking or running a command.
    pub awake_window: Duration,
    /// Phrases are ignored for this long after a command.
    pub command_cooldown: Duration,
    pub wake_words: Vec<String>,
    /// Leading token of quick-command phrases, e.g. `"hark"` in `"hark mute bob"`.
    pub quick_prefix: String,
    /// Start the renewed wake window from when the phrase began, not when it was recognized.
    pub latency_compensation: bool,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            awake_window: Duration::from_secs(20),
            command_cooldown: Duration::from_secs(1),
            wake_words: vec!["hey hark".into(), "okay hark".into()],
            quick_prefix: "hark".into(),
            latency_compensation: true,
        }
    }
}

/// Trimmed, non-blank, case-insensitively distinct wake words.
pub fn clean_wake_words(words: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let cleaned: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty() && seen.insert(w.to_lowercase()))
        .collect();

    if cleaned.is_empty() {
        vec![FALLBACK_WAKE_WORD.to_string()]
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Control handle
// ---------------------------------------------------------------------------

/// Lets command actions ask the assistant to sleep. The request is honored on
/// the next tick, so actions never need the assistant lock.
#[derive(Debug, Clone, Default)]
pub struct AssistantControl {
    sleep_requested: Arc<AtomicBool>,
}

impl AssistantControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_sleep(&self) {
        self.sleep_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_sleep_requested(&self) -> bool {
        self.sleep_requested.load(Ordering::SeqCst)
    }

    fn take_sleep_request(&self) -> bool {
        self.sleep_requested.swap(false, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Blank,
    NotAWakeWord,
    Executing,
    Cooldown,
    QuickDisabled,
    MissingPrefix,
}

#[derive(Debug, Clone)]
pub enum PhraseOutcome {
    Ignored(IgnoreReason),
    Woke,
    NoMatch,
    /// The assistant is now `ExecutingCommand`; the caller must run the
    /// command and then call [`Assistant::complete_execution`].
    Execute(Command),
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub struct Assistant {
    settings: AssistantSettings,
    wake_words: Vec<String>,
    wake_set: HashSet<String>,
    state: AssistantState,
    awake_until: Option<Instant>,
    cooldown_until: Option<Instant>,
    commands: Vec<Command>,
    main: Arc<dyn KeywordSink>,
    quick: Arc<dyn KeywordSink>,
    acks: Arc<dyn AckSink>,
    quick_enabled: bool,
    /// Keywords the quick channel is currently listening for; empty when stopped.
    quick_active: Vec<String>,
    /// State the current execution started from.
    execution_origin: Option<AssistantState>,
    next_wake_message: usize,
    control: AssistantControl,
}

impl Assistant {
    /// Start asleep with the main channel on wake words.
    pub fn new(
        settings: AssistantSettings,
        commands: Vec<Command>,
        main: Arc<dyn KeywordSink>,
        quick: Arc<dyn KeywordSink>,
        acks: Arc<dyn AckSink>,
        control: AssistantControl,
        quick_enabled: bool,
    ) -> Self {
        let wake_words = clean_wake_words(&settings.wake_words);
        let wake_set = wake_words.iter().map(|w| w.to_lowercase()).collect();

        let mut assistant = Self {
            settings,
            wake_words,
            wake_set,
            state: AssistantState::Sleeping,
            awake_until: None,
            cooldown_until: None,
            commands,
            main,
            quick,
            acks,
            quick_enabled,
            quick_active: Vec::new(),
            execution_origin: None,
            next_wake_message: 0,
            control,
        };
        assistant.main.start_listening(&assistant.wake_words);
        assistant.rebuild_quick_channel();
        info!(wake_words = ?assistant.wake_words, commands = assistant.commands.len(), "Assistant asleep (listening for wake word)");
        assistant
    }

    // -----------------------------------------------------------------------
    // Phrases
    // -----------------------------------------------------------------------

    /// Handle a phrase from the main channel.
    pub fn handle_phrase(&mut self, text: &str, now: Instant) -> PhraseOutcome {
        if text.trim().is_empty() {
            return PhraseOutcome::Ignored(IgnoreReason::Blank);
        }

        match self.state {
            AssistantState::Sleeping => {
                if self.is_wake_word(text) {
                    self.wake_up(now);
                    PhraseOutcome::Woke
                } else {
                    debug!(phrase = %text, "Asleep, ignoring non-wake phrase");
                    PhraseOutcome::Ignored(IgnoreReason::NotAWakeWord)
                }
            }
            AssistantState::ExecutingCommand => {
                info!(phrase = %text, "Ignoring phrase while executing");
                PhraseOutcome::Ignored(IgnoreReason::Executing)
            }
            AssistantState::Cooldown => {
                info!(phrase = %text, "Ignoring phrase during cooldown");
                PhraseOutcome::Ignored(IgnoreReason::Cooldown)
            }
            AssistantState::Awake | AssistantState::Listening => {
                match try_find_by_recognized_text(&self.commands, text).cloned() {
                    Some(command) => {
                        self.begin_execution(&command, TransitionReason::CommandMatched);
                        PhraseOutcome::Execute(command)
                    }
                    None => {
                        info!(phrase = %text, "Awake but no command matched");
                        PhraseOutcome::NoMatch
                    }
                }
            }
        }
    }

    /// Handle a phrase from the quick-command channel.
    ///
    /// Accepted in any state except while executing or cooling down.
    pub fn handle_quick_phrase(&mut self, text: &str, _now: Instant) -> PhraseOutcome {
        if !self.quick_enabled {
            return PhraseOutcome::Ignored(IgnoreReason::QuickDisabled);
        }
        let Some(rest) = quick_remainder(&self.settings.quick_prefix, text) else {
            return PhraseOutcome::Ignored(IgnoreReason::MissingPrefix);
        };

        match self.state {
            AssistantState::ExecutingCommand => PhraseOutcome::Ignored(IgnoreReason::Executing),
            AssistantState::Cooldown => {
                info!(phrase = %text, "Ignoring quick command during cooldown");
                PhraseOutcome::Ignored(IgnoreReason::Cooldown)
            }
            _ => match try_find_by_recognized_text(&self.commands, &rest).cloned() {
                Some(command) => {
                    self.begin_execution(&command, TransitionReason::QuickCommand);
                    PhraseOutcome::Execute(command)
                }
                None => {
                    info!(phrase = %text, "Quick command did not match");
                    PhraseOutcome::NoMatch
                }
            },
        }
    }

    fn begin_execution(&mut self, command: &Command, reason: TransitionReason) {
        self.execution_origin = Some(self.state);
        self.transition(AssistantState::ExecutingCommand, reason);
        info!(command = %command.name(), "Executing command");
    }

    /// Record the result of a command run and enter cooldown.
    ///
    /// Renews the wake window (from the phrase start when latency compensation
    /// is on) and, if the command came in while asleep, switches the main
    /// channel over to command keywords.
    pub fn complete_execution(
        &mut self,
        command: &Command,
        result: anyhow::Result<()>,
        latency: Duration,
        now: Instant,
    ) -> Transition {
        if let Err(e) = result {
            error!(command = %command.name(), error = %e, "Command failed");
            self.acks.acknowledge(Acknowledgment::CommandFailed {
                command: command.name().to_string(),
                error: e.to_string(),
            });
        }

        let phrase_time = if self.settings.latency_compensation {
            now.checked_sub(latency).unwrap_or(now)
        } else {
            now
        };
        self.awake_until = Some(phrase_time + self.settings.awake_window);
        self.cooldown_until = Some(now + self.settings.command_cooldown);

        let origin = self.execution_origin.take();
        let transition = self.transition(AssistantState::Cooldown, TransitionReason::CommandFinished);
        if origin == Some(AssistantState::Sleeping) {
            self.main.start_listening(&all_keywords(&self.commands));
        }
        info!("Wake window reset after command execution (entering cooldown)");
        transition
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    /// Periodic check of deadlines and pending sleep requests.
    pub fn tick(&mut self, now: Instant) -> Vec<Transition> {
        let mut transitions = Vec::new();

        if self.control.take_sleep_request() && self.state.is_active() {
            if self.state == AssistantState::ExecutingCommand {
                // Re-arm; the run has not reported back yet.
                self.control.request_sleep();
            } else {
                transitions.push(self.go_to_sleep(TransitionReason::SleepRequested));
                return transitions;
            }
        }

        match self.state {
            AssistantState::Sleeping | AssistantState::ExecutingCommand => return transitions,
            AssistantState::Awake => {
                transitions.push(self.transition(AssistantState::Listening, TransitionReason::Settled));
            }
            AssistantState::Cooldown if self.cooldown_until.map_or(true, |t| now >= t) => {
                transitions.push(self.transition(AssistantState::Listening, TransitionReason::CooldownElapsed));
                info!("Cooldown finished (back to listening)");
            }
            _ => {}
        }

        if self.awake_until.map_or(true, |t| now >= t) {
            transitions.push(self.go_to_sleep(TransitionReason::WindowExpired));
        }

        transitions
    }

    // -----------------------------------------------------------------------
    // Wake / sleep
    // -----------------------------------------------------------------------

    pub fn wake_up(&mut self, now: Instant) -> Transition {
        self.awake_until = Some(now + self.settings.awake_window);
        let transition = self.transition(AssistantState::Awake, TransitionReason::WakeWord);

        let message = WAKE_MESSAGES[self.next_wake_message % WAKE_MESSAGES.len()];
        self.next_wake_message = self.next_wake_message.wrapping_add(1);
        self.acks.acknowledge(Acknowledgment::Wake {
            message: message.to_string(),
        });

        self.main.start_listening(&all_keywords(&self.commands));
        info!("Assistant awakened (listening for commands)");
        transition
    }

    pub fn go_to_sleep(&mut self, reason: TransitionReason) -> Transition {
        let was_active = self.state.is_active();
        self.awake_until = None;
        self.cooldown_until = None;
        self.execution_origin = None;
        let transition = self.transition(AssistantState::Sleeping, reason);

        self.main.start_listening(&self.wake_words);
        if was_active {
            self.acks.acknowledge(Acknowledgment::Asleep);
        }
        info!("Assistant asleep (listening for wake word)");
        transition
    }

    // -----------------------------------------------------------------------
    // Catalog and quick channel
    // -----------------------------------------------------------------------

    /// Swap in a rebuilt command list.
    ///
    /// While asleep only the list changes; the new keywords are picked up at
    /// the next wake. Otherwise the main channel restarts immediately. The
    /// quick channel is rebuilt either way.
    pub fn refresh_commands(&mut self, commands: Vec<Command>) {
        self.commands = commands;
        if self.state.is_active() {
            self.main.start_listening(&all_keywords(&self.commands));
        }
        self.rebuild_quick_channel();
        debug!(commands = self.commands.len(), state = ?self.state, "Assistant commands refreshed");
    }

    pub fn set_quick_commands_enabled(&mut self, enabled: bool) {
        if self.quick_enabled == enabled {
            return;
        }
        self.quick_enabled = enabled;
        info!(enabled, "Quick commands toggled");
        self.rebuild_quick_channel();
    }

    /// Push the quick keyword set to its channel. Returns `false` when the set
    /// is unchanged and nothing was restarted.
    pub fn rebuild_quick_channel(&mut self) -> bool {
        let desired = if self.quick_enabled {
            quick_keywords(&self.settings.quick_prefix, &self.commands)
        } else {
            Vec::new()
        };

        if desired == self.quick_active {
            return false;
        }

        if desired.is_empty() {
            self.quick.stop_listening();
        } else {
            self.quick.start_listening(&desired);
        }
        debug!(keywords = desired.len(), "Quick-command channel rebuilt");
        self.quick_active = desired;
        true
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> AssistantState {
        self.state
    }

    pub fn awake_until(&self) -> Option<Instant> {
        self.awake_until
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    pub fn quick_keywords(&self) -> &[String] {
        &self.quick_active
    }

    pub fn is_quick_enabled(&self) -> bool {
        self.quick_enabled
    }

    pub fn control(&self) -> &AssistantControl {
        &self.control
    }

    fn is_wake_word(&self, text: &str) -> bool {
        self.wake_set.contains(&text.trim().to_lowercase())
    }

    fn transition(&mut self, to: AssistantState, reason: TransitionReason) -> Transition {
        let from = self.state;
        self.state = to;
        debug!(from = ?from, to = ?to, reason = reason.as_str(), "Assistant transition");
        Transition { from, to, reason }
    }
}

/// `"<prefix> <normalized keyword>"` for every name and keyword, deduplicated
/// in first-seen order.
pub fn quick_keywords(prefix: &str, commands: &[Command]) -> Vec<String> {
    let prefix = normalize(prefix);
    let mut seen = HashSet::new();
    all_keywords(commands)
        .iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .map(|k| format!("{prefix} {k}"))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// The normalized text after the prefix, if `text` has the shape `"<prefix> <rest>"`.
pub fn quick_remainder(prefix: &str, text: &str) -> Option<String> {
    let prefix = normalize(prefix);
    if prefix.is_empty() {
        return None;
    }
    let normalized = normalize(text);
    let rest = normalized.strip_prefix(&prefix)?.strip_prefix(' ')?;
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Option<Vec<String>>>>,
    }

    impl RecordingSink {
        fn last(&self) -> Option<Vec<String>> {
            self.calls.lock().last().cloned().flatten()
        }
        fn count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl KeywordSink for RecordingSink {
        fn start_listening(&self, phrases: &[String]) {
            self.calls.lock().push(Some(phrases.to_vec()));
        }
        fn stop_listening(&self) {
            self.calls.lock().push(None);
        }
    }

    #[derive(Default)]
    struct RecordingAcks(Mutex<Vec<Acknowledgment>>);

    impl AckSink for RecordingAcks {
        fn acknowledge(&self, ack: Acknowledgment) {
            self.0.lock().push(ack);
        }
    }

    struct Harness {
        assistant: Assistant,
        main: Arc<RecordingSink>,
        quick: Arc<RecordingSink>,
        acks: Arc<RecordingAcks>,
        runs: Arc<AtomicUsize>,
        t0: Instant,
    }

    impl Harness {
        fn at(&self, millis: u64) -> Instant {
            self.t0 + Duration::from_millis(millis)
        }

        /// Drive a phrase through the full execute path like the dispatcher does.
        fn say(&mut self, text: &str, millis: u64) -> PhraseOutcome {
            let now = self.at(millis);
            let outcome = self.assistant.handle_phrase(text, now);
            self.finish(&outcome, now);
            outcome
        }

        fn say_quick(&mut self, text: &str, millis: u64) -> PhraseOutcome {
            let now = self.at(millis);
            let outcome = self.assistant.handle_quick_phrase(text, now);
            self.finish(&outcome, now);
            outcome
        }

        fn finish(&mut self, outcome: &PhraseOutcome, now: Instant) {
            if let PhraseOutcome::Execute(cmd) = outcome {
                assert_eq!(self.assistant.state(), AssistantState::ExecutingCommand);
                let result = cmd.invoke();
                self.assistant.complete_execution(cmd, result, Duration::ZERO, now);
            }
        }

        fn tick(&mut self, millis: u64) -> Vec<Transition> {
            let now = self.at(millis);
            self.assistant.tick(now)
        }
    }

    fn harness_with(settings: AssistantSettings, quick_enabled: bool) -> Harness {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let commands = vec![
            Command::builder("mute all")
                .keyword("mute everyone")
                .action(move || {
                    r.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .build()
                .unwrap(),
            Command::new("explode", || Err(anyhow::anyhow!("kaboom"))),
        ];
        let main = Arc::new(RecordingSink::default());
        let quick = Arc::new(RecordingSink::default());
        let acks = Arc::new(RecordingAcks::default());
        let assistant = Assistant::new(
            settings,
            commands,
            main.clone(),
            quick.clone(),
            acks.clone(),
            AssistantControl::new(),
            quick_enabled,
        );
        Harness {
            assistant,
            main,
            quick,
            acks,
            runs,
            t0: Instant::now(),
        }
    }

    fn harness() -> Harness {
        harness_with(AssistantSettings::default(), true)
    }

    #[test]
    fn starts_asleep_listening_for_wake_words() {
        let h = harness();
        assert_eq!(h.assistant.state(), AssistantState::Sleeping);
        assert_eq!(h.main.last().unwrap(), vec!["hey hark", "okay hark"]);
    }

    #[test]
    fn wake_words_are_cleaned() {
        assert_eq!(
            clean_wake_words(&[" Hey Hark ".into(), "hey hark".into(), "  ".into(), "yo".into()]),
            vec!["Hey Hark", "yo"]
        );
        assert_eq!(clean_wake_words(&[]), vec![FALLBACK_WAKE_WORD]);
    }

    #[test]
    fn only_exact_wake_word_wakes() {
        let mut h = harness();
        assert!(matches!(h.say("hey hark please", 0), PhraseOutcome::Ignored(IgnoreReason::NotAWakeWord)));
        assert!(matches!(h.say("mute all", 0), PhraseOutcome::Ignored(IgnoreReason::NotAWakeWord)));
        assert_eq!(h.assistant.state(), AssistantState::Sleeping);
        assert_eq!(h.runs.load(Ordering::SeqCst), 0);

        assert!(matches!(h.say("  HEY HARK ", 0), PhraseOutcome::Woke));
        assert_eq!(h.assistant.state(), AssistantState::Awake);
        assert_eq!(
            h.main.last().unwrap(),
            vec!["mute all", "mute everyone", "explode"]
        );
        assert!(matches!(&h.acks.0.lock()[0], Acknowledgment::Wake { .. }));
    }

    #[test]
    fn awake_settles_into_listening() {
        let mut h = harness();
        h.say("hey hark", 0);
        let transitions = h.tick(50);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].reason, TransitionReason::Settled);
        assert_eq!(h.assistant.state(), AssistantState::Listening);
    }

    #[test]
    fn matched_phrase_executes_once_then_cools_down() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(50);

        assert!(matches!(h.say("please mute everyone now", 100), PhraseOutcome::Execute(_)));
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.assistant.state(), AssistantState::Cooldown);
        assert_eq!(h.assistant.cooldown_until(), Some(h.at(1_100)));
        assert_eq!(h.assistant.awake_until(), Some(h.at(20_100)));

        assert!(matches!(h.say("mute all", 500), PhraseOutcome::Ignored(IgnoreReason::Cooldown)));
        assert!(matches!(h.say("hey hark", 600), PhraseOutcome::Ignored(IgnoreReason::Cooldown)));
        // Past the deadline but before the tick: still cooling down.
        assert!(matches!(h.say("mute all", 1_200), PhraseOutcome::Ignored(IgnoreReason::Cooldown)));
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);

        h.tick(1_050);
        assert_eq!(h.assistant.state(), AssistantState::Cooldown);
        h.tick(1_150);
        assert_eq!(h.assistant.state(), AssistantState::Listening);
    }

    #[test]
    fn no_match_stays_listening() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(50);
        assert!(matches!(h.say("sing a song", 100), PhraseOutcome::NoMatch));
        assert_eq!(h.assistant.state(), AssistantState::Listening);
    }

    #[test]
    fn failing_command_still_enters_cooldown_and_acks() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(50);
        h.say("explode", 100);
        assert_eq!(h.assistant.state(), AssistantState::Cooldown);
        let acks = h.acks.0.lock();
        assert!(matches!(
            acks.last(),
            Some(Acknowledgment::CommandFailed { command, .. }) if command == "explode"
        ));
    }

    #[test]
    fn window_expiry_puts_assistant_to_sleep() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(50);
        assert!(h.tick(19_999).is_empty());

        let transitions = h.tick(20_000);
        assert_eq!(transitions.last().unwrap().reason, TransitionReason::WindowExpired);
        assert_eq!(h.assistant.state(), AssistantState::Sleeping);
        assert_eq!(h.main.last().unwrap(), vec!["hey hark", "okay hark"]);
        assert!(matches!(h.acks.0.lock().last(), Some(Acknowledgment::Asleep)));
    }

    #[test]
    fn expiry_fires_even_from_cooldown() {
        let mut h = harness_with(
            AssistantSettings {
                awake_window: Duration::from_millis(500),
                ..AssistantSettings::default()
            },
            true,
        );
        h.say("hey hark", 0);
        h.tick(10);
        h.say("mute all", 20);
        let transitions = h.tick(600);
        assert_eq!(h.assistant.state(), AssistantState::Sleeping);
        assert_eq!(transitions.last().unwrap().reason, TransitionReason::WindowExpired);
    }

    #[test]
    fn latency_compensation_shifts_window_start() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(50);
        let now = h.at(5_000);
        let PhraseOutcome::Execute(cmd) = h.assistant.handle_phrase("mute all", now) else {
            panic!("expected a match");
        };
        h.assistant
            .complete_execution(&cmd, Ok(()), Duration::from_millis(800), now);
        assert_eq!(h.assistant.awake_until(), Some(h.at(24_200)));
        assert_eq!(h.assistant.cooldown_until(), Some(h.at(6_000)));
    }

    #[test]
    fn latency_compensation_can_be_disabled() {
        let mut h = harness_with(
            AssistantSettings {
                latency_compensation: false,
                ..AssistantSettings::default()
            },
            true,
        );
        h.say("hey hark", 0);
        let now = h.at(5_000);
        let PhraseOutcome::Execute(cmd) = h.assistant.handle_phrase("mute all", now) else {
            panic!("expected a match");
        };
        h.assistant
            .complete_execution(&cmd, Ok(()), Duration::from_millis(800), now);
        assert_eq!(h.assistant.awake_until(), Some(h.at(25_000)));
    }

    #[test]
    fn quick_keywords_are_prefixed_and_deduplicated() {
        let commands = vec![
            Command::builder("Mute All").keywords(["mute, all", "mute everyone"]).action(|| Ok(())).build().unwrap(),
            Command::new("?!", || Ok(())),
        ];
        assert_eq!(
            quick_keywords("Hark", &commands),
            vec!["hark mute all", "hark mute everyone"]
        );
    }

    #[test]
    fn quick_remainder_requires_prefix_and_rest() {
        assert_eq!(quick_remainder("hark", "Hark, mute Bob!").as_deref(), Some("mute bob"));
        assert_eq!(quick_remainder("hark", "hark"), None);
        assert_eq!(quick_remainder("hark", "harkness mute"), None);
        assert_eq!(quick_remainder("hark", "mute bob"), None);
        assert_eq!(quick_remainder("  ", "hark mute"), None);
    }

    #[test]
    fn quick_command_runs_while_sleeping_and_wakes_main_channel() {
        let mut h = harness();
        assert_eq!(h.quick.last().unwrap()[0], "hark mute all");

        assert!(matches!(h.say_quick("hark mute all", 0), PhraseOutcome::Execute(_)));
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.assistant.state(), AssistantState::Cooldown);
        assert_eq!(h.main.last().unwrap()[0], "mute all");

        assert!(matches!(h.say_quick("hark mute all", 100), PhraseOutcome::Ignored(IgnoreReason::Cooldown)));
        assert_eq!(h.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quick_channel_respects_toggle() {
        let mut h = harness_with(AssistantSettings::default(), false);
        assert_eq!(h.quick.count(), 0);
        assert!(matches!(
            h.say_quick("hark mute all", 0),
            PhraseOutcome::Ignored(IgnoreReason::QuickDisabled)
        ));

        h.assistant.set_quick_commands_enabled(true);
        assert_eq!(h.quick.count(), 1);
        h.assistant.set_quick_commands_enabled(false);
        assert_eq!(h.quick.count(), 2);
        assert!(h.quick.last().is_none());
        assert!(h.assistant.quick_keywords().is_empty());
    }

    #[test]
    fn identical_quick_rebuild_is_a_no_op() {
        let mut h = harness();
        let before = h.quick.count();
        let same = h.assistant.commands().to_vec();
        h.assistant.refresh_commands(same);
        assert_eq!(h.quick.count(), before);
        assert!(!h.assistant.rebuild_quick_channel());
    }

    #[test]
    fn refresh_while_sleeping_defers_main_restart() {
        let mut h = harness();
        let main_calls = h.main.count();
        h.assistant
            .refresh_commands(vec![Command::new("wave", || Ok(()))]);
        assert_eq!(h.main.count(), main_calls);
        assert_eq!(h.quick.last().unwrap(), vec!["hark wave"]);

        h.say("hey hark", 0);
        assert_eq!(h.main.last().unwrap(), vec!["wave"]);
    }

    #[test]
    fn refresh_while_awake_restarts_main_channel() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(10);
        h.assistant
            .refresh_commands(vec![Command::new("wave", || Ok(()))]);
        assert_eq!(h.main.last().unwrap(), vec!["wave"]);
        assert!(matches!(h.say("wave", 20), PhraseOutcome::Execute(_)));
    }

    #[test]
    fn sleep_request_is_honored_on_next_tick() {
        let mut h = harness();
        h.say("hey hark", 0);
        h.tick(10);
        h.assistant.control().request_sleep();
        let transitions = h.tick(20);
        assert_eq!(transitions[0].reason, TransitionReason::SleepRequested);
        assert_eq!(h.assistant.state(), AssistantState::Sleeping);
        assert!(!h.assistant.control().is_sleep_requested());
    }

    #[test]
    fn sleep_request_while_asleep_is_dropped() {
        let mut h = harness();
        h.assistant.control().request_sleep();
        assert!(h.tick(10).is_empty());
        h.say("hey hark", 20);
        h.tick(30);
        assert_eq!(h.assistant.state(), AssistantState::Listening);
    }

    #[test]
    fn wake_messages_rotate() {
        let mut h = harness();
        for i in 0..3 {
            h.say("hey hark", i * 100);
            h.assistant.go_to_sleep(TransitionReason::SleepRequested);
        }
        let messages: Vec<String> = h
            .acks
            .0
            .lock()
            .iter()
            .filter_map(|a| match a {
                Acknowledgment::Wake { message } => Some(message.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(messages, WAKE_MESSAGES);
    }
}
