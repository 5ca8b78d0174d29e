//! Command Registry: the mutable store of dynamically registered commands.
//!
//! One instance is created at startup and handed (cheaply cloned) to every
//! command source. All list mutation happens under a single lock; change
//! listeners are always called after that lock is released so a listener may
//! re-enter the registry.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hark_core::command::name_key;
use hark_core::{Command, HarkError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback fired after the dynamic command list changes.
pub type Listener = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`CommandRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct State {
    commands: Vec<Command>,
    sealed: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

/// Thread-safe registry of custom commands.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    inner: Arc<Inner>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a command. Always succeeds, including after sealing.
    pub fn register(&self, command: Command) {
        let name = command.name().to_string();
        let sealed = {
            let mut state = self.inner.state.lock();
            state.commands.push(command);
            state.sealed
        };

        if sealed {
            warn!(command = %name, "Command registered after seal; a catalog rebuild will pick it up");
        } else {
            debug!(command = %name, "Registered command");
        }
        self.notify();
    }

    /// Register unless `cancel` has already fired.
    pub async fn register_async(&self, command: Command, cancel: &CancellationToken) -> Result<(), HarkError> {
        if cancel.is_cancelled() {
            return Err(HarkError::Cancelled(format!("registration of '{}'", command.name())));
        }
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(HarkError::Cancelled(format!("registration of '{}'", command.name())));
        }
        self.register(command);
        Ok(())
    }

    /// Remove every command whose trimmed name matches case-insensitively.
    pub fn unregister_by_name(&self, name: &str) -> usize {
        let key = name_key(name);
        let removed = {
            let mut state = self.inner.state.lock();
            let before = state.commands.len();
            state.commands.retain(|c| c.name_key() != key);
            before - state.commands.len()
        };

        if removed > 0 {
            debug!(command = %name.trim(), count = removed, "Unregistered command");
            self.notify();
        }
        removed
    }

    pub fn clear(&self) -> usize {
        let cleared = {
            let mut state = self.inner.state.lock();
            let n = state.commands.len();
            state.commands.clear();
            n
        };

        if cleared > 0 {
            info!(count = cleared, "Cleared command registry");
            self.notify();
        }
        cleared
    }

    /// Drop every command and the sealed flag. Debug builds only.
    #[cfg(debug_assertions)]
    pub fn reset_for_debug_only(&self) {
        {
            let mut state = self.inner.state.lock();
            state.commands.clear();
            state.sealed = false;
        }
        warn!("Command registry reset");
        self.notify();
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Copy of the current dynamic list.
    pub fn snapshot(&self) -> Vec<Command> {
        self.inner.state.lock().commands.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.state.lock().sealed
    }

    /// Wait up to `window` for late registrants, then seal and snapshot.
    ///
    /// Cancelling the wait only ends it early; the seal still happens.
    pub async fn seal_and_snapshot(&self, window: Duration, cancel: &CancellationToken) -> Vec<Command> {
        if !window.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(window) => {}
                _ = cancel.cancelled() => {
                    debug!("Seal grace period cancelled, sealing early");
                }
            }
        }

        let mut state = self.inner.state.lock();
        state.sealed = true;
        info!(count = state.commands.len(), "Command registry sealed");
        state.commands.clone()
    }

    // -----------------------------------------------------------------------
    // Change notification
    // -----------------------------------------------------------------------

    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, listener));
        id
    }

    pub fn subscribe_fn<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Command registry listener failed"),
                Err(_) => warn!("Command registry listener panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn cmd(name: &str) -> Command {
        Command::new(name, || Ok(()))
    }

    fn names(registry: &CommandRegistry) -> Vec<String> {
        registry.snapshot().iter().map(|c| c.name().to_string()).collect()
    }

    fn counter(registry: &CommandRegistry) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        registry.subscribe_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hits
    }

    #[test]
    fn snapshot_reflects_net_effect_in_order() {
        let registry = CommandRegistry::new();
        registry.register(cmd("wave"));
        registry.register(cmd("Mute Bob"));
        registry.register(cmd("nod"));
        assert_eq!(registry.unregister_by_name("  mute bob "), 1);
        registry.register(cmd("shrug"));
        assert_eq!(names(&registry), vec!["wave", "nod", "shrug"]);
    }

    #[test]
    fn unregister_removes_all_duplicates() {
        let registry = CommandRegistry::new();
        registry.register(cmd("wave"));
        registry.register(cmd("WAVE"));
        registry.register(cmd("nod"));
        assert_eq!(registry.unregister_by_name("Wave"), 2);
        assert_eq!(names(&registry), vec!["nod"]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let registry = CommandRegistry::new();
        registry.register(cmd("wave"));
        let snap = registry.snapshot();
        registry.clear();
        assert_eq!(snap.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn notifications_fire_only_on_change() {
        let registry = CommandRegistry::new();
        let hits = counter(&registry);

        registry.register(cmd("wave"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.unregister_by_name("missing"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.clear(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.clear(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let registry = CommandRegistry::new();
        registry.subscribe_fn(|| Err(anyhow::anyhow!("recognizer offline")));
        registry.subscribe_fn(|| panic!("listener bug"));
        let hits = counter(&registry);

        registry.register(cmd("wave"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(names(&registry), vec!["wave"]);
    }

    #[test]
    fn listener_may_reenter_registry() {
        let registry = CommandRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let (r, s) = (registry.clone(), seen.clone());
        registry.subscribe_fn(move || {
            s.store(r.snapshot().len(), Ordering::SeqCst);
            Ok(())
        });

        registry.register(cmd("wave"));
        registry.register(cmd("nod"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = CommandRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = registry.subscribe_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        registry.register(cmd("wave"));
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.register(cmd("nod"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn register_after_seal_still_works() {
        let registry = CommandRegistry::new();
        registry.register(cmd("early"));
        let sealed = registry
            .seal_and_snapshot(Duration::ZERO, &CancellationToken::new())
            .await;
        assert_eq!(sealed.len(), 1);
        assert!(registry.is_sealed());

        let hits = counter(&registry);
        registry.register(cmd("late"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(names(&registry), vec!["early", "late"]);
    }

    #[tokio::test]
    async fn seal_waits_for_window() {
        let registry = CommandRegistry::new();
        let late = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            late.register(Command::new("late plugin", || Ok(())));
        });

        let sealed = registry
            .seal_and_snapshot(Duration::from_millis(400), &CancellationToken::new())
            .await;
        assert_eq!(sealed.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_seal_returns_early_and_still_seals() {
        let registry = CommandRegistry::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let sealed = registry
            .seal_and_snapshot(Duration::from_secs(30), &cancel)
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(sealed.is_empty());
        assert!(registry.is_sealed());
    }

    #[tokio::test]
    async fn register_async_honors_cancellation() {
        let registry = CommandRegistry::new();
        let cancel = CancellationToken::new();
        registry.register_async(cmd("wave"), &cancel).await.unwrap();

        cancel.cancel();
        let err = registry.register_async(cmd("nod"), &cancel).await.unwrap_err();
        assert!(matches!(err, HarkError::Cancelled(_)));
        assert_eq!(names(&registry), vec!["wave"]);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn reset_clears_seal_and_commands() {
        let registry = CommandRegistry::new();
        registry.register(cmd("wave"));
        let hits = counter(&registry);
        registry.reset_for_debug_only();
        assert!(registry.is_empty());
        assert!(!registry.is_sealed());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
