// Scan field state
//
// The live cells a scan screen shares between its input field, the camera
// result callback and the quick-scan controller. Writers go through
// ScanStateManager, which emits a change event for every field that actually
// changed.

use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when a scan field cell is modified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanChange {
    /// The scanned text changed (keystroke, paste, or camera result)
    ValueChanged { value: String },

    /// Quick scan was switched on or off
    EnabledChanged { enabled: bool },

    /// The screen started or finished a blocking operation
    BusyChanged { busy: bool },
}

/// Current contents of the scan field cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanFieldState {
    pub value: String,
    pub enabled: bool,
    pub busy: bool,
}

impl Default for ScanFieldState {
    fn default() -> Self {
        Self {
            value: String::new(),
            enabled: true,
            busy: false,
        }
    }
}

/// Thread-safe holder for [`ScanFieldState`] with change notification
///
/// Every mutation goes through [`update()`](Self::update), which diffs the
/// old and new state and broadcasts one [`ScanChange`] per changed field.
/// Writing the same value twice emits nothing.
pub struct ScanStateManager {
    state: RwLock<ScanFieldState>,

    /// Multiple controllers can observe the same field
    change_tx: broadcast::Sender<ScanChange>,
}

impl ScanStateManager {
    /// Create a manager with an empty value, quick scan enabled and not busy.
    ///
    /// The broadcast channel buffers 100 events; a slow subscriber sees
    /// `Lagged` and should re-read the state.
    pub fn new() -> Self {
        Self::with_state(ScanFieldState::default())
    }

    pub fn with_state(initial: ScanFieldState) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: RwLock::new(initial),
            change_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> ScanFieldState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ScanFieldState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Mutate the state and broadcast what changed
    ///
    /// # Returns
    /// The events that were emitted, in field order (value, enabled, busy)
    pub fn update<F>(&self, update_fn: F) -> Vec<ScanChange>
    where
        F: FnOnce(&mut ScanFieldState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // No subscribers is fine
            let _ = self.change_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanChange> {
        self.change_tx.subscribe()
    }

    fn detect_changes(old: &ScanFieldState, new: &ScanFieldState) -> Vec<ScanChange> {
        let mut changes = Vec::new();

        if old.value != new.value {
            changes.push(ScanChange::ValueChanged {
                value: new.value.clone(),
            });
        }

        if old.enabled != new.enabled {
            changes.push(ScanChange::EnabledChanged {
                enabled: new.enabled,
            });
        }

        if old.busy != new.busy {
            changes.push(ScanChange::BusyChanged { busy: new.busy });
        }

        changes
    }

    pub fn value(&self) -> String {
        self.read(|s| s.value.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.read(|s| s.enabled)
    }

    pub fn is_busy(&self) -> bool {
        self.read(|s| s.busy)
    }

    /// Replace the scanned text. Used by the input field and the camera callback alike.
    pub fn set_value(&self, value: impl Into<String>) -> Vec<ScanChange> {
        let value = value.into();
        self.update(|state| state.value = value)
    }

    pub fn clear_value(&self) -> Vec<ScanChange> {
        self.update(|state| state.value.clear())
    }

    pub fn set_enabled(&self, enabled: bool) -> Vec<ScanChange> {
        self.update(|state| state.enabled = enabled)
    }

    pub fn toggle_enabled(&self) -> Vec<ScanChange> {
        self.update(|state| state.enabled = !state.enabled)
    }

    pub fn set_busy(&self, busy: bool) -> Vec<ScanChange> {
        self.update(|state| state.busy = busy)
    }
}

impl Default for ScanStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let manager = ScanStateManager::new();
        let state = manager.snapshot();
        assert!(state.value.is_empty());
        assert!(state.enabled);
        assert!(!state.busy);
    }

    #[test]
    fn test_set_value_emits_once() {
        let manager = ScanStateManager::new();

        let changes = manager.set_value("8991234567890");
        assert_eq!(
            changes,
            vec![ScanChange::ValueChanged {
                value: "8991234567890".to_string()
            }]
        );

        // Same value again is not a change
        assert!(manager.set_value("8991234567890").is_empty());
    }

    #[test]
    fn test_multiple_fields_in_one_update() {
        let manager = ScanStateManager::new();

        let changes = manager.update(|s| {
            s.value = "X1".to_string();
            s.busy = true;
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], ScanChange::ValueChanged { .. }));
        assert_eq!(changes[1], ScanChange::BusyChanged { busy: true });
    }

    #[test]
    fn test_toggle_enabled() {
        let manager = ScanStateManager::new();
        manager.toggle_enabled();
        assert!(!manager.is_enabled());
        manager.toggle_enabled();
        assert!(manager.is_enabled());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let manager = ScanStateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.set_busy(true);

        assert_eq!(rx1.recv().await.unwrap(), ScanChange::BusyChanged { busy: true });
        assert_eq!(rx2.recv().await.unwrap(), ScanChange::BusyChanged { busy: true });
    }
}
