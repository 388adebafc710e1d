// ── Client state store ──
//
// Process-wide state shared by every view: the session user, a loading
// flag, the notification queue, and the theme. Each field sits in its own
// `watch` channel so views observe exactly what they render. Only the
// theme crosses the persistence boundary.

mod storage;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::SessionUser;

pub use storage::{FileStorage, MemoryStorage, StateStorage};

/// Storage key of the persisted slice.
pub const STORAGE_KEY: &str = "app-storage";

// ── Notifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(),
            message: message.into(),
            kind,
        }
    }
}

pub type NotificationQueue = Arc<IndexMap<NotificationId, Notification>>;

// ── Theme ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }

    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Whatever renders the theme (a document class, a terminal palette).
pub trait VisualMode: Send + Sync {
    fn apply(&self, theme: Theme);
}

/// A visual mode with nothing to render to.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl VisualMode for Headless {
    fn apply(&self, _theme: Theme) {}
}

/// The persisted slice: the theme flag and nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub dark_mode: bool,
}

impl PersistedState {
    fn theme(self) -> Theme {
        if self.dark_mode { Theme::Dark } else { Theme::Light }
    }
}

// ── AppState ────────────────────────────────────────────────────────

/// Shared client state; hand it around as `Arc<AppState>`.
pub struct AppState {
    user: watch::Sender<Option<Arc<SessionUser>>>,
    loading: watch::Sender<bool>,
    notifications: watch::Sender<NotificationQueue>,
    theme: watch::Sender<Theme>,
    storage: Arc<dyn StateStorage>,
    visual: Arc<dyn VisualMode>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("user", &*self.user.borrow())
            .field("loading", &*self.loading.borrow())
            .field("notifications", &self.notifications.borrow().len())
            .field("theme", &*self.theme.borrow())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Fresh state with the light theme; storage is not consulted.
    pub fn new(storage: Arc<dyn StateStorage>, visual: Arc<dyn VisualMode>) -> Self {
        Self {
            user: watch::Sender::new(None),
            loading: watch::Sender::new(true),
            notifications: watch::Sender::new(Arc::new(IndexMap::new())),
            theme: watch::Sender::new(Theme::Light),
            storage,
            visual,
        }
    }

    /// In-memory state for tests and one-off tools.
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(Headless))
    }

    /// Rehydrate the persisted theme and apply it. Missing or unreadable
    /// storage falls back to the light theme.
    pub fn restore(storage: Arc<dyn StateStorage>, visual: Arc<dyn VisualMode>) -> Self {
        let persisted = match storage.read(STORAGE_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<PersistedState>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable persisted state");
                PersistedState::default()
            }),
            Ok(None) => PersistedState::default(),
            Err(e) => {
                warn!(error = %e, "persisted state unavailable");
                PersistedState::default()
            }
        };

        let state = Self::new(storage, visual);
        let theme = persisted.theme();
        state.theme.send_replace(theme);
        state.visual.apply(theme);
        debug!(%theme, "restored client state");
        state
    }

    // ── Session user ─────────────────────────────────────────────

    pub fn user(&self) -> Option<Arc<SessionUser>> {
        self.user.borrow().clone()
    }

    /// Replace the session user wholesale.
    pub fn set_user(&self, user: Option<SessionUser>) {
        self.user.send_replace(user.map(Arc::new));
    }

    pub fn subscribe_user(&self) -> watch::Receiver<Option<Arc<SessionUser>>> {
        self.user.subscribe()
    }

    // ── Loading flag ─────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    // ── Notifications ────────────────────────────────────────────

    /// Append to the queue. An entry with an existing id replaces it
    /// in place.
    pub fn add_notification(&self, notification: Notification) -> NotificationId {
        let id = notification.id.clone();
        self.notifications.send_modify(|queue| {
            Arc::make_mut(queue).insert(id.clone(), notification);
        });
        id
    }

    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>) -> NotificationId {
        self.add_notification(Notification::new(kind, message))
    }

    /// Returns whether an entry was removed.
    pub fn remove_notification(&self, id: &NotificationId) -> bool {
        self.notifications.send_if_modified(|queue| {
            if queue.contains_key(id) {
                Arc::make_mut(queue).shift_remove(id);
                true
            } else {
                false
            }
        })
    }

    pub fn notifications(&self) -> NotificationQueue {
        self.notifications.borrow().clone()
    }

    pub fn subscribe_notifications(&self) -> watch::Receiver<NotificationQueue> {
        self.notifications.subscribe()
    }

    // ── Theme ────────────────────────────────────────────────────

    pub fn theme(&self) -> Theme {
        *self.theme.borrow()
    }

    /// Switch theme, apply it right away, then persist it. The new theme
    /// stays active even if persisting fails.
    pub fn set_theme(&self, theme: Theme) -> Result<(), CoreError> {
        self.theme.send_replace(theme);
        self.visual.apply(theme);

        let persisted = PersistedState {
            dark_mode: theme.is_dark(),
        };
        let raw = serde_json::to_string(&persisted).map_err(|e| CoreError::Internal(e.to_string()))?;
        self.storage.write(STORAGE_KEY, &raw)
    }

    pub fn toggle_theme(&self) -> Result<Theme, CoreError> {
        let next = self.theme().toggle();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::model::UserId;

    #[derive(Default)]
    struct RecordingMode(Mutex<Vec<Theme>>);

    impl VisualMode for RecordingMode {
        fn apply(&self, theme: Theme) {
            self.0.lock().unwrap().push(theme);
        }
    }

    struct BrokenStorage;

    impl StateStorage for BrokenStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, CoreError> {
            Err(CoreError::Config {
                message: "disk gone".into(),
            })
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), CoreError> {
            Err(CoreError::Config {
                message: "disk gone".into(),
            })
        }
    }

    fn user(id: &str) -> SessionUser {
        SessionUser {
            id: UserId::from(id),
            email: Some(format!("{id}@example.org")),
            full_name: None,
            avatar_url: None,
            role: None,
        }
    }

    #[test]
    fn starts_loading_with_no_user() {
        let state = AppState::ephemeral();
        assert!(state.is_loading());
        assert!(state.user().is_none());
        assert!(state.notifications().is_empty());
        assert_eq!(state.theme(), Theme::Light);
    }

    #[test]
    fn set_user_replaces_wholesale() {
        let state = AppState::ephemeral();
        let mut rx = state.subscribe_user();

        state.set_user(Some(SessionUser {
            full_name: Some("Dana".into()),
            ..user("a")
        }));
        state.set_user(Some(user("b")));
        assert!(rx.has_changed().unwrap());

        let current = state.user().unwrap();
        assert_eq!(current.id, UserId::from("b"));
        assert_eq!(current.full_name, None);

        state.set_user(None);
        assert!(state.user().is_none());
    }

    #[test]
    fn notifications_keep_insertion_order() {
        let state = AppState::ephemeral();
        let first = state.notify(NotificationKind::Info, "one");
        let second = state.notify(NotificationKind::Success, "two");
        let third = state.notify(NotificationKind::Error, "three");

        assert!(state.remove_notification(&second));
        assert!(!state.remove_notification(&second));

        let queue = state.notifications();
        let ids: Vec<_> = queue.keys().cloned().collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn theme_is_applied_and_persisted_alone() {
        let storage = Arc::new(MemoryStorage::new());
        let visual = Arc::new(RecordingMode::default());
        let state = AppState::new(storage.clone(), visual.clone());

        state.set_user(Some(user("a")));
        state.notify(NotificationKind::Info, "hello");
        state.set_theme(Theme::Dark).unwrap();

        assert_eq!(*visual.0.lock().unwrap(), vec![Theme::Dark]);
        assert_eq!(
            storage.read(STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"dark_mode":true}"#)
        );
    }

    #[test]
    fn reload_restores_dark_mode_without_a_session() {
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStorage::new());
        {
            let before = AppState::new(storage.clone(), Arc::new(Headless));
            before.set_user(Some(user("a")));
            before.notify(NotificationKind::Info, "hello");
            before.set_theme(Theme::Dark).unwrap();
        }

        let visual = Arc::new(RecordingMode::default());
        let after = AppState::restore(storage, visual.clone());

        assert_eq!(after.theme(), Theme::Dark);
        assert_eq!(*visual.0.lock().unwrap(), vec![Theme::Dark]);
        assert!(after.user().is_none());
        assert!(after.notifications().is_empty());
    }

    #[test]
    fn unreadable_storage_falls_back_to_light() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(STORAGE_KEY, "not json").unwrap();
        let state = AppState::restore(storage, Arc::new(Headless));
        assert_eq!(state.theme(), Theme::Light);

        let state = AppState::restore(Arc::new(BrokenStorage), Arc::new(Headless));
        assert_eq!(state.theme(), Theme::Light);
    }

    #[test]
    fn failed_persist_still_switches_theme() {
        let visual = Arc::new(RecordingMode::default());
        let state = AppState::new(Arc::new(BrokenStorage), visual.clone());

        assert!(state.set_theme(Theme::Dark).is_err());
        assert_eq!(state.theme(), Theme::Dark);
        assert_eq!(*visual.0.lock().unwrap(), vec![Theme::Dark]);
    }

    #[test]
    fn toggle_flips() {
        let state = AppState::ephemeral();
        assert_eq!(state.toggle_theme().unwrap(), Theme::Dark);
        assert_eq!(state.toggle_theme().unwrap(), Theme::Light);
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
    }
}
