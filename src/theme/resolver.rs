use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    settings::PreferenceStore,
};

use super::signal::{ColorSchemeSource, ThemeSubscription};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Preference key the theme mode is stored under.
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        }
    }
}

impl FromStr for ThemeMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            "system" => Ok(ThemeMode::System),
            _ => Err(Error::invalid_argument(format!(
                "unknown theme '{value}'; expected light, dark or system"
            ))),
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl ResolvedTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedTheme::Light => "light",
            ResolvedTheme::Dark => "dark",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ResolvedTheme::Light => ResolvedTheme::Dark,
            ResolvedTheme::Dark => ResolvedTheme::Light,
        }
    }
}

impl fmt::Display for ResolvedTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit preferences win; `System` follows the OS signal.
pub fn resolve(preference: ThemeMode, os_prefers_dark: bool) -> ResolvedTheme {
    match preference {
        ThemeMode::Light => ResolvedTheme::Light,
        ThemeMode::Dark => ResolvedTheme::Dark,
        ThemeMode::System if os_prefers_dark => ResolvedTheme::Dark,
        ThemeMode::System => ResolvedTheme::Light,
    }
}

/// Whatever draws the UI; receives every re-resolution.
pub trait RenderSurface: Send + Sync {
    fn apply_theme(&self, theme: ResolvedTheme);
}

struct ThemeInner {
    mode: ThemeMode,
    os_prefers_dark: bool,
    resolved: ResolvedTheme,
}

/// Process-wide theme state. Cloning shares the same state.
#[derive(Clone)]
pub struct ThemeResolver {
    inner: Arc<Mutex<ThemeInner>>,
    store: Arc<dyn PreferenceStore>,
    surface: Arc<dyn RenderSurface>,
}

impl ThemeResolver {
    /// Reads the stored preference (falling back to `System`) and paints the
    /// surface once.
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        surface: Arc<dyn RenderSurface>,
        os_prefers_dark: bool,
    ) -> Self {
        let mode = match store.get(THEME_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                log_warn!("ignoring stored theme preference: {err}");
                ThemeMode::System
            }),
            None => ThemeMode::System,
        };
        let resolved = resolve(mode, os_prefers_dark);
        surface.apply_theme(resolved);

        Self {
            inner: Arc::new(Mutex::new(ThemeInner {
                mode,
                os_prefers_dark,
                resolved,
            })),
            store,
            surface,
        }
    }

    pub fn mode(&self) -> ThemeMode {
        self.lock().mode
    }

    pub fn resolved(&self) -> ResolvedTheme {
        self.lock().resolved
    }

    pub fn os_prefers_dark(&self) -> bool {
        self.lock().os_prefers_dark
    }

    /// Validates and applies a user-supplied mode. Invalid input leaves the
    /// current preference and resolved theme untouched.
    pub fn set_preference(&self, raw: &str) -> Result<ResolvedTheme> {
        let mode = raw.parse::<ThemeMode>()?;
        Ok(self.set_mode(mode))
    }

    pub fn set_mode(&self, mode: ThemeMode) -> ResolvedTheme {
        let mut inner = self.lock();
        if let Err(err) = self.store.set(THEME_KEY, mode.as_str()) {
            log_warn!("failed to persist theme preference '{mode}': {err:#}");
        }
        inner.mode = mode;
        self.reapply(&mut inner)
    }

    /// Flips between light and dark based on what is on screen now.
    pub fn toggle(&self) -> ResolvedTheme {
        let target = match self.resolved().opposite() {
            ResolvedTheme::Light => ThemeMode::Light,
            ResolvedTheme::Dark => ThemeMode::Dark,
        };
        self.set_mode(target)
    }

    pub fn on_os_signal(&self, prefers_dark: bool) -> ResolvedTheme {
        let mut inner = self.lock();
        inner.os_prefers_dark = prefers_dark;
        self.reapply(&mut inner)
    }

    /// Follows `source` until the returned handle is dropped or closed.
    pub fn attach(&self, source: &dyn ColorSchemeSource) -> ThemeSubscription {
        self.on_os_signal(source.prefers_dark());
        ThemeSubscription::spawn(self.clone(), source.subscribe())
    }

    fn reapply(&self, inner: &mut ThemeInner) -> ResolvedTheme {
        inner.resolved = resolve(inner.mode, inner.os_prefers_dark);
        log_debug!(
            "theme {} (os dark: {}) -> {}",
            inner.mode,
            inner.os_prefers_dark,
            inner.resolved
        );
        self.surface.apply_theme(inner.resolved);
        inner.resolved
    }

    fn lock(&self) -> MutexGuard<'_, ThemeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct RecordingSurface {
        pub(crate) applied: Mutex<Vec<ResolvedTheme>>,
    }

    impl RecordingSurface {
        pub(crate) fn last(&self) -> Option<ResolvedTheme> {
            self.applied.lock().unwrap().last().copied()
        }

        pub(crate) fn count(&self) -> usize {
            self.applied.lock().unwrap().len()
        }
    }

    impl RenderSurface for RecordingSurface {
        fn apply_theme(&self, theme: ResolvedTheme) {
            self.applied.lock().unwrap().push(theme);
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
        fail_writes: bool,
    }

    impl MemoryStore {
        fn with(key: &str, value: &str) -> Self {
            let store = Self::default();
            store
                .values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            store
        }
    }

    impl PreferenceStore for MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("read-only");
            }
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn resolver_with(
        store: MemoryStore,
        os_dark: bool,
    ) -> (ThemeResolver, Arc<MemoryStore>, Arc<RecordingSurface>) {
        let store = Arc::new(store);
        let surface = Arc::new(RecordingSurface::default());
        let resolver = ThemeResolver::new(store.clone(), surface.clone(), os_dark);
        (resolver, store, surface)
    }

    #[test]
    fn resolve_follows_os_only_for_system() {
        assert_eq!(resolve(ThemeMode::System, true), ResolvedTheme::Dark);
        assert_eq!(resolve(ThemeMode::System, false), ResolvedTheme::Light);
        assert_eq!(resolve(ThemeMode::Light, true), ResolvedTheme::Light);
        assert_eq!(resolve(ThemeMode::Dark, false), ResolvedTheme::Dark);
    }

    #[test]
    fn parses_modes_leniently() {
        assert_eq!(" Dark ".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!("SYSTEM".parse::<ThemeMode>().unwrap(), ThemeMode::System);
        assert!(matches!(
            "sepia".parse::<ThemeMode>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_or_invalid_stored_value_defaults_to_system() {
        let (resolver, _, surface) = resolver_with(MemoryStore::default(), true);
        assert_eq!(resolver.mode(), ThemeMode::System);
        assert_eq!(surface.last(), Some(ResolvedTheme::Dark));

        let (resolver, _, _) = resolver_with(MemoryStore::with(THEME_KEY, "purple"), false);
        assert_eq!(resolver.mode(), ThemeMode::System);
        assert_eq!(resolver.resolved(), ResolvedTheme::Light);
    }

    #[test]
    fn stored_preference_overrides_os() {
        let (resolver, _, surface) = resolver_with(MemoryStore::with(THEME_KEY, "light"), true);
        assert_eq!(resolver.resolved(), ResolvedTheme::Light);
        assert_eq!(surface.last(), Some(ResolvedTheme::Light));
    }

    #[test]
    fn invalid_preference_leaves_state_unchanged() {
        let (resolver, store, surface) = resolver_with(MemoryStore::default(), false);
        resolver.set_preference("dark").unwrap();
        let writes = surface.count();

        let err = resolver.set_preference("invalid").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(resolver.mode(), ThemeMode::Dark);
        assert_eq!(resolver.resolved(), ResolvedTheme::Dark);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
        assert_eq!(surface.count(), writes);
    }

    #[test]
    fn set_preference_persists_and_repaints() {
        let (resolver, store, surface) = resolver_with(MemoryStore::default(), true);
        assert_eq!(resolver.set_preference("light").unwrap(), ResolvedTheme::Light);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("light"));
        assert_eq!(surface.last(), Some(ResolvedTheme::Light));
    }

    #[test]
    fn persistence_failure_keeps_in_memory_choice() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let (resolver, _, surface) = resolver_with(store, false);

        assert_eq!(resolver.set_preference("dark").unwrap(), ResolvedTheme::Dark);
        assert_eq!(resolver.mode(), ThemeMode::Dark);
        assert_eq!(surface.last(), Some(ResolvedTheme::Dark));
    }

    #[test]
    fn toggle_bypasses_system() {
        let (resolver, store, _) = resolver_with(MemoryStore::default(), true);
        assert_eq!(resolver.resolved(), ResolvedTheme::Dark);

        assert_eq!(resolver.toggle(), ResolvedTheme::Light);
        assert_eq!(resolver.mode(), ThemeMode::Light);
        assert_eq!(resolver.toggle(), ResolvedTheme::Dark);
        assert_eq!(resolver.mode(), ThemeMode::Dark);
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn os_signal_only_matters_in_system_mode() {
        let (resolver, _, surface) = resolver_with(MemoryStore::default(), false);
        assert_eq!(resolver.on_os_signal(true), ResolvedTheme::Dark);
        assert_eq!(surface.last(), Some(ResolvedTheme::Dark));

        resolver.set_preference("light").unwrap();
        assert_eq!(resolver.on_os_signal(true), ResolvedTheme::Light);
        assert!(resolver.os_prefers_dark());
    }
}
