use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::resolver::ThemeResolver;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// OS-level "prefers dark" signal.
pub trait ColorSchemeSource: Send + Sync {
    fn prefers_dark(&self) -> bool;
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Signal fed by whoever can observe the OS setting (a platform hook, a
/// terminal query, an environment variable).
pub struct ColorSchemeSignal {
    tx: watch::Sender<bool>,
}

impl ColorSchemeSignal {
    pub fn new(prefers_dark: bool) -> Self {
        let (tx, _rx) = watch::channel(prefers_dark);
        Self { tx }
    }

    pub fn set(&self, prefers_dark: bool) {
        self.tx.send_replace(prefers_dark);
    }
}

impl ColorSchemeSource for ColorSchemeSignal {
    fn prefers_dark(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Live link between a signal source and a [`ThemeResolver`].
///
/// Dropping the handle stops further resolution; [`ThemeSubscription::close`]
/// also waits for the listener task to finish.
pub struct ThemeSubscription {
    active: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ThemeSubscription {
    pub(super) fn spawn(resolver: ThemeResolver, mut rx: watch::Receiver<bool>) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();

        let task_active = active.clone();
        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            log_debug!("color scheme source closed");
                            break;
                        }
                        let prefers_dark = *rx.borrow_and_update();
                        // Checked at delivery time: cancellation may still be in flight.
                        if !task_active.load(Ordering::SeqCst) {
                            break;
                        }
                        resolver.on_os_signal(prefers_dark);
                    }
                }
            }
        });

        Self {
            active,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn close(mut self) {
        self.release();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log_error!("theme listener task failed: {err}");
            }
        }
    }

    fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.cancel_token.cancel();
    }
}

impl Drop for ThemeSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::resolver::tests::{MemoryStore, RecordingSurface};
    use crate::theme::ResolvedTheme;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn follows_os_changes_until_closed() {
        let surface = Arc::new(RecordingSurface::default());
        let resolver = ThemeResolver::new(Arc::new(MemoryStore::default()), surface.clone(), false);
        let signal = ColorSchemeSignal::new(true);

        let subscription = resolver.attach(&signal);
        assert_eq!(resolver.resolved(), ResolvedTheme::Dark);

        signal.set(false);
        settle().await;
        assert_eq!(surface.last(), Some(ResolvedTheme::Light));

        subscription.close().await;
        let writes = surface.count();
        signal.set(true);
        settle().await;
        assert_eq!(surface.count(), writes);
        assert_eq!(resolver.resolved(), ResolvedTheme::Light);
    }

    #[tokio::test]
    async fn dropping_the_handle_releases_the_listener() {
        let surface = Arc::new(RecordingSurface::default());
        let resolver = ThemeResolver::new(Arc::new(MemoryStore::default()), surface.clone(), false);
        let signal = ColorSchemeSignal::new(false);

        let subscription = resolver.attach(&signal);
        assert!(subscription.is_active());
        drop(subscription);

        signal.set(true);
        settle().await;
        assert_eq!(resolver.resolved(), ResolvedTheme::Light);
    }
}
