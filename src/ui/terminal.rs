use std::sync::{Mutex, PoisonError};

use crate::theme::{RenderSurface, ResolvedTheme};

use super::SessionView;

const RESET: &str = "\x1b[0m";

/// Renders session views as single terminal lines, coloured for the
/// resolved theme.
pub struct TerminalSurface {
    theme: Mutex<ResolvedTheme>,
    color: bool,
}

impl TerminalSurface {
    pub fn new(color: bool) -> Self {
        Self {
            theme: Mutex::new(ResolvedTheme::Light),
            color,
        }
    }

    pub fn theme(&self) -> ResolvedTheme {
        *self.theme.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn accent(&self) -> &'static str {
        match self.theme() {
            ResolvedTheme::Light => "\x1b[34m",
            ResolvedTheme::Dark => "\x1b[96m",
        }
    }

    pub fn render(&self, view: &SessionView) -> String {
        let controls = view
            .controls
            .iter()
            .map(|c| format!("[{}]", c.label()))
            .collect::<Vec<_>>()
            .join(" ");
        let volume = if view.muted {
            "muted".to_string()
        } else {
            format!("vol {:.0}%", view.volume * 100.0)
        };

        if self.color {
            format!(
                "{}{}{} {} ({}) {}",
                self.accent(),
                view.timer_text,
                RESET,
                view.status.as_str(),
                volume,
                controls
            )
        } else {
            format!(
                "{} {} ({}) {}",
                view.timer_text,
                view.status.as_str(),
                volume,
                controls
            )
        }
    }
}

impl RenderSurface for TerminalSurface {
    fn apply_theme(&self, theme: ResolvedTheme) {
        *self.theme.lock().unwrap_or_else(PoisonError::into_inner) = theme;
    }
}
