pub mod resolver;
pub mod signal;

pub use resolver::{resolve, RenderSurface, ResolvedTheme, ThemeMode, ThemeResolver, THEME_KEY};
pub use signal::{ColorSchemeSignal, ColorSchemeSource, ThemeSubscription};
