use googlelog::Severity;
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString};

/// The severity of an application log record.
///
/// Parses from and displays as its lowercase name, e.g. `"warn"`. Records without a level use
/// [`Level::NoLevel`], named `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// The application is about to panic.
    Panic,
    /// The application is about to exit. Writes at this level are flushed before returning.
    Fatal,
    #[strum(serialize = "none")]
    NoLevel,
}

impl From<slog::Level> for Level {
    // slog has no fatal level, Critical takes its place.
    fn from(level: slog::Level) -> Self {
        match level {
            slog::Level::Critical => Level::Fatal,
            slog::Level::Error => Level::Error,
            slog::Level::Warning => Level::Warn,
            slog::Level::Info => Level::Info,
            slog::Level::Debug => Level::Debug,
            slog::Level::Trace => Level::Trace,
        }
    }
}

/// Maps application levels to Cloud Logging severities. Levels missing from the mapping are
/// written with [`Severity::Default`].
pub type LevelMapping = HashMap<Level, Severity>;

/// The mapping every [`LogWriter`](crate::writer::LogWriter) starts out with.
pub fn default_level_mapping() -> LevelMapping {
    HashMap::from([
        (Level::Debug, Severity::Debug),
        (Level::Info, Severity::Info),
        (Level::Warn, Severity::Warning),
        (Level::Error, Severity::Error),
        (Level::Panic, Severity::Critical),
        (Level::Fatal, Severity::Alert),
        (Level::NoLevel, Severity::Default),
        (Level::Trace, Severity::Default),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn default_mapping_covers_every_level() {
        let mapping = default_level_mapping();
        for level in Level::iter() {
            assert!(mapping.contains_key(&level), "{level} is not mapped");
        }
    }

    #[test]
    fn names_round_trip() {
        assert_eq!("warn", Level::Warn.to_string());
        assert_eq!("none", Level::NoLevel.to_string());
        assert_eq!(Ok(Level::Fatal), "fatal".parse::<Level>());
        assert_eq!(Ok(Level::NoLevel), "none".parse::<Level>());
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn slog_levels_translate() {
        assert_eq!(Level::Fatal, Level::from(slog::Level::Critical));
        assert_eq!(Level::Warn, Level::from(slog::Level::Warning));
        assert_eq!(Level::Trace, Level::from(slog::Level::Trace));
    }
}
