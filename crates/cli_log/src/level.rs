//! Severity levels and the [`Leveler`] abstraction used to configure the minimum level of a
//! [`CliHandler`][crate::CliHandler].

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicI32, Ordering},
};

/// The severity of a log record.
///
/// Levels are plain integers: the higher the value, the more severe the record. The named
/// levels are spaced apart so that intermediate levels can be expressed as offsets from them,
/// which render as `NAME+n` (e.g. `INFO+2`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i32);

impl Level {
    /// Very verbose diagnostics.
    pub const TRACE: Self = Self(-8);

    /// Diagnostics useful while debugging.
    pub const DEBUG: Self = Self(-4);

    /// Informational messages. This is the default minimum level.
    pub const INFO: Self = Self(0);

    /// Conditions that deserve attention.
    pub const WARN: Self = Self(4);

    /// Failures.
    pub const ERROR: Self = Self(8);

    /// Creates a level from its raw integer value.
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw integer value of the level.
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns the named level this level is an offset of.
    fn base(self) -> (&'static str, Self) {
        if self < Self::DEBUG {
            ("TRACE", Self::TRACE)
        } else if self < Self::INFO {
            ("DEBUG", Self::DEBUG)
        } else if self < Self::WARN {
            ("INFO", Self::INFO)
        } else if self < Self::ERROR {
            ("WARN", Self::WARN)
        } else {
            ("ERROR", Self::ERROR)
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, base) = self.base();
        match self.0.checked_sub(base.0) {
            Some(0) => f.write_str(name),
            Some(offset) => write!(f, "{name}{offset:+}"),
            None => write!(f, "{name}"),
        }
    }
}

/// Error returned when a string cannot be parsed into a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid log level `{input}`")]
pub struct ParseLevelError {
    input: String,
}

impl ParseLevelError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_owned(),
        }
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, case-insensitively, optionally followed by a signed offset:
    /// `info`, `WARN`, `debug+2`, `ERROR-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, offset) = match s.find(['+', '-']) {
            Some(index) => {
                let (name, offset) = s.split_at(index);
                let offset = offset
                    .parse::<i32>()
                    .map_err(|_| ParseLevelError::new(s))?;
                (name, offset)
            }
            None => (s, 0),
        };

        let base = match name.to_ascii_uppercase().as_str() {
            "TRACE" => Self::TRACE,
            "DEBUG" => Self::DEBUG,
            "INFO" => Self::INFO,
            "WARN" => Self::WARN,
            "ERROR" => Self::ERROR,
            _ => return Err(ParseLevelError::new(s)),
        };

        base.0
            .checked_add(offset)
            .map(Self)
            .ok_or_else(|| ParseLevelError::new(s))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Level {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "tracing")]
impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::TRACE,
            tracing::Level::DEBUG => Self::DEBUG,
            tracing::Level::INFO => Self::INFO,
            tracing::Level::WARN => Self::WARN,
            tracing::Level::ERROR => Self::ERROR,
        }
    }
}

/// Supplies the minimum level of a handler.
///
/// The handler asks for the level on every [`enabled`][crate::CliHandler::enabled] check, so an
/// implementation may change its answer over time (see [`LevelVar`]).
pub trait Leveler: fmt::Debug + Send + Sync {
    /// Returns the current minimum level.
    fn level(&self) -> Level;
}

impl Leveler for Level {
    fn level(&self) -> Level {
        *self
    }
}

/// A [`Leveler`] whose level can be changed at runtime, from any thread.
#[derive(Debug, Default)]
pub struct LevelVar(AtomicI32);

impl LevelVar {
    /// Creates a new variable holding `level`.
    pub fn new(level: Level) -> Self {
        Self(AtomicI32::new(level.0))
    }

    /// Replaces the held level.
    pub fn set(&self, level: Level) {
        self.0.store(level.0, Ordering::Relaxed);
    }
}

impl Leveler for LevelVar {
    fn level(&self) -> Level {
        Level(self.0.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn named_levels_render_uppercase() {
        assert_eq!(Level::TRACE.to_string(), "TRACE");
        assert_eq!(Level::DEBUG.to_string(), "DEBUG");
        assert_eq!(Level::INFO.to_string(), "INFO");
        assert_eq!(Level::WARN.to_string(), "WARN");
        assert_eq!(Level::ERROR.to_string(), "ERROR");
    }

    #[test]
    fn intermediate_levels_render_as_offsets() {
        assert_eq!(Level::new(2).to_string(), "INFO+2");
        assert_eq!(Level::new(-1).to_string(), "DEBUG+3");
        assert_eq!(Level::new(12).to_string(), "ERROR+4");
        assert_eq!(Level::new(-10).to_string(), "TRACE-2");
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::TRACE < Level::DEBUG);
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
        assert_eq!(Level::default(), Level::INFO);
    }

    #[test]
    fn parse_accepts_names_and_offsets() {
        assert_eq!("info".parse::<Level>().unwrap(), Level::INFO);
        assert_eq!("Warn".parse::<Level>().unwrap(), Level::WARN);
        assert_eq!("DEBUG+2".parse::<Level>().unwrap(), Level::new(-2));
        assert_eq!("error-1".parse::<Level>().unwrap(), Level::new(7));
    }

    #[test]
    fn parse_round_trips_display() {
        for value in -12..=12 {
            let level = Level::new(value);
            assert_eq!(level.to_string().parse::<Level>().unwrap(), level);
        }
    }

    #[test]
    fn parse_rejects_unknown_input() {
        let error = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(error.to_string(), "invalid log level `verbose`");
        assert!("INFO+x".parse::<Level>().is_err());
        assert!("".parse::<Level>().is_err());
    }

    #[test]
    fn level_var_can_be_changed() {
        let var = LevelVar::new(Level::WARN);
        assert_eq!(var.level(), Level::WARN);
        var.set(Level::DEBUG);
        assert_eq!(var.level(), Level::DEBUG);
        assert_eq!(LevelVar::default().level(), Level::INFO);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn converts_from_tracing_levels() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::TRACE);
        assert_eq!(Level::from(tracing::Level::INFO), Level::INFO);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::ERROR);
    }
}
