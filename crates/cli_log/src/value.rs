//! Attribute values and key/value attributes.

use std::{fmt, time::Duration};

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// The value of an [`Attr`].
///
/// Each kind has a single default textual rendering, provided by its [`fmt::Display`]
/// implementation.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Placeholder for "no attribute". Attributes holding it are not rendered at all.
    #[default]
    Empty,

    /// A string, rendered verbatim.
    String(String),

    /// A boolean, rendered as `true` or `false`.
    Bool(bool),

    /// A signed integer, rendered in decimal.
    Int(i64),

    /// An unsigned integer, rendered in decimal.
    Uint(u64),

    /// A floating point number, rendered in its shortest form, with an exponent when it is
    /// smaller than `1e-4` or at least `1e+06`.
    Float(f64),

    /// A duration, rendered with units, e.g. `1.5s`, `2m0s` or `150ms`.
    Duration(Duration),

    /// A point in time, rendered in RFC 3339 format.
    Time(OffsetDateTime),

    /// A nested sequence of attributes.
    Group(Vec<Attr>),
}

impl Value {
    /// Returns `true` for the [`Value::Empty`] placeholder.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::String(value) => f.write_str(value),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Float(value) => fmt_float(*value, f),
            Self::Duration(value) => fmt_duration(*value, f),
            Self::Time(value) => match value.format(&Rfc3339) {
                Ok(formatted) => f.write_str(&formatted),
                Err(_) => write!(f, "{value}"),
            },
            Self::Group(attrs) => {
                f.write_str("[")?;
                for (index, attr) in attrs.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{attr}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Writes `value` in its shortest round-trip form, switching to exponent notation (`1e+06`,
/// `1.5e-07`) outside `[1e-4, 1e6)`, with `NaN`, `+Inf` and `-Inf` for special values.
fn fmt_float(value: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("NaN");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 { "+Inf" } else { "-Inf" });
    }

    let scientific = format!("{value:e}");
    let parsed = scientific
        .split_once('e')
        .and_then(|(mantissa, exponent)| Some((mantissa, exponent.parse::<i32>().ok()?)));
    match parsed {
        Some((mantissa, exponent)) if !(-4..6).contains(&exponent) => {
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
        }
        _ => write!(f, "{value}"),
    }
}

/// Writes `duration` the way Go's `time.Duration` prints itself: the largest fitting unit below
/// one second (`ns`, `µs`, `ms`), otherwise hours, minutes and fractional seconds with leading
/// zero units omitted.
fn fmt_duration(duration: Duration, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    const NANOS_PER_MICRO: u32 = 1_000;
    const NANOS_PER_MILLI: u32 = 1_000_000;

    if duration.is_zero() {
        return f.write_str("0s");
    }

    if duration.as_secs() == 0 {
        let nanos = duration.subsec_nanos();
        return if nanos < NANOS_PER_MICRO {
            write!(f, "{nanos}ns")
        } else if nanos < NANOS_PER_MILLI {
            fmt_decimal(f, nanos / NANOS_PER_MICRO, nanos % NANOS_PER_MICRO, 3)?;
            f.write_str("µs")
        } else {
            fmt_decimal(f, nanos / NANOS_PER_MILLI, nanos % NANOS_PER_MILLI, 6)?;
            f.write_str("ms")
        };
    }

    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = total_seconds / 60 % 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        write!(f, "{hours}h{minutes}m")?;
    } else if minutes > 0 {
        write!(f, "{minutes}m")?;
    }
    fmt_decimal(f, seconds, duration.subsec_nanos(), 9)?;
    f.write_str("s")
}

/// Writes `whole.fraction`, where `fraction` has `digits` digits, dropping trailing zeros (and
/// the point itself when nothing is left).
fn fmt_decimal(
    f: &mut fmt::Formatter<'_>,
    whole: impl fmt::Display,
    fraction: u32,
    digits: usize,
) -> fmt::Result {
    write!(f, "{whole}")?;
    if fraction == 0 {
        return Ok(());
    }
    let fraction = format!("{fraction:0digits$}");
    write!(f, ".{}", fraction.trim_end_matches('0'))
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Uint(u64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::Time(value)
    }
}

impl From<Vec<Attr>> for Value {
    fn from(attrs: Vec<Attr>) -> Self {
        Self::Group(attrs)
    }
}

/// A key/value pair attached to a log record or bound to a handler.
///
/// Keys are not required to be unique.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attr {
    /// The attribute key. An empty key on a group makes the group anonymous: its members are
    /// rendered without an additional prefix segment.
    pub key: String,

    /// The attribute value.
    pub value: Value,
}

impl Attr {
    /// Creates a new attribute.
    ///
    /// ```
    /// use cli_log::Attr;
    ///
    /// assert_eq!(Attr::new("retries", 3).to_string(), "retries=3");
    /// ```
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a group attribute holding `attrs`.
    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Self>) -> Self {
        Self {
            key: key.into(),
            value: Value::Group(attrs.into_iter().collect()),
        }
    }

    /// Creates the empty attribute, which is never rendered.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
