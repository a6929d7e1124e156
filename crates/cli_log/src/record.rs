//! Log records and their source locations.

use std::{borrow::Cow, panic::Location};

use time::OffsetDateTime;

use crate::{Attr, Level};

/// A single log event, captured at the moment it was emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// When the event happened. Records without a time are rendered without a timestamp.
    pub time: Option<OffsetDateTime>,

    /// The severity of the event.
    pub level: Level,

    /// The log message, rendered verbatim.
    pub message: String,

    /// Attributes attached to this event, in the order they were added.
    pub attrs: Vec<Attr>,

    /// Where the event was emitted from, if known.
    pub source: Option<Source>,
}

impl Record {
    /// Creates a record without a timestamp, attributes or source location.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: None,
            level,
            message: message.into(),
            attrs: Vec::new(),
            source: None,
        }
    }

    /// Sets the time of the record.
    #[must_use]
    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Appends `attrs` to the attributes of the record.
    #[must_use]
    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    /// Sets the source location of the record.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Appends a single attribute.
    pub fn add_attr(&mut self, attr: Attr) {
        self.attrs.push(attr);
    }
}

/// The source code location a record was emitted from.
///
/// Either part may be missing, in which case the location is unresolvable and handlers omit it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Source {
    file: Option<Cow<'static, str>>,
    line: Option<u32>,
}

impl Source {
    /// Creates a source location from possibly unknown parts.
    pub fn new(file: Option<impl Into<Cow<'static, str>>>, line: Option<u32>) -> Self {
        Self {
            file: file.map(Into::into),
            line,
        }
    }

    /// Returns the location of the caller of this function.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    /// Returns the file and line, if both are known.
    pub fn resolve(&self) -> Option<(&str, u32)> {
        Some((self.file.as_deref()?, self.line?))
    }
}

impl From<&'static Location<'static>> for Source {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: Some(Cow::Borrowed(location.file())),
            line: Some(location.line()),
        }
    }
}
