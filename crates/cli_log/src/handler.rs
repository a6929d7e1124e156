//! Provides [`CliHandler`], which renders [`Record`]s as single human readable lines.

use std::{
    fmt::{self, Write as _},
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use time::{macros::format_description, OffsetDateTime};

use crate::{Attr, Level, Leveler, Record, Value};

/// Options for a [`CliHandler`]. The default value enables every option's default behavior.
#[derive(Clone, Debug, Default)]
pub struct HandlerOptions {
    /// Causes the handler to output the source code position of the log statement.
    pub add_source: bool,

    /// The minimum level of records the handler outputs. If `None`, [`Level::INFO`] is used.
    ///
    /// The level is consulted on every check, so a shared [`LevelVar`][crate::LevelVar] can be
    /// used to adjust it at runtime.
    pub level: Option<Arc<dyn Leveler>>,
}

impl HandlerOptions {
    /// Sets the minimum level.
    #[must_use]
    pub fn with_level(mut self, level: impl Leveler + 'static) -> Self {
        self.level = Some(Arc::new(level));
        self
    }

    /// Sets whether the source code position is output.
    #[must_use]
    pub fn with_source(mut self, add_source: bool) -> Self {
        self.add_source = add_source;
        self
    }
}

/// Renders log records into single lines of text and writes them to a shared writer.
///
/// A line looks like:
///
/// ```text
/// 2023-09-20T12:24:43Z INFO main.rs:12 message wa=1 p1.c=foo p1.g.a=1
/// ```
///
/// Handlers are immutable. [`with_attrs`][Self::with_attrs] and
/// [`with_group`][Self::with_group] return new handlers that share the writer (and the lock
/// around it) with the handler they were derived from, so records from any number of derived
/// handlers, on any number of threads, are written without interleaving.
pub struct CliHandler<W> {
    options: HandlerOptions,
    /// Preformatted group prefix, empty or ending with a dot.
    group: String,
    /// Preformatted bound attributes, empty or starting with a space.
    attrs: String,
    writer: Arc<Mutex<W>>,
}

impl<W> CliHandler<W> {
    /// Creates a new handler writing to `writer`.
    ///
    /// ```
    /// use cli_log::{Attr, CliHandler, HandlerOptions, Level, Record};
    ///
    /// let handler = CliHandler::new(Vec::<u8>::new(), HandlerOptions::default())
    ///     .with_attrs(&[Attr::new("request", 7)])
    ///     .with_group("db");
    ///
    /// let record = Record::new(Level::INFO, "query done").with_attrs([Attr::new("rows", 3)]);
    /// assert_eq!(handler.format(&record), "INFO query done request=7 db.rows=3\n");
    /// ```
    pub fn new(writer: W, options: HandlerOptions) -> Self {
        Self::from_shared(Arc::new(Mutex::new(writer)), options)
    }

    /// Creates a new handler writing to an already shared writer.
    ///
    /// Every write holds the lock of `writer`, so other users of the same writer see whole lines.
    pub fn from_shared(writer: Arc<Mutex<W>>, options: HandlerOptions) -> Self {
        Self {
            options,
            group: String::new(),
            attrs: String::new(),
            writer,
        }
    }

    /// Reports whether records at `level` are output. Records below the minimum level are
    /// discarded.
    pub fn enabled(&self, level: Level) -> bool {
        let minimum = self
            .options
            .level
            .as_ref()
            .map_or(Level::INFO, |leveler| leveler.level());
        level >= minimum
    }

    /// Returns a new handler whose bound attributes consist of both the receiver's attributes
    /// and `attrs`.
    ///
    /// The attributes are rendered immediately, under the groups opened so far. Groups opened
    /// on the returned handler later do not apply to them.
    #[must_use]
    pub fn with_attrs<'a>(&self, attrs: impl IntoIterator<Item = &'a Attr>) -> Self {
        let mut rendered = self.attrs.clone();
        for attr in attrs {
            append_attr(&mut rendered, &self.group, attr);
        }
        Self {
            options: self.options.clone(),
            group: self.group.clone(),
            attrs: rendered,
            writer: Arc::clone(&self.writer),
        }
    }

    /// Returns a new handler with the group `name` appended to the receiver's groups.
    ///
    /// Attributes bound or logged through the returned handler are prefixed with `name.`.
    /// An empty `name` opens no group.
    #[must_use]
    pub fn with_group(&self, name: &str) -> Self {
        let mut group = self.group.clone();
        if !name.is_empty() {
            group.push_str(name);
            group.push('.');
        }
        Self {
            options: self.options.clone(),
            group,
            attrs: self.attrs.clone(),
            writer: Arc::clone(&self.writer),
        }
    }

    /// Renders `record` as a single line, including the trailing newline, without writing it.
    pub fn format(&self, record: &Record) -> String {
        let mut line = String::new();

        if let Some(time) = record.time {
            if let Some(time) = format_time(time) {
                line.push_str(&time);
                line.push(' ');
            }
        }

        // Writing into a `String` never fails.
        let _ = write!(line, "{} ", record.level);

        if self.options.add_source {
            if let Some((file, number)) = record.source.as_ref().and_then(|s| s.resolve()) {
                let _ = write!(line, "{file}:{number} ");
            }
        }

        line.push_str(&record.message);
        line.push_str(&self.attrs);
        for attr in &record.attrs {
            append_attr(&mut line, &self.group, attr);
        }
        line.push('\n');
        line
    }
}

impl<W: Write> CliHandler<W> {
    /// Renders `record` and writes it to the writer.
    ///
    /// The line is written by a single `write_all` call while holding the writer's lock, so it
    /// is never interleaved with lines written through other handlers sharing the writer.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the writer, unchanged.
    pub fn handle(&self, record: &Record) -> io::Result<()> {
        let line = self.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())
    }
}

impl<W> Clone for CliHandler<W> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            group: self.group.clone(),
            attrs: self.attrs.clone(),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W> fmt::Debug for CliHandler<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliHandler")
            .field("options", &self.options)
            .field("group", &self.group)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

/// Formats `time` as RFC 3339 with whole seconds, `Z` for UTC.
fn format_time(time: OffsetDateTime) -> Option<String> {
    let mut formatted = time
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]"
        ))
        .ok()?;
    if time.offset().is_utc() {
        formatted.push('Z');
    } else {
        formatted.push_str(
            &time
                .format(format_description!(
                    "[offset_hour sign:mandatory]:[offset_minute]"
                ))
                .ok()?,
        );
    }
    Some(formatted)
}

/// Appends ` {group}{key}={value}` for `attr`, flattening groups into dotted keys.
fn append_attr(buf: &mut String, group: &str, attr: &Attr) {
    match &attr.value {
        Value::Empty => (),
        Value::Group(attrs) => {
            if attr.key.is_empty() {
                for attr in attrs {
                    append_attr(buf, group, attr);
                }
            } else {
                let group = format!("{group}{}.", attr.key);
                for attr in attrs {
                    append_attr(buf, &group, attr);
                }
            }
        }
        value => {
            let _ = write!(buf, " {group}{}={value}", attr.key);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::{thread, time::Duration};

    use time::macros::{datetime, offset};

    use super::*;
    use crate::{LevelVar, Source};

    const TEST_TIME: OffsetDateTime = datetime!(2023-09-20 12:24:43 UTC);

    fn shared_buffer() -> Arc<Mutex<Vec<u8>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn contents(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
    }

    fn message(attrs: Vec<Attr>) -> Record {
        Record::new(Level::INFO, "message")
            .with_time(TEST_TIME)
            .with_attrs(attrs)
    }

    fn basic_attrs() -> Vec<Attr> {
        vec![Attr::new("c", "foo"), Attr::new("b", true)]
    }

    fn handle(
        handler: &CliHandler<Vec<u8>>,
        record: &Record,
        buffer: &Arc<Mutex<Vec<u8>>>,
    ) -> String {
        buffer.lock().unwrap().clear();
        handler.handle(record).unwrap();
        contents(buffer)
    }

    #[test]
    fn renders_time_level_message_and_attrs() {
        let buffer = shared_buffer();
        let handler = CliHandler::from_shared(Arc::clone(&buffer), HandlerOptions::default());

        let output = handle(&handler, &message(basic_attrs()), &buffer);
        assert_eq!(output, "2023-09-20T12:24:43Z INFO message c=foo b=true\n");
    }

    #[test]
    fn flattens_groups_into_dotted_keys() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default());
        let record = message(vec![
            Attr::new("c", "foo"),
            Attr::group("g", [Attr::new("a", 1), Attr::new("d", 4)]),
            Attr::new("b", true),
        ]);

        assert_eq!(
            handler.format(&record),
            "2023-09-20T12:24:43Z INFO message c=foo g.a=1 g.d=4 b=true\n"
        );
    }

    #[test]
    fn nested_and_anonymous_groups() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default());
        let record = message(vec![
            Attr::group(
                "outer",
                [
                    Attr::group("inner", [Attr::new("x", 1)]),
                    Attr::group("", [Attr::new("y", 2)]),
                ],
            ),
            Attr::group("", [Attr::new("z", 3)]),
            Attr::group("nothing", []),
        ]);

        assert_eq!(
            handler.format(&record),
            "2023-09-20T12:24:43Z INFO message outer.inner.x=1 outer.y=2 z=3\n"
        );
    }

    #[test]
    fn adds_source_after_the_level() {
        let options = HandlerOptions::default().with_source(true);
        let handler = CliHandler::new(io::sink(), options);
        let line = line!() + 1;
        let record = message(basic_attrs()).with_source(Source::caller());

        assert_eq!(
            handler.format(&record),
            format!(
                "2023-09-20T12:24:43Z INFO {}:{line} message c=foo b=true\n",
                file!()
            )
        );
    }

    #[test]
    fn omits_source_unless_enabled_and_resolvable() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default().with_source(true));
        let unresolvable = message(basic_attrs()).with_source(Source::new(Some("main.rs"), None));
        assert_eq!(
            handler.format(&unresolvable),
            "2023-09-20T12:24:43Z INFO message c=foo b=true\n"
        );
        assert_eq!(
            handler.format(&message(basic_attrs())),
            "2023-09-20T12:24:43Z INFO message c=foo b=true\n"
        );

        let disabled = CliHandler::new(io::sink(), HandlerOptions::default());
        let record = message(basic_attrs()).with_source(Source::caller());
        assert_eq!(
            disabled.format(&record),
            "2023-09-20T12:24:43Z INFO message c=foo b=true\n"
        );
    }

    #[test]
    fn omits_unset_time() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default());
        let record = Record::new(Level::WARN, "message").with_attrs(basic_attrs());
        assert_eq!(handler.format(&record), "WARN message c=foo b=true\n");
    }

    #[test]
    fn renders_utc_offsets() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default());
        let record = Record::new(Level::ERROR, "message")
            .with_time(TEST_TIME.to_offset(offset!(+2)))
            .with_attrs([Attr::new("took", Duration::from_millis(1_500))]);
        assert_eq!(
            handler.format(&record),
            "2023-09-20T14:24:43+02:00 ERROR message took=1.5s\n"
        );
    }

    #[test]
    fn bound_attrs_come_before_record_attrs() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default())
            .with_attrs(&[Attr::new("wa", 1), Attr::new("wb", 2)]);

        assert_eq!(
            handler.format(&message(basic_attrs())),
            "2023-09-20T12:24:43Z INFO message wa=1 wb=2 c=foo b=true\n"
        );
    }

    #[test]
    fn groups_apply_only_to_later_attrs() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default())
            .with_attrs(&[Attr::new("wa", 1), Attr::new("wb", 2)])
            .with_group("p1")
            .with_attrs(&[Attr::new("wc", 3)])
            .with_group("p2");

        assert_eq!(
            handler.format(&message(basic_attrs())),
            "2023-09-20T12:24:43Z INFO message wa=1 wb=2 p1.wc=3 p1.p2.c=foo p1.p2.b=true\n"
        );
    }

    #[test]
    fn empty_group_name_opens_no_group() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default())
            .with_group("")
            .with_attrs(std::iter::empty());

        assert_eq!(
            handler.format(&message(basic_attrs())),
            "2023-09-20T12:24:43Z INFO message c=foo b=true\n"
        );
    }

    #[test]
    fn deriving_leaves_the_receiver_unchanged() {
        let root = CliHandler::new(io::sink(), HandlerOptions::default());
        let bound = root.with_attrs(&[Attr::new("wa", 1)]);
        let _grouped = bound.with_group("g");
        let _rebound = bound.with_attrs(&[Attr::new("wb", 2)]);

        let record = message(vec![Attr::new("c", "foo")]);
        assert_eq!(
            root.format(&record),
            "2023-09-20T12:24:43Z INFO message c=foo\n"
        );
        assert_eq!(
            bound.format(&record),
            "2023-09-20T12:24:43Z INFO message wa=1 c=foo\n"
        );
    }

    #[test]
    fn empty_attrs_contribute_nothing() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default())
            .with_attrs(&[Attr::empty(), Attr::new("bound", Value::Empty)]);
        let record = message(vec![
            Attr::empty(),
            Attr::new("c", "foo"),
            Attr::group("g", [Attr::empty()]),
            Attr::new("skipped", Value::Empty),
        ]);

        assert_eq!(
            handler.format(&record),
            "2023-09-20T12:24:43Z INFO message c=foo\n"
        );
    }

    #[test]
    fn duplicate_keys_are_kept_in_order() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default())
            .with_attrs(&[Attr::new("k", 1)]);
        let record = message(vec![Attr::new("k", 2), Attr::new("k", 3)]);
        assert_eq!(
            handler.format(&record),
            "2023-09-20T12:24:43Z INFO message k=1 k=2 k=3\n"
        );
    }

    #[test]
    fn enabled_compares_against_the_minimum_level() {
        let cases = [
            (Level::WARN, Level::DEBUG, false),
            (Level::WARN, Level::INFO, false),
            (Level::WARN, Level::WARN, true),
            (Level::WARN, Level::ERROR, true),
        ];

        for (minimum, level, want) in cases {
            let handler = CliHandler::new(io::sink(), HandlerOptions::default().with_level(minimum));
            assert_eq!(
                handler.enabled(level),
                want,
                "minimum {minimum}, level {level}"
            );
        }
    }

    #[test]
    fn enabled_defaults_to_info() {
        let handler = CliHandler::new(io::sink(), HandlerOptions::default());
        assert!(!handler.enabled(Level::DEBUG));
        assert!(!handler.enabled(Level::new(-1)));
        assert!(handler.enabled(Level::INFO));
        assert!(handler.enabled(Level::ERROR));
    }

    #[test]
    fn enabled_follows_a_level_var() {
        let level = Arc::new(LevelVar::new(Level::ERROR));
        let leveler: Arc<dyn Leveler> = level.clone();
        let options = HandlerOptions {
            level: Some(leveler),
            ..HandlerOptions::default()
        };
        let handler = CliHandler::new(io::sink(), options).with_group("g");

        assert!(!handler.enabled(Level::WARN));
        level.set(Level::DEBUG);
        assert!(handler.enabled(Level::WARN));
    }

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_are_returned_unchanged() {
        let handler = CliHandler::new(FailingWriter, HandlerOptions::default());
        let record = message(basic_attrs());

        for _ in 0..2 {
            let error = handler.handle(&record).unwrap_err();
            assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
            assert_eq!(error.to_string(), "reader went away");
        }
    }

    /// Accepts a single byte per call, so unsynchronized writers would interleave.
    #[derive(Debug, Default)]
    struct ByteWriter(Vec<u8>);

    impl Write for ByteWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    self.0.push(*byte);
                    thread::yield_now();
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_writes_do_not_interleave() {
        const THREADS: usize = 8;
        const RECORDS: usize = 50;

        let writer = Arc::new(Mutex::new(ByteWriter::default()));
        let root = CliHandler::from_shared(Arc::clone(&writer), HandlerOptions::default());

        thread::scope(|scope| {
            for worker in 0..THREADS {
                let handler = root
                    .with_group(&format!("w{worker}"))
                    .with_attrs(&[Attr::new("worker", worker.to_string())]);
                scope.spawn(move || {
                    for sequence in 0..RECORDS {
                        let record = Record::new(Level::INFO, "tick")
                            .with_attrs([Attr::new("seq", sequence.to_string())]);
                        handler.handle(&record).unwrap();
                    }
                });
            }
        });

        let output = String::from_utf8(writer.lock().unwrap().0.clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), THREADS * RECORDS);
        for line in lines {
            let fields: Vec<&str> = line.split(' ').collect();
            assert_eq!(fields.len(), 4, "torn line: {line:?}");
            assert_eq!(fields[0], "INFO");
            assert_eq!(fields[1], "tick");
            let worker = fields[2].strip_prefix('w').unwrap();
            let (group, worker) = worker.split_once(".worker=").unwrap();
            assert_eq!(group, worker);
            assert!(fields[3].starts_with(&format!("w{worker}.seq=")));
        }
    }
}
