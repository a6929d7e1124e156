//! Provides [`CliLayer`], a [`tracing_subscriber::Layer`] that writes events through a
//! [`CliHandler`].

use std::{fmt, io::Write};

use time::OffsetDateTime;
use tracing::{
    span::{Attributes, Id, Record as SpanRecord},
    subscriber::Interest,
    Event, Metadata, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use super::visitor::FieldVisitor;
use crate::{CliHandler, Level, Record, Source};

/// The handler of a span: its parent's handler with the span's fields bound.
struct SpanHandler<W>(CliHandler<W>);

/// A [`tracing_subscriber::Layer`] that renders events as single human readable lines.
///
/// Span fields are bound to the span when it is created (and when they are recorded later), so
/// every event inside a span carries the fields of all enclosing spans, outermost first, before
/// its own fields. Events are stamped with the current UTC time.
///
/// The minimum level of the handler is applied to events through [`Layer::enabled`], so disabled
/// events are not constructed at all. The level is checked for every event, never cached per
/// callsite, so a [`LevelVar`][crate::LevelVar] can change it at runtime. Spans are always
/// enabled: their fields are bound context for admitted events.
pub struct CliLayer<W> {
    handler: CliHandler<W>,
}

impl<W> fmt::Debug for CliLayer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliLayer")
            .field("handler", &self.handler)
            .finish()
    }
}

impl<W> CliLayer<W> {
    /// Creates a new layer writing through `handler`.
    ///
    /// Attributes and groups already present on `handler` apply to every event.
    ///
    /// ```
    /// use cli_log::{CliHandler, CliLayer, HandlerOptions};
    /// use tracing_subscriber::layer::SubscriberExt;
    ///
    /// let handler = CliHandler::new(std::io::stderr(), HandlerOptions::default());
    /// let subscriber = tracing_subscriber::registry().with(CliLayer::new(handler));
    ///
    /// tracing::subscriber::with_default(subscriber, || {
    ///     tracing::info!(files = 3, "copy finished");
    /// });
    /// ```
    pub fn new(handler: CliHandler<W>) -> Self {
        Self { handler }
    }

    /// Returns the handler used for events outside of any span.
    pub fn handler(&self) -> &CliHandler<W> {
        &self.handler
    }
}

impl<S, W> Layer<S> for CliLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + Send + 'static,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata.is_span() || self.handler.enabled(Level::from(*metadata.level()))
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        // Inherit the handler of the parent span if it exists, otherwise start from the root.
        let handler = match span.parent() {
            Some(parent) => {
                let extensions = parent.extensions();
                extensions
                    .get::<SpanHandler<W>>()
                    .map_or(&self.handler, |parent_handler| &parent_handler.0)
                    .with_attrs(visitor.attrs())
            }
            None => self.handler.with_attrs(visitor.attrs()),
        };

        span.extensions_mut().insert(SpanHandler(handler));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        if let Some(span_handler) = extensions.get_mut::<SpanHandler<W>>() {
            span_handler.0 = span_handler.0.with_attrs(visitor.attrs());
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let (message, attrs) = visitor.into_parts();

        let record = Record {
            time: Some(OffsetDateTime::now_utc()),
            level: Level::from(*metadata.level()),
            message: message.unwrap_or_default(),
            attrs,
            source: Some(Source::new(metadata.file(), metadata.line())),
        };

        let span_handler = ctx.event_span(event).and_then(|span| {
            let extensions = span.extensions();
            extensions
                .get::<SpanHandler<W>>()
                .map(|span_handler| span_handler.0.clone())
        });
        let handler = span_handler.as_ref().unwrap_or(&self.handler);

        // Layers cannot report errors; a failed write only loses this line.
        let _ = handler.handle(&record);
    }
}
