//! Collects `tracing` span and event fields as [`Attr`]s.

use std::fmt;

use tracing::field::{Field, Visit};

use crate::{Attr, Value};

const MESSAGE: &str = "message";

/// Field values recorded for a span or an event, in recording order.
#[derive(Clone, Debug, Default)]
pub(crate) struct FieldVisitor {
    attrs: Vec<Attr>,

    /// The `message` field of an event, if recorded.
    message: Option<String>,
}

impl FieldVisitor {
    pub(crate) fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    pub(crate) fn into_parts(self) -> (Option<String>, Vec<Attr>) {
        (self.message, self.attrs)
    }

    fn record_value(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == MESSAGE {
            if self.message.is_none() {
                self.message = Some(value.to_string());
            }
            return;
        }
        // Fields added by `tracing-log` duplicate the record metadata.
        if name.starts_with("log.") {
            return;
        }
        let key = name.strip_prefix("r#").unwrap_or(name);
        self.attrs.push(Attr::new(key, value));
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, Value::Float(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::Int(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::Uint(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE {
            // `record_str()` is preferred for `message`
            self.message = Some(value.to_owned());
        } else {
            self.record_value(field, Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, Value::String(format!("{value:?}")));
    }
}
