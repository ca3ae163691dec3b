use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};

/// Collects an event's fields as JSON attributes. `event_*` fields are
/// renamed to the dotted `event.*` convention.
#[derive(Default)]
struct Attributes(Map<String, Value>);

impl Attributes {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        let key = match field.name().strip_prefix("event_") {
            Some(rest) => format!("event.{}", rest),
            None => field.name().to_string(),
        };
        self.0.insert(key, value.into());
    }
}

impl Visit for Attributes {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn severity_number(level: &Level) -> u8 {
    match *level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        Level::ERROR => 17,
    }
}

/// One JSON log record per line, in the OpenTelemetry log data model.
struct OtelLogFormat {
    resource: Value,
}

impl OtelLogFormat {
    fn new(logging_config: &LoggingConfig) -> Self {
        OtelLogFormat {
            resource: json!({
                "service.name": logging_config.service_name,
                "service.version": logging_config.service_version,
            }),
        }
    }

    fn record(&self, event: &Event<'_>) -> Value {
        let metadata = event.metadata();
        let mut attributes = Attributes::default();
        event.record(&mut attributes);
        let mut attributes = attributes.0;

        let body = match attributes.remove("message") {
            Some(Value::String(message)) => message,
            _ => metadata.name().to_string(),
        };
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".to_string(), file.into());
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), line.into());
        }
        attributes.insert("code.target".to_string(), metadata.target().into());

        json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "severity_text": metadata.level().as_str(),
            "severity_number": severity_number(metadata.level()),
            "body": body,
            "resource": self.resource,
            "attributes": attributes,
        })
    }
}

impl<S, N> FormatEvent<S, N> for OtelLogFormat
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let line = serde_json::to_string(&self.record(event)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Install the global subscriber for the configured level and format, and
/// route `log` records from dependencies into it.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), String> {
    let level_filter = parse_level(&logging_config.level)?;
    let filter_layer = EnvFilter::default().add_directive(level_filter.into());

    LogTracer::init().map_err(|e| format!("could not bridge log records: {}", e))?;

    let installed = match logging_config.format.trim().to_lowercase().as_str() {
        "json" => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().with_writer(std::io::stderr).event_format(OtelLogFormat::new(logging_config))),
        ),
        // "console", and anything unrecognised
        _ => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().with_writer(std::io::stderr).pretty()),
        ),
    };
    installed.map_err(|e| format!("could not install subscriber: {}", e))
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(format!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            level
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::WARN);
        assert!(parse_level("verbose").unwrap_err().contains("Invalid logging.level"));
    }

    #[test]
    fn test_json_event_shape() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(captured.clone())
                .event_format(OtelLogFormat::new(&LoggingConfig {
                    service_name: "nestkey".to_string(),
                    service_version: "0.1.0".to_string(),
                    ..Default::default()
                })),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(
                event_name = "storage.session.reduced",
                event_domain = "storage",
                attempt = 1u64,
                "session stored with a reduced user record"
            );
        });

        let line = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let json: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(json["severity_text"], "WARN");
        assert_eq!(json["severity_number"], 13);
        assert_eq!(json["body"], "session stored with a reduced user record");
        assert_eq!(json["resource"]["service.name"], "nestkey");
        assert_eq!(json["attributes"]["event.name"], "storage.session.reduced");
        assert_eq!(json["attributes"]["event.domain"], "storage");
        assert_eq!(json["attributes"]["attempt"], 1);
        assert!(json["attributes"].get("message").is_none());
        assert!(json["attributes"]["code.lineno"].is_u64());
    }

    #[test]
    fn test_event_without_message_uses_its_name() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(captured.clone())
                .event_format(OtelLogFormat::new(&LoggingConfig::default())),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(event_name = "auth.refresh.failed", status = 401u64);
        });

        let line = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let json: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(json["severity_number"], 17);
        assert!(json["body"].as_str().unwrap().starts_with("event "));
        assert_eq!(json["attributes"]["event.name"], "auth.refresh.failed");
        assert_eq!(json["attributes"]["status"], 401);
    }
}
