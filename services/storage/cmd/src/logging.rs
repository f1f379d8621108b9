use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths
const SOURCE_WIDTH: usize = 22;
const LEVEL_WIDTH: usize = 9;

/// Log line formatter: `[timestamp] [source] [level] message`.
///
/// Events carrying a `component` field are attributed to
/// `<service>-<component>` instead of the bare service name.
pub struct StorageLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log at info level on behalf of a component
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level on behalf of a component
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at debug level on behalf of a component
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

impl StorageLogFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: colors_supported(),
        }
    }

    fn source(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(component) => format!("{}-{}", self.service_name, component),
            None => self.service_name.clone(),
        };
        if name.chars().count() > SOURCE_WIDTH {
            let cut: String = name.chars().take(SOURCE_WIDTH - 1).collect();
            format!("{}…", cut)
        } else {
            format!("{:<width$}", name, width = SOURCE_WIDTH)
        }
    }

    fn level(level: &Level) -> String {
        let label = match *level {
            Level::ERROR => "✗ ERROR",
            Level::WARN => "⚠ WARN",
            Level::INFO => "ℹ INFO",
            Level::DEBUG => "◦ DEBUG",
            Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", label, width = LEVEL_WIDTH)
    }

    fn color(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }
        match *level {
            Level::ERROR => COLOR_BRIGHT_RED,
            Level::WARN => COLOR_BRIGHT_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG | Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }

    fn paint(&self, color: &'static str) -> &'static str {
        if self.color_enabled {
            color
        } else {
            ""
        }
    }
}

impl<S, N> FormatEvent<S, N> for StorageLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut fields = EventFields::default();
        event.record(&mut fields);

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            self.paint(COLOR_CYAN),
            timestamp,
            self.source(fields.component.as_deref()),
            self.color(level),
            Self::level(level),
            self.paint(COLOR_RESET)
        )?;
        writeln!(writer, "{}{}", fields.message, self.paint(COLOR_RESET))
    }
}

/// The message and component of an event
#[derive(Default)]
struct EventFields {
    message: String,
    component: Option<String>,
}

fn unquote(s: String) -> String {
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => s,
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = unquote(format!("{:?}", value)),
            "component" => self.component = Some(unquote(format!("{:?}", value))),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }
}

fn colors_supported() -> bool {
    if std::env::var("TERM").map(|t| t == "dumb").unwrap_or(true) {
        return false;
    }
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> StorageLogFormatter {
        StorageLogFormatter {
            service_name: "storage-proto".to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_source_column() {
        let formatter = plain();
        assert_eq!(formatter.source(None).len(), SOURCE_WIDTH);
        assert!(formatter.source(None).starts_with("storage-proto "));
        assert!(formatter.source(Some("codec")).starts_with("storage-proto-codec"));
        let long = formatter.source(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), SOURCE_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_no_color_codes_when_disabled() {
        let formatter = plain();
        assert_eq!(formatter.color(&Level::ERROR), "");
        assert_eq!(formatter.paint(COLOR_RESET), "");
        assert!(StorageLogFormatter::level(&Level::WARN).starts_with("⚠ WARN"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"hello\"".to_string()), "hello");
        assert_eq!(unquote("42".to_string()), "42");
    }
}
