use colored::Color;
use std::fmt;
use std::fmt::Write;
use std::fmt::{Debug, Display};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

/// Single-line event format: `[time LVL] target@trace_id{span fields}: message`
/// on a terminal, `date time target@trace_id [L] message` in files.
pub(super) struct Formatter {
    use_colors: bool,
}

impl Formatter {
    pub(super) fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }
}

fn short_target(target: &str) -> String {
    match target.strip_prefix("vitalink") {
        Some(rest) => format!("vl{rest}"),
        None => target.to_string(),
    }
}

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let now = chrono::Local::now();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut span_fields = Vec::new();
        let mut trace_id = String::new();
        for span in ctx
            .event_scope()
            .into_iter()
            .flat_map(tracing_subscriber::registry::Scope::from_root)
        {
            let exts = span.extensions();
            let Some(fields) = exts.get::<FormattedFields<N>>() else {
                continue;
            };
            if fields.is_empty() {
                continue;
            }
            match fields.strip_prefix("trace_id=") {
                Some(id) => {
                    trace_id.push('@');
                    trace_id.push_str(id);
                }
                None => span_fields.push(fields.to_string()),
            }
        }
        let span_fields = if span_fields.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", span_fields.join(" "))
        };
        let location = format!("{}{}{}", short_target(meta.target()), trace_id, span_fields);

        if self.use_colors {
            write!(
                writer,
                "[{} {}] {} {}",
                Dimmed(now.format("%X%.3f")),
                LevelLabel::short(meta.level(), true),
                Dimmed(format!("{location}:")),
                visitor.message.trim_end()
            )?;
        } else {
            write!(
                writer,
                "{} {} {} {}",
                now.format("%F %X%.3f"),
                location,
                LevelLabel::bracketed(meta.level()),
                visitor.message.trim_end()
            )?;
        }
        writeln!(writer)
    }
}

/// Collects the `message` field first, then any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            write!(self.message, "{:?} ", value).ok();
        } else {
            write!(self.message, "{}={:?} ", field.name(), value).ok();
        }
    }
}

struct LevelLabel {
    label: &'static str,
    color: Option<Color>,
}

impl LevelLabel {
    fn short(level: &Level, use_colors: bool) -> Self {
        let (label, color) = match *level {
            Level::ERROR => ("ERR", Color::BrightRed),
            Level::WARN => ("WRN", Color::BrightYellow),
            Level::INFO => ("INF", Color::BrightBlue),
            Level::DEBUG => ("DBG", Color::BrightMagenta),
            Level::TRACE => ("TRC", Color::BrightWhite),
        };
        Self {
            label,
            color: use_colors.then_some(color),
        }
    }
    fn bracketed(level: &Level) -> Self {
        let label = match *level {
            Level::ERROR => "[E]",
            Level::WARN => "[W]",
            Level::INFO => "[I]",
            Level::DEBUG => "[D]",
            Level::TRACE => "[T]",
        };
        Self { label, color: None }
    }
}

impl Display for LevelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color {
            Some(color) => write!(f, "\x1B[{}m{}\x1B[0m", color.to_fg_str(), self.label),
            None => f.write_str(self.label),
        }
    }
}

struct Dimmed<T>(T);

impl<T: Display> Display for Dimmed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1B[{}m{}\x1B[0m", Color::BrightBlack.to_fg_str(), self.0)
    }
}
