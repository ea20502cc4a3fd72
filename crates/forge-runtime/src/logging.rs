//! Logging bootstrap built on `tracing` / `tracing-subscriber`.
//!
//! `SpanEvents` flags and a `LoggingBuilder` for callers who want more
//! control than the `init*` free functions offer, gated behind forge's own
//! `json-log` feature for structured output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Span event configuration for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self { new: false, enter: false, exit: false, close: false };

    pub const LIFECYCLE: Self = Self { new: true, enter: false, exit: false, close: true };

    pub const FULL: Self = Self { new: true, enter: true, exit: true, close: true };

    pub const ACTIVE: Self = Self { new: false, enter: true, exit: true, close: false };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

/// Initializes logging with the `info` default, honoring `RUST_LOG`.
///
/// # Panics
/// Panics if a global subscriber has already been installed.
pub fn init() {
    init_with_filter("info");
}

pub fn init_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry().with(fmt::layer()).with(env_filter).init();
}

pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    try_init_with_filter("info")
}

pub fn try_init_with_filter(filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .try_init()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
}

/// Default filter covering forge's own crates: `forge_core` at `debug`,
/// everything else forge-owned at `info`.
pub fn default_forge_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("forge_runtime=info".parse().unwrap())
            .add_directive("forge_framework=info".parse().unwrap())
            .add_directive("forge_loader=info".parse().unwrap())
            .add_directive("forge_core=debug".parse().unwrap())
    })
}

pub fn init_forge_defaults() {
    tracing_subscriber::registry().with(fmt::layer()).with(default_forge_filter()).init();
}

/// Builder for configuring the global tracing subscriber.
#[derive(Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    #[cfg(feature = "json-log")]
    json: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    #[cfg(feature = "json-log")]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base_filter = match self.level {
            Some(tracing::Level::TRACE) => "trace",
            Some(tracing::Level::DEBUG) => "debug",
            Some(tracing::Level::INFO) => "info",
            Some(tracing::Level::WARN) => "warn",
            Some(tracing::Level::ERROR) => "error",
            None => "info",
        };

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_filter));

        for directive in &self.directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }

        filter
    }

    fn build_fmt_layer<S>(&self) -> fmt::Layer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fmt::layer()
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
    }

    pub fn init(self) {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .init();
            return;
        }

        tracing_subscriber::registry().with(self.build_fmt_layer()).with(filter).init();
    }

    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.build_filter();

        #[cfg(feature = "json-log")]
        if self.json {
            return tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(self.span_events.to_fmt_span()))
                .with(filter)
                .try_init()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
        }

        tracing_subscriber::registry()
            .with(self.build_fmt_layer())
            .with(filter)
            .try_init()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}
