//! Tracing setup: human or JSON logs on stderr, plus OTLP export of traces
//! and logs when `OTEL_EXPORTER_OTLP_ENDPOINT` is set (feature `otel`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const DEFAULT_FILTER: &str = "warn,clawe=info";

/// Flushes exporters on drop. Keep it alive for the life of `main`.
#[must_use]
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    otel: Option<otel::Providers>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(providers) = self.otel.take() {
            providers.shutdown();
        }
    }
}

fn json_requested() -> bool {
    std::env::var("CLAWE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init() -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = if json_requested() {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    #[cfg(feature = "otel")]
    {
        use opentelemetry::trace::TracerProvider as _;

        let providers = otel::Providers::from_env();
        let trace_layer = providers.as_ref().map(|p| {
            tracing_opentelemetry::layer().with_tracer(p.tracer_provider.tracer("clawe"))
        });
        let log_layer = providers.as_ref().map(|p| {
            opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
                &p.logger_provider,
            )
        });

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(trace_layer)
            .with(log_layer)
            .try_init();

        return TelemetryGuard { otel: providers };
    }

    #[cfg(not(feature = "otel"))]
    {
        let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
        TelemetryGuard {}
    }
}

#[cfg(feature = "otel")]
mod otel {
    use opentelemetry_otlp::{LogExporter, SpanExporter};
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::logs::SdkLoggerProvider;
    use opentelemetry_sdk::trace::SdkTracerProvider;

    const SERVICE_NAME: &str = "clawe";

    pub struct Providers {
        pub tracer_provider: SdkTracerProvider,
        pub logger_provider: SdkLoggerProvider,
    }

    impl Providers {
        /// Exporters read their endpoint and headers from the standard
        /// `OTEL_EXPORTER_OTLP_*` variables. Returns `None` when no endpoint
        /// is configured or an exporter cannot be built.
        pub fn from_env() -> Option<Self> {
            std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())?;

            let resource = Resource::builder().with_service_name(SERVICE_NAME).build();

            let spans = match SpanExporter::builder().with_http().build() {
                Ok(exporter) => exporter,
                Err(e) => {
                    eprintln!("warning: OTLP trace exporter disabled: {e}");
                    return None;
                }
            };
            let logs = match LogExporter::builder().with_http().build() {
                Ok(exporter) => exporter,
                Err(e) => {
                    eprintln!("warning: OTLP log exporter disabled: {e}");
                    return None;
                }
            };

            Some(Self {
                tracer_provider: SdkTracerProvider::builder()
                    .with_batch_exporter(spans)
                    .with_resource(resource.clone())
                    .build(),
                logger_provider: SdkLoggerProvider::builder()
                    .with_batch_exporter(logs)
                    .with_resource(resource)
                    .build(),
            })
        }

        pub fn shutdown(self) {
            if let Err(e) = self.tracer_provider.shutdown() {
                eprintln!("warning: flushing traces failed: {e}");
            }
            if let Err(e) = self.logger_provider.shutdown() {
                eprintln!("warning: flushing logs failed: {e}");
            }
        }
    }
}
