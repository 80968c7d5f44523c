use crate::engine::Engine;
use crate::host::LogPayload;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into generic log events on
/// an [`Engine`].
///
/// Each event at or above `min_level` becomes a record tagged
/// `[<level>, <target>]` whose `data` holds the message and fields.
/// Events emitted by this crate itself are skipped so the shipper never
/// ships its own diagnostics.
pub struct BananasLayer {
    engine: Engine,
    min_level: Level,
    /// Total events seen by the layer (before filtering).
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the engine.
    pub enqueued_events: Arc<AtomicU64>,
}

impl BananasLayer {
    pub fn new(engine: Engine, min_level: Level) -> Self {
        Self {
            engine,
            min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for BananasLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        // Level ordering: TRACE > DEBUG > INFO > WARN > ERROR.
        if *meta.level() > self.min_level || meta.target().starts_with("bananas") {
            return;
        }

        let mut fields = Map::new();
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        event.record(&mut visitor);

        let tags = [meta.level().as_str().to_ascii_lowercase(), meta.target().to_string()];
        self.engine.log(tags, LogPayload::Data(Value::Object(fields)));
        self.enqueued_events.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::StandaloneHost;
    use crate::noop_sink::MemorySink;
    use serde_json::json;
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[tokio::test]
    async fn events_become_log_records() {
        let sink = MemorySink::new();
        let engine = Engine::start(
            Config::new("abc").with_interval(Duration::from_secs(3600)),
            Arc::new(sink.clone()),
            Arc::new(StandaloneHost),
        )
        .await
        .unwrap();

        let layer = BananasLayer::new(engine.clone(), Level::INFO);
        let total = Arc::clone(&layer.total_events);
        let enqueued = Arc::clone(&layer.enqueued_events);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "checkout", order = 42, "payment slow");
            tracing::debug!(target: "checkout", "too chatty");
            tracing::info!(target: "bananas::engine", "own diagnostics");
        });

        assert_eq!(total.load(Ordering::Relaxed), 3);
        assert_eq!(enqueued.load(Ordering::Relaxed), 1);

        engine.flush().await;
        let records = sink.records();
        assert_eq!(records[1]["tags"], json!(["warn", "checkout"]));
        assert_eq!(records[1]["data"], json!({"message": "payment slow", "order": 42}));

        engine.shutdown().await;
    }
}
