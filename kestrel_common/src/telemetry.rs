//! Append-only telemetry collaborator.
//!
//! The core only ever writes; it never reads telemetry back. Writes are
//! fire-and-forget and must not stall the tick, so sink errors are logged
//! and dropped.

use std::io::Write;

use serde::Serialize;
use tracing::warn;

/// One numeric telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub series: String,
    pub value: f64,
    pub timestamp: f64,
}

/// Diagnostic fault event surfaced by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultEvent {
    pub source: String,
    pub message: String,
    pub timestamp: f64,
}

/// Telemetry / data-log sink.
pub trait Telemetry {
    /// Append one sample to a named series.
    fn append(&mut self, series: &str, value: f64, timestamp: f64);

    /// Surface a recovered fault.
    fn fault(&mut self, source: &str, message: &str, timestamp: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn append(&mut self, _series: &str, _value: f64, _timestamp: f64) {}
    fn fault(&mut self, _source: &str, _message: &str, _timestamp: f64) {}
}

/// Keeps every sample in memory (tests and short simulations).
#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetry {
    pub samples: Vec<Sample>,
    pub faults: Vec<FaultEvent>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values of one series in append order.
    pub fn series(&self, name: &str) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| s.series == name)
            .map(|s| s.value)
            .collect()
    }
}

impl Telemetry for MemoryTelemetry {
    fn append(&mut self, series: &str, value: f64, timestamp: f64) {
        self.samples.push(Sample {
            series: series.to_string(),
            value,
            timestamp,
        });
    }

    fn fault(&mut self, source: &str, message: &str, timestamp: f64) {
        self.faults.push(FaultEvent {
            source: source.to_string(),
            message: message.to_string(),
            timestamp,
        });
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Record<'a> {
    Sample {
        series: &'a str,
        value: f64,
        timestamp: f64,
    },
    Fault {
        source: &'a str,
        message: &'a str,
        timestamp: f64,
    },
}

/// Writes one JSON object per line to any `Write` sink.
pub struct JsonLinesTelemetry<W: Write> {
    sink: W,
    write_errors: u64,
}

impl<W: Write> JsonLinesTelemetry<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            write_errors: 0,
        }
    }

    /// Number of dropped records.
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_record(&mut self, record: &Record<'_>) {
        let result = serde_json::to_writer(&mut self.sink, record)
            .map_err(std::io::Error::from)
            .and_then(|()| self.sink.write_all(b"\n"));
        if let Err(e) = result {
            // Warn on the first drop only; the sink is probably gone.
            if self.write_errors == 0 {
                warn!("telemetry write failed: {e}");
            }
            self.write_errors += 1;
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.sink.flush() {
            warn!("telemetry flush failed: {e}");
        }
    }
}

impl<W: Write> Telemetry for JsonLinesTelemetry<W> {
    fn append(&mut self, series: &str, value: f64, timestamp: f64) {
        self.write_record(&Record::Sample {
            series,
            value,
            timestamp,
        });
    }

    fn fault(&mut self, source: &str, message: &str, timestamp: f64) {
        self.write_record(&Record::Fault {
            source,
            message,
            timestamp,
        });
    }
}
