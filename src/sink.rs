use std::io::{self, Write};

use serde_json::{json, Value};

/// Write-only channel for Singer messages. The tap declares each entity's
/// schema before any records, streams records in order, and flushes complete
/// state snapshots at checkpoints.
pub trait Sink {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[&str],
    ) -> io::Result<()>;

    fn write_record(&mut self, stream: &str, record: &Value) -> io::Result<()>;

    fn write_state(&mut self, state: &Value) -> io::Result<()>;
}

/// Singer messages as JSON lines, one message per line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_message(&mut self, message: &Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn write_schema(
        &mut self,
        stream: &str,
        schema: &Value,
        key_properties: &[&str],
    ) -> io::Result<()> {
        self.write_message(&json!({
            "type": "SCHEMA",
            "stream": stream,
            "schema": schema,
            "key_properties": key_properties,
        }))
    }

    fn write_record(&mut self, stream: &str, record: &Value) -> io::Result<()> {
        self.write_message(&json!({
            "type": "RECORD",
            "stream": stream,
            "record": record,
        }))
    }

    fn write_state(&mut self, state: &Value) -> io::Result<()> {
        self.write_message(&json!({
            "type": "STATE",
            "value": state,
        }))
    }
}
