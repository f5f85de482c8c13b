//! Makes the [`LogWriter`] usable as a [`slog::Drain`].
//!
//! Each record becomes a JSON object holding the message, the level, all key-values and the
//! source location in the field Cloud Logging recognizes:
//!
//! ```json
//!  {
//!     "message": ${message},
//!     "level": ${levelLowercase},
//!     "logging.googleapis.com/sourceLocation": {
//!         "file": ${file},
//!         "line": ${line},
//!         "function": ${modulePath}
//!     },
//!     ... // logger key-values
//!     ... // record key-values
//!  }
//! ```
//!
//! Record key-values replace logger key-values of the same name. `message`, `level` and
//! `logging.googleapis.com/sourceLocation` are always written by the drain and replace
//! key-values using those names.
//!
//! Example usage:
//!
//! ```no_run
//!  use slog::{info, o, Drain};
//!  use slog_gcl::{ClientRegistry, LogWriter};
//!
//! # async fn run() -> Result<(), slog_gcl::Error> {
//!  let registry = ClientRegistry::new();
//!  let writer: LogWriter<googlelog::Client> = LogWriter::new(
//!      &registry,
//!      "projects/my-project",
//!      "my-app",
//!      googlelog::ClientConfig::default(),
//!      googlelog::LoggerOptions::default(),
//!  )
//!  .await?;
//!
//!  let drain = slog_gcl::FallbackToStderr::new(writer).fuse();
//!  let drain = slog_async::Async::new(drain).build().fuse();
//!  let log = slog::Logger::root(drain, o!("version" => "1.0"));
//!  info!(log, "Sent to {}!", "Cloud Logging"; "user" => "alice");
//! # Ok(())
//! # }
//! ```
use crate::backend::LogClient;
use crate::error::Error;
use crate::level::Level;
use crate::writer::{LevelWrite, LogWriter};

use serde_json::{json, Map, Value};
use slog::{Drain, Key, OwnedKVList, Record, KV};
use std::cell::RefCell;
use std::fmt::{self, Display, Write};

/// The field Cloud Logging reads the source location of an entry from.
pub const SOURCE_LOCATION_KEY: &str = "logging.googleapis.com/sourceLocation";

impl<C: LogClient> Drain for LogWriter<C> {
    type Ok = ();
    type Err = Error;

    fn log(&self, record: &Record<'_>, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        let level = Level::from(record.level());
        let payload = json_payload(level, record, values)?;
        self.write_level(level, &payload)?;
        Ok(())
    }
}

fn json_payload(level: Level, record: &Record<'_>, values: &OwnedKVList) -> Result<Vec<u8>, Error> {
    let mut serializer = Serializer::new();
    values.serialize(record, &mut serializer)?;
    record.kv().serialize(record, &mut serializer)?;

    let mut fields = serializer.done();
    fields.insert("message".to_string(), json!(record.msg().to_string()));
    fields.insert("level".to_string(), json!(level.to_string()));
    fields.insert(
        SOURCE_LOCATION_KEY.to_string(),
        json!({
            "file": record.file(),
            "line": record.line().to_string(),
            "function": record.module(),
        }),
    );
    Ok(serde_json::to_vec(&Value::Object(fields))?)
}

// Serializes key-values into a JSON object, later keys replace earlier ones.
struct Serializer {
    map: Map<String, Value>,
}

impl Serializer {
    fn new() -> Serializer {
        Serializer { map: Map::new() }
    }

    fn emit_val(&mut self, key: Key, val: Value) -> slog::Result {
        self.map.insert(key.to_string(), val);
        Ok(())
    }

    fn emit_serde_json_number<V>(&mut self, key: Key, value: V) -> slog::Result
    where
        serde_json::Number: From<V>,
    {
        self.emit_val(key, Value::Number(serde_json::Number::from(value)))
    }

    fn done(self) -> Map<String, Value> {
        self.map
    }
}

// used by Serializer
thread_local! {
    static THREAD_LOCAL_BUF: RefCell<String> = RefCell::new(String::with_capacity(256))
}

impl slog::Serializer for Serializer {
    fn emit_bool(&mut self, key: Key, val: bool) -> slog::Result {
        self.emit_val(key, Value::Bool(val))
    }

    fn emit_unit(&mut self, key: Key) -> slog::Result {
        self.emit_val(key, Value::Null)
    }

    fn emit_str(&mut self, key: Key, val: &str) -> slog::Result {
        self.emit_val(key, Value::String(val.to_string()))
    }

    fn emit_char(&mut self, key: Key, val: char) -> slog::Result {
        self.emit_val(key, Value::String(val.to_string()))
    }

    fn emit_none(&mut self, key: Key) -> slog::Result {
        self.emit_val(key, Value::Null)
    }

    fn emit_u8(&mut self, key: Key, val: u8) -> slog::Result {
        self.emit_serde_json_number::<u8>(key, val)
    }

    fn emit_i8(&mut self, key: Key, val: i8) -> slog::Result {
        self.emit_serde_json_number::<i8>(key, val)
    }

    fn emit_u16(&mut self, key: Key, val: u16) -> slog::Result {
        self.emit_serde_json_number::<u16>(key, val)
    }

    fn emit_i16(&mut self, key: Key, val: i16) -> slog::Result {
        self.emit_serde_json_number::<i16>(key, val)
    }

    fn emit_usize(&mut self, key: Key, val: usize) -> slog::Result {
        self.emit_serde_json_number::<usize>(key, val)
    }

    fn emit_isize(&mut self, key: Key, val: isize) -> slog::Result {
        self.emit_serde_json_number::<isize>(key, val)
    }

    fn emit_u32(&mut self, key: Key, val: u32) -> slog::Result {
        self.emit_serde_json_number::<u32>(key, val)
    }

    fn emit_i32(&mut self, key: Key, val: i32) -> slog::Result {
        self.emit_serde_json_number::<i32>(key, val)
    }

    fn emit_f32(&mut self, key: Key, val: f32) -> slog::Result {
        self.emit_f64(key, f64::from(val))
    }

    fn emit_u64(&mut self, key: Key, val: u64) -> slog::Result {
        self.emit_serde_json_number::<u64>(key, val)
    }

    fn emit_i64(&mut self, key: Key, val: i64) -> slog::Result {
        self.emit_serde_json_number::<i64>(key, val)
    }

    // NaN and the infinities have no JSON representation
    fn emit_f64(&mut self, key: Key, val: f64) -> slog::Result {
        let val = serde_json::Number::from_f64(val).map_or(Value::Null, Value::Number);
        self.emit_val(key, val)
    }

    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        THREAD_LOCAL_BUF.with(|buf| {
            let mut buf = buf.borrow_mut();
            buf.write_fmt(*val)?;
            let res = self.emit_val(key, Value::String(buf.clone()));
            buf.clear();
            res
        })
    }
}

/// Reports the errors of the wrapped drain on stderr instead of passing them on, so it can be
/// used where slog wants a drain that never fails.
#[derive(Clone)]
pub struct FallbackToStderr<D: Drain> {
    drain: D,
}

impl<D: Drain> FallbackToStderr<D> {
    pub fn new(drain: D) -> Self {
        FallbackToStderr { drain }
    }
}

impl<D: Drain> Drain for FallbackToStderr<D>
where
    D::Err: Display,
{
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Never> {
        if let Err(err) = self.drain.log(record, logger_values) {
            eprintln!("A drain could not log to its destination: {}", err);
        }
        Ok(())
    }

    #[inline]
    fn is_enabled(&self, level: slog::Level) -> bool {
        self.drain.is_enabled(level)
    }
}
