//! Profiles: one entity's fields, as stored by the host.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{NaiveDate, TimeDelta};
use strata_codec::{decode_with, encode, DecodeOptions, Value};
use strata_log::{ChunkedLog, LogConfig};

use crate::error::{WorkerError, WorkerResult};

/// Field holding the expiry date stamped by [`Profile::set_expire`].
pub const EXPIRES_FIELD: &str = "!!expires";

/// Key of the mapping that stands in for a field stored in parts.
pub const PARTS_FIELD: &str = "!!parts";

/// Date format of job groups and expiry stamps.
pub const GROUP_FORMAT: &str = "%Y-%m-%d";

/// An entity record: a uid and a mapping of named fields.
///
/// Fields holding event logs are lazy sequences; [`Profile::open_log`]
/// reopens one for appending without decompressing its sealed chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    uid: Value,
    fields: BTreeMap<String, Value>,
}

impl Profile {
    /// An empty profile.
    pub fn new(uid: Value) -> Self {
        Self {
            uid,
            fields: BTreeMap::new(),
        }
    }

    /// Build a profile from a `[uid, fields]` entry.
    pub fn from_entry(entry: Value) -> WorkerResult<Self> {
        Self::from_entry_with(entry, DecodeOptions::default())
    }

    /// Like [`from_entry`](Self::from_entry), decoding fields stored in
    /// parts with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Entry`] if the entry is not a pair of a uid
    /// and a mapping with string keys.
    pub fn from_entry_with(entry: Value, options: DecodeOptions) -> WorkerResult<Self> {
        let pair = match entry {
            Value::List(pair) => pair,
            other => return Err(WorkerError::entry(format!("profile is not a list: {other}"))),
        };
        let Ok([uid, data]) = <[Value; 2]>::try_from(pair) else {
            return Err(WorkerError::entry("profile must be a [uid, fields] pair"));
        };
        let pairs = match data {
            Value::Map(pairs) => pairs,
            other => {
                return Err(WorkerError::entry(format!(
                    "profile fields are not a mapping: {other}"
                )))
            }
        };

        let mut profile = Self::new(uid);
        for (key, value) in pairs {
            let name = key
                .as_text()
                .ok_or_else(|| WorkerError::entry(format!("profile field name {key}")))?
                .to_string();
            let value = match parts_of(&value) {
                Some(parts) => join_parts(parts, options)?,
                None => value,
            };
            profile.fields.insert(name, value);
        }
        Ok(profile)
    }

    /// The profile uid.
    pub fn uid(&self) -> &Value {
        &self.uid
    }

    /// The uid as text, if it is a string.
    pub fn uid_text(&self) -> Option<&str> {
        self.uid.as_text()
    }

    /// Field `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set field `name`, returning its previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Remove field `name`.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the profile has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Open the event log in field `name`, or a new one if the field is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Entry`] if the field is not a lazy sequence,
    /// or a log error if it is not a well-formed log.
    pub fn open_log(&self, name: &str, config: LogConfig) -> WorkerResult<ChunkedLog> {
        match self.fields.get(name) {
            None => Ok(ChunkedLog::new(config)),
            Some(Value::Lazy(lazy)) => Ok(ChunkedLog::from_encoded(lazy.as_bytes().clone(), config)?),
            Some(other) => Err(WorkerError::entry(format!(
                "field {name} is not an event log: {other}"
            ))),
        }
    }

    /// Seal `log` and store it in field `name`.
    pub fn store_log(&mut self, name: impl Into<String>, log: ChunkedLog) {
        self.fields.insert(name.into(), log.into_value());
    }

    /// Stamp the profile to expire `days` after the day of `group`.
    ///
    /// Only the first ten characters of `group` are read, as a
    /// `YYYY-MM-DD` date.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] if `group` does not start with a date
    /// or the result is out of range.
    pub fn set_expire(&mut self, days: i64, group: &str) -> WorkerResult<()> {
        let day = group
            .get(..10)
            .ok_or_else(|| WorkerError::config(format!("group {group:?} has no date")))?;
        let start = NaiveDate::parse_from_str(day, GROUP_FORMAT)
            .map_err(|e| WorkerError::config(format!("group {group:?}: {e}")))?;
        let expires = TimeDelta::try_days(days)
            .and_then(|delta| start.checked_add_signed(delta))
            .ok_or_else(|| WorkerError::config(format!("{days} days after {start} is out of range")))?;
        self.insert(
            EXPIRES_FIELD,
            Value::bytes(expires.format(GROUP_FORMAT).to_string()),
        );
        Ok(())
    }

    /// The expiry date, if one has been stamped.
    pub fn expires(&self) -> Option<NaiveDate> {
        let stamp = self.get(EXPIRES_FIELD)?.as_text()?;
        NaiveDate::parse_from_str(stamp, GROUP_FORMAT).ok()
    }

    /// Encode as a `[uid, fields]` entry.
    ///
    /// Lazy sequences whose encoding is longer than `part_size` are stored
    /// as `{"!!parts": [part, ...]}`, which [`from_entry`](Self::from_entry)
    /// joins back together.
    pub fn to_value(&self, part_size: usize) -> WorkerResult<Value> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            let value = match value {
                Value::Lazy(_) => {
                    let encoded = encode(value)?;
                    if encoded.len() > part_size {
                        split_parts(&encoded, part_size)
                    } else {
                        value.clone()
                    }
                }
                _ => value.clone(),
            };
            pairs.push((Value::bytes(name), value));
        }
        Ok(Value::List(vec![self.uid.clone(), Value::map(pairs)]))
    }
}

fn parts_of(value: &Value) -> Option<&[Value]> {
    match value.as_map()? {
        [(key, Value::List(parts))] if key.as_text() == Some(PARTS_FIELD) => Some(parts),
        _ => None,
    }
}

fn join_parts(parts: &[Value], options: DecodeOptions) -> WorkerResult<Value> {
    let mut joined = Vec::new();
    for part in parts {
        let bytes = part
            .as_bytes()
            .ok_or_else(|| WorkerError::entry(format!("field part is not bytes: {part}")))?;
        joined.extend_from_slice(bytes);
    }
    Ok(decode_with(Bytes::from(joined), options)?)
}

fn split_parts(encoded: &[u8], part_size: usize) -> Value {
    let parts = encoded
        .chunks(part_size.max(1))
        .map(|part| Value::Bytes(part.to_vec()))
        .collect();
    Value::Map(vec![(Value::bytes(PARTS_FIELD), Value::List(parts))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uid: &str, fields: Vec<(&str, Value)>) -> Value {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (Value::bytes(k), v))
            .collect();
        Value::List(vec![Value::bytes(uid), Value::map(fields)])
    }

    fn texts(log: &ChunkedLog) -> Vec<String> {
        log.iter()
            .map(|v| v.unwrap().as_text().unwrap().to_string())
            .collect()
    }

    #[test]
    fn from_entry_reads_fields() {
        let profile = Profile::from_entry(entry(
            "u1",
            vec![("name", Value::bytes("ann")), ("visits", Value::Integer(3))],
        ))
        .unwrap();

        assert_eq!(profile.uid_text(), Some("u1"));
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.get("visits"), Some(&Value::Integer(3)));
        let names: Vec<&str> = profile.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["name", "visits"]);
    }

    #[test]
    fn from_entry_rejects_wrong_shape() {
        for bad in [
            Value::bytes("u1"),
            Value::List(vec![Value::bytes("u1")]),
            Value::List(vec![Value::bytes("u1"), Value::Integer(1)]),
            Value::List(vec![
                Value::bytes("u1"),
                Value::Map(vec![(Value::Integer(1), Value::Integer(1))]),
            ]),
        ] {
            assert!(matches!(
                Profile::from_entry(bad),
                Err(WorkerError::Entry { .. })
            ));
        }
    }

    #[test]
    fn log_round_trip_through_parts() {
        let mut profile = Profile::new(Value::bytes("u1"));
        let config = LogConfig::new().with_chunk_size(14);
        let mut log = profile.open_log("events", config).unwrap();
        assert!(log.is_empty());
        for batch in [["a", "b", "c"], ["d", "e", "f"]] {
            log.push(batch.iter().map(|s| Value::bytes(*s))).unwrap();
        }
        profile.store_log("events", log);

        let stored = profile.to_value(8).unwrap();
        let fields = &stored.as_list().unwrap()[1];
        let parts = parts_of(fields.get("events").unwrap()).unwrap();
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.as_bytes().unwrap().len() <= 8));

        let reopened = Profile::from_entry(stored).unwrap();
        let mut log = reopened.open_log("events", config).unwrap();
        assert_eq!(texts(&log), vec!["f", "e", "d", "c", "b", "a"]);
        log.push([Value::bytes("g")]).unwrap();
        assert_eq!(texts(&log)[0], "g");
    }

    #[test]
    fn small_logs_are_stored_inline() {
        let mut profile = Profile::new(Value::bytes("u1"));
        let mut log = ChunkedLog::new(LogConfig::default());
        log.push([Value::bytes("a")]).unwrap();
        profile.store_log("events", log);

        let stored = profile.to_value(1024).unwrap();
        let fields = &stored.as_list().unwrap()[1];
        assert!(matches!(fields.get("events"), Some(Value::Lazy(_))));
    }

    #[test]
    fn open_log_rejects_non_logs() {
        let mut profile = Profile::new(Value::bytes("u1"));
        profile.insert("count", Value::Integer(1));
        assert!(matches!(
            profile.open_log("count", LogConfig::default()),
            Err(WorkerError::Entry { .. })
        ));
    }

    #[test]
    fn expiry_is_days_after_group() {
        let mut profile = Profile::new(Value::bytes("u1"));
        profile.set_expire(30, "2013-01-15T10:00").unwrap();
        assert_eq!(profile.get(EXPIRES_FIELD), Some(&Value::bytes("2013-02-14")));
        assert_eq!(profile.expires(), NaiveDate::from_ymd_opt(2013, 2, 14));

        profile.set_expire(-15, "2013-01-15").unwrap();
        assert_eq!(profile.get(EXPIRES_FIELD), Some(&Value::bytes("2012-12-31")));

        assert!(matches!(
            profile.set_expire(1, "2013"),
            Err(WorkerError::Config { .. })
        ));
        assert!(matches!(
            profile.set_expire(1, "2013-13-01"),
            Err(WorkerError::Config { .. })
        ));
    }
}
