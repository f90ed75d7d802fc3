//! Events of a profile.

use chrono::Utc;
use serde::{Serialize, Serializer};
use strata_codec::Value;

use crate::error::{WorkerError, WorkerResult};

/// Entry value the host sends after the last event of a profile.
pub const PROFILE_DONE: &str = "profile_done";

/// One event: six fields in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Entity the event belongs to.
    pub uid: String,
    /// Source address.
    pub ip: String,
    /// Event payload, usually an embedded JSON document.
    #[serde(serialize_with = "object_as_json")]
    pub object: Value,
    /// Event identifier.
    pub id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Grouping key.
    pub groupkey: String,
}

fn object_as_json<S: Serializer>(object: &Value, serializer: S) -> Result<S::Ok, S::Error> {
    match object {
        Value::Json(doc) => doc
            .to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer),
        Value::Text(s) => serializer.serialize_str(s),
        other => serializer.collect_str(other),
    }
}

impl Event {
    /// Decode an event entry: a list of the six fields.
    pub fn from_value(value: Value) -> WorkerResult<Self> {
        let fields = match value {
            Value::List(fields) => fields,
            other => return Err(WorkerError::entry(format!("event is not a list: {other}"))),
        };
        let Ok([uid, ip, object, id, timestamp, groupkey]) = <[Value; 6]>::try_from(fields) else {
            return Err(WorkerError::entry("event must have six fields"));
        };
        Ok(Self {
            uid: text(uid, "uid")?,
            ip: text(ip, "ip")?,
            object,
            id: text(id, "id")?,
            timestamp: text(timestamp, "timestamp")?,
            groupkey: text(groupkey, "groupkey")?,
        })
    }

    /// Encode the event in wire order.
    pub fn to_value(&self) -> Value {
        Value::List(vec![
            Value::bytes(&self.uid),
            Value::bytes(&self.ip),
            self.object.clone(),
            Value::bytes(&self.id),
            Value::bytes(&self.timestamp),
            Value::bytes(&self.groupkey),
        ])
    }
}

fn text(value: Value, field: &str) -> WorkerResult<String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
        Value::Integer(n) => Ok(n.to_string()),
        other => Err(WorkerError::entry(format!("event {field} is not a string: {other}"))),
    }
}

/// Create an event stamped with the current UTC time, from no particular
/// address and without an identifier.
pub fn make_event(uid: impl Into<String>, object: Value, groupkey: impl Into<String>) -> Event {
    Event {
        uid: uid.into(),
        ip: "0.0.0.0".to_string(),
        object,
        id: String::new(),
        timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        groupkey: groupkey.into(),
    }
}
