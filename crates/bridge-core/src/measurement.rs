use crate::registers::logical_address;
use crate::tags::TagMap;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_LOCATION_CODE: &str = "DAMMA-ARMST-STRM1";
pub const DEFAULT_MESSAGE_NAMESPACE: &str = "Alto.ConsumersBase.Model";
pub const MESSAGE_TYPE_NAME: &str = "UniversalEventHubMessage";

/// One tagged reading as consumers see it on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "Tag")]
    pub tag: String,
    #[serde(rename = "LocationCode")]
    pub location_code: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Metrics")]
    pub metrics: BTreeMap<String, String>,
}

/// Outer wire wrapper: a type discriminator list plus the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message_type: Vec<String>,
    pub message: Measurement,
}

impl Envelope {
    pub fn wrap(namespace: &str, message: Measurement) -> Self {
        Self {
            message_type: vec![message_type_urn(namespace)],
            message,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

pub fn message_type_urn(namespace: &str) -> String {
    format!("urn:message:{namespace}:{MESSAGE_TYPE_NAME}")
}

/// Shortest decimal that round-trips the value ("7", "12.5").
pub fn format_value(value: f32) -> String {
    if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        value.to_string()
    }
}

/// Map the `index`-th value of a block read at `start_address` to a
/// [`Measurement`].
///
/// Returns `None` when the logical address has no table entry or the entry has
/// no non-empty metric key. Every non-empty key receives the same value.
pub fn build_measurement(
    start_address: u16,
    index: usize,
    raw: f32,
    tags: &TagMap,
    location_code: &str,
    now: DateTime<Utc>,
) -> Option<Measurement> {
    let address = logical_address(start_address, index);
    let Some(mapping) = tags.lookup(address) else {
        debug!("no tag mapping for address {address}, skipping");
        return None;
    };

    let value = format_value(raw);
    let metrics: BTreeMap<String, String> = mapping
        .active_keys()
        .map(|key| (key.to_string(), value.clone()))
        .collect();

    if metrics.is_empty() {
        debug!("tag {} at {address} has no metric keys, skipping", mapping.tag);
        return None;
    }

    Some(Measurement {
        tag: mapping.tag.to_string(),
        location_code: location_code.to_string(),
        timestamp: now,
        metrics,
    })
}

/// Deployment-wide settings for building envelopes.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    tags: TagMap,
    location_code: String,
    namespace: String,
}

impl MessageBuilder {
    pub fn new(
        tags: TagMap,
        location_code: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            tags,
            location_code: location_code.into(),
            namespace: namespace.into(),
        }
    }

    pub fn build(
        &self,
        start_address: u16,
        index: usize,
        raw: f32,
        now: DateTime<Utc>,
    ) -> Option<Measurement> {
        build_measurement(
            start_address,
            index,
            raw,
            &self.tags,
            &self.location_code,
            now,
        )
    }

    pub fn envelope(&self, measurement: Measurement) -> Envelope {
        Envelope::wrap(&self.namespace, measurement)
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new(
            TagMap::reference(),
            DEFAULT_LOCATION_CODE,
            DEFAULT_MESSAGE_NAMESPACE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagMapping;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn reference_scenario() {
        let tags = TagMap::reference();
        let first = build_measurement(2000, 0, 12.5, &tags, "LOC", ts()).unwrap();
        assert_eq!(first.tag, "FIT-90000");
        assert_eq!(
            first.metrics.get("Gross_Volume_Flow_Rate").map(String::as_str),
            Some("12.5")
        );

        let second = build_measurement(2000, 1, 7.0, &tags, "LOC", ts()).unwrap();
        assert_eq!(second.tag, "GC-1");
        assert_eq!(
            second.metrics.get("Standard_Flowrate").map(String::as_str),
            Some("7")
        );
        assert_eq!(second.metrics.len(), 1);
    }

    #[test]
    fn unmapped_slot_yields_nothing() {
        let tags = TagMap::reference();
        assert!(build_measurement(2000, 36, 1.0, &tags, "LOC", ts()).is_none());
        assert!(build_measurement(1999, 0, 1.0, &tags, "LOC", ts()).is_none());
    }

    static MULTI_KEY: [TagMapping; 2] = [
        TagMapping {
            address: 40001,
            tag: "AT-1",
            metric_keys: &["Density", "", "Relative_Density"],
        },
        TagMapping {
            address: 40003,
            tag: "AT-2",
            metric_keys: &["", ""],
        },
    ];

    #[test]
    fn every_non_empty_key_gets_the_value() {
        let tags = TagMap::new(&MULTI_KEY);
        let m = build_measurement(0, 0, 0.75, &tags, "LOC", ts()).unwrap();
        assert_eq!(m.metrics.len(), 2);
        assert_eq!(m.metrics["Density"], "0.75");
        assert_eq!(m.metrics["Relative_Density"], "0.75");
    }

    #[test]
    fn placeholder_only_entry_is_skipped() {
        let tags = TagMap::new(&MULTI_KEY);
        assert!(build_measurement(0, 1, 1.0, &tags, "LOC", ts()).is_none());
    }

    #[test]
    fn non_finite_values_format_like_consumers_expect() {
        assert_eq!(format_value(f32::NAN), "NaN");
        assert_eq!(format_value(f32::INFINITY), "Infinity");
        assert_eq!(format_value(f32::NEG_INFINITY), "-Infinity");
        assert_eq!(format_value(-3.25), "-3.25");
    }

    #[test]
    fn extreme_magnitudes_print_as_plain_decimals() {
        assert_eq!(format_value(1e20), "100000000000000000000");
        assert_eq!(format_value(-1e20), "-100000000000000000000");
        assert_eq!(format_value(1e-7), "0.0000001");
        assert_eq!(format_value(f32::MAX), format!("{}", f32::MAX));
        assert!(!format_value(f32::MAX).contains('e'));
    }

    #[test]
    fn envelope_wire_shape() {
        let builder = MessageBuilder::default();
        let m = builder.build(2000, 0, 12.5, ts()).unwrap();
        let bytes = builder.envelope(m).to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value["messageType"][0],
            "urn:message:Alto.ConsumersBase.Model:UniversalEventHubMessage"
        );
        assert_eq!(value["message"]["Tag"], "FIT-90000");
        assert_eq!(value["message"]["LocationCode"], DEFAULT_LOCATION_CODE);
        assert_eq!(value["message"]["TimeStamp"], "2024-03-01T08:30:00Z");
        assert_eq!(value["message"]["Metrics"]["Gross_Volume_Flow_Rate"], "12.5");
    }

    #[test]
    fn envelope_parses_back() {
        let builder = MessageBuilder::default();
        let now = Utc.timestamp_opt(1_709_281_800, 123_456_000).unwrap();
        let m = builder.build(2000, 4, 31.5, now).unwrap();
        let envelope = builder.envelope(m.clone());
        let parsed = Envelope::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.message, m);
        assert_eq!(parsed, envelope);
    }
}
