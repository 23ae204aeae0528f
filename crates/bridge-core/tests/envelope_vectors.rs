use bridge_core::measurement::{DEFAULT_LOCATION_CODE, DEFAULT_MESSAGE_NAMESPACE};
use bridge_core::{Envelope, MessageBuilder, TagMap};
use chrono::{TimeZone, Utc};

#[test]
fn parses_consumer_envelope() {
    let raw = r#"{
        "messageType":["urn:message:Alto.ConsumersBase.Model:UniversalEventHubMessage"],
        "message":{
            "Tag":"FIT-90000",
            "LocationCode":"DAMMA-ARMST-STRM1",
            "TimeStamp":"2024-05-17T09:04:33Z",
            "Metrics":{"Pressure":"51.75"}
        }
    }"#;

    let envelope = Envelope::from_slice(raw.as_bytes()).expect("envelope should parse");
    assert_eq!(envelope.message.tag, "FIT-90000");
    assert_eq!(envelope.message.metrics["Pressure"], "51.75");
    assert_eq!(
        envelope.message.timestamp,
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 4, 33).unwrap()
    );
}

#[test]
fn accepts_fractional_and_offset_timestamps() {
    let raw = r#"{
        "messageType":["urn:message:Alto.ConsumersBase.Model:UniversalEventHubMessage"],
        "message":{
            "Tag":"TIT-90000",
            "LocationCode":"SITE-2",
            "TimeStamp":"2024-05-17T12:04:33.250+03:00",
            "Metrics":{"Temperature":"31.5"}
        }
    }"#;

    let envelope = Envelope::from_slice(raw.as_bytes()).expect("envelope should parse");
    assert_eq!(
        envelope.message.timestamp,
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 4, 33).unwrap() + chrono::Duration::milliseconds(250)
    );
}

#[test]
fn rejects_envelope_without_message() {
    let raw = r#"{"messageType":["urn:message:x:UniversalEventHubMessage"]}"#;
    assert!(Envelope::from_slice(raw.as_bytes()).is_err());
}

#[test]
fn emits_exact_wire_shape() {
    let builder = MessageBuilder::new(
        TagMap::reference(),
        DEFAULT_LOCATION_CODE,
        DEFAULT_MESSAGE_NAMESPACE,
    );
    let now = Utc.with_ymd_and_hms(2024, 5, 17, 9, 4, 33).unwrap();

    // Slot 2 of a block read at 2000 is 42005.
    let measurement = builder.build(2000, 2, 51.75, now).expect("42005 is mapped");
    let mapping = TagMap::reference().lookup(42005).unwrap();
    let key = mapping.active_keys().next().unwrap();

    let bytes = builder.envelope(measurement).to_bytes().unwrap();
    let expected = format!(
        concat!(
            r#"{{"messageType":["urn:message:Alto.ConsumersBase.Model:UniversalEventHubMessage"],"#,
            r#""message":{{"Tag":"{}","LocationCode":"DAMMA-ARMST-STRM1","#,
            r#""TimeStamp":"2024-05-17T09:04:33Z","Metrics":{{"{}":"51.75"}}}}}}"#
        ),
        mapping.tag, key
    );
    assert_eq!(String::from_utf8(bytes).unwrap(), expected);
}
