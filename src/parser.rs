//! Decoding upstream feed messages.

use anyhow::Result;
use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Decodes a binary GTFS-realtime message. The NYCT extension fields are
/// part of the compiled schema, so no extension registry is involved;
/// unknown fields from newer upstream revisions are skipped by prost.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, NyctTripDescriptor, TripDescriptor, TripUpdate};

    #[test]
    fn test_roundtrip_with_nyct_extension() {
        let message = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "1.0".to_string(),
                timestamp: Some(1_700_000_000),
                ..Default::default()
            },
            entity: vec![FeedEntity {
                id: "1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("086500_7..".to_string()),
                        nyct_trip_descriptor: Some(NyctTripDescriptor {
                            train_id: Some("07 1441+ TSQ/MST".to_string()),
                            is_assigned: Some(true),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            }],
        };

        let bytes = message.encode_to_vec();
        let decoded = parse_feed(&bytes).unwrap();
        assert_eq!(decoded, message);

        let nyct = decoded.entity[0]
            .trip_update
            .as_ref()
            .unwrap()
            .trip
            .nyct_trip_descriptor
            .as_ref()
            .unwrap();
        assert_eq!(nyct.train_id.as_deref(), Some("07 1441+ TSQ/MST"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_feed(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
