//! Property tests for the payload codec.

use proptest::prelude::*;
use signalmap_lib::codec::{compress, decode_record, decompress, encode_record};
use signalmap_lib::models::{ConnectionKind, Position, SignalMeasurement, Technology};

fn arb_measurement() -> impl Strategy<Value = SignalMeasurement> {
    (
        -85.0f64..85.0,
        -180.0f64..180.0,
        0.0f64..=100.0,
        proptest::option::of(0.0f64..500.0),
        0i64..4_000_000_000_000,
        any::<bool>(),
        proptest::option::of("[a-zA-Z ]{0,12}"),
    )
        .prop_map(|(lat, lon, strength, accuracy, ts, wifi, provider)| {
            let mut position = Position::new(lat, lon, ts);
            position.accuracy = accuracy;
            SignalMeasurement {
                connection_kind: if wifi {
                    ConnectionKind::WiFi
                } else {
                    ConnectionKind::Cellular
                },
                strength_percent: strength,
                technology: if wifi { None } else { Some(Technology::FourG) },
                provider,
                position,
            }
        })
}

#[test]
fn coordinates_survive_storage_bit_for_bit() {
    let recorded = vec![
        Position::new(-21.420032391256438, 0.0, 0),
        Position::new(48.856613999999996, 2.3522219000000004, 1_700_000_000_000),
    ];
    let decoded: Vec<Position> = decode_record(&encode_record(&recorded).unwrap()).unwrap();
    for (before, after) in recorded.iter().zip(&decoded) {
        assert_eq!(before.latitude.to_bits(), after.latitude.to_bits());
        assert_eq!(before.longitude.to_bits(), after.longitude.to_bits());
    }
}

proptest! {
    #[test]
    fn bytes_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        prop_assert_eq!(decompress(&compress(&data)).unwrap(), data);
    }

    #[test]
    fn repetitive_bytes_round_trip(byte in any::<u8>(), len in 0usize..20_000) {
        let data = vec![byte; len];
        prop_assert_eq!(decompress(&compress(&data)).unwrap(), data);
    }

    #[test]
    fn compression_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        prop_assert_eq!(compress(&data), compress(&data));
    }

    #[test]
    fn coordinate_bits_round_trip(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
        let position = Position::new(lat, lon, 0);
        let decoded: Position = decode_record(&encode_record(&position).unwrap()).unwrap();
        prop_assert_eq!(decoded.latitude.to_bits(), lat.to_bits());
        prop_assert_eq!(decoded.longitude.to_bits(), lon.to_bits());
    }

    #[test]
    fn track_round_trips(track in proptest::collection::vec(arb_measurement(), 0..50)) {
        let encoded = encode_record(&track).unwrap();
        let decoded: Vec<SignalMeasurement> = decode_record(&encoded).unwrap();
        prop_assert_eq!(decoded, track);
    }

    #[test]
    fn arbitrary_text_never_panics(text in "\\PC{0,64}") {
        let _ = decompress(&text);
    }
}
