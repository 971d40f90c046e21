use playbackcore::Channel;
use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde_json::{json, Map, Value};

const LOCATIONS: &[&str] = &[
    "Main Street - North Junction",
    "East Road - Mobile Unit #3",
    "Ring Road Flyover",
    "Station Square",
    "Harbour Bridge Approach",
    "Market Lane Crossing",
];

const VEHICLE_TYPES: &[&str] = &["car", "motorcycle", "truck", "bus", "van"];

const PLATE_REGIONS: &[&str] = &["KA", "MH", "DL", "TN", "GJ"];

fn plate_number(rng: &mut StdRng) -> String {
    let region = PLATE_REGIONS.choose(rng).copied().unwrap_or("KA");
    let letters: String = (0..2).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
    format!(
        "{}{:02}{}{:04}",
        region,
        rng.gen_range(1..=99),
        letters,
        rng.gen_range(0..10_000)
    )
}

/// Channel-specific payload for one synthetic detection.
pub fn payload_for(channel: Channel, rng: &mut StdRng, lookout: &[String]) -> Map<String, Value> {
    let location = LOCATIONS.choose(rng).copied().unwrap_or("Unknown");
    let confidence = (rng.gen_range(0.62f64..0.99) * 100.0).round() / 100.0;
    let mut payload = Map::new();
    payload.insert("location".into(), json!(location));
    payload.insert("camera".into(), json!(format!("CAM-{:03}", rng.gen_range(1..=120))));
    payload.insert("confidence".into(), json!(confidence));
    payload.insert(
        "thumbnail".into(),
        json!(format!("/thumbnails/{}/{:06}.jpg", channel, rng.gen_range(0..1_000_000))),
    );

    match channel {
        Channel::Overspeeding => {
            let limit = *[40u32, 50, 60, 80].choose(rng).unwrap_or(&50);
            payload.insert("speedLimit".into(), json!(limit));
            payload.insert("speed".into(), json!(limit + rng.gen_range(5..=45)));
            payload.insert("plateNumber".into(), json!(plate_number(rng)));
        }
        Channel::RedLightPassing | Channel::WrongWay | Channel::NoHelmet => {
            payload.insert("plateNumber".into(), json!(plate_number(rng)));
            let vehicle = if channel == Channel::NoHelmet {
                "motorcycle"
            } else {
                VEHICLE_TYPES.choose(rng).copied().unwrap_or("car")
            };
            payload.insert("vehicleType".into(), json!(vehicle));
        }
        Channel::Pothole => {
            let severity = *["low", "moderate", "high"].choose(rng).unwrap_or(&"moderate");
            payload.insert("severity".into(), json!(severity));
            payload.insert("diameterCm".into(), json!(rng.gen_range(15..=120)));
        }
        Channel::VehicleFinder => {
            let plate = lookout
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| plate_number(rng));
            payload.insert("plateNumber".into(), json!(plate));
            payload.insert("onLookout".into(), json!(!lookout.is_empty()));
        }
        Channel::TrafficControl => {
            let direction = *["north", "south", "east", "west"].choose(rng).unwrap_or(&"north");
            payload.insert("direction".into(), json!(direction));
            payload.insert("vehicleCount".into(), json!(rng.gen_range(3..=60)));
        }
        Channel::PersonDetector => {
            payload.insert("personCount".into(), json!(rng.gen_range(1..=12)));
        }
    }

    payload
}
