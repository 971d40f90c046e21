use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detection category; each channel is an independent delivery timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    RedLightPassing,
    NoHelmet,
    Overspeeding,
    WrongWay,
    Pothole,
    VehicleFinder,
    TrafficControl,
    PersonDetector,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::RedLightPassing,
        Channel::NoHelmet,
        Channel::Overspeeding,
        Channel::WrongWay,
        Channel::Pothole,
        Channel::VehicleFinder,
        Channel::TrafficControl,
        Channel::PersonDetector,
    ];

    /// Wire name used in datasets and on the dashboard bridge.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::RedLightPassing => "redLightPassing",
            Channel::NoHelmet => "noHelmet",
            Channel::Overspeeding => "overspeeding",
            Channel::WrongWay => "wrongWay",
            Channel::Pothole => "pothole",
            Channel::VehicleFinder => "vehicleFinder",
            Channel::TrafficControl => "trafficControl",
            Channel::PersonDetector => "personDetector",
        }
    }

    /// Dashboard section title.
    pub fn label(self) -> &'static str {
        match self {
            Channel::RedLightPassing => "Red Light Jumping",
            Channel::NoHelmet => "No Helmet Violation",
            Channel::Overspeeding => "Over-speeding Detection",
            Channel::WrongWay => "Wrong Way Detection",
            Channel::Pothole => "Pothole Detection",
            Channel::VehicleFinder => "Vehicle Detection",
            Channel::TrafficControl => "Traffic Control",
            Channel::PersonDetector => "Person Detection",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown channel `{0}`")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    /// Accepts the wire name, case-insensitively, with `-`/`_` separators ignored.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str().to_lowercase() == normalized)
            .ok_or_else(|| UnknownChannel(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parses_wire_and_cli_spellings() {
        assert_eq!("pothole".parse::<Channel>().unwrap(), Channel::Pothole);
        assert_eq!(
            "redLightPassing".parse::<Channel>().unwrap(),
            Channel::RedLightPassing
        );
        assert_eq!("wrong-way".parse::<Channel>().unwrap(), Channel::WrongWay);
        assert_eq!(
            "VEHICLE_FINDER".parse::<Channel>().unwrap(),
            Channel::VehicleFinder
        );
    }

    #[test]
    fn channel_rejects_unknown_names() {
        let err = "speedTrap".parse::<Channel>().unwrap_err();
        assert_eq!(err, UnknownChannel("speedTrap".into()));
    }

    #[test]
    fn channel_serializes_to_wire_name() {
        for channel in Channel::ALL {
            let encoded = serde_json::to_string(&channel).unwrap();
            assert_eq!(encoded, format!("\"{}\"", channel.as_str()));
        }
    }
}
