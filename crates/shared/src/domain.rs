use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(TrackId);
key_newtype!(MacAddress);
key_newtype!(GroupName);

/// Speaker volume, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Volume(u8);

impl Volume {
    pub const MIN: Volume = Volume(0);
    pub const MAX: Volume = Volume(100);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if !(Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&value) {
            return Err(ValidationError::VolumeOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Volume {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Volume> for u8 {
    fn from(value: Volume) -> Self {
        value.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeakerStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    #[serde(other)]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    #[serde(other)]
    Stopped,
}

/// The backend leaves status unset on freshly discovered devices; treat `null`
/// the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    pub mac_address: MacAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default = "default_volume", deserialize_with = "volume_or_default")]
    pub volume: Volume,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SpeakerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_track: Option<String>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub master: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_members: Vec<MacAddress>,
    #[serde(default)]
    pub position: u32,
}

fn default_volume() -> Volume {
    Volume(50)
}

fn volume_or_default<'de, D>(deserializer: D) -> Result<Volume, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Volume>::deserialize(deserializer)?.unwrap_or_else(default_volume))
}

impl Speaker {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Speaker")
    }

    pub fn is_playing(&self) -> bool {
        self.status == SpeakerStatus::Playing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: GroupName,
    #[serde(
        rename = "speakerMacAddresses",
        default,
        deserialize_with = "null_as_default"
    )]
    pub members: Vec<MacAddress>,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub volume: Option<u8>,
}

impl Group {
    /// Membership comparison ignoring order and duplicates.
    pub fn has_members(&self, expected: &[MacAddress]) -> bool {
        let mut actual: Vec<&MacAddress> = self.members.iter().collect();
        let mut wanted: Vec<&MacAddress> = expected.iter().collect();
        actual.sort();
        actual.dedup();
        wanted.sort();
        wanted.dedup();
        actual == wanted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PlaybackStatus,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    #[serde(default)]
    pub speaker_id: Option<MacAddress>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_track: Option<String>,
    #[serde(default)]
    pub volume: Option<u8>,
}

impl PlaybackState {
    /// Fraction of the track already played, `0.0` when the duration is unknown.
    pub fn progress(&self) -> f32 {
        if self.duration == 0 {
            return 0.0;
        }
        (self.position.min(self.duration) as f32) / (self.duration as f32)
    }
}

/// The speaker or group whose playback the client is following.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaybackTarget {
    Speaker(MacAddress),
    Group(GroupName),
}

impl fmt::Display for PlaybackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackTarget::Speaker(mac) => write!(f, "speaker {mac}"),
            PlaybackTarget::Group(name) => write!(f, "group {name}"),
        }
    }
}
