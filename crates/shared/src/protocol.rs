use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Group, GroupName, MacAddress, Speaker, TrackId, Volume};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: GroupName,
    pub speakers: Vec<MacAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub track_id: TrackId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub volume: Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// Response of `GET /groups/organize`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedSpeakers {
    #[serde(default)]
    pub all_groups: Vec<Group>,
    #[serde(default)]
    pub grouped: HashMap<GroupName, Vec<Speaker>>,
    #[serde(default)]
    pub ungrouped: Option<Vec<Speaker>>,
}
