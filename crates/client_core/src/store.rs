//! View-model store: the latest snapshot the front end renders from.
//!
//! Every collection is replaced wholesale. There is no partial patching and no I/O.

use shared::domain::{
    Group, GroupName, MacAddress, PlaybackState, PlaybackTarget, Speaker, Track, TrackId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedPlayback {
    pub target: PlaybackTarget,
    pub state: PlaybackState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewModelStore {
    speakers: Vec<Speaker>,
    groups: Vec<Group>,
    tracks: Vec<Track>,
    playback: Option<FocusedPlayback>,
}

impl ViewModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group member lists are left alone even when they now reference speakers that
    /// disappeared; see [`ViewModelStore::dangling_members`].
    pub fn apply_speakers(&mut self, speakers: Vec<Speaker>) {
        self.speakers = speakers;
    }

    pub fn apply_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
    }

    /// Full library or search results alike; the caller tracks which query produced them.
    pub fn apply_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    pub fn apply_playback_state(&mut self, target: PlaybackTarget, state: PlaybackState) {
        self.playback = Some(FocusedPlayback { target, state });
    }

    pub fn clear_playback(&mut self) {
        self.playback = None;
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn playback(&self) -> Option<&FocusedPlayback> {
        self.playback.as_ref()
    }

    pub fn speaker(&self, mac: &MacAddress) -> Option<&Speaker> {
        self.speakers.iter().find(|speaker| &speaker.mac_address == mac)
    }

    pub fn group(&self, name: &GroupName) -> Option<&Group> {
        self.groups.iter().find(|group| &group.name == name)
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    /// Members of `group` that no longer show up in the speaker list.
    pub fn dangling_members<'a>(&self, group: &'a Group) -> Vec<&'a MacAddress> {
        group
            .members
            .iter()
            .filter(|mac| self.speaker(mac).is_none())
            .collect()
    }

    pub fn snapshot(&self) -> ViewModelStore {
        self.clone()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
