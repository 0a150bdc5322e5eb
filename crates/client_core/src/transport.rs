//! REST transport for the multiroom backend.
//!
//! Every call is a single request with no retry. Failures of any kind (connection,
//! non-2xx status, undecodable body) come back as [`TransportError`] and the caller
//! must assume nothing changed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Group, GroupName, MacAddress, PlaybackState, Speaker, Track, TrackId, Volume},
    protocol::{
        CreateGroupRequest, GroupedSpeakers, PlayRequest, SearchQuery, SeekRequest, VolumeRequest,
    },
};
use tracing::warn;
use url::Url;

use crate::error::TransportError;

pub type TransportResult<T> = Result<T, TransportError>;

/// One operation per backend capability. Mutations resolve to the backend's text
/// acknowledgement.
#[async_trait]
pub trait MultiroomApi: Send + Sync {
    async fn list_speakers(&self) -> TransportResult<Vec<Speaker>>;
    async fn refresh_discovery(&self) -> TransportResult<String>;
    async fn get_speaker(&self, mac: &MacAddress) -> TransportResult<Speaker>;

    async fn list_groups(&self) -> TransportResult<Vec<Group>>;
    async fn get_group(&self, name: &GroupName) -> TransportResult<Group>;
    async fn grouped_speakers(&self) -> TransportResult<GroupedSpeakers>;
    async fn create_group(&self, request: &CreateGroupRequest) -> TransportResult<Group>;
    async fn delete_group(&self, name: &GroupName) -> TransportResult<String>;
    async fn sync_group(&self, name: &GroupName) -> TransportResult<String>;

    async fn play_on_speaker(&self, mac: &MacAddress, track_id: TrackId)
        -> TransportResult<String>;
    async fn play_on_group(&self, name: &GroupName, track_id: TrackId) -> TransportResult<String>;
    async fn pause_speaker(&self, mac: &MacAddress) -> TransportResult<String>;
    async fn pause_group(&self, name: &GroupName) -> TransportResult<String>;
    async fn resume_speaker(&self, mac: &MacAddress) -> TransportResult<String>;
    async fn resume_group(&self, name: &GroupName) -> TransportResult<String>;
    async fn stop_speaker(&self, mac: &MacAddress) -> TransportResult<String>;
    async fn set_speaker_volume(&self, mac: &MacAddress, volume: Volume)
        -> TransportResult<String>;
    async fn set_group_volume(&self, name: &GroupName, volume: Volume) -> TransportResult<String>;
    async fn seek_speaker(&self, mac: &MacAddress, seconds: u32) -> TransportResult<String>;
    async fn playback_state(&self, mac: &MacAddress) -> TransportResult<PlaybackState>;

    async fn list_tracks(&self) -> TransportResult<Vec<Track>>;
    async fn get_track(&self, id: TrackId) -> TransportResult<Track>;
    async fn search_tracks(&self, query: &str) -> TransportResult<Vec<Track>>;
    async fn scan_library(&self) -> TransportResult<String>;
    async fn library_directory(&self) -> TransportResult<String>;
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`. A zero or absent
    /// timeout leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> TransportResult<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            TransportError::network(format!("invalid api url '{base_url}': {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::network(format!(
                "api url '{base_url}' cannot carry a path"
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout.filter(|timeout| !timeout.is_zero()) {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> TransportResult<T> {
        let result: Result<T, reqwest::Error> = async {
            request.send().await?.error_for_status()?.json().await
        }
        .await;
        result.map_err(|err| report(operation, err))
    }

    async fn fetch_text(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> TransportResult<String> {
        let result: Result<String, reqwest::Error> = async {
            request.send().await?.error_for_status()?.text().await
        }
        .await;
        result.map_err(|err| report(operation, err))
    }
}

fn report(operation: &'static str, err: reqwest::Error) -> TransportError {
    let err = TransportError::from(err);
    warn!(operation, status = ?err.status, error = %err.message, "backend request failed");
    err
}

#[async_trait]
impl MultiroomApi for HttpTransport {
    async fn list_speakers(&self) -> TransportResult<Vec<Speaker>> {
        let url = self.endpoint(&["speakers"]);
        self.fetch_json("list_speakers", self.http.get(url)).await
    }

    async fn refresh_discovery(&self) -> TransportResult<String> {
        let url = self.endpoint(&["speakers", "refresh"]);
        self.fetch_text("refresh_discovery", self.http.post(url))
            .await
    }

    async fn get_speaker(&self, mac: &MacAddress) -> TransportResult<Speaker> {
        let url = self.endpoint(&["speakers", mac.as_str()]);
        self.fetch_json("get_speaker", self.http.get(url)).await
    }

    async fn list_groups(&self) -> TransportResult<Vec<Group>> {
        let url = self.endpoint(&["groups"]);
        self.fetch_json("list_groups", self.http.get(url)).await
    }

    async fn get_group(&self, name: &GroupName) -> TransportResult<Group> {
        let url = self.endpoint(&["groups", name.as_str()]);
        self.fetch_json("get_group", self.http.get(url)).await
    }

    async fn grouped_speakers(&self) -> TransportResult<GroupedSpeakers> {
        let url = self.endpoint(&["groups", "organize"]);
        self.fetch_json("grouped_speakers", self.http.get(url))
            .await
    }

    async fn create_group(&self, request: &CreateGroupRequest) -> TransportResult<Group> {
        let url = self.endpoint(&["groups"]);
        self.fetch_json("create_group", self.http.post(url).json(request))
            .await
    }

    async fn delete_group(&self, name: &GroupName) -> TransportResult<String> {
        let url = self.endpoint(&["groups", name.as_str()]);
        self.fetch_text("delete_group", self.http.delete(url)).await
    }

    async fn sync_group(&self, name: &GroupName) -> TransportResult<String> {
        let url = self.endpoint(&["groups", name.as_str(), "sync"]);
        self.fetch_text("sync_group", self.http.post(url)).await
    }

    async fn play_on_speaker(
        &self,
        mac: &MacAddress,
        track_id: TrackId,
    ) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "play"]);
        self.fetch_text(
            "play_on_speaker",
            self.http.post(url).json(&PlayRequest { track_id }),
        )
        .await
    }

    async fn play_on_group(&self, name: &GroupName, track_id: TrackId) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "groups", name.as_str(), "play"]);
        self.fetch_text(
            "play_on_group",
            self.http.post(url).json(&PlayRequest { track_id }),
        )
        .await
    }

    async fn pause_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "pause"]);
        self.fetch_text("pause_speaker", self.http.post(url)).await
    }

    async fn pause_group(&self, name: &GroupName) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "groups", name.as_str(), "pause"]);
        self.fetch_text("pause_group", self.http.post(url)).await
    }

    async fn resume_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "resume"]);
        self.fetch_text("resume_speaker", self.http.post(url)).await
    }

    async fn resume_group(&self, name: &GroupName) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "groups", name.as_str(), "resume"]);
        self.fetch_text("resume_group", self.http.post(url)).await
    }

    async fn stop_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "stop"]);
        self.fetch_text("stop_speaker", self.http.post(url)).await
    }

    async fn set_speaker_volume(
        &self,
        mac: &MacAddress,
        volume: Volume,
    ) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "volume"]);
        self.fetch_text(
            "set_speaker_volume",
            self.http.put(url).json(&VolumeRequest { volume }),
        )
        .await
    }

    async fn set_group_volume(&self, name: &GroupName, volume: Volume) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "groups", name.as_str(), "volume"]);
        self.fetch_text(
            "set_group_volume",
            self.http.put(url).json(&VolumeRequest { volume }),
        )
        .await
    }

    async fn seek_speaker(&self, mac: &MacAddress, seconds: u32) -> TransportResult<String> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "seek"]);
        self.fetch_text(
            "seek_speaker",
            self.http.put(url).json(&SeekRequest { seconds }),
        )
        .await
    }

    async fn playback_state(&self, mac: &MacAddress) -> TransportResult<PlaybackState> {
        let url = self.endpoint(&["playback", "speakers", mac.as_str(), "state"]);
        self.fetch_json("playback_state", self.http.get(url)).await
    }

    async fn list_tracks(&self) -> TransportResult<Vec<Track>> {
        let url = self.endpoint(&["library", "tracks"]);
        self.fetch_json("list_tracks", self.http.get(url)).await
    }

    async fn get_track(&self, id: TrackId) -> TransportResult<Track> {
        let id = id.to_string();
        let url = self.endpoint(&["library", "tracks", &id]);
        self.fetch_json("get_track", self.http.get(url)).await
    }

    async fn search_tracks(&self, query: &str) -> TransportResult<Vec<Track>> {
        let url = self.endpoint(&["library", "search"]);
        let query = SearchQuery {
            query: query.to_string(),
        };
        self.fetch_json("search_tracks", self.http.get(url).query(&query))
            .await
    }

    async fn scan_library(&self) -> TransportResult<String> {
        let url = self.endpoint(&["library", "scan"]);
        self.fetch_text("scan_library", self.http.post(url)).await
    }

    async fn library_directory(&self) -> TransportResult<String> {
        let url = self.endpoint(&["library", "config", "directory"]);
        self.fetch_text("library_directory", self.http.get(url))
            .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
