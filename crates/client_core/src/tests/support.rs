//! In-process stand-ins for the backend used across the unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{
        Group, GroupName, MacAddress, PlaybackState, PlaybackStatus, Speaker, SpeakerStatus,
        Track, TrackId, Volume,
    },
    protocol::{
        CreateGroupRequest, GroupedSpeakers, PlayRequest, SearchQuery, SeekRequest, VolumeRequest,
    },
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    error::TransportError,
    transport::{MultiroomApi, TransportResult},
};

pub(crate) fn speaker(mac: &str, name: &str) -> Speaker {
    Speaker {
        mac_address: MacAddress::from(mac),
        name: Some(name.to_string()),
        model: Some("WAM750".to_string()),
        ip_address: Some("192.168.1.10".to_string()),
        volume: Volume::new(50).expect("volume"),
        status: SpeakerStatus::Stopped,
        current_track: None,
        connected: true,
        master: false,
        group_members: Vec::new(),
        position: 0,
    }
}

pub(crate) fn track(id: i64, title: &str, artist: &str) -> Track {
    Track {
        id: TrackId(id),
        title: title.to_string(),
        artist: Some(artist.to_string()),
        album: Some("Greatest Hits".to_string()),
        duration: 180 + id as u32,
        uri: None,
        album_art: None,
    }
}

pub(crate) fn group(name: &str, members: &[&str]) -> Group {
    Group {
        name: GroupName::from(name),
        members: members.iter().map(|mac| MacAddress::from(*mac)).collect(),
        playing: false,
        volume: Some(50),
    }
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct BackendState {
    pub speakers: Vec<Speaker>,
    pub groups: Vec<Group>,
    pub tracks: Vec<Track>,
    pub playback: HashMap<MacAddress, PlaybackState>,
    pub requests: Vec<String>,
    pub bodies: Vec<serde_json::Value>,
    pub fail_with: Option<StatusCode>,
}

type Shared = Arc<Mutex<BackendState>>;

pub(crate) struct MockBackend {
    pub api_url: String,
    pub state: Shared,
}

impl MockBackend {
    pub async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }

    pub async fn fail_with(&self, status: Option<StatusCode>) {
        self.state.lock().await.fail_with = status;
    }
}

/// Serves `app` on an ephemeral local port and returns its `/api` root.
pub(crate) async fn spawn_router(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

pub(crate) async fn spawn_backend(initial: BackendState) -> MockBackend {
    let state: Shared = Arc::new(Mutex::new(initial));

    let app = Router::new()
        .route("/api/speakers", get(list_speakers))
        .route("/api/speakers/refresh", post(refresh_discovery))
        .route("/api/speakers/:mac", get(get_speaker))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/organize", get(grouped_speakers))
        .route("/api/groups/:name", get(get_group).delete(delete_group))
        .route("/api/groups/:name/sync", post(sync_group))
        .route(
            "/api/playback/:kind/:target/:action",
            get(playback_state).post(playback_action).put(playback_setting),
        )
        .route("/api/library/tracks", get(list_tracks))
        .route("/api/library/tracks/:id", get(get_track))
        .route("/api/library/search", get(search_tracks))
        .route("/api/library/scan", post(scan_library))
        .route("/api/library/config/directory", get(library_directory))
        .with_state(state.clone());

    MockBackend {
        api_url: spawn_router(app).await,
        state,
    }
}

async fn enter(
    state: &Shared,
    line: String,
) -> Result<tokio::sync::MutexGuard<'_, BackendState>, StatusCode> {
    let mut guard = state.lock().await;
    guard.requests.push(line);
    match guard.fail_with {
        Some(status) => Err(status),
        None => Ok(guard),
    }
}

async fn list_speakers(State(state): State<Shared>) -> Result<Json<Vec<Speaker>>, StatusCode> {
    let guard = enter(&state, "GET /speakers".into()).await?;
    Ok(Json(guard.speakers.clone()))
}

async fn refresh_discovery(State(state): State<Shared>) -> Result<&'static str, StatusCode> {
    enter(&state, "POST /speakers/refresh".into()).await?;
    Ok("Device discovery refreshed")
}

async fn get_speaker(
    State(state): State<Shared>,
    Path(mac): Path<String>,
) -> Result<Json<Speaker>, StatusCode> {
    let guard = enter(&state, format!("GET /speakers/{mac}")).await?;
    guard
        .speakers
        .iter()
        .find(|speaker| speaker.mac_address.as_str() == mac)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_groups(State(state): State<Shared>) -> Result<Json<Vec<Group>>, StatusCode> {
    let guard = enter(&state, "GET /groups".into()).await?;
    Ok(Json(guard.groups.clone()))
}

async fn grouped_speakers(
    State(state): State<Shared>,
) -> Result<Json<GroupedSpeakers>, StatusCode> {
    let guard = enter(&state, "GET /groups/organize".into()).await?;
    let mut grouped: HashMap<GroupName, Vec<Speaker>> = HashMap::new();
    let mut ungrouped = Vec::new();
    for speaker in &guard.speakers {
        match guard
            .groups
            .iter()
            .find(|group| group.members.contains(&speaker.mac_address))
        {
            Some(group) => grouped
                .entry(group.name.clone())
                .or_default()
                .push(speaker.clone()),
            None => ungrouped.push(speaker.clone()),
        }
    }
    Ok(Json(GroupedSpeakers {
        all_groups: guard.groups.clone(),
        grouped,
        ungrouped: (!ungrouped.is_empty()).then_some(ungrouped),
    }))
}

async fn get_group(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<Json<Group>, StatusCode> {
    let guard = enter(&state, format!("GET /groups/{name}")).await?;
    guard
        .groups
        .iter()
        .find(|group| group.name.as_str() == name)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_group(
    State(state): State<Shared>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<Group>, StatusCode> {
    let mut guard = enter(&state, "POST /groups".into()).await?;
    if guard.groups.iter().any(|group| group.name == request.name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let group = Group {
        name: request.name,
        members: request.speakers,
        playing: false,
        volume: Some(50),
    };
    guard.groups.push(group.clone());
    Ok(Json(group))
}

async fn delete_group(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<&'static str, StatusCode> {
    let mut guard = enter(&state, format!("DELETE /groups/{name}")).await?;
    let before = guard.groups.len();
    guard.groups.retain(|group| group.name.as_str() != name);
    if guard.groups.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok("Group deleted successfully")
}

async fn sync_group(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<&'static str, StatusCode> {
    enter(&state, format!("POST /groups/{name}/sync")).await?;
    Ok("Group playback synced successfully")
}

async fn playback_state(
    State(state): State<Shared>,
    Path((kind, target, action)): Path<(String, String, String)>,
) -> Result<Json<PlaybackState>, StatusCode> {
    let guard = enter(&state, format!("GET /playback/{kind}/{target}/{action}")).await?;
    if kind != "speakers" || action != "state" {
        return Err(StatusCode::NOT_FOUND);
    }
    guard
        .playback
        .get(&MacAddress::new(target))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn playback_action(
    State(state): State<Shared>,
    Path((kind, target, action)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    let mut guard = enter(&state, format!("POST /playback/{kind}/{target}/{action}")).await?;
    let status = match action.as_str() {
        "play" => {
            let request: PlayRequest =
                serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
            guard
                .bodies
                .push(serde_json::to_value(request).map_err(|_| StatusCode::BAD_REQUEST)?);
            PlaybackStatus::Playing
        }
        "pause" => PlaybackStatus::Paused,
        "resume" => PlaybackStatus::Playing,
        "stop" if kind == "speakers" => PlaybackStatus::Stopped,
        _ => return Err(StatusCode::NOT_FOUND),
    };
    if kind == "speakers" {
        let entry = guard.playback.entry(MacAddress::new(target)).or_default();
        entry.status = status;
    }
    Ok("ok")
}

async fn playback_setting(
    State(state): State<Shared>,
    Path((kind, target, action)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    let mut guard = enter(&state, format!("PUT /playback/{kind}/{target}/{action}")).await?;
    let value = match action.as_str() {
        "volume" => {
            let request: VolumeRequest =
                serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
            serde_json::to_value(request)
        }
        "seek" if kind == "speakers" => {
            let request: SeekRequest =
                serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
            serde_json::to_value(request)
        }
        _ => return Err(StatusCode::NOT_FOUND),
    }
    .map_err(|_| StatusCode::BAD_REQUEST)?;
    guard.bodies.push(value);
    Ok("ok")
}

async fn list_tracks(State(state): State<Shared>) -> Result<Json<Vec<Track>>, StatusCode> {
    let guard = enter(&state, "GET /library/tracks".into()).await?;
    Ok(Json(guard.tracks.clone()))
}

async fn get_track(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<Json<Track>, StatusCode> {
    let guard = enter(&state, format!("GET /library/tracks/{id}")).await?;
    guard
        .tracks
        .iter()
        .find(|track| track.id == TrackId(id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn search_tracks(
    State(state): State<Shared>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Track>>, StatusCode> {
    let guard = enter(&state, format!("GET /library/search?query={}", query.query)).await?;
    let needle = query.query.to_lowercase();
    let matches = guard
        .tracks
        .iter()
        .filter(|track| {
            track.title.to_lowercase().contains(&needle)
                || track
                    .artist
                    .as_deref()
                    .is_some_and(|artist| artist.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    Ok(Json(matches))
}

async fn scan_library(State(state): State<Shared>) -> Result<String, StatusCode> {
    let guard = enter(&state, "POST /library/scan".into()).await?;
    Ok(format!(
        "Scanned directory. {} new tracks added to library.",
        guard.tracks.len()
    ))
}

async fn library_directory(State(state): State<Shared>) -> Result<&'static str, StatusCode> {
    enter(&state, "GET /library/config/directory".into()).await?;
    Ok("/srv/music")
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// Scriptable [`MultiroomApi`] that records calls and hands out queued results.
/// Reads fall back to the configured collections once their queue is empty.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub calls: std::sync::Mutex<Vec<String>>,
    pub speakers: std::sync::Mutex<Vec<Speaker>>,
    pub groups: std::sync::Mutex<Vec<Group>>,
    pub tracks: std::sync::Mutex<Vec<Track>>,
    pub playback: std::sync::Mutex<HashMap<MacAddress, PlaybackState>>,
    pub speaker_results: std::sync::Mutex<VecDeque<TransportResult<Vec<Speaker>>>>,
    pub fail_mutations: std::sync::Mutex<Option<TransportError>>,
    pub fail_reads: std::sync::Mutex<Option<TransportError>>,
    /// Held while a `list_speakers` call is in flight so tests can interleave.
    pub speaker_gate: Mutex<()>,
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|entry| entry.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls").push(call.into());
    }

    fn read<T>(&self, call: impl Into<String>, value: impl FnOnce() -> T) -> TransportResult<T> {
        self.record(call);
        match self.fail_reads.lock().expect("fail").clone() {
            Some(err) => Err(err),
            None => Ok(value()),
        }
    }

    fn mutate(&self, call: impl Into<String>) -> TransportResult<String> {
        self.record(call);
        match self.fail_mutations.lock().expect("fail").clone() {
            Some(err) => Err(err),
            None => Ok("ok".to_string()),
        }
    }
}

#[async_trait]
impl MultiroomApi for FakeApi {
    async fn list_speakers(&self) -> TransportResult<Vec<Speaker>> {
        let _gate = self.speaker_gate.lock().await;
        let scripted = self.speaker_results.lock().expect("results").pop_front();
        if let Some(result) = scripted {
            self.record("list_speakers");
            return result;
        }
        self.read("list_speakers", || {
            self.speakers.lock().expect("speakers").clone()
        })
    }

    async fn refresh_discovery(&self) -> TransportResult<String> {
        self.mutate("refresh_discovery")
    }

    async fn get_speaker(&self, mac: &MacAddress) -> TransportResult<Speaker> {
        self.record(format!("get_speaker {mac}"));
        self.speakers
            .lock()
            .expect("speakers")
            .iter()
            .find(|speaker| &speaker.mac_address == mac)
            .cloned()
            .ok_or_else(|| TransportError::status(404, "Not Found"))
    }

    async fn list_groups(&self) -> TransportResult<Vec<Group>> {
        self.read("list_groups", || self.groups.lock().expect("groups").clone())
    }

    async fn get_group(&self, name: &GroupName) -> TransportResult<Group> {
        self.record(format!("get_group {name}"));
        self.groups
            .lock()
            .expect("groups")
            .iter()
            .find(|group| &group.name == name)
            .cloned()
            .ok_or_else(|| TransportError::status(404, "Not Found"))
    }

    async fn grouped_speakers(&self) -> TransportResult<GroupedSpeakers> {
        self.read("grouped_speakers", || GroupedSpeakers {
            all_groups: self.groups.lock().expect("groups").clone(),
            ..GroupedSpeakers::default()
        })
    }

    async fn create_group(&self, request: &CreateGroupRequest) -> TransportResult<Group> {
        self.mutate(format!("create_group {}", request.name))?;
        let group = Group {
            name: request.name.clone(),
            members: request.speakers.clone(),
            playing: false,
            volume: None,
        };
        self.groups.lock().expect("groups").push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, name: &GroupName) -> TransportResult<String> {
        let ack = self.mutate(format!("delete_group {name}"))?;
        self.groups
            .lock()
            .expect("groups")
            .retain(|group| &group.name != name);
        Ok(ack)
    }

    async fn sync_group(&self, name: &GroupName) -> TransportResult<String> {
        self.mutate(format!("sync_group {name}"))
    }

    async fn play_on_speaker(
        &self,
        mac: &MacAddress,
        track_id: TrackId,
    ) -> TransportResult<String> {
        self.mutate(format!("play_on_speaker {mac} {track_id}"))
    }

    async fn play_on_group(&self, name: &GroupName, track_id: TrackId) -> TransportResult<String> {
        self.mutate(format!("play_on_group {name} {track_id}"))
    }

    async fn pause_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        self.mutate(format!("pause_speaker {mac}"))
    }

    async fn pause_group(&self, name: &GroupName) -> TransportResult<String> {
        self.mutate(format!("pause_group {name}"))
    }

    async fn resume_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        self.mutate(format!("resume_speaker {mac}"))
    }

    async fn resume_group(&self, name: &GroupName) -> TransportResult<String> {
        self.mutate(format!("resume_group {name}"))
    }

    async fn stop_speaker(&self, mac: &MacAddress) -> TransportResult<String> {
        self.mutate(format!("stop_speaker {mac}"))
    }

    async fn set_speaker_volume(
        &self,
        mac: &MacAddress,
        volume: Volume,
    ) -> TransportResult<String> {
        self.mutate(format!("set_speaker_volume {mac} {}", volume.get()))
    }

    async fn set_group_volume(&self, name: &GroupName, volume: Volume) -> TransportResult<String> {
        self.mutate(format!("set_group_volume {name} {}", volume.get()))
    }

    async fn seek_speaker(&self, mac: &MacAddress, seconds: u32) -> TransportResult<String> {
        self.mutate(format!("seek_speaker {mac} {seconds}"))
    }

    async fn playback_state(&self, mac: &MacAddress) -> TransportResult<PlaybackState> {
        self.read(format!("playback_state {mac}"), || {
            self.playback
                .lock()
                .expect("playback")
                .get(mac)
                .cloned()
                .unwrap_or_default()
        })
    }

    async fn list_tracks(&self) -> TransportResult<Vec<Track>> {
        self.read("list_tracks", || self.tracks.lock().expect("tracks").clone())
    }

    async fn get_track(&self, id: TrackId) -> TransportResult<Track> {
        self.record(format!("get_track {id}"));
        self.tracks
            .lock()
            .expect("tracks")
            .iter()
            .find(|track| track.id == id)
            .cloned()
            .ok_or_else(|| TransportError::status(404, "Not Found"))
    }

    async fn search_tracks(&self, query: &str) -> TransportResult<Vec<Track>> {
        let needle = query.to_lowercase();
        self.read(format!("search_tracks {query}"), || {
            self.tracks
                .lock()
                .expect("tracks")
                .iter()
                .filter(|track| track.title.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        })
    }

    async fn scan_library(&self) -> TransportResult<String> {
        self.mutate("scan_library")
    }

    async fn library_directory(&self) -> TransportResult<String> {
        self.read("library_directory", || "/srv/music".to_string())
    }
}
