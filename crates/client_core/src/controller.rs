//! Maps user intents and poll ticks onto transport calls, store updates and render
//! signals.
//!
//! Each section (speakers, groups, library) has its own load bookkeeping: a state
//! (`Idle -> Loading -> Loaded | Failed`), an in-flight marker and a generation number.
//! Periodic ticks skip a section that is already loading. Explicit refreshes always
//! start a new generation, and a response is only applied if its generation is still
//! the latest one for that section. A failed load never touches the store.
//!
//! The in-flight marker is a weak handle to a token owned by the running load, so a
//! load whose future is dropped mid-request stops counting as in flight.

use std::{
    collections::BTreeSet,
    future::Future,
    sync::{Arc, Weak},
};

use shared::{
    domain::{
        Group, GroupName, MacAddress, PlaybackState, PlaybackTarget, Speaker, Track, TrackId,
        Volume,
    },
    error::ValidationError,
    protocol::CreateGroupRequest,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    notifications::{Notification, NotificationKind, NotificationQueue},
    store::ViewModelStore,
    transport::{MultiroomApi, TransportResult},
    view::{self, format_time, SectionView},
};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Speakers,
    Groups,
    Library,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Speakers, Section::Groups, Section::Library];

    fn index(self) -> usize {
        match self {
            Section::Speakers => 0,
            Section::Groups => 1,
            Section::Library => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Speakers => "speakers",
            Section::Groups => "groups",
            Section::Library => "library",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    Speakers,
    Groups,
    Library,
}

impl View {
    pub fn section(self) -> Option<Section> {
        match self {
            View::Dashboard => None,
            View::Speakers => Some(Section::Speakers),
            View::Groups => Some(Section::Groups),
            View::Library => Some(Section::Library),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SectionState {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// `message` is the user-facing text, `detail` the transport error.
    Failed { message: String, detail: String },
}

/// Which query produced the tracks currently held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackQuery {
    #[default]
    Library,
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Explicit,
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load for the same section started while this one was in flight.
    Superseded,
    /// Nothing was requested (tick while loading, hidden section, no focus).
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    SectionLoading(Section),
    RenderSection(Section),
    RenderSectionError { section: Section, message: String },
    RenderPlayback,
    RenderPlaybackError(String),
    Notification(Notification),
}

#[derive(Debug, Default)]
struct SectionSlot {
    state: SectionState,
    generation: u64,
    in_flight: Weak<()>,
}

impl SectionSlot {
    fn is_in_flight(&self) -> bool {
        self.in_flight.strong_count() > 0
    }
}

/// Held by a running section load for as long as its future is alive.
struct LoadTicket {
    generation: u64,
    query: TrackQuery,
    _in_flight: Arc<()>,
}

struct ControllerState {
    view: View,
    focus: Option<PlaybackTarget>,
    /// Query behind the tracks currently in the store.
    track_query: TrackQuery,
    sections: [SectionSlot; 3],
    playback_generation: u64,
    selection: BTreeSet<MacAddress>,
    notifications: NotificationQueue,
}

impl ControllerState {
    fn slot(&self, section: Section) -> &SectionSlot {
        &self.sections[section.index()]
    }

    fn slot_mut(&mut self, section: Section) -> &mut SectionSlot {
        &mut self.sections[section.index()]
    }
}

pub struct Controller {
    api: Arc<dyn MultiroomApi>,
    store: RwLock<ViewModelStore>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Controller {
    pub fn new(api: Arc<dyn MultiroomApi>) -> Arc<Self> {
        Self::with_notification_capacity(api, DEFAULT_NOTIFICATION_CAPACITY)
    }

    pub fn with_notification_capacity(
        api: Arc<dyn MultiroomApi>,
        notification_capacity: usize,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            store: RwLock::new(ViewModelStore::new()),
            inner: Mutex::new(ControllerState {
                view: View::default(),
                focus: None,
                track_query: TrackQuery::default(),
                sections: Default::default(),
                playback_generation: 0,
                selection: BTreeSet::new(),
                notifications: NotificationQueue::new(notification_capacity),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ViewModelStore {
        self.store.read().await.snapshot()
    }

    pub async fn section_state(&self, section: Section) -> SectionState {
        self.inner.lock().await.slot(section).state.clone()
    }

    pub async fn current_view(&self) -> View {
        self.inner.lock().await.view
    }

    pub async fn focused_target(&self) -> Option<PlaybackTarget> {
        self.inner.lock().await.focus.clone()
    }

    pub async fn track_query(&self) -> TrackQuery {
        self.inner.lock().await.track_query.clone()
    }

    pub async fn section_view(&self, section: Section) -> SectionView {
        let guard = self.inner.lock().await;
        let store = self.store.read().await;
        view::section_view(
            &store,
            section,
            &guard.slot(section).state,
            &guard.track_query,
        )
    }

    pub async fn drain_notifications(&self) -> Vec<Notification> {
        self.inner.lock().await.notifications.drain()
    }

    pub async fn latest_notification(&self) -> Option<Notification> {
        self.inner
            .lock()
            .await
            .notifications
            .latest(chrono::Utc::now())
            .cloned()
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    async fn notify(&self, kind: NotificationKind, message: impl Into<String>) {
        let notification = Notification::new(kind, message);
        self.inner
            .lock()
            .await
            .notifications
            .push(notification.clone());
        self.emit(ControllerEvent::Notification(notification));
    }

    // -----------------------------------------------------------------------
    // Section loading
    // -----------------------------------------------------------------------

    /// Loads every section once, concurrently.
    pub async fn initialize(&self) {
        let (speakers, groups, library) = futures::join!(
            self.refresh_section(Section::Speakers, Trigger::Explicit),
            self.refresh_section(Section::Groups, Trigger::Explicit),
            self.refresh_section(Section::Library, Trigger::Explicit),
        );
        for (section, result) in Section::ALL.into_iter().zip([speakers, groups, library]) {
            if let Err(err) = result {
                warn!(section = section.name(), %err, "initial load failed");
            }
        }
    }

    pub async fn switch_view(&self, view: View) -> TransportResult<LoadOutcome> {
        self.inner.lock().await.view = view;
        info!(?view, "switched view");
        match view.section() {
            Some(section) => self.refresh_section(section, Trigger::Explicit).await,
            None => Ok(LoadOutcome::Skipped),
        }
    }

    /// One tick of the periodic refresh; only the speakers view is polled.
    pub async fn poll_tick(&self) -> TransportResult<LoadOutcome> {
        if self.current_view().await != View::Speakers {
            return Ok(LoadOutcome::Skipped);
        }
        self.refresh_section(Section::Speakers, Trigger::Periodic)
            .await
    }

    pub async fn refresh_section(
        &self,
        section: Section,
        trigger: Trigger,
    ) -> TransportResult<LoadOutcome> {
        let query = self.track_query().await;
        self.load_section(section, trigger, query).await
    }

    /// `query` only matters for the library; it becomes the current track query once
    /// its results are applied.
    async fn load_section(
        &self,
        section: Section,
        trigger: Trigger,
        query: TrackQuery,
    ) -> TransportResult<LoadOutcome> {
        let Some(ticket) = self.begin_load(section, trigger, query).await else {
            return Ok(LoadOutcome::Skipped);
        };

        match section {
            Section::Speakers => {
                let result = self.api.list_speakers().await;
                self.finish_load(section, ticket, result, ViewModelStore::apply_speakers)
                    .await
            }
            Section::Groups => {
                let result = self
                    .api
                    .grouped_speakers()
                    .await
                    .map(|grouped| grouped.all_groups);
                self.finish_load(section, ticket, result, ViewModelStore::apply_groups)
                    .await
            }
            Section::Library => {
                let result = match &ticket.query {
                    TrackQuery::Library => self.api.list_tracks().await,
                    TrackQuery::Search(query) => self.api.search_tracks(query).await,
                };
                self.finish_load(section, ticket, result, ViewModelStore::apply_tracks)
                    .await
            }
        }
    }

    async fn begin_load(
        &self,
        section: Section,
        trigger: Trigger,
        query: TrackQuery,
    ) -> Option<LoadTicket> {
        let ticket = {
            let mut guard = self.inner.lock().await;
            let slot = guard.slot_mut(section);
            if trigger == Trigger::Periodic && slot.is_in_flight() {
                debug!(section = section.name(), "skipping tick, load already in flight");
                return None;
            }
            let token = Arc::new(());
            slot.generation += 1;
            slot.in_flight = Arc::downgrade(&token);
            slot.state = SectionState::Loading;
            LoadTicket {
                generation: slot.generation,
                query,
                _in_flight: token,
            }
        };
        debug!(
            section = section.name(),
            generation = ticket.generation,
            ?trigger,
            "loading section"
        );
        self.emit(ControllerEvent::SectionLoading(section));
        Some(ticket)
    }

    async fn finish_load<T>(
        &self,
        section: Section,
        ticket: LoadTicket,
        result: TransportResult<T>,
        apply: fn(&mut ViewModelStore, T),
    ) -> TransportResult<LoadOutcome> {
        let mut guard = self.inner.lock().await;
        let slot = guard.slot_mut(section);
        if slot.generation != ticket.generation {
            debug!(
                section = section.name(),
                generation = ticket.generation,
                latest = slot.generation,
                "discarding stale response"
            );
            return Ok(LoadOutcome::Superseded);
        }
        slot.in_flight = Weak::new();

        match result {
            Ok(value) => {
                apply(&mut *self.store.write().await, value);
                slot.state = SectionState::Loaded;
                if section == Section::Library {
                    guard.track_query = ticket.query;
                }
                drop(guard);
                self.emit(ControllerEvent::RenderSection(section));
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                let message = view::failure_message(section, &ticket.query).to_string();
                slot.state = SectionState::Failed {
                    message: message.clone(),
                    detail: err.to_string(),
                };
                drop(guard);
                warn!(section = section.name(), %err, "section load failed");
                self.emit(ControllerEvent::RenderSectionError { section, message });
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Speakers
    // -----------------------------------------------------------------------

    /// Asks the backend to rediscover devices, then reloads the speakers section.
    pub async fn refresh_devices(&self) -> Result<(), ClientError> {
        info!("refreshing device discovery");
        if let Err(err) = self.api.refresh_discovery().await {
            self.notify(NotificationKind::Error, "Failed to refresh devices")
                .await;
            return Err(err.into());
        }
        if let Err(err) = self
            .refresh_section(Section::Speakers, Trigger::Explicit)
            .await
        {
            debug!(%err, "speaker reload after discovery failed");
        }
        self.notify(NotificationKind::Success, "Devices refreshed successfully")
            .await;
        Ok(())
    }

    /// Fetches one speaker without touching the store.
    pub async fn inspect_speaker(&self, mac: &MacAddress) -> TransportResult<Speaker> {
        self.api.get_speaker(mac).await
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Toggles `mac` in the pending group selection, returning whether it is now selected.
    pub async fn toggle_selection(&self, mac: MacAddress) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.selection.remove(&mac) {
            false
        } else {
            guard.selection.insert(mac);
            true
        }
    }

    pub async fn selected_speakers(&self) -> Vec<MacAddress> {
        self.inner.lock().await.selection.iter().cloned().collect()
    }

    /// Creates a group from the current selection and clears it on success.
    pub async fn create_group_from_selection(&self, name: &str) -> Result<Group, ClientError> {
        let members = self.selected_speakers().await;
        let group = self.create_group(name, members).await?;
        self.inner.lock().await.selection.clear();
        Ok(group)
    }

    pub async fn create_group(
        &self,
        name: &str,
        members: Vec<MacAddress>,
    ) -> Result<Group, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(ValidationError::EmptyGroupName).await);
        }
        if members.is_empty() {
            return Err(self.reject(ValidationError::EmptyGroupMembers).await);
        }

        info!(group = name, members = members.len(), "creating speaker group");
        let request = CreateGroupRequest {
            name: GroupName::from(name),
            speakers: members,
        };
        match self.api.create_group(&request).await {
            Ok(group) => {
                self.reload_groups_after_mutation().await;
                self.notify(
                    NotificationKind::Success,
                    format!("Group \"{name}\" created successfully"),
                )
                .await;
                Ok(group)
            }
            Err(err) => {
                self.notify(NotificationKind::Error, "Failed to create group")
                    .await;
                Err(err.into())
            }
        }
    }

    pub async fn delete_group(&self, name: &GroupName) -> Result<(), ClientError> {
        info!(group = %name, "deleting speaker group");
        match self.api.delete_group(name).await {
            Ok(_) => {
                self.reload_groups_after_mutation().await;
                self.notify(NotificationKind::Success, format!("Group {name} deleted"))
                    .await;
                Ok(())
            }
            Err(err) => {
                self.notify(NotificationKind::Error, "Failed to delete group")
                    .await;
                Err(err.into())
            }
        }
    }

    pub async fn sync_group(&self, name: &GroupName) -> Result<(), ClientError> {
        let target = PlaybackTarget::Group(name.clone());
        self.playback_command(
            &target,
            format!("Group {name} synced"),
            "Failed to sync group",
            self.api.sync_group(name),
        )
        .await
    }

    pub async fn inspect_group(&self, name: &GroupName) -> TransportResult<Group> {
        self.api.get_group(name).await
    }

    async fn reload_groups_after_mutation(&self) {
        if let Err(err) = self
            .refresh_section(Section::Groups, Trigger::Explicit)
            .await
        {
            debug!(%err, "groups reload after mutation failed");
        }
    }

    async fn reject(&self, err: ValidationError) -> ClientError {
        debug!(%err, "rejected input before issuing request");
        self.notify(NotificationKind::Error, err.to_string()).await;
        ClientError::Validation(err)
    }

    // -----------------------------------------------------------------------
    // Library
    // -----------------------------------------------------------------------

    /// Searches the library; a blank query reloads the full library instead. The query
    /// only becomes [`Controller::track_query`] once its results are applied.
    pub async fn search_tracks(&self, query: &str) -> TransportResult<LoadOutcome> {
        let query = query.trim();
        let query = if query.is_empty() {
            TrackQuery::Library
        } else {
            TrackQuery::Search(query.to_string())
        };
        self.load_section(Section::Library, Trigger::Explicit, query)
            .await
    }

    /// Reloads the full library, dropping any active search.
    pub async fn load_library(&self) -> TransportResult<LoadOutcome> {
        self.search_tracks("").await
    }

    pub async fn scan_library(&self) -> Result<String, ClientError> {
        info!("scanning music library");
        match self.api.scan_library().await {
            Ok(summary) => {
                if self.track_query().await == TrackQuery::Library {
                    if let Err(err) = self
                        .refresh_section(Section::Library, Trigger::Explicit)
                        .await
                    {
                        debug!(%err, "library reload after scan failed");
                    }
                }
                self.notify(NotificationKind::Success, summary.clone()).await;
                Ok(summary)
            }
            Err(err) => {
                self.notify(NotificationKind::Error, "Failed to scan music library")
                    .await;
                Err(err.into())
            }
        }
    }

    pub async fn library_directory(&self) -> TransportResult<String> {
        self.api.library_directory().await
    }

    pub async fn inspect_track(&self, id: TrackId) -> TransportResult<Track> {
        self.api.get_track(id).await
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Changes the focused target and loads its playback state; `None` clears it.
    pub async fn focus(&self, target: Option<PlaybackTarget>) -> TransportResult<LoadOutcome> {
        self.inner.lock().await.focus = target.clone();
        if target.is_none() {
            self.store.write().await.clear_playback();
            self.emit(ControllerEvent::RenderPlayback);
            return Ok(LoadOutcome::Skipped);
        }
        self.refresh_playback().await
    }

    pub async fn refresh_playback(&self) -> TransportResult<LoadOutcome> {
        let (target, generation) = {
            let mut guard = self.inner.lock().await;
            let Some(target) = guard.focus.clone() else {
                return Ok(LoadOutcome::Skipped);
            };
            guard.playback_generation += 1;
            (target, guard.playback_generation)
        };

        let result = self.fetch_playback_state(&target).await;

        let guard = self.inner.lock().await;
        if guard.playback_generation != generation || guard.focus.as_ref() != Some(&target) {
            debug!(%target, generation, "discarding stale playback state");
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(state) => {
                self.store
                    .write()
                    .await
                    .apply_playback_state(target, state);
                drop(guard);
                self.emit(ControllerEvent::RenderPlayback);
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                drop(guard);
                warn!(%target, %err, "playback state refresh failed");
                self.emit(ControllerEvent::RenderPlaybackError(err.to_string()));
                Err(err)
            }
        }
    }

    /// The backend only reports per-speaker state; a group reads its first member.
    async fn fetch_playback_state(
        &self,
        target: &PlaybackTarget,
    ) -> TransportResult<PlaybackState> {
        match target {
            PlaybackTarget::Speaker(mac) => self.api.playback_state(mac).await,
            PlaybackTarget::Group(name) => {
                let known = self.store.read().await.group(name).cloned();
                let group = match known {
                    Some(group) => group,
                    None => self.api.get_group(name).await?,
                };
                match group.members.first() {
                    Some(mac) => self.api.playback_state(mac).await,
                    None => Ok(PlaybackState::default()),
                }
            }
        }
    }

    pub async fn play(
        &self,
        target: &PlaybackTarget,
        track_id: TrackId,
    ) -> Result<(), ClientError> {
        let success = match target {
            PlaybackTarget::Speaker(mac) => {
                format!("Playing track on {}", self.speaker_label(mac).await)
            }
            PlaybackTarget::Group(name) => format!("Playing on group {name}"),
        };
        let call = async {
            match target {
                PlaybackTarget::Speaker(mac) => self.api.play_on_speaker(mac, track_id).await,
                PlaybackTarget::Group(name) => self.api.play_on_group(name, track_id).await,
            }
        };
        self.playback_command(target, success, "Failed to play track", call)
            .await
    }

    pub async fn pause(&self, target: &PlaybackTarget) -> Result<(), ClientError> {
        let success = format!("Paused on {}", self.target_label(target).await);
        let call = async {
            match target {
                PlaybackTarget::Speaker(mac) => self.api.pause_speaker(mac).await,
                PlaybackTarget::Group(name) => self.api.pause_group(name).await,
            }
        };
        self.playback_command(target, success, "Failed to pause track", call)
            .await
    }

    pub async fn resume(&self, target: &PlaybackTarget) -> Result<(), ClientError> {
        let success = format!("Resumed on {}", self.target_label(target).await);
        let call = async {
            match target {
                PlaybackTarget::Speaker(mac) => self.api.resume_speaker(mac).await,
                PlaybackTarget::Group(name) => self.api.resume_group(name).await,
            }
        };
        self.playback_command(target, success, "Failed to resume playback", call)
            .await
    }

    /// Groups have no stop command on the backend; stop is speaker-only.
    pub async fn stop(&self, mac: &MacAddress) -> Result<(), ClientError> {
        let target = PlaybackTarget::Speaker(mac.clone());
        let success = format!("Stopped on {}", self.speaker_label(mac).await);
        self.playback_command(
            &target,
            success,
            "Failed to stop track",
            self.api.stop_speaker(mac),
        )
        .await
    }

    /// Rejects volumes outside `0..=100` before anything is sent.
    pub async fn set_volume(
        &self,
        target: &PlaybackTarget,
        volume: i64,
    ) -> Result<(), ClientError> {
        let volume = match Volume::new(volume) {
            Ok(volume) => volume,
            Err(err) => return Err(self.reject(err).await),
        };
        let success = format!("Volume set to {volume} on {}", self.target_label(target).await);
        let call = async {
            match target {
                PlaybackTarget::Speaker(mac) => self.api.set_speaker_volume(mac, volume).await,
                PlaybackTarget::Group(name) => self.api.set_group_volume(name, volume).await,
            }
        };
        self.playback_command(target, success, "Failed to set volume", call)
            .await
    }

    pub async fn seek(&self, mac: &MacAddress, seconds: u32) -> Result<(), ClientError> {
        let target = PlaybackTarget::Speaker(mac.clone());
        let success = format!(
            "Seeked to {} on {}",
            format_time(seconds),
            self.speaker_label(mac).await
        );
        self.playback_command(
            &target,
            success,
            "Failed to seek position",
            self.api.seek_speaker(mac, seconds),
        )
        .await
    }

    /// Issues one playback mutation, reports it, and refreshes the focused playback
    /// state when the mutation targeted it.
    async fn playback_command<F>(
        &self,
        target: &PlaybackTarget,
        success: String,
        failure: &str,
        call: F,
    ) -> Result<(), ClientError>
    where
        F: Future<Output = TransportResult<String>>,
    {
        info!(%target, "issuing playback command");
        match call.await {
            Ok(_) => {
                self.notify(NotificationKind::Success, success).await;
                if self.focused_target().await.as_ref() == Some(target) {
                    if let Err(err) = self.refresh_playback().await {
                        debug!(%err, "playback refresh after command failed");
                    }
                }
                Ok(())
            }
            Err(err) => {
                self.notify(NotificationKind::Error, failure).await;
                Err(ClientError::Transport(err))
            }
        }
    }

    async fn speaker_label(&self, mac: &MacAddress) -> String {
        self.store
            .read()
            .await
            .speaker(mac)
            .map(|speaker| speaker.display_name().to_string())
            .unwrap_or_else(|| mac.to_string())
    }

    async fn target_label(&self, target: &PlaybackTarget) -> String {
        match target {
            PlaybackTarget::Speaker(mac) => self.speaker_label(mac).await,
            PlaybackTarget::Group(name) => format!("group {name}"),
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
