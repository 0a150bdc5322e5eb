//! Per-section view-model derived from the store and the controller's load state.

use shared::domain::{Group, Speaker, SpeakerStatus, Track};

use crate::{
    controller::{Section, SectionState, TrackQuery},
    store::ViewModelStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    NoSpeakers,
    NoGroups,
    EmptyLibrary,
    NoSearchResults { query: String },
}

impl EmptyState {
    pub fn title(&self) -> &'static str {
        match self {
            EmptyState::NoSpeakers => "No speakers found",
            EmptyState::NoGroups => "No speaker groups created",
            EmptyState::EmptyLibrary => "No tracks in library",
            EmptyState::NoSearchResults { .. } => "No tracks found",
        }
    }

    pub fn hint(&self) -> String {
        match self {
            EmptyState::NoSpeakers => {
                "Click refresh to search for speakers on your network".to_string()
            }
            EmptyState::NoGroups => {
                "Create a group to control multiple speakers together".to_string()
            }
            EmptyState::EmptyLibrary => {
                "Add music files to your library to get started".to_string()
            }
            EmptyState::NoSearchResults { query } => {
                format!("No tracks match your search query \"{query}\"")
            }
        }
    }
}

/// Items of one section, as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionItems {
    Speakers(Vec<Speaker>),
    Groups(Vec<Group>),
    Tracks(Vec<Track>),
}

impl SectionItems {
    fn from_store(store: &ViewModelStore, section: Section) -> Option<Self> {
        let items = match section {
            Section::Speakers => SectionItems::Speakers(store.speakers().to_vec()),
            Section::Groups => SectionItems::Groups(store.groups().to_vec()),
            Section::Library => SectionItems::Tracks(store.tracks().to_vec()),
        };
        (!items.is_empty()).then_some(items)
    }

    pub fn len(&self) -> usize {
        match self {
            SectionItems::Speakers(items) => items.len(),
            SectionItems::Groups(items) => items.len(),
            SectionItems::Tracks(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionView {
    Idle,
    Loading,
    /// `retained` holds what an earlier load left in the store, still worth showing.
    Error {
        message: String,
        detail: String,
        retained: Option<SectionItems>,
    },
    Empty(EmptyState),
    Speakers(Vec<Speaker>),
    Groups(Vec<Group>),
    Tracks(Vec<Track>),
}

pub fn section_view(
    store: &ViewModelStore,
    section: Section,
    state: &SectionState,
    query: &TrackQuery,
) -> SectionView {
    match state {
        SectionState::Idle => SectionView::Idle,
        SectionState::Loading => SectionView::Loading,
        SectionState::Failed { message, detail } => SectionView::Error {
            message: message.clone(),
            detail: detail.clone(),
            retained: SectionItems::from_store(store, section),
        },
        SectionState::Loaded => loaded_view(store, section, query),
    }
}

fn loaded_view(store: &ViewModelStore, section: Section, query: &TrackQuery) -> SectionView {
    match section {
        Section::Speakers if store.speakers().is_empty() => {
            SectionView::Empty(EmptyState::NoSpeakers)
        }
        Section::Speakers => SectionView::Speakers(store.speakers().to_vec()),
        Section::Groups if store.groups().is_empty() => SectionView::Empty(EmptyState::NoGroups),
        Section::Groups => SectionView::Groups(store.groups().to_vec()),
        Section::Library if store.tracks().is_empty() => SectionView::Empty(match query {
            TrackQuery::Library => EmptyState::EmptyLibrary,
            TrackQuery::Search(query) => EmptyState::NoSearchResults {
                query: query.clone(),
            },
        }),
        Section::Library => SectionView::Tracks(store.tracks().to_vec()),
    }
}

pub fn failure_message(section: Section, query: &TrackQuery) -> &'static str {
    match (section, query) {
        (Section::Speakers, _) => "Failed to load speakers",
        (Section::Groups, _) => "Failed to load groups",
        (Section::Library, TrackQuery::Library) => "Failed to load tracks",
        (Section::Library, TrackQuery::Search(_)) => "Failed to search tracks",
    }
}

/// `M:SS`, as shown next to tracks and the progress bar.
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Indicator label for a speaker; an unset status reads as disconnected.
pub fn status_label(status: SpeakerStatus) -> &'static str {
    match status {
        SpeakerStatus::Playing => "playing",
        SpeakerStatus::Paused => "paused",
        SpeakerStatus::Stopped => "stopped",
        SpeakerStatus::Disconnected => "disconnected",
    }
}
