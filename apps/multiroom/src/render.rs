//! Plain-text rendering of the client view-model.

use std::fmt::Write as _;

use client_core::{
    view::{format_time, status_label},
    FocusedPlayback, Notification, NotificationKind, SectionItems, SectionView,
};
use shared::domain::{Group, PlaybackStatus, Speaker, Track};

const PROGRESS_WIDTH: usize = 24;

pub fn section(view: &SectionView) -> String {
    match view {
        SectionView::Idle => String::new(),
        SectionView::Loading => "Loading...".to_string(),
        SectionView::Error {
            message,
            detail,
            retained,
        } => {
            let mut out = format!("{message}: {detail}");
            if let Some(retained) = retained {
                out.push_str("\n(showing previously loaded data)\n");
                out.push_str(&items(retained));
            }
            out
        }
        SectionView::Empty(empty) => format!("{}\n{}", empty.title(), empty.hint()),
        SectionView::Speakers(speakers) => lines(speakers, speaker_line),
        SectionView::Groups(groups) => lines(groups, group_line),
        SectionView::Tracks(tracks) => lines(tracks, track_line),
    }
}

fn items(items: &SectionItems) -> String {
    match items {
        SectionItems::Speakers(speakers) => lines(speakers, speaker_line),
        SectionItems::Groups(groups) => lines(groups, group_line),
        SectionItems::Tracks(tracks) => lines(tracks, track_line),
    }
}

fn lines<T>(items: &[T], line: fn(&T) -> String) -> String {
    items.iter().map(line).collect::<Vec<_>>().join("\n")
}

pub fn speaker_line(speaker: &Speaker) -> String {
    let mut line = format!(
        "{:<24} {}  [{}] vol {}",
        speaker.display_name(),
        speaker.mac_address,
        status_label(speaker.status),
        speaker.volume
    );
    if let Some(track) = speaker.current_track.as_deref() {
        let _ = write!(line, "  ♪ {track}");
    }
    line
}

pub fn speaker_detail(speaker: &Speaker) -> String {
    let mut out = format!("{}\n", speaker.display_name());
    let _ = writeln!(out, "  mac:       {}", speaker.mac_address);
    let _ = writeln!(out, "  model:     {}", speaker.model.as_deref().unwrap_or("Unknown Model"));
    let _ = writeln!(out, "  ip:        {}", speaker.ip_address.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "  status:    {}", status_label(speaker.status));
    let _ = writeln!(out, "  volume:    {}", speaker.volume);
    let _ = writeln!(out, "  connected: {}", speaker.connected);
    if speaker.master {
        let _ = writeln!(out, "  group master of {} member(s)", speaker.group_members.len());
    }
    if let Some(track) = speaker.current_track.as_deref() {
        let _ = writeln!(out, "  playing:   {track} at {}", format_time(speaker.position));
    }
    out.trim_end().to_string()
}

pub fn group_line(group: &Group) -> String {
    let members = group
        .members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let state = if group.playing { "playing" } else { "idle" };
    match group.volume {
        Some(volume) => format!("{:<20} [{state}] vol {volume}%  {members}", group.name),
        None => format!("{:<20} [{state}]  {members}", group.name),
    }
}

pub fn track_line(track: &Track) -> String {
    format!(
        "{:>5}  {} - {}  ({})  {}",
        track.id,
        track.artist.as_deref().unwrap_or("Unknown Artist"),
        track.title,
        track.album.as_deref().unwrap_or("Unknown Album"),
        format_time(track.duration)
    )
}

pub fn playback(focused: &FocusedPlayback) -> String {
    let state = &focused.state;
    let status = match state.status {
        PlaybackStatus::Playing => "playing",
        PlaybackStatus::Paused => "paused",
        PlaybackStatus::Stopped => "stopped",
    };
    let mut out = format!("{}: {status}", focused.target);
    if let Some(track) = state.current_track.as_deref() {
        let _ = write!(out, "\n  {track}");
    }
    let filled = (state.progress() * PROGRESS_WIDTH as f32).round() as usize;
    let filled = filled.min(PROGRESS_WIDTH);
    let _ = write!(
        out,
        "\n  {} [{}{}] {}",
        format_time(state.position),
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        format_time(state.duration)
    );
    if let Some(volume) = state.volume {
        let _ = write!(out, "\n  volume {volume}%");
    }
    out
}

pub fn notification(notification: &Notification) -> String {
    let tag = match notification.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
        NotificationKind::Info => "info",
    };
    format!("[{tag}] {}", notification.message)
}
