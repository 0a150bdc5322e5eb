//! Client core for the multi-room audio controller: REST transport, view-model
//! store and the controller that ties user intents and polling to both.

pub mod controller;
pub mod error;
pub mod notifications;
pub mod poller;
pub mod store;
pub mod transport;
pub mod view;

pub use controller::{
    Controller, ControllerEvent, LoadOutcome, Section, SectionState, TrackQuery, Trigger, View,
    DEFAULT_NOTIFICATION_CAPACITY,
};
pub use error::{ClientError, TransportError};
pub use notifications::{Notification, NotificationKind};
pub use poller::{spawn_speaker_poll, PollHandle, DEFAULT_POLL_INTERVAL};
pub use store::{FocusedPlayback, ViewModelStore};
pub use transport::{HttpTransport, MultiroomApi, TransportResult};
pub use view::{EmptyState, SectionItems, SectionView};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
