//! `postpilot-notify`: live push channels and the notification store.
//!
//! [`registry::ConnectionRegistry`] maps users to their open WebSocket
//! channels; [`store::NotificationStore`] persists notification records and
//! preferences in SQLite; [`notifier::Notifier`] ties them together so a
//! notification is stored once and pushed to every open tab of its owner.

pub mod db;
pub mod error;
pub mod notifier;
pub mod registry;
pub mod store;
pub mod types;

pub use error::{NotifyError, Result};
pub use notifier::Notifier;
pub use registry::{ChannelId, ConnectionRegistry, PushChannel};
pub use store::NotificationStore;
pub use types::{
    NewNotification, Notification, NotificationKind, NotificationPreferences, PostContext,
    PreferencesUpdate,
};
