mod chat;
mod content;
mod metadata;
mod portal;
pub mod validation;

pub use chat::{ChatClient, ChatSink};
pub use content::ContentFetcher;
pub use metadata::{HttpMetadataFetcher, MetadataFetcher};
pub use portal::{
    FollowRecord, NotificationPayload, PortalApi, PortalClient, Subscriber, APP_ID,
};
