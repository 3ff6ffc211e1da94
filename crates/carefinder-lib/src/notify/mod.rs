//! Push notifications: event types, the subscriber registry and the
//! reconnecting channel that feeds it.

mod channel;
mod event;
mod subscribers;
mod transport;

pub use channel::{
    ChannelState, NotificationChannel, ReconnectPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use event::{NotificationEvent, NotificationInbox, NotificationKind};
pub use subscribers::{SubscriberRegistry, Subscription};
pub use transport::{Connector, MessageStream, WebSocketConnector};
