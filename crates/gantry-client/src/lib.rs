//! # gantry-client
//!
//! Client side of the launch service:
//! - `Transport`/`Link` seam with a WebSocket implementation
//! - `ControlChannel`, the persistent connection and its reconnect state machine
//! - `LaunchService`, the login and profile requests
//! - `AuthSupervisor`, profile resolution wrapped in the retry policy
//! - `ReauthOnReconnect`, the disconnect handler that restores the session

pub mod auth;
pub mod channel;
pub mod error;
pub mod protocol;
pub mod reconnect;
pub mod service;
pub mod transport;

pub use auth::{resolve_profile, AuthReport, AuthSupervisor, ProfileLookup};
pub use channel::{ChannelOptions, ControlChannel, DisconnectHandler};
pub use error::{AuthError, ChannelError};
pub use reconnect::ReauthOnReconnect;
pub use service::{ChannelLaunchService, LaunchService};
pub use transport::{Link, Transport, WsTransport};
