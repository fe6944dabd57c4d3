//! `authwire-session` — client-side authentication session manager.
//!
//! This crate provides:
//! - The session record and its status state machine ([`AuthController`])
//! - Silent renewal scheduling and consumers awaiting a valid access token
//! - Collaborator contracts for a redirect-based identity provider and
//!   durable flag storage, with in-memory and file-backed stores
//!
//! The controller never touches global state: the provider, the store, the
//! current location and the clock are all injected.

pub mod bus;
pub mod callback;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod provider;
pub mod redirect;
mod renewal;
pub mod state;
pub mod store;
pub mod waiters;

pub use bus::{Subscription, Transition, TransitionBus};
pub use callback::{AuthorizeParams, authorize_url, logout_url, parse_callback_fragment};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use controller::{AuthController, AuthControllerBuilder, RouteBootstrap};
pub use error::{AuthError, ConfigError, ProviderError, SessionResult, StoreError};
pub use location::{Location, StaticLocation};
pub use provider::{AuthResult, CheckSessionOptions, IdentityProvider};
pub use redirect::{Navigator, RedirectIdentityProvider};
pub use state::{AuthStatus, SessionSnapshot, SessionState, TokenSet};
pub use store::{FileFlagStore, InMemoryFlagStore, PersistentFlagStore};
pub use waiters::{TokenOutcome, TokenWaiter, WaiterCancel, WaiterId};
