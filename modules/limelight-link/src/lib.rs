//! Linking a persona to an external business account: the signed state
//! codec that makes the OAuth callback stateless, the three-leg flow
//! controller, and the account listing / link / unlink services.

pub mod accounts;
pub mod flow;
pub mod state;

pub use accounts::AccountService;
pub use flow::{Callback, LinkService};
pub use state::{LinkState, StateCodec};
