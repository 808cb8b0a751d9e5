//! Inbound engagement: the comment feed with already-handled events
//! filtered out, the ACK service, and the reply orchestrator that only
//! acknowledges a comment after its reply is confirmed posted.

pub mod comments;
pub mod drafter;
pub mod reply;

pub use comments::{CommentFeed, MediaComments, PersonaComments};
pub use drafter::{HttpDrafter, ReplyContext, ReplyDrafter};
pub use reply::ReplyOrchestrator;
