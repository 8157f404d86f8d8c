//! Chat screen components: transcript, prompt composer, and the view that
//! drives the send protocol.

pub mod composer;
pub mod transcript;
pub mod view;

pub use composer::Composer;
pub use transcript::Transcript;
pub use view::{ChatAction, ChatView, SendAttempt};
