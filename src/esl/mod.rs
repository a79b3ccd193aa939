//! Event-socket integration: wire codec, event view, session state machine,
//! and the lifecycle event handler.

pub mod codec;
pub mod event;
pub mod handler;
pub mod session;

pub use codec::{Command, EslCodec, EslFrame};
pub use event::EslEvent;
pub use handler::{EngineServices, EventHandler};
pub use session::{BackoffPolicy, EslCluster, EslSession, SessionState};
