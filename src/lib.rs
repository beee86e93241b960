//! Drive two UCI engines through the same `perft` request and diff their
//! per-move node counts.

pub mod columns;
pub mod config;
pub mod error;
pub mod perft;
pub mod pump;
pub mod session;
pub mod sync;
pub mod uci;

pub use config::CompareConfig;
pub use error::SessionError;
pub use perft::{PerftComparator, PerftReport, PerftRequest};
pub use session::{EngineCommand, EngineSession, SessionState};
pub use sync::LineBuffer;
