//! Per-caller bounded session state: the message ring, token accounting,
//! tool-result pruning, expiry, and compaction described in spec §3 and
//! §4.F. The vector/workspace stores that *durable* memory lands in are
//! owned by `proxy-retriever` and `proxy-workspace`; this crate only tracks
//! the live, in-process conversation a caller is currently having.

pub mod error;
pub mod manager;
pub mod types;

pub use error::SessionError;
pub use manager::{SessionManager, SessionPolicy};
pub use types::{Session, SessionStats};
