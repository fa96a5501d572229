pub mod domain;
pub mod ports;
pub mod reducer;

pub use domain::{MatchRecord, MatchState, SessionState, ViewingWindow};
pub use ports::{Clock, PortError, PortResult, ScheduleSource, StreamSession};
pub use reducer::{reduce, reduce_with, ClosePolicy, MERGE_THRESHOLD_HOURS};
