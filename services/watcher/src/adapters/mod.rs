pub mod browser;
pub mod clock;
pub mod schedule_api;

pub use browser::{new_session, BrowserSessionAdapter};
pub use clock::SystemClock;
pub use schedule_api::HttpScheduleAdapter;
