pub mod session;

pub use session::{LoadState, LoadTicket, ReplayInfo, ReplaySession, TimeWindow};
