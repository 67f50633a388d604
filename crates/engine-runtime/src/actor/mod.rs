pub mod actor;
pub mod messages;
pub mod spawn;
pub mod worker;
