pub mod curated;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod retry;
