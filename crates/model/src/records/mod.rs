pub mod customer;
pub mod raw;
pub mod typed;
