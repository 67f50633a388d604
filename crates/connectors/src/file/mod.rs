//! One schema per supported format.

pub mod csv;
pub mod json;
pub mod xml;

pub use self::csv::FeedbackSchema;
pub use self::json::PurchaseSchema;
pub use self::xml::ProfileSchema;
