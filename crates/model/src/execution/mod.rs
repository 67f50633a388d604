pub mod batch;
pub mod errors;
pub mod quality;
pub mod run;
pub mod validation;
