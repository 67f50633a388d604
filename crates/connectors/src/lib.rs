pub mod detect;
pub mod error;
pub mod file;
pub mod postgres;
pub mod schema;
pub mod storage;
pub mod validator;
