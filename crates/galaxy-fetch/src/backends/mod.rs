//! Transport backends

pub mod reqwest_backend;

pub(crate) use reqwest_backend::ConnectionSettings;
pub use reqwest_backend::ReqwestTransport;
