pub mod householder;
pub mod provider;
pub mod request;
pub mod review;
pub mod service;
