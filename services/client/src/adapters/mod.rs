pub mod env_identity;
pub mod http_backend;

pub use env_identity::EnvIdentityProvider;
pub use http_backend::HttpBackend;
