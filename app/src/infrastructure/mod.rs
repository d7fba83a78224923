pub mod config;
pub mod database;
pub mod grpc;
pub mod repository;
pub mod service;
mod service_provider;

pub use service_provider::ServiceProvider;
