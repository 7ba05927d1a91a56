pub mod adapters;
#[cfg(feature = "cli")]
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{
    InMemoryAddressStore, InMemoryCustomerStore, JsonFileAddressStore, JsonFileCustomerStore,
    ViaCepClient,
};
pub use config::{toml_config::TomlConfig, ServiceConfig};
pub use crate::core::customer_service::CustomerService;
pub use domain::model::{Address, Customer, CustomerId};
pub use utils::error::{Result, ServiceError};
