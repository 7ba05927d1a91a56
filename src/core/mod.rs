pub mod customer_service;

pub use crate::domain::model::{Address, Customer, CustomerId};
pub use crate::domain::ports::{AddressLookup, AddressStore, ConfigProvider, CustomerStore};
pub use crate::utils::error::Result;
