use crate::adapters::http::ViaCepClient;
use crate::adapters::storage::{
    InMemoryAddressStore, InMemoryCustomerStore, JsonFileAddressStore, JsonFileCustomerStore,
};
use crate::config::cli::Command;
use crate::config::{ServiceConfig, STORAGE_MEMORY};
use crate::core::customer_service::CustomerService;
use crate::core::{AddressLookup, AddressStore, ConfigProvider, Customer, CustomerId, CustomerStore};
use crate::utils::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Customers(Vec<Customer>),
    Customer(Customer),
    Deleted { deleted: CustomerId },
}

pub async fn execute<C, A, L>(
    service: &CustomerService<C, A, L>,
    command: &Command,
) -> Result<CommandOutput>
where
    C: CustomerStore,
    A: AddressStore,
    L: AddressLookup,
{
    match command {
        Command::List => Ok(CommandOutput::Customers(service.list().await?)),
        Command::Get { id } => Ok(CommandOutput::Customer(service.get_by_id(*id).await?)),
        Command::Create(args) => {
            let customer = args.to_customer()?;
            Ok(CommandOutput::Customer(service.create(customer).await?))
        }
        Command::Update { id, customer } => {
            let customer = customer.to_customer()?;
            Ok(CommandOutput::Customer(service.update(*id, customer).await?))
        }
        Command::Delete { id } => {
            service.delete(*id).await?;
            Ok(CommandOutput::Deleted { deleted: *id })
        }
    }
}

/// 依設定建立儲存與查詢元件後執行指令
pub async fn run(config: &ServiceConfig, command: &Command) -> Result<CommandOutput> {
    let lookup = ViaCepClient::new(config.lookup_endpoint(), config.lookup_timeout())?;
    tracing::debug!(
        "Using {} storage with lookup endpoint {}",
        config.storage_backend(),
        config.lookup_endpoint()
    );

    if config.storage_backend() == STORAGE_MEMORY {
        let service = CustomerService::new(
            InMemoryCustomerStore::new(),
            InMemoryAddressStore::new(),
            lookup,
        )
        .with_lookup_timeout(config.lookup_timeout());
        return execute(&service, command).await;
    }

    let customers = JsonFileCustomerStore::open(config.data_dir()).await?;
    let addresses = JsonFileAddressStore::open(config.data_dir()).await?;
    let service = CustomerService::new(customers, addresses, lookup)
        .with_lookup_timeout(config.lookup_timeout());
    execute(&service, command).await
}
