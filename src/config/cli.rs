use crate::config::toml_config::TomlConfig;
use crate::config::{ServiceConfig, STORAGE_BACKENDS};
use crate::core::{Customer, CustomerId};
use crate::utils::error::{Result, ServiceError};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "customer-cep")]
#[command(about = "Customer records with addresses resolved from Brazilian postal codes")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, global = true, help = "Directory holding customers.json and addresses.json")]
    pub data_dir: Option<String>,

    #[arg(long, global = true, help = "Postal code lookup base URL")]
    pub lookup_endpoint: Option<String>,

    #[arg(long, global = true)]
    pub lookup_timeout_seconds: Option<u64>,

    #[arg(long, global = true, value_parser = STORAGE_BACKENDS)]
    pub storage: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List every customer
    List,
    /// Show one customer
    Get {
        #[arg(allow_negative_numbers = true)]
        id: CustomerId,
    },
    /// Create a customer, resolving the address from its postal code
    Create(CustomerArgs),
    /// Replace the customer stored at `id`
    Update {
        #[arg(allow_negative_numbers = true)]
        id: CustomerId,
        #[command(flatten)]
        customer: CustomerArgs,
    },
    /// Delete a customer (no error when it does not exist)
    Delete {
        #[arg(allow_negative_numbers = true)]
        id: CustomerId,
    },
}

#[derive(Debug, Clone, Args)]
pub struct CustomerArgs {
    #[arg(long, conflicts_with_all = ["name", "cep"], help = "Full customer payload as JSON")]
    pub json: Option<String>,

    #[arg(long, required_unless_present = "json")]
    pub name: Option<String>,

    #[arg(long, required_unless_present = "json", help = "Postal code, e.g. 01001-000")]
    pub cep: Option<String>,
}

impl CustomerArgs {
    pub fn to_customer(&self) -> Result<Customer> {
        if let Some(payload) = &self.json {
            return Customer::from_json_payload(payload);
        }

        match (&self.name, &self.cep) {
            (Some(name), Some(cep)) => Ok(Customer::new(name.clone(), cep.clone())),
            _ => Err(ServiceError::invalid_argument(
                "Customer must not be null: pass --json or both --name and --cep",
            )),
        }
    }
}

impl CliConfig {
    pub fn load_toml(&self) -> Result<Option<TomlConfig>> {
        self.config.as_ref().map(TomlConfig::from_file).transpose()
    }

    /// 命令列有指定的值優先於 TOML
    pub fn resolve(&self, toml: Option<&TomlConfig>) -> ServiceConfig {
        let mut config = toml
            .map(TomlConfig::to_service_config)
            .unwrap_or_default();

        if let Some(endpoint) = &self.lookup_endpoint {
            config.lookup_endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.lookup_timeout_seconds {
            config.lookup_timeout_seconds = timeout;
        }
        if let Some(storage) = &self.storage {
            config.storage_backend = storage.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }

        config
    }
}
