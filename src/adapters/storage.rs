use crate::domain::model::{Address, Customer, CustomerId};
use crate::domain::ports::{AddressStore, CustomerStore};
use crate::utils::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CUSTOMERS_FILE: &str = "customers.json";
pub const ADDRESSES_FILE: &str = "addresses.json";

#[derive(Debug, Clone, Default)]
struct CustomerTable {
    rows: BTreeMap<CustomerId, Customer>,
    last_id: CustomerId,
}

impl CustomerTable {
    fn from_rows(last_id: CustomerId, customers: Vec<Customer>) -> Self {
        let mut table = Self {
            last_id,
            ..Self::default()
        };
        for customer in customers {
            if let Some(id) = customer.id {
                table.last_id = table.last_id.max(id);
                table.rows.insert(id, customer);
            }
        }
        table
    }

    fn upsert(&mut self, mut customer: Customer) -> Result<Customer> {
        let id = match customer.id {
            Some(id) => id,
            None => self.last_id.checked_add(1).ok_or_else(|| {
                ServiceError::Io(std::io::Error::other("customer id space exhausted"))
            })?,
        };
        self.last_id = self.last_id.max(id);
        customer.id = Some(id);
        self.rows.insert(id, customer.clone());
        Ok(customer)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerStore {
    table: Arc<Mutex<CustomerTable>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CustomerStore for InMemoryCustomerStore {
    async fn find_all(&self) -> Result<Vec<Customer>> {
        let table = self.table.lock().await;
        Ok(table.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<Customer> {
        let mut table = self.table.lock().await;
        table.upsert(customer)
    }

    async fn delete_by_id(&self, id: CustomerId) -> Result<()> {
        let mut table = self.table.lock().await;
        table.rows.remove(&id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressStore {
    rows: Arc<Mutex<BTreeMap<String, Address>>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl AddressStore for InMemoryAddressStore {
    async fn find_by_postal_code(&self, postal_code: &str) -> Result<Option<Address>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(postal_code).cloned())
    }

    async fn save(&self, address: Address) -> Result<Address> {
        let mut rows = self.rows.lock().await;
        rows.insert(address.postal_code.clone(), address.clone());
        Ok(address)
    }
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let data = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, data).await?;
    Ok(())
}

/// `customers.json` 內容；早期版本只存客戶陣列
#[derive(Deserialize)]
#[serde(untagged)]
enum CustomerFile {
    Snapshot {
        #[serde(default)]
        last_id: CustomerId,
        customers: Vec<Customer>,
    },
    Rows(Vec<Customer>),
}

#[derive(Serialize)]
struct CustomerSnapshot<'a> {
    last_id: CustomerId,
    customers: Vec<&'a Customer>,
}

/// 以 `customers.json` 保存整個客戶集合與最後配發的 ID，每次異動都整檔重寫。
///
/// 先寫檔成功才更新記憶體內容，寫入失敗時狀態不變。
#[derive(Debug)]
pub struct JsonFileCustomerStore {
    path: PathBuf,
    table: Mutex<CustomerTable>,
}

impl JsonFileCustomerStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(CUSTOMERS_FILE);
        let table = match read_json_file(&path).await? {
            Some(CustomerFile::Snapshot { last_id, customers }) => {
                CustomerTable::from_rows(last_id, customers)
            }
            Some(CustomerFile::Rows(customers)) => CustomerTable::from_rows(0, customers),
            None => CustomerTable::default(),
        };
        tracing::debug!("Loaded {} customers from {}", table.rows.len(), path.display());

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &CustomerTable) -> Result<()> {
        let snapshot = CustomerSnapshot {
            last_id: table.last_id,
            customers: table.rows.values().collect(),
        };
        write_json_file(&self.path, &snapshot).await
    }
}

impl CustomerStore for JsonFileCustomerStore {
    async fn find_all(&self) -> Result<Vec<Customer>> {
        let table = self.table.lock().await;
        Ok(table.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<Customer> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let saved = next.upsert(customer)?;
        self.persist(&next).await?;
        *table = next;
        Ok(saved)
    }

    async fn delete_by_id(&self, id: CustomerId) -> Result<()> {
        let mut table = self.table.lock().await;
        if !table.rows.contains_key(&id) {
            return Ok(());
        }
        let mut next = table.clone();
        next.rows.remove(&id);
        self.persist(&next).await?;
        *table = next;
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonFileAddressStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<String, Address>>,
}

impl JsonFileAddressStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().join(ADDRESSES_FILE);
        let addresses: Vec<Address> = read_json_file(&path).await?.unwrap_or_default();
        tracing::debug!("Loaded {} cached addresses from {}", addresses.len(), path.display());

        let rows = addresses
            .into_iter()
            .map(|address| (address.postal_code.clone(), address))
            .collect();

        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AddressStore for JsonFileAddressStore {
    async fn find_by_postal_code(&self, postal_code: &str) -> Result<Option<Address>> {
        let rows = self.rows.lock().await;
        Ok(rows.get(postal_code).cloned())
    }

    async fn save(&self, address: Address) -> Result<Address> {
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();
        next.insert(address.postal_code.clone(), address.clone());
        let snapshot: Vec<&Address> = next.values().collect();
        write_json_file(&self.path, &snapshot).await?;
        *rows = next;
        Ok(address)
    }
}
