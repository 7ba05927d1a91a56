use crate::domain::model::{Address, Customer, CustomerId};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::future::Future;

/// 外部郵遞區號查詢服務
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup(&self, postal_code: &str) -> Result<Address>;
}

/// 以郵遞區號為鍵的地址快取
pub trait AddressStore: Send + Sync {
    fn find_by_postal_code(
        &self,
        postal_code: &str,
    ) -> impl Future<Output = Result<Option<Address>>> + Send;

    /// 同一郵遞區號重複寫入時以最後一次為準
    fn save(&self, address: Address) -> impl Future<Output = Result<Address>> + Send;
}

pub trait CustomerStore: Send + Sync {
    fn find_all(&self) -> impl Future<Output = Result<Vec<Customer>>> + Send;

    fn find_by_id(&self, id: CustomerId) -> impl Future<Output = Result<Option<Customer>>> + Send;

    /// `id` 為空時配發新 ID，否則整筆覆蓋
    fn save(&self, customer: Customer) -> impl Future<Output = Result<Customer>> + Send;

    /// 不存在的 ID 直接忽略
    fn delete_by_id(&self, id: CustomerId) -> impl Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn lookup_endpoint(&self) -> &str;
    fn lookup_timeout_seconds(&self) -> u64;
    fn storage_backend(&self) -> &str;
    fn data_dir(&self) -> &str;
}
