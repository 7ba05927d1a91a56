use crate::core::{Address, AddressLookup, AddressStore, Customer, CustomerId, CustomerStore};
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::{validate_customer_id, validate_postal_code};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

type FillLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// 某個郵遞區號的補快取鎖登記；離開作用域（含 future 被取消）時，
/// 若已無其他任務持有就從表中移除。
struct FillLockEntry<'a> {
    locks: &'a FillLocks,
    postal_code: String,
    key_lock: Arc<Mutex<()>>,
}

impl<'a> FillLockEntry<'a> {
    fn register(locks: &'a FillLocks, postal_code: &str) -> Self {
        let key_lock = locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(postal_code.to_string())
            .or_default()
            .clone();

        Self {
            locks,
            postal_code: postal_code.to_string(),
            key_lock,
        }
    }
}

impl Drop for FillLockEntry<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // 在表鎖內釋放自己的參照，計數才不會與其他任務交錯
        drop(std::mem::take(&mut self.key_lock));
        if locks
            .get(&self.postal_code)
            .is_some_and(|key_lock| Arc::strong_count(key_lock) == 1)
        {
            locks.remove(&self.postal_code);
        }
    }
}

/// 客戶服務：驗證輸入、以郵遞區號解析地址（優先使用快取），再寫入客戶資料。
///
/// 三個協作者都在建構時注入：客戶儲存、地址快取與外部郵遞區號查詢。
/// 錯誤一律原樣往上拋，不做重試或轉換。
pub struct CustomerService<C: CustomerStore, A: AddressStore, L: AddressLookup> {
    customers: C,
    addresses: A,
    lookup: L,
    lookup_timeout: Duration,
    fill_locks: FillLocks,
}

impl<C: CustomerStore, A: AddressStore, L: AddressLookup> CustomerService<C, A, L> {
    pub fn new(customers: C, addresses: A, lookup: L) -> Self {
        Self {
            customers,
            addresses,
            lookup,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            fill_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn customers(&self) -> &C {
        &self.customers
    }

    pub fn addresses(&self) -> &A {
        &self.addresses
    }

    pub async fn list(&self) -> Result<Vec<Customer>> {
        self.customers.find_all().await
    }

    pub async fn get_by_id(&self, id: CustomerId) -> Result<Customer> {
        validate_customer_id(id)?;

        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Customer not found for id: {}", id)))
    }

    /// 新增客戶，ID 一律由儲存端配發
    pub async fn create(&self, mut customer: Customer) -> Result<Customer> {
        customer.id = None;
        let saved = self.resolve_and_save(customer).await?;
        tracing::info!("✅ Customer {:?} created", saved.id);
        Ok(saved)
    }

    /// 整筆覆蓋 `id` 對應的客戶；payload 內的 ID 會被 `id` 取代
    pub async fn update(&self, id: CustomerId, mut customer: Customer) -> Result<Customer> {
        validate_customer_id(id)?;

        if self.customers.find_by_id(id).await?.is_none() {
            return Err(ServiceError::not_found(format!(
                "Customer not found for id: {}",
                id
            )));
        }

        if customer.id.is_some_and(|payload_id| payload_id != id) {
            tracing::warn!(
                "Payload id {:?} differs from requested id {}, using requested id",
                customer.id,
                id
            );
        }
        customer.id = Some(id);

        let saved = self.resolve_and_save(customer).await?;
        tracing::info!("✅ Customer {} updated", id);
        Ok(saved)
    }

    /// 刪除不存在的 ID 不視為錯誤
    pub async fn delete(&self, id: CustomerId) -> Result<()> {
        validate_customer_id(id)?;

        self.customers.delete_by_id(id).await?;
        tracing::info!("🗑️ Customer {} deleted", id);
        Ok(())
    }

    async fn resolve_and_save(&self, mut customer: Customer) -> Result<Customer> {
        let postal_code = customer.postal_code().to_string();
        validate_postal_code(&postal_code)?;

        customer.address = self.resolve_address(&postal_code).await?;
        self.customers.save(customer).await
    }

    async fn resolve_address(&self, postal_code: &str) -> Result<Address> {
        if let Some(address) = self.addresses.find_by_postal_code(postal_code).await? {
            tracing::debug!("Address cache hit for postal code {}", postal_code);
            return Ok(address);
        }

        // 同一郵遞區號的補快取流程一次只跑一個
        let entry = FillLockEntry::register(&self.fill_locks, postal_code);
        let _guard = entry.key_lock.lock().await;
        self.fill_address(postal_code).await
    }

    async fn fill_address(&self, postal_code: &str) -> Result<Address> {
        // 等鎖期間可能已被其他請求寫入
        if let Some(address) = self.addresses.find_by_postal_code(postal_code).await? {
            tracing::debug!("Address for postal code {} filled concurrently", postal_code);
            return Ok(address);
        }

        tracing::debug!("Address cache miss for postal code {}", postal_code);
        let mut address = self.fetch_address(postal_code).await?;
        address.postal_code = postal_code.to_string();

        let saved = self.addresses.save(address).await?;
        tracing::info!("📮 Cached address for postal code {}", postal_code);
        Ok(saved)
    }

    async fn fetch_address(&self, postal_code: &str) -> Result<Address> {
        tokio::time::timeout(self.lookup_timeout, self.lookup.lookup(postal_code))
            .await
            .map_err(|_| {
                ServiceError::lookup_failed(
                    postal_code,
                    format!("lookup timed out after {:?}", self.lookup_timeout),
                )
            })?
    }

    #[cfg(test)]
    fn pending_fill_locks(&self) -> usize {
        self.fill_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::{InMemoryAddressStore, InMemoryCustomerStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct MockLookup {
        known: Arc<HashMap<String, Address>>,
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl MockLookup {
        fn with(entries: &[(&str, &str, &str, &str)]) -> Self {
            let known = entries
                .iter()
                .map(|(code, street, city, state)| {
                    (
                        code.to_string(),
                        Address {
                            postal_code: code.to_string(),
                            street: street.to_string(),
                            city: city.to_string(),
                            state: state.to_string(),
                            ..Address::default()
                        },
                    )
                })
                .collect();

            Self {
                known: Arc::new(known),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: None,
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AddressLookup for MockLookup {
        async fn lookup(&self, postal_code: &str) -> Result<Address> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.known
                .get(postal_code)
                .cloned()
                .ok_or_else(|| ServiceError::lookup_failed(postal_code, "postal code not found"))
        }
    }

    type TestService = CustomerService<InMemoryCustomerStore, InMemoryAddressStore, MockLookup>;

    fn sample_lookup() -> MockLookup {
        MockLookup::with(&[
            ("01001-000", "Praça da Sé", "São Paulo", "SP"),
            ("20040-002", "Avenida Rio Branco", "Rio de Janeiro", "RJ"),
        ])
    }

    fn service_with(lookup: MockLookup) -> TestService {
        CustomerService::new(
            InMemoryCustomerStore::new(),
            InMemoryAddressStore::new(),
            lookup,
        )
    }

    #[tokio::test]
    async fn test_create_resolves_and_caches_address() {
        let lookup = sample_lookup();
        let service = service_with(lookup.clone());

        let saved = service.create(Customer::new("Ana", "01001-000")).await.unwrap();

        assert_eq!(lookup.calls(), 1);
        assert!(saved.id.is_some());
        assert_eq!(saved.name, "Ana");
        assert_eq!(saved.address.street, "Praça da Sé");
        assert_eq!(saved.address.city, "São Paulo");
        assert_eq!(saved.address.state, "SP");

        let cached = service
            .addresses()
            .find_by_postal_code("01001-000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached, saved.address);
        assert_eq!(service.addresses().len().await, 1);
    }

    #[tokio::test]
    async fn test_second_customer_with_same_postal_code_hits_cache() {
        let lookup = sample_lookup();
        let service = service_with(lookup.clone());

        let ana = service.create(Customer::new("Ana", "01001-000")).await.unwrap();
        let bia = service.create(Customer::new("Bia", "01001-000")).await.unwrap();

        assert_eq!(lookup.calls(), 1);
        assert_ne!(ana.id, bia.id);
        assert_eq!(ana.address, bia.address);
        assert_eq!(service.addresses().len().await, 1);
    }

    #[tokio::test]
    async fn test_round_trip_returns_resolved_address_not_stub() {
        let service = service_with(sample_lookup());

        let mut stub = Customer::new("Ana", "20040-002");
        stub.address.street = "typed by the user".to_string();
        let saved = service.create(stub).await.unwrap();

        let fetched = service.get_by_id(saved.id.unwrap()).await.unwrap();
        assert_eq!(fetched.address.street, "Avenida Rio Branco");
        assert_eq!(fetched.address.city, "Rio de Janeiro");
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn test_create_ignores_payload_id() {
        let service = service_with(sample_lookup());
        service.create(Customer::new("Ana", "01001-000")).await.unwrap();

        let second = service
            .create(Customer::new("Bia", "01001-000").with_id(1))
            .await
            .unwrap();

        assert_eq!(second.id, Some(2));
        assert_eq!(service.get_by_id(1).await.unwrap().name, "Ana");
    }

    #[tokio::test]
    async fn test_create_with_empty_postal_code_is_invalid() {
        let lookup = sample_lookup();
        let service = service_with(lookup.clone());

        let err = service.create(Customer::new("Ana", "")).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidArgument { .. }));
        assert_eq!(lookup.calls(), 0);
        assert!(service.customers().is_empty().await);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates_without_writes() {
        let service = service_with(sample_lookup());

        let err = service.create(Customer::new("Ana", "99999-999")).await.unwrap_err();

        assert!(matches!(err, ServiceError::LookupFailed { .. }));
        assert!(service.customers().is_empty().await);
        assert!(service.addresses().is_empty().await);
    }

    #[tokio::test]
    async fn test_lookup_timeout_is_lookup_failed() {
        let lookup = sample_lookup().delayed(Duration::from_secs(5));
        let service = service_with(lookup).with_lookup_timeout(Duration::from_millis(20));

        let err = service.create(Customer::new("Ana", "01001-000")).await.unwrap_err();

        match err {
            ServiceError::LookupFailed { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(service.addresses().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_by_id_validation_and_not_found() {
        let service = service_with(sample_lookup());

        for id in [0, -1, i64::MIN] {
            assert!(matches!(
                service.get_by_id(id).await,
                Err(ServiceError::InvalidArgument { .. })
            ));
        }
        for id in [1, 42, i64::MAX] {
            assert!(matches!(
                service.get_by_id(id).await,
                Err(ServiceError::NotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_list_returns_all_customers() {
        let service = service_with(sample_lookup());
        assert!(service.list().await.unwrap().is_empty());

        service.create(Customer::new("Ana", "01001-000")).await.unwrap();
        service.create(Customer::new("Caio", "20040-002")).await.unwrap();

        let names: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Caio"]);
    }

    #[tokio::test]
    async fn test_update_missing_customer_is_not_found_and_writes_nothing() {
        let lookup = sample_lookup();
        let service = service_with(lookup.clone());

        let err = service
            .update(5, Customer::new("Ana", "01001-000"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(lookup.calls(), 0);
        assert!(service.customers().is_empty().await);
        assert!(service.addresses().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_overwrites_record_at_requested_id() {
        let service = service_with(sample_lookup());
        let ana = service.create(Customer::new("Ana", "01001-000")).await.unwrap();
        let bia = service.create(Customer::new("Bia", "01001-000")).await.unwrap();

        // Payload carries Bia's id; the requested id wins
        let payload = Customer::new("Ana Souza", "20040-002").with_id(bia.id.unwrap());
        let updated = service.update(ana.id.unwrap(), payload).await.unwrap();

        assert_eq!(updated.id, ana.id);
        assert_eq!(updated.address.city, "Rio de Janeiro");

        let stored_ana = service.get_by_id(ana.id.unwrap()).await.unwrap();
        assert_eq!(stored_ana.name, "Ana Souza");
        let stored_bia = service.get_by_id(bia.id.unwrap()).await.unwrap();
        assert_eq!(stored_bia.name, "Bia");
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_validation_order() {
        let service = service_with(sample_lookup());
        service.create(Customer::new("Ana", "01001-000")).await.unwrap();

        assert!(matches!(
            service.update(0, Customer::new("Ana", "01001-000")).await,
            Err(ServiceError::InvalidArgument { .. })
        ));
        assert!(matches!(
            service.update(1, Customer::new("Ana", "")).await,
            Err(ServiceError::InvalidArgument { .. })
        ));
        assert_eq!(service.get_by_id(1).await.unwrap().postal_code(), "01001-000");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let service = service_with(sample_lookup());
        let ana = service.create(Customer::new("Ana", "01001-000")).await.unwrap();
        let id = ana.id.unwrap();

        service.delete(id).await.unwrap();
        service.delete(id).await.unwrap();

        assert!(matches!(
            service.get_by_id(id).await,
            Err(ServiceError::NotFound { .. })
        ));
        // Cached address remains after its customer is gone
        assert_eq!(service.addresses().len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_rejects_non_positive_id() {
        let service = service_with(sample_lookup());
        for id in [0, -7] {
            assert!(matches!(
                service.delete(id).await,
                Err(ServiceError::InvalidArgument { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_share_one_lookup() {
        let lookup = sample_lookup().delayed(Duration::from_millis(50));
        let service = service_with(lookup.clone());

        let (a, b, c, d) = tokio::join!(
            service.create(Customer::new("Ana", "01001-000")),
            service.create(Customer::new("Bia", "01001-000")),
            service.create(Customer::new("Caio", "01001-000")),
            service.create(Customer::new("Davi", "20040-002")),
        );

        for result in [&a, &b, &c, &d] {
            assert!(result.is_ok());
        }
        assert_eq!(lookup.calls(), 2);
        assert_eq!(service.addresses().len().await, 2);
        assert_eq!(service.customers().len().await, 4);
        assert_eq!(service.pending_fill_locks(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_create_releases_fill_lock() {
        let lookup = sample_lookup().delayed(Duration::from_secs(2));
        let service = service_with(lookup.clone());

        let result = tokio::time::timeout(
            Duration::from_millis(10),
            service.create(Customer::new("Ana", "01001-000")),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(lookup.calls(), 1);
        assert_eq!(service.pending_fill_locks(), 0);
        assert!(service.addresses().is_empty().await);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_keeps_lock_for_running_fill() {
        let lookup = sample_lookup().delayed(Duration::from_millis(100));
        let service = service_with(lookup.clone());

        let (first, cancelled) = tokio::join!(
            service.create(Customer::new("Ana", "01001-000")),
            tokio::time::timeout(
                Duration::from_millis(10),
                service.create(Customer::new("Bia", "01001-000")),
            ),
        );

        assert!(first.is_ok());
        assert!(cancelled.is_err());
        assert_eq!(lookup.calls(), 1);
        assert_eq!(service.pending_fill_locks(), 0);
    }

    #[tokio::test]
    async fn test_create_from_payload_with_null_postal_code_is_invalid() {
        let lookup = sample_lookup();
        let service = service_with(lookup.clone());

        let customer =
            Customer::from_json_payload(r#"{"name":"Ana","address":{"postal_code":null}}"#)
                .unwrap();
        let err = service.create(customer).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidArgument { .. }));
        assert_eq!(lookup.calls(), 0);
        assert!(service.customers().is_empty().await);
    }
}
