use crate::utils::error::{Result, ServiceError};
use serde::{Deserialize, Deserializer, Serialize};

pub type CustomerId = i64;

/// JSON `null` 視同欄位缺省
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 郵遞區號解析出的地址，以郵遞區號為主鍵
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(deserialize_with = "null_as_default")]
    pub postal_code: String,
    pub street: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub ibge: String,
    pub gia: String,
    pub ddd: String,
    pub siafi: String,
}

impl Address {
    /// 只帶郵遞區號的地址，由呼叫端提供，儲存前會被解析結果取代
    pub fn stub(postal_code: impl Into<String>) -> Self {
        Self {
            postal_code: postal_code.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CustomerId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: Address,
}

impl Customer {
    pub fn new(name: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: Address::stub(postal_code),
        }
    }

    pub fn with_id(mut self, id: CustomerId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn postal_code(&self) -> &str {
        &self.address.postal_code
    }

    /// 解析外部傳入的 JSON；`null` 視為缺少客戶
    pub fn from_json_payload(payload: &str) -> Result<Self> {
        let customer: Option<Customer> = serde_json::from_str(payload).map_err(|e| {
            ServiceError::invalid_argument(format!("Malformed customer payload: {}", e))
        })?;
        customer.ok_or_else(|| ServiceError::invalid_argument("Customer must not be null"))
    }
}
