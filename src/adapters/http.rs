use crate::domain::model::Address;
use crate::domain::ports::AddressLookup;
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_VIACEP_ENDPOINT: &str = "https://viacep.com.br/ws";
pub const DEFAULT_LOOKUP_TIMEOUT_SECONDS: u64 = 10;

/// ViaCEP 回應格式
#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    complemento: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    ibge: String,
    #[serde(default)]
    gia: String,
    #[serde(default)]
    ddd: String,
    #[serde(default)]
    siafi: String,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    /// 查無此郵遞區號時 ViaCEP 回傳 `{"erro": true}`（新版為字串 "true"）
    fn is_error(&self) -> bool {
        match &self.erro {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(flag)) => flag != "false",
            Some(_) => true,
        }
    }

    fn into_address(self, requested: &str) -> Address {
        let postal_code = if self.cep.is_empty() {
            requested.to_string()
        } else {
            self.cep
        };

        Address {
            postal_code,
            street: self.logradouro,
            complement: self.complemento,
            neighborhood: self.bairro,
            city: self.localidade,
            state: self.uf,
            ibge: self.ibge,
            gia: self.gia,
            ddd: self.ddd,
            siafi: self.siafi,
        }
    }
}

fn postal_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{5})-?(\d{3})$").expect("postal code pattern is valid")
    })
}

/// 將 `01001-000` 或 `01001000` 正規化為 8 位數字
pub fn normalize_postal_code(postal_code: &str) -> Option<String> {
    postal_code_pattern()
        .captures(postal_code.trim())
        .map(|caps| format!("{}{}", &caps[1], &caps[2]))
}

#[derive(Debug, Clone)]
pub struct ViaCepClient {
    client: Client,
    base_url: String,
}

impl ViaCepClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lookup_url(&self, digits: &str) -> String {
        format!("{}/{}/json/", self.base_url, digits)
    }
}

#[async_trait]
impl AddressLookup for ViaCepClient {
    async fn lookup(&self, postal_code: &str) -> Result<Address> {
        let digits = normalize_postal_code(postal_code).ok_or_else(|| {
            ServiceError::lookup_failed(postal_code, "postal code must have 8 digits")
        })?;

        let url = self.lookup_url(&digits);
        tracing::debug!("Making postal code request to: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::lookup_failed(postal_code, e.to_string()))?;

        tracing::debug!("Postal code response status: {}", response.status());

        if !response.status().is_success() {
            return Err(ServiceError::lookup_failed(
                postal_code,
                format!("lookup service answered {}", response.status()),
            ));
        }

        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::lookup_failed(postal_code, e.to_string()))?;

        if body.is_error() {
            return Err(ServiceError::lookup_failed(
                postal_code,
                "postal code not found",
            ));
        }

        Ok(body.into_address(postal_code))
    }
}
