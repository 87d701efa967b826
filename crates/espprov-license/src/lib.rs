//! HTTP client for the device licensing service
//!
//! Four ordered endpoints plus a fetch-existing fallback, all under one
//! host. The service convention: HTTP 200 with a truthy `data` field is
//! success; anything else is an error surfaced with the raw response body
//! so an operator can quote it to the service admin.
//!
//! | call            | method | endpoint                                          | body |
//! |-----------------|--------|---------------------------------------------------|------|
//! | report          | POST   | `/v4/organizations/{org}/licenses`                | form |
//! | allocate        | PUT    | `/v4/organizations/{org}/licenses`                | JSON |
//! | apply           | POST   | `/v4/products/{pk}/licenses`                      | JSON |
//! | confirm         | PUT    | `/v4/products/{pk}/licenses/{license_key}`        | JSON |
//! | fetch_existing  | GET    | `/v4/products/{pk}/devices/{mac}/license`         | -    |
//!
//! Product-scoped calls carry the organization id in an `X-Org-Id` header.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use espprov_core::error::{Error, Result};
use espprov_core::license::{
    AllocateOutcome, LicenseRecord, LicenseService, LicenseState, ProductConfig,
};
use espprov_core::mac::MacAddr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed request timeout for every licensing call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ORG_ID_HEADER: &str = "X-Org-Id";

/// Blocking HTTP implementation of [`LicenseService`]
pub struct HttpLicenseService {
    config: ProductConfig,
    client: reqwest::blocking::Client,
}

impl HttpLicenseService {
    /// Build a client for the given tenant/product credentials
    pub fn new(config: ProductConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ProductConfig {
        &self.config
    }

    fn org_licenses_url(&self) -> String {
        format!(
            "{}/v4/organizations/{}/licenses",
            self.config.host, self.config.org_id
        )
    }

    fn product_licenses_url(&self) -> String {
        format!(
            "{}/v4/products/{}/licenses",
            self.config.host, self.config.product_key
        )
    }

    fn device_license_url(&self, mac: &MacAddr) -> String {
        format!(
            "{}/v4/products/{}/devices/{}/license",
            self.config.host, self.config.product_key, mac
        )
    }
}

#[derive(Debug, Serialize)]
struct AllocateBody<'a> {
    product_key: &'a str,
    product_secret: &'a str,
    device_macs: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct ApplyBody<'a> {
    product_secret: &'a str,
    device_macs: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct ConfirmBody<'a> {
    product_secret: &'a str,
    device_id: &'a str,
    device_mac: &'a str,
    state: u8,
}

/// Standard response envelope: `data` is present and truthy on success
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// One issued license inside an envelope's `data`
#[derive(Debug, Clone, Deserialize)]
struct LicenseEntry {
    device_id: String,
    license_key: String,
}

impl From<LicenseEntry> for LicenseRecord {
    fn from(entry: LicenseEntry) -> Self {
        Self {
            device_id: entry.device_id,
            license_key: entry.license_key,
        }
    }
}

/// Read the status and body of a response; transport errors map to
/// [`Error::Http`].
fn status_and_body(resp: reqwest::blocking::Response) -> Result<(bool, String)> {
    let ok = resp.status().is_success();
    let body = resp.text().map_err(|e| Error::Http(e.to_string()))?;
    Ok((ok, body))
}

impl LicenseService for HttpLicenseService {
    fn report(&self, mac: &MacAddr) -> Result<()> {
        let resp = self
            .client
            .post(self.org_licenses_url())
            .form(&[("device_mac", mac.as_str())])
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let (ok, body) = status_and_body(resp)?;
        if !ok {
            return Err(Error::Report(body));
        }
        log::debug!("report accepted for {}", mac);
        Ok(())
    }

    fn allocate(&self, mac: &MacAddr) -> Result<AllocateOutcome> {
        let body = AllocateBody {
            product_key: &self.config.product_key,
            product_secret: &self.config.product_secret,
            device_macs: [mac.as_str()],
        };
        let resp = self
            .client
            .put(self.org_licenses_url())
            .json(&body)
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let (ok, body) = status_and_body(resp)?;

        // Both a non-200 and a `failure` flag inside a 200 payload mean the
        // MAC has already consumed a license; the handshake falls back to
        // fetch_existing in that case.
        if !ok {
            log::warn!("allocate rejected for {}: {}", mac, body);
            return Ok(AllocateOutcome::AlreadyAllocated);
        }
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|_| Error::Allocate(body.clone()))?;
        let failed = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("failure"))
            .and_then(|f| f.as_u64())
            .unwrap_or(0)
            == 1;
        if failed {
            log::warn!("allocate reported failure for {}: {}", mac, body);
            return Ok(AllocateOutcome::AlreadyAllocated);
        }
        Ok(AllocateOutcome::Allocated)
    }

    fn apply(&self, mac: &MacAddr) -> Result<LicenseRecord> {
        let body = ApplyBody {
            product_secret: &self.config.product_secret,
            device_macs: [mac.as_str()],
        };
        let resp = self
            .client
            .post(self.product_licenses_url())
            .header(ORG_ID_HEADER, self.config.org_id.to_string())
            .json(&body)
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let (ok, body) = status_and_body(resp)?;
        if !ok {
            return Err(Error::Http(body));
        }
        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|_| Error::Http(body.clone()))?;
        let entries: Vec<LicenseEntry> = match envelope.data {
            Some(data) => serde_json::from_value(data).map_err(|_| Error::Http(body.clone()))?,
            None => return Err(Error::NoLicense),
        };
        // The handshake always applies for a single MAC; use the first record.
        entries
            .into_iter()
            .next()
            .map(LicenseRecord::from)
            .ok_or(Error::NoLicense)
    }

    fn confirm(&self, mac: &MacAddr, record: &LicenseRecord, state: LicenseState) -> Result<()> {
        let url = format!("{}/{}", self.product_licenses_url(), record.license_key);
        let body = ConfirmBody {
            product_secret: &self.config.product_secret,
            device_id: &record.device_id,
            device_mac: mac.as_str(),
            state: state.code(),
        };
        let resp = self
            .client
            .put(url)
            .header(ORG_ID_HEADER, self.config.org_id.to_string())
            .json(&body)
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let (ok, body) = status_and_body(resp)?;
        if !ok {
            return Err(Error::Confirm(body));
        }
        log::debug!("confirmed {} state {} for {}", record.license_key, state.code(), mac);
        Ok(())
    }

    fn fetch_existing(&self, mac: &MacAddr) -> Result<LicenseRecord> {
        let resp = self
            .client
            .get(self.device_license_url(mac))
            .header(ORG_ID_HEADER, self.config.org_id.to_string())
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let (ok, body) = status_and_body(resp)?;
        if !ok {
            return Err(Error::FetchExisting(body));
        }
        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|_| Error::Http(body.clone()))?;
        let entry: LicenseEntry = match envelope.data {
            Some(data) => serde_json::from_value(data).map_err(|_| Error::Http(body.clone()))?,
            None => return Err(Error::NoLicense),
        };
        Ok(entry.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_body_serializes_single_mac_array() {
        let body = AllocateBody {
            product_key: "pk",
            product_secret: "ps",
            device_macs: ["cc8da20bf278"],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"device_macs\":[\"cc8da20bf278\"]"));
        assert!(json.contains("\"product_key\":\"pk\""));
    }

    #[test]
    fn confirm_body_carries_numeric_state() {
        let body = ConfirmBody {
            product_secret: "ps",
            device_id: "nc1217e0",
            device_mac: "cc8da20bf278",
            state: LicenseState::Confirmed.code(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"state\":3"));
    }

    #[test]
    fn license_entry_deserializes_from_apply_payload() {
        let json = r#"{
            "data": [
                {"device_id": "nc1217e0", "license_key": "f594b05ef36f410b82f2719fe7a83fe2"}
            ]
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        let entries: Vec<LicenseEntry> =
            serde_json::from_value(envelope.data.unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device_id, "nc1217e0");
    }

    #[test]
    fn envelope_tolerates_missing_data() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn allocate_failure_flag_is_detected() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"data": {"failure": 1}}"#).unwrap();
        let failed = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("failure"))
            .and_then(|f| f.as_u64())
            .unwrap_or(0)
            == 1;
        assert!(failed);
    }

    #[test]
    fn urls_are_built_from_config() {
        let svc = HttpLicenseService::new(ProductConfig {
            host: "http://licensing.example:31647".to_string(),
            org_id: 16431,
            product_key: "pk".to_string(),
            product_secret: "ps".to_string(),
        })
        .unwrap();
        assert_eq!(
            svc.org_licenses_url(),
            "http://licensing.example:31647/v4/organizations/16431/licenses"
        );
        assert_eq!(
            svc.product_licenses_url(),
            "http://licensing.example:31647/v4/products/pk/licenses"
        );
        let mac = MacAddr::parse("cc8da20bf278").unwrap();
        assert_eq!(
            svc.device_license_url(&mac),
            "http://licensing.example:31647/v4/products/pk/devices/cc8da20bf278/license"
        );
    }
}
