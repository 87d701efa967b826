//! On-flash authorization record format
//!
//! The device firmware reads its license from a reserved flash region. The
//! record is plain ASCII: the comma-joined fields followed by an additive
//! checksum, and the whole string written twice with a `;` separator so a
//! partial flash write leaves one intact copy:
//!
//! ```text
//! {license_key},{device_id}[,{product_key},{product_secret}],{checksum};{...again}
//! ```
//!
//! The checksum is the sum of the character ordinals of the comma-joined
//! fields (checksum excluded). The format is positional and carries no
//! version byte; the decoder compensates by enforcing field count, half
//! equality and the checksum.

use crate::error::{Error, Result};

/// Required length of a license key
pub const LICENSE_KEY_LEN: usize = 32;

/// Required length of a device id
pub const DEVICE_ID_LEN: usize = 8;

/// A validated authorization record, ready to be encoded for flash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    license_key: String,
    device_id: String,
    product: Option<(String, String)>,
}

impl AuthRecord {
    /// Build a two-field record (`license_key,device_id`).
    ///
    /// Fails before any I/O if the field lengths are wrong.
    pub fn new(license_key: &str, device_id: &str) -> Result<Self> {
        validate_lengths(license_key, device_id)?;
        Ok(Self {
            license_key: license_key.to_string(),
            device_id: device_id.to_string(),
            product: None,
        })
    }

    /// Build a four-field record that also embeds the product credentials.
    pub fn with_product(
        license_key: &str,
        device_id: &str,
        product_key: &str,
        product_secret: &str,
    ) -> Result<Self> {
        validate_lengths(license_key, device_id)?;
        Ok(Self {
            license_key: license_key.to_string(),
            device_id: device_id.to_string(),
            product: Some((product_key.to_string(), product_secret.to_string())),
        })
    }

    /// The license key field
    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    /// The device id field
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Embedded product credentials, if any
    pub fn product(&self) -> Option<(&str, &str)> {
        self.product.as_ref().map(|(k, s)| (k.as_str(), s.as_str()))
    }

    /// The comma-joined fields, without the checksum
    fn joined(&self) -> String {
        match &self.product {
            Some((key, secret)) => format!(
                "{},{},{},{}",
                self.license_key, self.device_id, key, secret
            ),
            None => format!("{},{}", self.license_key, self.device_id),
        }
    }

    /// Checksum over the comma-joined fields
    pub fn checksum(&self) -> u32 {
        checksum(&self.joined())
    }

    /// Encode the full blob: record + checksum, written twice with a `;`
    pub fn encode(&self) -> String {
        let half = format!("{},{}", self.joined(), self.checksum());
        format!("{half};{half}")
    }

    /// Decode and verify a blob previously produced by [`AuthRecord::encode`].
    ///
    /// Checks that both halves are identical, the checksum matches, the
    /// field count is 2 or 4, and the key/id lengths are valid.
    pub fn decode(blob: &str) -> Result<Self> {
        let mut halves = blob.split(';');
        let (first, second) = match (halves.next(), halves.next(), halves.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => {
                return Err(Error::MalformedBlob(
                    "expected exactly two ';'-separated halves".to_string(),
                ))
            }
        };
        if first != second {
            return Err(Error::BlobMismatch);
        }

        let (record, stored) = first.rsplit_once(',').ok_or_else(|| {
            Error::MalformedBlob("missing checksum field".to_string())
        })?;
        let stored: u32 = stored
            .parse()
            .map_err(|_| Error::MalformedBlob(format!("non-numeric checksum {stored:?}")))?;
        let computed = checksum(record);
        if stored != computed {
            return Err(Error::BadChecksum { stored, computed });
        }

        let fields: Vec<&str> = record.split(',').collect();
        match fields.as_slice() {
            [key, id] => Self::new(key, id),
            [key, id, pk, ps] => Self::with_product(key, id, pk, ps),
            _ => Err(Error::MalformedBlob(format!(
                "expected 2 or 4 fields, got {}",
                fields.len()
            ))),
        }
    }
}

fn validate_lengths(license_key: &str, device_id: &str) -> Result<()> {
    if license_key.len() != LICENSE_KEY_LEN {
        return Err(Error::InvalidLicenseKeyLength(license_key.len()));
    }
    if device_id.len() != DEVICE_ID_LEN {
        return Err(Error::InvalidDeviceIdLength(device_id.len()));
    }
    Ok(())
}

/// Additive checksum: the sum of the char ordinals of `record`
pub fn checksum(record: &str) -> u32 {
    record.chars().map(|c| c as u32).sum()
}

/// Decode an authorization blob read back from flash.
///
/// The flash region is larger than the blob, so the read comes back padded
/// with erased bytes (0xFF) or zeros; those are trimmed before decoding.
pub fn decode_flash_bytes(data: &[u8]) -> Result<AuthRecord> {
    let end = data
        .iter()
        .position(|&b| b == 0xFF || b == 0)
        .unwrap_or(data.len());
    let text = core::str::from_utf8(&data[..end])
        .map_err(|_| Error::MalformedBlob("record is not valid UTF-8".to_string()))?;
    AuthRecord::decode(text)
}
