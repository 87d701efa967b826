//! The device authorization handshake
//!
//! Strictly linear control flow: read MAC → report → allocate → apply
//! (bounded retry) → write blob to flash → confirm. On a flash or confirm
//! failure the freshly applied license is released back to the pool with
//! `confirm(Released)`; that rollback is fire-and-forget.
//!
//! A crash between apply and confirm leaves the license
//! allocated-but-unconfirmed on the server; reconciling that is a manual
//! operation outside this tool.

use crate::auth::AuthRecord;
use crate::error::{Error, Result};
use crate::flash::{offsets, FlashTool};
use crate::license::{AllocateOutcome, LicenseRecord, LicenseService, LicenseState};
use crate::mac::MacAddr;
use crate::retry::RetryPolicy;

/// Handshake parameters
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Flash offset of the auth partition
    pub offset: u32,
    /// Retry policy for the apply call
    pub retry: RetryPolicy,
    /// When set, the product key/secret are embedded as the third and
    /// fourth record fields (newer firmware expects them)
    pub product: Option<(String, String)>,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            offset: offsets::AUTH_OFFSET_C2,
            retry: RetryPolicy::default(),
            product: None,
        }
    }
}

/// Result of a successful handshake
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    /// The device MAC the license is bound to
    pub mac: MacAddr,
    /// The license written to flash
    pub record: LicenseRecord,
    /// True when the allocate step found the MAC already licensed and the
    /// existing record was re-flashed instead of applying a fresh one
    pub reused_existing: bool,
}

/// Run the full handshake against a device.
pub fn provision<S, T>(svc: &S, tool: &T, opts: &ProvisionOptions) -> Result<ProvisionOutcome>
where
    S: LicenseService + ?Sized,
    T: FlashTool + ?Sized,
{
    let mac = tool.read_mac()?;
    log::info!("device MAC: {}", mac);

    svc.report(&mac)?;
    log::info!("reported MAC {}", mac);

    let (record, reused_existing) = match svc.allocate(&mac)? {
        AllocateOutcome::Allocated => {
            let record = apply_with_retry(svc, &mac, &opts.retry)?;
            (record, false)
        }
        AllocateOutcome::AlreadyAllocated => {
            log::warn!("MAC {} already allocated, fetching existing license", mac);
            (svc.fetch_existing(&mac)?, true)
        }
    };
    log::info!(
        "license for {}: device id {}, key {}",
        mac,
        record.device_id,
        record.license_key
    );

    // Length validation happens here, before any flash I/O.
    let auth = match &opts.product {
        Some((key, secret)) => {
            AuthRecord::with_product(&record.license_key, &record.device_id, key, secret)?
        }
        None => AuthRecord::new(&record.license_key, &record.device_id)?,
    };

    if let Err(e) = tool.write_flash(opts.offset, auth.encode().as_bytes()) {
        // A reused license was consumed in an earlier run; only a license
        // applied in this run is released on failure.
        if !reused_existing {
            release_license(svc, &mac, &record);
        }
        return Err(e);
    }
    log::info!("authorization record written at {:#x}", opts.offset);

    if !reused_existing {
        if let Err(e) = svc.confirm(&mac, &record, LicenseState::Confirmed) {
            release_license(svc, &mac, &record);
            return Err(e);
        }
    }

    Ok(ProvisionOutcome {
        mac,
        record,
        reused_existing,
    })
}

fn apply_with_retry<S>(svc: &S, mac: &MacAddr, retry: &RetryPolicy) -> Result<LicenseRecord>
where
    S: LicenseService + ?Sized,
{
    let mut attempts = 0;
    retry
        .run(|attempt| {
            attempts = attempt;
            svc.apply(mac)
        })
        .map_err(|e| Error::Apply {
            attempts,
            body: e.to_string(),
        })
}

/// Roll back a consumed license. Failure is logged, never escalated: this
/// is the terminal step of an already failing handshake.
fn release_license<S>(svc: &S, mac: &MacAddr, record: &LicenseRecord)
where
    S: LicenseService + ?Sized,
{
    match svc.confirm(mac, record, LicenseState::Released) {
        Ok(()) => log::info!("released license {} for {}", record.license_key, mac),
        Err(e) => log::warn!(
            "failed to release license {} for {}: {}",
            record.license_key,
            mac,
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    const KEY: &str = "f594b05ef36f410b82f2719fe7a83fe2";
    const ID: &str = "nc1217e0";

    fn record() -> LicenseRecord {
        LicenseRecord {
            device_id: ID.to_string(),
            license_key: KEY.to_string(),
        }
    }

    #[derive(Default)]
    struct FakeService {
        apply_calls: Cell<u32>,
        apply_failures: u32,
        allocate_outcome: Option<AllocateOutcome>,
        existing: Option<LicenseRecord>,
        issued: Option<LicenseRecord>,
        fail_confirmed: bool,
        confirms: RefCell<Vec<u8>>,
    }

    impl FakeService {
        fn issuing(record: LicenseRecord) -> Self {
            Self {
                allocate_outcome: Some(AllocateOutcome::Allocated),
                issued: Some(record),
                ..Default::default()
            }
        }
    }

    impl LicenseService for FakeService {
        fn report(&self, _mac: &MacAddr) -> Result<()> {
            Ok(())
        }

        fn allocate(&self, _mac: &MacAddr) -> Result<AllocateOutcome> {
            Ok(self.allocate_outcome.unwrap_or(AllocateOutcome::Allocated))
        }

        fn apply(&self, _mac: &MacAddr) -> Result<LicenseRecord> {
            let call = self.apply_calls.get() + 1;
            self.apply_calls.set(call);
            if call <= self.apply_failures {
                return Err(Error::Http("service unavailable".to_string()));
            }
            self.issued.clone().ok_or(Error::NoLicense)
        }

        fn confirm(
            &self,
            _mac: &MacAddr,
            _record: &LicenseRecord,
            state: LicenseState,
        ) -> Result<()> {
            self.confirms.borrow_mut().push(state.code());
            if self.fail_confirmed && state == LicenseState::Confirmed {
                return Err(Error::Confirm("state change rejected".to_string()));
            }
            Ok(())
        }

        fn fetch_existing(&self, _mac: &MacAddr) -> Result<LicenseRecord> {
            self.existing.clone().ok_or(Error::NoLicense)
        }
    }

    #[derive(Default)]
    struct FakeTool {
        write_calls: Cell<u32>,
        fail_write: bool,
        written: RefCell<Vec<(u32, Vec<u8>)>>,
    }

    impl FlashTool for FakeTool {
        fn read_mac(&self) -> Result<MacAddr> {
            MacAddr::parse("cc8da20bf278")
        }

        fn write_flash(&self, offset: u32, data: &[u8]) -> Result<()> {
            self.write_calls.set(self.write_calls.get() + 1);
            if self.fail_write {
                return Err(Error::FlashWrite("timed out waiting for packet".to_string()));
            }
            self.written.borrow_mut().push((offset, data.to_vec()));
            Ok(())
        }

        fn read_flash(&self, _offset: u32, size: usize) -> Result<Vec<u8>> {
            Ok(vec![0xFF; size])
        }
    }

    fn opts() -> ProvisionOptions {
        ProvisionOptions {
            retry: RetryPolicy::no_delay(32),
            ..Default::default()
        }
    }

    #[test]
    fn happy_path_writes_blob_and_confirms() {
        let svc = FakeService::issuing(record());
        let tool = FakeTool::default();
        let outcome = provision(&svc, &tool, &opts()).unwrap();

        assert_eq!(outcome.record, record());
        assert!(!outcome.reused_existing);
        assert_eq!(*svc.confirms.borrow(), vec![3]);

        let written = tool.written.borrow();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, offsets::AUTH_OFFSET_C2);
        let blob = String::from_utf8(written[0].1.clone()).unwrap();
        let halves: Vec<&str> = blob.split(';').collect();
        assert_eq!(halves[0], halves[1]);
    }

    #[test]
    fn apply_gives_up_after_retry_budget() {
        let svc = FakeService {
            apply_failures: u32::MAX,
            ..FakeService::issuing(record())
        };
        let tool = FakeTool::default();
        let err = provision(&svc, &tool, &opts()).unwrap_err();

        assert!(matches!(err, Error::Apply { attempts: 32, .. }));
        assert_eq!(svc.apply_calls.get(), 32);
        // Nothing was flashed.
        assert_eq!(tool.write_calls.get(), 0);
    }

    #[test]
    fn apply_recovers_within_budget() {
        let svc = FakeService {
            apply_failures: 5,
            ..FakeService::issuing(record())
        };
        let tool = FakeTool::default();
        let outcome = provision(&svc, &tool, &opts()).unwrap();
        assert_eq!(svc.apply_calls.get(), 6);
        assert_eq!(outcome.record, record());
    }

    #[test]
    fn flash_failure_releases_license() {
        let svc = FakeService::issuing(record());
        let tool = FakeTool {
            fail_write: true,
            ..Default::default()
        };
        let err = provision(&svc, &tool, &opts()).unwrap_err();
        assert!(matches!(err, Error::FlashWrite(_)));
        assert_eq!(*svc.confirms.borrow(), vec![0]);
    }

    #[test]
    fn confirm_failure_releases_license_and_fails() {
        let svc = FakeService {
            fail_confirmed: true,
            ..FakeService::issuing(record())
        };
        let tool = FakeTool::default();
        let err = provision(&svc, &tool, &opts()).unwrap_err();

        assert!(matches!(err, Error::Confirm(_)));
        // The blob was written, then the rejected confirm rolled the
        // license back to the pool.
        assert_eq!(tool.write_calls.get(), 1);
        assert_eq!(*svc.confirms.borrow(), vec![3, 0]);
    }

    #[test]
    fn already_allocated_falls_back_to_existing_license() {
        let svc = FakeService {
            allocate_outcome: Some(AllocateOutcome::AlreadyAllocated),
            existing: Some(record()),
            ..Default::default()
        };
        let tool = FakeTool::default();
        let outcome = provision(&svc, &tool, &opts()).unwrap();

        assert!(outcome.reused_existing);
        assert_eq!(svc.apply_calls.get(), 0);
        // Re-flashed licenses are already consumed server-side: no confirm.
        assert!(svc.confirms.borrow().is_empty());
        assert_eq!(tool.write_calls.get(), 1);
    }

    #[test]
    fn reused_license_is_not_released_on_flash_failure() {
        let svc = FakeService {
            allocate_outcome: Some(AllocateOutcome::AlreadyAllocated),
            existing: Some(record()),
            ..Default::default()
        };
        let tool = FakeTool {
            fail_write: true,
            ..Default::default()
        };
        let err = provision(&svc, &tool, &opts()).unwrap_err();
        assert!(matches!(err, Error::FlashWrite(_)));
        assert!(svc.confirms.borrow().is_empty());
    }

    #[test]
    fn bad_license_lengths_fail_before_flash_io() {
        let svc = FakeService::issuing(LicenseRecord {
            device_id: "short".to_string(),
            license_key: KEY.to_string(),
        });
        let tool = FakeTool::default();
        let err = provision(&svc, &tool, &opts()).unwrap_err();
        assert!(matches!(err, Error::InvalidDeviceIdLength(5)));
        assert_eq!(tool.write_calls.get(), 0);
    }

    #[test]
    fn product_fields_are_embedded_when_requested() {
        let svc = FakeService::issuing(record());
        let tool = FakeTool::default();
        let opts = ProvisionOptions {
            product: Some(("pk".to_string(), "ps".to_string())),
            retry: RetryPolicy::no_delay(1),
            ..Default::default()
        };
        provision(&svc, &tool, &opts).unwrap();
        let written = tool.written.borrow();
        let blob = String::from_utf8(written[0].1.clone()).unwrap();
        assert!(blob.contains(&format!("{KEY},{ID},pk,ps,")));
    }
}
