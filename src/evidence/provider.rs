// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::errors::Error;
use crate::nonce::Nonce;
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Default mount point of the Linux configfs-tsm report interface
pub const TSM_REPORT_ROOT: &str = "/sys/kernel/config/tsm/report";

// The report interface is host-wide and handles one request at a time.
static TSM_LOCK: Mutex<()> = Mutex::new(());
static TSM_ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Access to the trusted hardware/firmware layer that produces attestation
/// evidence bound to a challenge.
pub trait EvidenceProvider: Send + Sync {
    /// Obtain evidence for the supplied nonce.  Implementations do not retry.
    fn collect(&self, nonce: &Nonce) -> Result<Vec<u8>, Error>;
}

impl<F> EvidenceProvider for F
where
    F: Fn(&Nonce) -> Result<Vec<u8>, Error> + Send + Sync,
{
    fn collect(&self, nonce: &Nonce) -> Result<Vec<u8>, Error> {
        self(nonce)
    }
}

/// Evidence provider backed by the Linux configfs-tsm report interface
#[derive(Debug, Clone)]
pub struct TsmProvider {
    root: PathBuf,
}

impl Default for TsmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TsmProvider {
    pub fn new() -> Self {
        Self::with_root(TSM_REPORT_ROOT)
    }

    /// Use a report interface mounted somewhere other than the default
    /// location
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn new_entry(&self) -> Result<PathBuf, Error> {
        let seq = TSM_ENTRY_SEQ.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .root
            .join(format!("ccapassport-{}-{seq}", std::process::id()));

        fs::create_dir(&entry).map_err(|e| {
            Error::CollectionFailed(format!("creating report entry {entry:?}: {e}"))
        })?;

        Ok(entry)
    }

    fn read_report(&self, entry: &Path, nonce: &Nonce) -> Result<Vec<u8>, Error> {
        fs::write(entry.join("inblob"), nonce.as_bytes())
            .map_err(|e| Error::CollectionFailed(format!("writing inblob: {e}")))?;

        let before = read_generation(entry)?;

        let outblob = fs::read(entry.join("outblob"))
            .map_err(|e| Error::CollectionFailed(format!("reading outblob: {e}")))?;

        let after = read_generation(entry)?;

        if before != after {
            return Err(Error::CollectionFailed(format!(
                "report entry modified while reading (generation {before} -> {after})"
            )));
        }

        if outblob.is_empty() {
            return Err(Error::CollectionFailed("empty outblob".to_string()));
        }

        debug!("collected {} bytes of evidence", outblob.len());

        Ok(outblob)
    }
}

fn read_generation(entry: &Path) -> Result<u64, Error> {
    let s = fs::read_to_string(entry.join("generation"))
        .map_err(|e| Error::CollectionFailed(format!("reading generation: {e}")))?;

    s.trim()
        .parse::<u64>()
        .map_err(|e| Error::CollectionFailed(format!("parsing generation {s:?}: {e}")))
}

impl EvidenceProvider for TsmProvider {
    fn collect(&self, nonce: &Nonce) -> Result<Vec<u8>, Error> {
        match fs::metadata(&self.root) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(Error::SourceUnavailable(format!(
                    "{:?} is not a directory",
                    self.root
                )))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::SourceUnavailable(format!(
                    "no TSM report interface at {:?}",
                    self.root
                )))
            }
            Err(e) => {
                return Err(Error::SourceUnavailable(format!(
                    "accessing {:?}: {e}",
                    self.root
                )))
            }
        }

        // the guarded state is (), so a poisoned lock is still usable
        let _guard = TSM_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let entry = self.new_entry()?;
        let r = self.read_report(&entry, nonce);

        if let Err(e) = fs::remove_dir(&entry) {
            warn!("removing report entry {entry:?}: {e}");
        }

        r
    }
}
