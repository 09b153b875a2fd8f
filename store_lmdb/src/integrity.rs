//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the scheduler starts
//! acting on stored records.

use std::path::Path;

use govproxy_store::ReferendumStore;
use govproxy_types::RecordKey;

use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub records_checked: u64,
    pub open_records: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Walk every stored record and the open index.
///
/// Each record must decode, sit under the key it carries, and appear in the
/// open index exactly when it is not closed. Problems are collected in the
/// report rather than returned as a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        records_checked: 0,
        open_records: 0,
        errors: Vec::new(),
    };

    let rtxn = env.env().read_txn()?;
    for entry in env.referenda_db.iter(&rtxn)? {
        let (kb, val) = entry?;
        report.records_checked += 1;

        let Some(key) = RecordKey::from_bytes(kb) else {
            report.errors.push(format!("malformed record key {:?}", kb));
            continue;
        };
        let record: govproxy_store::ReferendumRecord = match bincode::deserialize(val) {
            Ok(record) => record,
            Err(e) => {
                report.errors.push(format!("record {key} does not decode: {e}"));
                continue;
            }
        };
        if record.key != key {
            report
                .errors
                .push(format!("record {} stored under key {key}", record.key));
        }
        let indexed = env.open_index_db.get(&rtxn, kb)?.is_some();
        if !record.is_closed() {
            report.open_records += 1;
        }
        if indexed == record.is_closed() {
            report.errors.push(format!(
                "open index disagrees with record {key} (closed: {})",
                record.is_closed()
            ));
        }
    }

    for entry in env.open_index_db.iter(&rtxn)? {
        let (kb, _) = entry?;
        if env.referenda_db.get(&rtxn, kb)?.is_none() {
            report
                .errors
                .push(format!("open index entry {:?} has no record", kb));
        }
    }

    // Cross-check through the trait so a healthy report implies list_open works.
    if report.errors.is_empty() {
        drop(rtxn);
        if let Err(e) = env.referendum_store().list_open() {
            report.errors.push(format!("list_open failed: {e}"));
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let is_empty = std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "data directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
