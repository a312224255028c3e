//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the chain database
//! loads its state.

use std::path::Path;

use heed::types::Bytes;
use heed::Env;

use dpos_store::Table;

use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub missing: Vec<&'static str>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check LMDB database integrity on startup.
///
/// Opens each table database and counts its entries. Read failures are
/// recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &Env) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        missing: Vec::new(),
        errors: Vec::new(),
    };

    let rtxn = env.read_txn()?;

    for table in Table::ALL {
        let name = table.name();
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", name, e)),
                }
            }
            // Fresh environment.
            Ok(None) => report.missing.push(name),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", name, e)),
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
