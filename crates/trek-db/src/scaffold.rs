use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;
use trek_common::{Error, ParseErrorKind, Result};

use crate::migration::{normalize_extension, split_filename};

const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

const TEMPLATE: &str = "-- up\n\n-- down\n";

/// Filename for a migration created at `now`.
pub fn migration_filename(name: &str, extension: &str, now: NaiveDateTime) -> Result<String> {
    let extension = normalize_extension(extension)?;
    let filename = format!("{}_{name}.{extension}", now.format(VERSION_FORMAT));
    match split_filename(&filename) {
        Some((_, parsed)) if parsed == name => Ok(filename),
        _ => Err(Error::Parse {
            filename,
            kind: ParseErrorKind::InvalidFilename,
        }),
    }
}

/// Write an empty up/down migration into `dir`, creating the directory if
/// needed. Never overwrites an existing file.
pub fn new_migration(dir: &Path, name: &str, extension: &str, now: NaiveDateTime) -> Result<PathBuf> {
    let filename = migration_filename(name, extension, now)?;
    std::fs::create_dir_all(dir)?;

    let path = dir.join(filename);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| Error::Other(format!("failed to create {}: {e}", path.display())))?;
    file.write_all(TEMPLATE.as_bytes())?;

    info!("created migration {}", path.display());
    Ok(path)
}
