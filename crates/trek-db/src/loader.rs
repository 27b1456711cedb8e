use std::path::Path;

use tracing::{debug, info};
use trek_common::{Error, Result};

use crate::migration::{Migration, normalize_extension};
use crate::migrations::Migrations;

/// Load every migration file with the given extension from `dir`.
///
/// `extension` may be given with or without its leading dot and may be
/// compound (`up.sql`). Sub-directories and files with another extension are
/// ignored. Every file with the extension must be a valid migration: a
/// malformed name or body aborts the whole load.
pub fn load_migrations(dir: &Path, extension: &str) -> Result<Migrations> {
    let suffix = format!(".{}", normalize_extension(extension)?);
    let discovery_err = |e: std::io::Error| Error::Discovery {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(discovery_err)? {
        let entry = entry.map_err(discovery_err)?;
        if !entry.file_type().map_err(discovery_err)?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            debug!("ignoring {}: filename is not valid UTF-8", path.display());
            continue;
        };
        if !filename.ends_with(&suffix) {
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(discovery_err)?;
        migrations.push(Migration::parse(filename, &content)?);
    }

    let set = Migrations::new(migrations)?;
    info!("loaded {} migrations from {}", set.len(), dir.display());
    Ok(set)
}
