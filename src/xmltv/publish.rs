//! Atomic publication of the `epg-<region>.xml` / `.xml.gz` pair
//!
//! Both files are written to a temp file in the output directory and renamed
//! into place, so readers never see a truncated artifact. The plain XML is
//! published first; if the gzip copy then fails the XML stays published and
//! the error is reported.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::error::{GuideError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    /// `epg-<region>.xml`
    pub xml: PathBuf,
    /// `epg-<region>.xml.gz`
    pub gzip: PathBuf,
}

pub struct Publisher {
    output_dir: PathBuf,
    /// One writer per region at a time
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Publisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn artifact_paths(&self, region: &str) -> ArtifactPaths {
        let name = format!("epg-{}.xml", region);
        ArtifactPaths {
            gzip: self.output_dir.join(format!("{}.gz", name)),
            xml: self.output_dir.join(name),
        }
    }

    fn region_lock(&self, region: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(region.to_string()).or_default())
    }

    /// Write `xml` and its gzip copy for `region`
    pub fn publish(&self, region: &str, xml: &[u8]) -> Result<ArtifactPaths> {
        let lock = self.region_lock(region);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::create_dir_all(&self.output_dir).map_err(|e| GuideError::persistence(&self.output_dir, e))?;
        let paths = self.artifact_paths(region);

        write_atomically(&self.output_dir, &paths.xml, |file| file.write_all(xml))?;
        write_atomically(&self.output_dir, &paths.gzip, |file| {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(xml)?;
            encoder.finish()?;
            Ok(())
        })?;

        Ok(paths)
    }
}

/// Published artifacts are served by other processes, so they stay world-readable
#[cfg(unix)]
fn make_readable(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_readable(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Fill a temp file next to `target` and rename it over `target`.
/// The temp file is removed if anything fails before the rename.
fn write_atomically<F>(dir: &Path, target: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| GuideError::persistence(target, e))?;
    fill(tmp.as_file_mut()).map_err(|e| GuideError::persistence(target, e))?;
    make_readable(tmp.as_file()).map_err(|e| GuideError::persistence(target, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| GuideError::persistence(target, e))?;
    tmp.persist(target)
        .map_err(|e| GuideError::persistence(target, e.error))?;
    Ok(())
}
