//! In-place FITS header keyword updates.

use crate::card::Value;
use crate::reader::scan_hdus;
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Sets keywords in one HDU header, rewriting the file.
///
/// Existing cards keep their comments; new keywords are appended before
/// `END`. The header grows by whole blocks when it runs out of room, and
/// every other byte of the file is preserved.
///
/// # Errors
/// Returns an error if the file cannot be read or written, is not valid
/// FITS, or has no HDU `hdu`.
pub fn update_keywords<P: AsRef<Path>>(path: P, hdu: usize, updates: &[(&str, Value)]) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = std::fs::read(path)?;
    let hdus = scan_hdus(&bytes, path)?;
    let target = hdus.get(hdu).ok_or_else(|| Error::MissingHdu {
        path: path.display().to_string(),
        index: hdu,
    })?;

    let mut header = target.header.clone();
    for (keyword, value) in updates {
        debug!(path = %path.display(), hdu, keyword, value = %value, "updating keyword");
        header.set(keyword, value.clone());
    }

    let start = target.header_offset;
    let end = start + target.header_len;
    bytes.splice(start..end, header.to_bytes());

    std::fs::write(path, bytes)?;
    Ok(())
}
