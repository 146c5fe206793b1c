//! Memory-mapped FITS reader.
//!

use crate::card::{padded_len, Card, Header, Value, CARD_LEN};
use crate::{Error, Result};
use memmap2::Mmap;
use ndarray::Array2;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Location and header of one HDU inside a FITS file.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    /// Position in the file (0 = primary).
    pub index: usize,
    /// Parsed header.
    pub header: Header,
    /// Byte offset of the first header card.
    pub header_offset: usize,
    /// Header size in bytes, including block padding.
    pub header_len: usize,
    /// Byte offset of the data unit.
    pub data_offset: usize,
    /// Data size in bytes, excluding block padding.
    pub data_len: usize,
}

impl Hdu {
    /// Name of the extension, if any.
    #[must_use]
    pub fn extname(&self) -> Option<&str> {
        self.header.extname()
    }
}

/// Walks the HDUs of an in-memory FITS image.
///
/// Scanning stops at the first block after the primary HDU that does not
/// begin an extension, so trailing padding is tolerated.
pub(crate) fn scan_hdus(data: &[u8], path: &Path) -> Result<Vec<Hdu>> {
    let invalid = |reason: String| Error::InvalidFormat {
        path: path.display().to_string(),
        reason,
    };

    if !data.starts_with(b"SIMPLE  =") {
        return Err(invalid("missing SIMPLE card".into()));
    }

    let mut hdus = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if !hdus.is_empty() && !data[offset..].starts_with(b"XTENSION") {
            break;
        }

        let mut cards = Vec::new();
        let mut cursor = offset;
        loop {
            let Some(raw) = data.get(cursor..cursor + CARD_LEN) else {
                return Err(invalid(format!("unterminated header at byte {offset}")));
            };
            let card = Card::parse(raw);
            cursor += CARD_LEN;
            if card.is_end() {
                break;
            }
            cards.push(card);
        }

        let header = Header::from_cards(cards);
        let header_len = padded_len(cursor - offset);
        let data_offset = offset + header_len;
        let data_len = data_unit_len(&header).map_err(&invalid)?;

        if data_offset + data_len > data.len() {
            return Err(invalid(format!(
                "HDU {} data unit truncated ({} bytes expected)",
                hdus.len(),
                data_len
            )));
        }

        hdus.push(Hdu {
            index: hdus.len(),
            header,
            header_offset: offset,
            header_len,
            data_offset,
            data_len,
        });
        offset = data_offset + padded_len(data_len);
    }

    Ok(hdus)
}

/// Size of the data unit described by a header, without padding.
fn data_unit_len(header: &Header) -> std::result::Result<usize, String> {
    let int = |keyword: &str, default: Option<i64>| -> std::result::Result<usize, String> {
        let value = match header.get(keyword) {
            Some(value) => value
                .as_i64()
                .ok_or_else(|| format!("{keyword} is not an integer"))?,
            None => default.ok_or_else(|| format!("missing {keyword}"))?,
        };
        usize::try_from(value).map_err(|_| format!("{keyword} = {value} is negative"))
    };

    let naxis = int("NAXIS", None)?;
    if naxis == 0 {
        return Ok(0);
    }

    let bitpix = header
        .get("BITPIX")
        .and_then(Value::as_i64)
        .ok_or("missing BITPIX")?;
    let bytes_per_value = usize::try_from(bitpix.unsigned_abs() / 8).map_err(|e| e.to_string())?;

    let mut elements = 1usize;
    for axis in 1..=naxis {
        elements = elements.saturating_mul(int(&format!("NAXIS{axis}"), None)?);
    }

    let pcount = int("PCOUNT", Some(0))?;
    let gcount = int("GCOUNT", Some(1))?;
    Ok(bytes_per_value
        .saturating_mul(gcount)
        .saturating_mul(pcount.saturating_add(elements)))
}

/// A FITS file opened for reading headers and images.
///
/// Uses memmap2 to access the data units without copying the file.
pub struct FitsFile {
    mmap: Mmap,
    path: PathBuf,
    hdus: Vec<Hdu>,
}

impl FitsFile {
    /// Opens and indexes a FITS file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its HDU structure is
    /// invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::InvalidFormat {
                path: path.display().to_string(),
                reason: "file is empty".into(),
            });
        }
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let hdus = scan_hdus(&mmap, &path)?;
        Ok(Self { mmap, path, hdus })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All HDUs in file order.
    #[must_use]
    pub fn hdus(&self) -> &[Hdu] {
        &self.hdus
    }

    /// HDU by position.
    ///
    /// # Errors
    /// Returns [`Error::MissingHdu`] if the index is past the last HDU.
    pub fn hdu(&self, index: usize) -> Result<&Hdu> {
        self.hdus.get(index).ok_or_else(|| Error::MissingHdu {
            path: self.path.display().to_string(),
            index,
        })
    }

    /// First extension whose EXTNAME matches (case-insensitive).
    ///
    /// # Errors
    /// Returns [`Error::MissingExtension`] if no extension has that name.
    pub fn extension(&self, extname: &str) -> Result<&Hdu> {
        self.hdus
            .iter()
            .find(|hdu| hdu.extname().is_some_and(|n| n.eq_ignore_ascii_case(extname)))
            .ok_or_else(|| Error::MissingExtension {
                path: self.path.display().to_string(),
                extname: extname.to_string(),
            })
    }

    /// Raw keyword value from HDU `hdu`.
    ///
    /// # Errors
    /// Returns [`Error::MissingHdu`] or [`Error::MissingKeyword`].
    pub fn keyword(&self, hdu: usize, keyword: &str) -> Result<&Value> {
        self.hdu(hdu)?
            .header
            .get(keyword)
            .ok_or_else(|| Error::MissingKeyword {
                path: self.path.display().to_string(),
                hdu,
                keyword: keyword.to_string(),
            })
    }

    /// Numeric keyword value.
    ///
    /// # Errors
    /// Returns [`Error::KeywordType`] if the value is not numeric.
    pub fn read_f64(&self, hdu: usize, keyword: &str) -> Result<f64> {
        self.keyword(hdu, keyword)?
            .as_f64()
            .ok_or_else(|| self.type_error(keyword, "a number"))
    }

    /// String keyword value.
    ///
    /// # Errors
    /// Returns [`Error::KeywordType`] if the value is not a string.
    pub fn read_str(&self, hdu: usize, keyword: &str) -> Result<String> {
        self.keyword(hdu, keyword)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.type_error(keyword, "a string"))
    }

    /// Number of rows (NAXIS2) in the named table extension.
    ///
    /// # Errors
    /// Returns [`Error::MissingExtension`] if the extension does not exist.
    pub fn row_count(&self, extname: &str) -> Result<usize> {
        let hdu = self.extension(extname)?;
        let rows = hdu
            .header
            .get("NAXIS2")
            .and_then(Value::as_i64)
            .ok_or_else(|| self.type_error("NAXIS2", "an integer"))?;
        usize::try_from(rows).map_err(|_| self.type_error("NAXIS2", "a row count"))
    }

    /// Reads a two-dimensional image as `[row, column]` = `[y - 1, x - 1]`.
    ///
    /// BSCALE and BZERO are applied.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the HDU is not a 2-D image with a
    /// supported BITPIX.
    #[allow(clippy::cast_precision_loss)]
    pub fn read_image(&self, hdu: usize) -> Result<Array2<f64>> {
        let hdu = self.hdu(hdu)?;
        let header = &hdu.header;
        let invalid = |reason: String| Error::InvalidFormat {
            path: self.path.display().to_string(),
            reason,
        };
        let axis = |keyword: &str| {
            header
                .get(keyword)
                .and_then(Value::as_i64)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| invalid(format!("image HDU {} lacks {keyword}", hdu.index)))
        };

        if axis("NAXIS")? != 2 {
            return Err(invalid(format!("HDU {} is not a 2-D image", hdu.index)));
        }
        let (cols, rows) = (axis("NAXIS1")?, axis("NAXIS2")?);
        let scale = header.get("BSCALE").and_then(Value::as_f64).unwrap_or(1.0);
        let zero = header.get("BZERO").and_then(Value::as_f64).unwrap_or(0.0);

        let data = &self.mmap[hdu.data_offset..hdu.data_offset + hdu.data_len];
        let raw: Vec<f64> = match header.get("BITPIX").and_then(Value::as_i64) {
            Some(8) => data.iter().map(|&b| f64::from(b)).collect(),
            Some(16) => decode(data, |b| f64::from(i16::from_be_bytes(b))),
            Some(32) => decode(data, |b| f64::from(i32::from_be_bytes(b))),
            Some(64) => decode(data, |b| i64::from_be_bytes(b) as f64),
            Some(-32) => decode(data, |b| f64::from(f32::from_be_bytes(b))),
            Some(-64) => decode(data, f64::from_be_bytes),
            other => return Err(invalid(format!("unsupported BITPIX {other:?}"))),
        };

        let values = raw.into_iter().map(|v| zero + scale * v).collect();
        Array2::from_shape_vec((rows, cols), values).map_err(|e| invalid(e.to_string()))
    }

    fn type_error(&self, keyword: &str, expected: &'static str) -> Error {
        Error::KeywordType {
            path: self.path.display().to_string(),
            keyword: keyword.to_string(),
            expected,
        }
    }
}

/// Decodes big-endian fixed-width values.
fn decode<const N: usize>(data: &[u8], convert: impl Fn([u8; N]) -> f64) -> Vec<f64> {
    data.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            convert(bytes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{write_fits, HduBuilder};
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_open_indexes_hdus() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("obs.evt");
        write_fits(
            &path,
            &[
                HduBuilder::empty_primary(),
                HduBuilder::table("EVENTS", 100, 16).keyword("EXPOSURE", 1500.0),
                HduBuilder::table("GTI", 3, 16),
                HduBuilder::table("BADPIX", 2, 12),
            ],
        )
        .unwrap();

        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.hdus().len(), 4);
        assert_eq!(fits.hdu(1).unwrap().extname(), Some("EVENTS"));
        assert_eq!(fits.hdu(1).unwrap().data_len, 1600);
        assert_eq!(fits.row_count("GTI").unwrap(), 3);
        assert_eq!(fits.row_count("badpix").unwrap(), 2);
        assert!((fits.read_f64(1, "EXPOSURE").unwrap() - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_extension_and_keyword() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("obs.evt");
        write_fits(&path, &[HduBuilder::empty_primary(), HduBuilder::table("EVENTS", 1, 8)]).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        assert!(matches!(fits.row_count("GTI"), Err(Error::MissingExtension { .. })));
        assert!(matches!(
            fits.read_str(1, "BACKFILE"),
            Err(Error::MissingKeyword { hdu: 1, .. })
        ));
        assert!(matches!(fits.hdu(5), Err(Error::MissingHdu { index: 5, .. })));
        assert!(matches!(
            fits.read_str(1, "NAXIS2"),
            Err(Error::KeywordType { .. })
        ));
    }

    #[test]
    fn test_read_image_orientation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("temp.img");
        let image = array![[0.0, 1.0, 2.0], [3.0, 40.0, 5.0]];
        write_fits(&path, &[HduBuilder::image(&image)]).unwrap();

        let read = FitsFile::open(&path).unwrap().read_image(0).unwrap();
        assert_eq!(read.dim(), (2, 3));
        assert_eq!(read, image);
    }

    #[test]
    fn test_read_scaled_integer_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counts.img");
        let counts = array![[1, 2], [3, 4]];
        write_fits(
            &path,
            &[HduBuilder::image_i32(&counts)
                .keyword("BSCALE", 2.0)
                .keyword("BZERO", 10.0)],
        )
        .unwrap();

        let read = FitsFile::open(&path).unwrap().read_image(0).unwrap();
        assert_eq!(read, array![[12.0, 14.0], [16.0, 18.0]]);
    }

    #[test]
    fn test_rejects_non_fits_and_truncated_files() {
        let dir = tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not a fits file").unwrap();
        assert!(matches!(FitsFile::open(&text), Err(Error::InvalidFormat { .. })));

        let empty = dir.path().join("empty.fits");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(FitsFile::open(&empty), Err(Error::InvalidFormat { .. })));

        let truncated = dir.path().join("truncated.img");
        write_fits(&truncated, &[HduBuilder::image(&array![[1.0, 2.0]])]).unwrap();
        let bytes = std::fs::read(&truncated).unwrap();
        std::fs::write(&truncated, &bytes[..2880 + 8]).unwrap();
        assert!(matches!(FitsFile::open(&truncated), Err(Error::InvalidFormat { .. })));
    }
}
