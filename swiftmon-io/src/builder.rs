//! Minimal FITS file construction for fixtures.
//!
//! Only compiled for tests or with the `test-util` feature; pipeline stages
//! never write FITS files themselves.

use crate::card::{padded_len, Card, Header, Value};
use crate::Result;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Builder for one HDU of a FITS file.
#[derive(Debug, Clone)]
pub struct HduBuilder {
    header: Header,
    data: Vec<u8>,
}

impl HduBuilder {
    /// Primary HDU without data.
    #[must_use]
    pub fn empty_primary() -> Self {
        let mut header = Header::new();
        header.set("SIMPLE", true);
        header.set("BITPIX", 8);
        header.set("NAXIS", 0);
        Self {
            header,
            data: Vec::new(),
        }
    }

    /// Primary image HDU with 64-bit float pixels, `image[[row, col]]`.
    #[must_use]
    pub fn image(image: &Array2<f64>) -> Self {
        let data = image.iter().flat_map(|v| v.to_be_bytes()).collect();
        Self::image_with(-64, image.dim(), data)
    }

    /// Primary image HDU with 32-bit integer pixels.
    #[must_use]
    pub fn image_i32(image: &Array2<i32>) -> Self {
        let data = image.iter().flat_map(|v| v.to_be_bytes()).collect();
        Self::image_with(32, image.dim(), data)
    }

    fn image_with(bitpix: i64, (rows, cols): (usize, usize), data: Vec<u8>) -> Self {
        let mut header = Header::new();
        header.set("SIMPLE", true);
        header.set("BITPIX", bitpix);
        header.set("NAXIS", 2);
        header.set("NAXIS1", to_i64(cols));
        header.set("NAXIS2", to_i64(rows));
        Self { header, data }
    }

    /// Binary table extension with `rows` zero-filled rows of `row_bytes`.
    #[must_use]
    pub fn table(extname: &str, rows: usize, row_bytes: usize) -> Self {
        let mut header = Header::new();
        header.set("XTENSION", "BINTABLE");
        header.set("BITPIX", 8);
        header.set("NAXIS", 2);
        header.set("NAXIS1", to_i64(row_bytes));
        header.set("NAXIS2", to_i64(rows));
        header.set("PCOUNT", 0);
        header.set("GCOUNT", 1);
        header.set("TFIELDS", 0);
        header.set("EXTNAME", extname);
        Self {
            header,
            data: vec![0; rows * row_bytes],
        }
    }

    /// Adds or replaces a keyword.
    #[must_use]
    pub fn keyword(mut self, keyword: &str, value: impl Into<Value>) -> Self {
        self.header.set(keyword, value);
        self
    }

    /// Adds a HISTORY card.
    #[must_use]
    pub fn history(mut self, text: &str) -> Self {
        let mut cards = self.header.cards().to_vec();
        cards.push(Card::parse(format!("HISTORY {text}").as_bytes()));
        self.header = Header::from_cards(cards);
        self
    }

    fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&self.header.to_bytes())?;
        writer.write_all(&self.data)?;
        let padding = padded_len(self.data.len()) - self.data.len();
        writer.write_all(&vec![0u8; padding])
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Writes a FITS file from HDU builders; the first must be a primary HDU.
///
/// # Errors
/// Returns an I/O error if the file cannot be written.
pub fn write_fits<P: AsRef<Path>>(path: P, hdus: &[HduBuilder]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for hdu in hdus {
        hdu.write_to(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
