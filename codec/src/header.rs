use crate::{
    ebcdic,
    fields::{
        Field, BINARY_BASE, BINARY_FIELDS, BINARY_FIELD_COUNT, BIN_FORMAT, BIN_SAMP_NUM,
        BIN_SAMP_RATE, TRACE_BASE, TRACE_FIELDS, TRACE_FIELD_COUNT,
    },
    Block, Endian, Error, TextEncoding, BINARY_HEADER_SIZE, TEXT_COLUMNS, TEXT_HEADER_SIZE,
    TEXT_ROWS, TRACE_HEADER_SIZE,
};
use bytes::{Buf, BufMut};

/// The 3200-byte textual file header: 40 rows of 80 characters, stored as ASCII.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextHeader {
    bytes: Vec<u8>,
}

impl Default for TextHeader {
    fn default() -> Self {
        Self {
            bytes: vec![b' '; TEXT_HEADER_SIZE],
        }
    }
}

impl TextHeader {
    /// Build a header from exactly 40 rows of at most 80 bytes each.
    ///
    /// Short rows are padded with spaces.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, Error> {
        if rows.len() != TEXT_ROWS {
            return Err(Error::ShapeMismatch {
                what: "text header rows",
                expected: TEXT_ROWS,
                found: rows.len(),
            });
        }
        let mut bytes = Vec::with_capacity(TEXT_HEADER_SIZE);
        for row in rows {
            let row = row.as_ref().as_bytes();
            if row.len() > TEXT_COLUMNS {
                return Err(Error::ShapeMismatch {
                    what: "text header columns",
                    expected: TEXT_COLUMNS,
                    found: row.len(),
                });
            }
            bytes.extend_from_slice(row);
            bytes.resize(bytes.len() + TEXT_COLUMNS - row.len(), b' ');
        }
        Ok(Self { bytes })
    }

    /// Build a header from 3200 raw ASCII bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != TEXT_HEADER_SIZE {
            return Err(Error::ShapeMismatch {
                what: "text header bytes",
                expected: TEXT_HEADER_SIZE,
                found: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Raw ASCII bytes (row-major).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The 40 rows with trailing spaces and NULs removed.
    ///
    /// Non-ASCII bytes are replaced with `?`.
    pub fn rows(&self) -> Vec<String> {
        self.bytes
            .chunks(TEXT_COLUMNS)
            .map(|row| {
                let end = row
                    .iter()
                    .rposition(|b| *b != b' ' && *b != 0)
                    .map_or(0, |i| i + 1);
                row[..end]
                    .iter()
                    .map(|b| if b.is_ascii() { *b as char } else { '?' })
                    .collect()
            })
            .collect()
    }
}

impl Block for TextHeader {
    const SIZE: usize = TEXT_HEADER_SIZE;
    const NAME: &'static str = "text header";
    type Cfg = TextEncoding;

    fn write(&self, buf: &mut impl BufMut, encoding: TextEncoding) -> Result<(), Error> {
        match encoding {
            TextEncoding::Ascii => buf.put_slice(&self.bytes),
            TextEncoding::Ebcdic => {
                let mut encoded = self.bytes.clone();
                ebcdic::encode_in_place(&mut encoded);
                buf.put_slice(&encoded);
            }
        }
        Ok(())
    }

    fn read_cfg(buf: &mut impl Buf, encoding: TextEncoding) -> Result<Self, Error> {
        if buf.remaining() < Self::SIZE {
            return Err(Error::EndOfBuffer(Self::NAME));
        }
        let mut bytes = vec![0u8; Self::SIZE];
        buf.copy_to_slice(&mut bytes);
        if encoding == TextEncoding::Ebcdic {
            ebcdic::decode_in_place(&mut bytes);
        }
        Ok(Self { bytes })
    }
}

fn read_fields<const N: usize>(
    buf: &mut impl Buf,
    fields: &[Field; N],
    base: usize,
    size: usize,
    endian: Endian,
    name: &'static str,
) -> Result<[f64; N], Error> {
    if buf.remaining() < size {
        return Err(Error::EndOfBuffer(name));
    }
    let mut block = vec![0u8; size];
    buf.copy_to_slice(&mut block);
    let mut values = [0f64; N];
    for (value, field) in values.iter_mut().zip(fields.iter()) {
        *value = field.get(&block, base, endian);
    }
    Ok(values)
}

fn write_fields(
    buf: &mut impl BufMut,
    fields: &[Field],
    values: &[f64],
    base: usize,
    size: usize,
    endian: Endian,
) -> Result<(), Error> {
    // Encode into a zeroed block first so a failing field leaves `buf` untouched
    let mut block = vec![0u8; size];
    for (field, value) in fields.iter().zip(values.iter()) {
        let mut slot = &mut block[field.offset(base)..field.offset(base) + field.width];
        field.put(&mut slot, *value, endian)?;
    }
    buf.put_slice(&block);
    Ok(())
}

/// The 400-byte binary file header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinaryHeader {
    pub values: [f64; BINARY_FIELD_COUNT],
}

impl Default for BinaryHeader {
    fn default() -> Self {
        Self {
            values: [0.0; BINARY_FIELD_COUNT],
        }
    }
}

impl BinaryHeader {
    /// Build a header from exactly 30 values.
    pub fn from_values(values: &[f64]) -> Result<Self, Error> {
        let values: [f64; BINARY_FIELD_COUNT] =
            values.try_into().map_err(|_| Error::ShapeMismatch {
                what: "binary header",
                expected: BINARY_FIELD_COUNT,
                found: values.len(),
            })?;
        Ok(Self { values })
    }

    /// Sample interval (`SAMP_RATE`), in the file's native unit (microseconds for time).
    pub fn sample_interval(&self) -> f64 {
        self.values[BIN_SAMP_RATE]
    }

    /// Samples per trace (`SAMP_NUM`).
    pub fn sample_count(&self) -> f64 {
        self.values[BIN_SAMP_NUM]
    }

    /// Data sample format code (`FORMAT`).
    pub fn format_code(&self) -> f64 {
        self.values[BIN_FORMAT]
    }
}

impl Block for BinaryHeader {
    const SIZE: usize = BINARY_HEADER_SIZE;
    const NAME: &'static str = "binary header";
    type Cfg = Endian;

    fn write(&self, buf: &mut impl BufMut, endian: Endian) -> Result<(), Error> {
        write_fields(
            buf,
            &BINARY_FIELDS,
            &self.values,
            BINARY_BASE,
            Self::SIZE,
            endian,
        )
    }

    fn read_cfg(buf: &mut impl Buf, endian: Endian) -> Result<Self, Error> {
        let values = read_fields(buf, &BINARY_FIELDS, BINARY_BASE, Self::SIZE, endian, Self::NAME)?;
        Ok(Self { values })
    }
}

/// The 240-byte header of a single trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHeader {
    pub values: [f64; TRACE_FIELD_COUNT],
}

impl Default for TraceHeader {
    fn default() -> Self {
        Self {
            values: [0.0; TRACE_FIELD_COUNT],
        }
    }
}

impl TraceHeader {
    /// Build a header from exactly 78 values.
    pub fn from_values(values: &[f64]) -> Result<Self, Error> {
        let values: [f64; TRACE_FIELD_COUNT] =
            values.try_into().map_err(|_| Error::ShapeMismatch {
                what: "trace header",
                expected: TRACE_FIELD_COUNT,
                found: values.len(),
            })?;
        Ok(Self { values })
    }
}

impl Block for TraceHeader {
    const SIZE: usize = TRACE_HEADER_SIZE;
    const NAME: &'static str = "trace header";
    type Cfg = Endian;

    fn write(&self, buf: &mut impl BufMut, endian: Endian) -> Result<(), Error> {
        write_fields(
            buf,
            &TRACE_FIELDS,
            &self.values,
            TRACE_BASE,
            Self::SIZE,
            endian,
        )
    }

    fn read_cfg(buf: &mut impl Buf, endian: Endian) -> Result<Self, Error> {
        let values = read_fields(buf, &TRACE_FIELDS, TRACE_BASE, Self::SIZE, endian, Self::NAME)?;
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::trace_index;
    use geoseis_macros::test_traced;

    fn rows() -> Vec<String> {
        (1..=40).map(|i| format!("C{i:2} GEOSEIS TEST")).collect()
    }

    #[test_traced]
    fn test_text_header_ebcdic_round_trip() {
        let header = TextHeader::from_rows(&rows()).unwrap();
        let encoded = header.encode(TextEncoding::Ebcdic).unwrap();
        assert_eq!(encoded.len(), TEXT_HEADER_SIZE);
        assert_eq!(encoded[0], 0xC3); // 'C'
        assert_eq!(encoded[79], 0x40); // padding

        let decoded = TextHeader::decode(&encoded, TextEncoding::Ebcdic).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.rows(), rows());
    }

    #[test_traced]
    fn test_text_header_shape() {
        // Too few rows
        let result = TextHeader::from_rows(&rows()[..39]);
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expected: 40,
                found: 39,
                ..
            })
        ));

        // Row too long
        let mut long = rows();
        long[3] = "x".repeat(81);
        let result = TextHeader::from_rows(&long);
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expected: 80,
                found: 81,
                ..
            })
        ));
    }

    #[test_traced]
    fn test_binary_header_round_trip() {
        let mut header = BinaryHeader::default();
        header.values[0] = 123_456.0;
        header.values[BIN_SAMP_RATE] = 2000.0;
        header.values[BIN_SAMP_NUM] = 1501.0;
        header.values[BIN_FORMAT] = 5.0;
        header.values[29] = -1.0;
        for endian in [Endian::Big, Endian::Little] {
            let encoded = header.encode(endian).unwrap();
            let decoded = BinaryHeader::decode(&encoded, endian).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(decoded.sample_interval(), 2000.0);
            assert_eq!(decoded.sample_count(), 1501.0);
            assert_eq!(decoded.format_code(), 5.0);
        }

        // FORMAT lives at file byte 3225 (block offset 24)
        let encoded = header.encode(Endian::Big).unwrap();
        assert_eq!(&encoded[24..26], &[0, 5]);
        // N_EXT_HDRS lives at file byte 3505 (block offset 304)
        assert_eq!(&encoded[304..306], &[0xff, 0xff]);
    }

    #[test_traced]
    fn test_binary_header_shape() {
        let result = BinaryHeader::from_values(&[0.0; 29]);
        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                expected: 30,
                found: 29,
                ..
            })
        ));
    }

    #[test_traced]
    fn test_trace_header_round_trip() {
        let mut header = TraceHeader::default();
        for (i, v) in header.values.iter_mut().enumerate() {
            *v = i as f64 - 30.0;
        }
        let cdp_x = trace_index("CDP_X").unwrap();
        header.values[cdp_x] = 654_321.0;
        for endian in [Endian::Big, Endian::Little] {
            let encoded = header.encode(endian).unwrap();
            assert_eq!(encoded.len(), TRACE_HEADER_SIZE);
            let decoded = TraceHeader::decode(&encoded, endian).unwrap();
            assert_eq!(decoded, header);
        }
    }

    #[test_traced]
    fn test_trace_header_overflow_leaves_buffer_untouched() {
        let mut header = TraceHeader::default();
        header.values[trace_index("TRCID").unwrap()] = 1.0e6;
        let mut buf = Vec::new();
        let result = header.write(&mut buf, Endian::Big);
        assert!(matches!(
            result,
            Err(Error::FieldOverflow { field: "TRCID", .. })
        ));
        assert!(buf.is_empty());
    }

    #[test_traced]
    fn test_decode_wrong_size() {
        let result = TraceHeader::decode(&[0u8; 239], Endian::Big);
        assert!(matches!(result, Err(Error::EndOfBuffer(_))));
        let result = TraceHeader::decode(&[0u8; 241], Endian::Big);
        assert!(matches!(result, Err(Error::ExtraData(_, 1))));
    }
}
