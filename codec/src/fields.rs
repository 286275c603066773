//! Field layouts of the binary file header and the trace header.
//!
//! Byte positions follow the usual SEG-Y convention: they are 1-based and counted from the start
//! of the file for the binary header (`3201..=3600`) and from the start of the trace record for
//! trace headers (`1..=240`).

use crate::{Endian, Error};
use bytes::{Buf, BufMut};

/// A single integer field of a header block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Short mnemonic (`SAMP_RATE`, `CDP_X`, ...).
    pub name: &'static str,
    /// 1-based byte position of the first byte of the field.
    pub byte: usize,
    /// Width in bytes (2 or 4).
    pub width: usize,
    /// Human readable description.
    pub description: &'static str,
}

impl Field {
    const fn new(
        name: &'static str,
        byte: usize,
        width: usize,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            byte,
            width,
            description,
        }
    }

    /// Offset of the field relative to the start of a block whose first byte is `base`.
    pub const fn offset(&self, base: usize) -> usize {
        self.byte - base
    }

    /// Read the field from `block` (the block starting at byte `base`).
    pub fn get(&self, block: &[u8], base: usize, endian: Endian) -> f64 {
        let mut buf = &block[self.offset(base)..self.offset(base) + self.width];
        match (self.width, endian) {
            (4, Endian::Big) => buf.get_i32() as f64,
            (4, Endian::Little) => buf.get_i32_le() as f64,
            (_, Endian::Big) => buf.get_i16() as f64,
            (_, Endian::Little) => buf.get_i16_le() as f64,
        }
    }

    /// Encode `value` into the field.
    ///
    /// Values are rounded to the nearest integer; non-finite values and values outside the
    /// range of the field width are rejected.
    pub fn put(&self, buf: &mut impl BufMut, value: f64, endian: Endian) -> Result<(), Error> {
        let rounded = value.round();
        let overflow = || Error::FieldOverflow {
            field: self.name,
            value,
            width: self.width,
        };
        if !rounded.is_finite() {
            return Err(overflow());
        }
        if self.width == 4 {
            if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
                return Err(overflow());
            }
            match endian {
                Endian::Big => buf.put_i32(rounded as i32),
                Endian::Little => buf.put_i32_le(rounded as i32),
            }
        } else {
            if rounded < i16::MIN as f64 || rounded > i16::MAX as f64 {
                return Err(overflow());
            }
            match endian {
                Endian::Big => buf.put_i16(rounded as i16),
                Endian::Little => buf.put_i16_le(rounded as i16),
            }
        }
        Ok(())
    }
}

/// First byte of the binary header.
pub const BINARY_BASE: usize = 3201;

/// First byte of a trace header.
pub const TRACE_BASE: usize = 1;

/// Number of binary header fields.
pub const BINARY_FIELD_COUNT: usize = 30;

/// Number of trace header fields.
pub const TRACE_FIELD_COUNT: usize = 78;

/// Binary header fields, in storage order.
pub const BINARY_FIELDS: [Field; BINARY_FIELD_COUNT] = [
    Field::new("JOB", 3201, 4, "Job identification number"),
    Field::new("LINE", 3205, 4, "Line number"),
    Field::new("REEL", 3209, 4, "Reel number"),
    Field::new("TRACENUM", 3213, 2, "Data traces per ensemble"),
    Field::new("AUX", 3215, 2, "Auxiliary traces per ensemble"),
    Field::new("SAMP_RATE", 3217, 2, "Sample interval"),
    Field::new("SAMP_FRATE", 3219, 2, "Sample interval of the field recording"),
    Field::new("SAMP_NUM", 3221, 2, "Samples per data trace"),
    Field::new("SAMP_FNUM", 3223, 2, "Samples per trace of the field recording"),
    Field::new("FORMAT", 3225, 2, "Data sample format code"),
    Field::new("CDP_FOLD", 3227, 2, "Ensemble fold"),
    Field::new("SORT", 3229, 2, "Trace sorting code"),
    Field::new("VERT_SUM", 3231, 2, "Vertical sum code"),
    Field::new("SWEEP_START", 3233, 2, "Sweep frequency at start"),
    Field::new("SWEEP_END", 3235, 2, "Sweep frequency at end"),
    Field::new("SWEEP_LENGTH", 3237, 2, "Sweep length"),
    Field::new("SWEEP_TYPE", 3239, 2, "Sweep type code"),
    Field::new("SWEEP_CHAN", 3241, 2, "Trace number of sweep channel"),
    Field::new("SWEEP_TAPER_START", 3243, 2, "Sweep taper length at start"),
    Field::new("SWEEP_TAPER_END", 3245, 2, "Sweep taper length at end"),
    Field::new("SWEEP_TAPER_TYPE", 3247, 2, "Taper type"),
    Field::new("CORR", 3249, 2, "Correlated data traces"),
    Field::new("BIN_GAIN", 3251, 2, "Binary gain recovered"),
    Field::new("AMP_REC", 3253, 2, "Amplitude recovery method"),
    Field::new("LENGTH_SYS", 3255, 2, "Measurement system"),
    Field::new("POLARITY", 3257, 2, "Impulse signal polarity"),
    Field::new("VIB_POL", 3259, 2, "Vibratory polarity code"),
    Field::new("REVISION", 3501, 2, "SEG-Y format revision number"),
    Field::new("FIXED_TRLENGTH", 3503, 2, "Fixed length trace flag"),
    Field::new("N_EXT_HDRS", 3505, 2, "Number of extended textual headers"),
];

/// Index of `SAMP_RATE` in [BINARY_FIELDS].
pub const BIN_SAMP_RATE: usize = 5;
/// Index of `SAMP_NUM` in [BINARY_FIELDS].
pub const BIN_SAMP_NUM: usize = 7;
/// Index of `FORMAT` in [BINARY_FIELDS].
pub const BIN_FORMAT: usize = 9;

/// Trace header fields, in storage order.
pub const TRACE_FIELDS: [Field; TRACE_FIELD_COUNT] = [
    Field::new("SEQWL", 1, 4, "Trace sequence number within line"),
    Field::new("SEQWR", 5, 4, "Trace sequence number within reel"),
    Field::new("FFID", 9, 4, "Original field record number"),
    Field::new("TRCFLD", 13, 4, "Trace number within field record"),
    Field::new("SP", 17, 4, "Energy source point number"),
    Field::new("CDP", 21, 4, "Ensemble number"),
    Field::new("TRCNUM", 25, 4, "Trace number within ensemble"),
    Field::new("TRCID", 29, 2, "Trace identification code"),
    Field::new("NVST", 31, 2, "Vertically summed traces"),
    Field::new("NHST", 33, 2, "Horizontally stacked traces"),
    Field::new("DU", 35, 2, "Data use"),
    Field::new("DSREG", 37, 4, "Source to receiver group distance"),
    Field::new("RGE", 41, 4, "Receiver group elevation"),
    Field::new("SES", 45, 4, "Surface elevation at source"),
    Field::new("SDBS", 49, 4, "Source depth below surface"),
    Field::new("DERG", 53, 4, "Datum elevation at receiver group"),
    Field::new("DES", 57, 4, "Datum elevation at source"),
    Field::new("WDS", 61, 4, "Water depth at source"),
    Field::new("WGD", 65, 4, "Water depth at group"),
    Field::new("SAED", 69, 2, "Scalar for elevations and depths"),
    Field::new("SAC", 71, 2, "Scalar for coordinates"),
    Field::new("SRCX", 73, 4, "Source X coordinate"),
    Field::new("SRCY", 77, 4, "Source Y coordinate"),
    Field::new("GRPX", 81, 4, "Group X coordinate"),
    Field::new("GRPY", 85, 4, "Group Y coordinate"),
    Field::new("UNITS", 89, 2, "Coordinate units"),
    Field::new("WVEL", 91, 2, "Weathering velocity"),
    Field::new("SVEL", 93, 2, "Subweathering velocity"),
    Field::new("UTSRC", 95, 2, "Uphole time at source"),
    Field::new("UTGRP", 97, 2, "Uphole time at group"),
    Field::new("SECSCOR", 99, 2, "Source static correction"),
    Field::new("GRPSCOR", 101, 2, "Group static correction"),
    Field::new("TSA", 103, 2, "Total static applied"),
    Field::new("LAGTA", 105, 2, "Lag time A"),
    Field::new("LAGTB", 107, 2, "Lag time B"),
    Field::new("DELRECT", 109, 2, "Delay recording time"),
    Field::new("MTSTART", 111, 2, "Mute time start"),
    Field::new("MTEND", 113, 2, "Mute time end"),
    Field::new("NSMP", 115, 2, "Samples in this trace"),
    Field::new("SI", 117, 2, "Sample interval of this trace"),
    Field::new("GTFI", 119, 2, "Gain type of field instruments"),
    Field::new("IG", 121, 2, "Instrument gain"),
    Field::new("IGC", 123, 2, "Instrument gain constant"),
    Field::new("CORREL", 125, 2, "Correlated"),
    Field::new("SFSTART", 127, 2, "Sweep frequency at start"),
    Field::new("SFEND", 129, 2, "Sweep frequency at end"),
    Field::new("SLEN", 131, 2, "Sweep length"),
    Field::new("STYP", 133, 2, "Sweep type"),
    Field::new("SSTRLS", 135, 2, "Sweep taper length at start"),
    Field::new("SSTLE", 137, 2, "Sweep taper length at end"),
    Field::new("TTYP", 139, 2, "Taper type"),
    Field::new("AFF", 141, 2, "Alias filter frequency"),
    Field::new("AFS", 143, 2, "Alias filter slope"),
    Field::new("NFF", 145, 2, "Notch filter frequency"),
    Field::new("NFS", 147, 2, "Notch filter slope"),
    Field::new("LOCF", 149, 2, "Low cut frequency"),
    Field::new("HOCF", 151, 2, "High cut frequency"),
    Field::new("LOCS", 153, 2, "Low cut slope"),
    Field::new("HICS", 155, 2, "High cut slope"),
    Field::new("YEAR", 157, 2, "Year recorded"),
    Field::new("DAY", 159, 2, "Day of year"),
    Field::new("HOUR", 161, 2, "Hour of day"),
    Field::new("MINUTE", 163, 2, "Minute of hour"),
    Field::new("SCE", 165, 2, "Second of minute"),
    Field::new("TMBS", 167, 2, "Time basis code"),
    Field::new("TWF", 169, 2, "Trace weighting factor"),
    Field::new("GGNSW", 171, 2, "Geophone group number of roll switch position one"),
    Field::new("GGN1ST", 173, 2, "Geophone group number of first trace"),
    Field::new("GGNLST", 175, 2, "Geophone group number of last trace"),
    Field::new("GAPSZ", 177, 2, "Gap size"),
    Field::new("OAWT", 179, 2, "Overtravel associated with taper"),
    Field::new("CDP_X", 181, 4, "Ensemble X coordinate"),
    Field::new("CDP_Y", 185, 4, "Ensemble Y coordinate"),
    Field::new("INLINE", 189, 4, "Inline number"),
    Field::new("XLINE", 193, 4, "Crossline number"),
    Field::new("SPN", 197, 4, "Shotpoint number"),
    Field::new("SPS", 201, 2, "Shotpoint scalar"),
    Field::new("TVMU", 203, 2, "Trace value measurement unit"),
];

/// Index of `DELRECT` in [TRACE_FIELDS].
pub const TRC_DELRECT: usize = 35;

/// Position of a binary header field by name.
pub fn binary_index(name: &str) -> Option<usize> {
    BINARY_FIELDS.iter().position(|f| f.name == name)
}

/// Position of a trace header field by name.
pub fn trace_index(name: &str) -> Option<usize> {
    TRACE_FIELDS.iter().position(|f| f.name == name)
}

/// Standard trace header names, in storage order.
pub fn trace_names() -> impl Iterator<Item = &'static str> {
    TRACE_FIELDS.iter().map(|f| f.name)
}

/// Standard binary header names, in storage order.
pub fn binary_names() -> impl Iterator<Item = &'static str> {
    BINARY_FIELDS.iter().map(|f| f.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;

    #[test_traced]
    fn test_trace_layout_is_contiguous() {
        // Every field starts where the previous one ends and the last ends at byte 204
        let mut next = 1;
        for field in TRACE_FIELDS.iter() {
            assert_eq!(field.byte, next, "{} misplaced", field.name);
            assert!(field.width == 2 || field.width == 4);
            next += field.width;
        }
        assert_eq!(next, 205);
    }

    #[test_traced]
    fn test_binary_layout() {
        // 3 x 4-byte fields, then 27 x 2-byte fields, the last three at 3501
        assert!(BINARY_FIELDS[..3].iter().all(|f| f.width == 4));
        assert!(BINARY_FIELDS[3..].iter().all(|f| f.width == 2));
        assert_eq!(BINARY_FIELDS[27].byte, 3501);
        assert_eq!(BINARY_FIELDS[26].byte + 2, 3261);
        assert_eq!(BINARY_FIELDS[BIN_SAMP_RATE].name, "SAMP_RATE");
        assert_eq!(BINARY_FIELDS[BIN_SAMP_NUM].name, "SAMP_NUM");
        assert_eq!(BINARY_FIELDS[BIN_FORMAT].name, "FORMAT");
        assert_eq!(TRACE_FIELDS[TRC_DELRECT].name, "DELRECT");
    }

    #[test_traced]
    fn test_lookup() {
        assert_eq!(trace_index("SEQWL"), Some(0));
        assert_eq!(trace_index("TVMU"), Some(77));
        assert_eq!(trace_index("CDP_X"), Some(71));
        assert_eq!(binary_index("N_EXT_HDRS"), Some(29));
        assert_eq!(trace_index("NOPE"), None);
    }

    #[test_traced]
    fn test_put_and_get() {
        let field = TRACE_FIELDS[trace_index("SAC").unwrap()];
        for endian in [Endian::Big, Endian::Little] {
            let mut block = vec![0u8; 240];
            let mut buf = &mut block[field.offset(TRACE_BASE)..];
            field.put(&mut buf, -100.4, endian).unwrap();
            assert_eq!(field.get(&block, TRACE_BASE, endian), -100.0);
        }

        // Out of range for a 2-byte field
        let mut buf = Vec::new();
        let result = field.put(&mut buf, 40_000.0, Endian::Big);
        assert!(matches!(
            result,
            Err(Error::FieldOverflow {
                field: "SAC",
                width: 2,
                ..
            })
        ));

        // NaN is rejected
        let result = field.put(&mut buf, f64::NAN, Endian::Big);
        assert!(matches!(result, Err(Error::FieldOverflow { .. })));
    }
}
