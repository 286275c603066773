//! Persisted description of a dataset.

use super::{DataType, Domain, SurveyType};
use crate::{schema::HeaderField, Error, HeaderSchema};
use bytes::{Buf, BufMut};
use geoseis_codec::{fields::BINARY_FIELD_COUNT, TEXT_HEADER_SIZE};
use geoseis_geometry::Point;
use geoseis_utils::units::UnitKind;

/// Layout version of the encoded state.
const VERSION: u8 = 1;

/// Everything about a dataset except its matrices.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct State {
    pub name: String,
    pub samples: usize,
    pub traces: usize,
    pub domain: Domain,
    pub data_type: DataType,
    pub survey_type: SurveyType,
    pub srd: f64,
    pub spatial_reference: String,
    pub length_units: String,
    pub temporal_units: String,
    pub angular_units: String,
    pub data_units: String,
    pub null_value: f64,
    pub schema: HeaderSchema,
    pub bin_header: [f64; BINARY_FIELD_COUNT],
    pub text_header: Vec<u8>,
    /// `(min, max)` per storage column; `(inf, -inf)` until a finite value is seen.
    pub limits: Vec<(f64, f64)>,
    pub pkeys: Vec<String>,
    pub boundary: Vec<Point>,
}

fn unit_kind_code(kind: UnitKind) -> u8 {
    match kind {
        UnitKind::Dimensionless => 0,
        UnitKind::Length => 1,
        UnitKind::Temporal => 2,
        UnitKind::Angular => 3,
    }
}

fn unit_kind(code: u8) -> Result<UnitKind, Error> {
    match code {
        0 => Ok(UnitKind::Dimensionless),
        1 => Ok(UnitKind::Length),
        2 => Ok(UnitKind::Temporal),
        3 => Ok(UnitKind::Angular),
        other => Err(corrupt(format!("unit kind {other}"))),
    }
}

fn corrupt(reason: impl AsRef<str>) -> Error {
    Error::Corrupt(format!("dataset metadata: {}", reason.as_ref()))
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    buf.put_u64(len as u64);
}

/// Cursor over an encoded state that turns short reads into [Error::Corrupt].
struct Reader<'a> {
    buf: &'a [u8],
}

impl Reader<'_> {
    fn need(&self, n: usize, what: &str) -> Result<(), Error> {
        if self.buf.remaining() < n {
            return Err(corrupt(format!("truncated {what}")));
        }
        Ok(())
    }

    fn u8(&mut self, what: &str) -> Result<u8, Error> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self, what: &str) -> Result<u32, Error> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    fn len(&mut self, what: &str) -> Result<usize, Error> {
        self.need(8, what)?;
        usize::try_from(self.buf.get_u64()).map_err(|_| corrupt(format!("oversized {what}")))
    }

    fn f64(&mut self, what: &str) -> Result<f64, Error> {
        self.need(8, what)?;
        Ok(self.buf.get_f64())
    }

    fn bytes(&mut self, n: usize, what: &str) -> Result<Vec<u8>, Error> {
        self.need(n, what)?;
        let mut out = vec![0u8; n];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    fn string(&mut self, what: &str) -> Result<String, Error> {
        let len = self.u32(what)? as usize;
        let bytes = self.bytes(len, what)?;
        String::from_utf8(bytes).map_err(|_| corrupt(format!("{what} is not UTF-8")))
    }
}

impl State {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u8(VERSION);
        put_str(&mut buf, &self.name);
        put_len(&mut buf, self.samples);
        put_len(&mut buf, self.traces);
        buf.put_u8(self.domain.code());
        buf.put_u8(self.data_type.code());
        buf.put_u8(self.survey_type.code());
        buf.put_f64(self.srd);
        put_str(&mut buf, &self.spatial_reference);
        put_str(&mut buf, &self.length_units);
        put_str(&mut buf, &self.temporal_units);
        put_str(&mut buf, &self.angular_units);
        put_str(&mut buf, &self.data_units);
        buf.put_f64(self.null_value);

        put_len(&mut buf, self.schema.len());
        for field in self.schema.fields() {
            put_str(&mut buf, &field.name);
            put_len(&mut buf, field.index);
            buf.put_u8(unit_kind_code(field.kind));
        }

        for value in &self.bin_header {
            buf.put_f64(*value);
        }
        buf.put_slice(&self.text_header);

        put_len(&mut buf, self.limits.len());
        for (min, max) in &self.limits {
            buf.put_f64(*min);
            buf.put_f64(*max);
        }

        put_len(&mut buf, self.pkeys.len());
        for name in &self.pkeys {
            put_str(&mut buf, name);
        }

        put_len(&mut buf, self.boundary.len());
        for point in &self.boundary {
            buf.put_f64(point.x);
            buf.put_f64(point.y);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader { buf: bytes };
        let version = r.u8("version")?;
        if version != VERSION {
            return Err(corrupt(format!("unknown version {version}")));
        }
        let name = r.string("name")?;
        let samples = r.len("sample count")?;
        let traces = r.len("trace count")?;
        let domain = Domain::from_code(r.u8("domain")?)?;
        let data_type = DataType::from_code(r.u8("data type")?)?;
        let survey_type = SurveyType::from_code(r.u8("survey type")?)?;
        let srd = r.f64("srd")?;
        let spatial_reference = r.string("spatial reference")?;
        let length_units = r.string("length units")?;
        let temporal_units = r.string("temporal units")?;
        let angular_units = r.string("angular units")?;
        let data_units = r.string("data units")?;
        let null_value = r.f64("null value")?;

        let count = r.len("schema")?;
        let mut fields = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            fields.push(HeaderField {
                name: r.string("field name")?,
                index: r.len("field index")?,
                kind: unit_kind(r.u8("field kind")?)?,
            });
        }
        let schema = HeaderSchema::new(fields).map_err(|e| corrupt(e.to_string()))?;

        let mut bin_header = [0.0; BINARY_FIELD_COUNT];
        for value in bin_header.iter_mut() {
            *value = r.f64("binary header")?;
        }
        let text_header = r.bytes(TEXT_HEADER_SIZE, "text header")?;

        let count = r.len("limits")?;
        if count != schema.len() {
            return Err(corrupt(format!(
                "{count} limits for {} header fields",
                schema.len()
            )));
        }
        let mut limits = Vec::with_capacity(count);
        for _ in 0..count {
            limits.push((r.f64("limits")?, r.f64("limits")?));
        }

        let count = r.len("primary keys")?;
        let mut pkeys = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            pkeys.push(r.string("primary key")?);
        }

        let count = r.len("boundary")?;
        let mut boundary = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            boundary.push(Point::new(r.f64("boundary")?, r.f64("boundary")?));
        }

        if r.buf.has_remaining() {
            return Err(corrupt(format!("{} trailing bytes", r.buf.remaining())));
        }
        Ok(Self {
            name,
            samples,
            traces,
            domain,
            data_type,
            survey_type,
            srd,
            spatial_reference,
            length_units,
            temporal_units,
            angular_units,
            data_units,
            null_value,
            schema,
            bin_header,
            text_header,
            limits,
            pkeys,
            boundary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;

    fn sample() -> State {
        let schema = HeaderSchema::standard();
        let mut bin_header = [0.0; BINARY_FIELD_COUNT];
        bin_header[5] = 2000.0;
        State {
            name: "survey".into(),
            samples: 501,
            traces: 12,
            domain: Domain::Tvdss,
            data_type: DataType::Prestack,
            survey_type: SurveyType::TwoD,
            srd: 12.5,
            spatial_reference: "EPSG:32631".into(),
            length_units: "m".into(),
            temporal_units: "ms".into(),
            angular_units: "deg".into(),
            data_units: "".into(),
            null_value: f64::NAN,
            limits: vec![(f64::INFINITY, f64::NEG_INFINITY); schema.len()],
            schema,
            bin_header,
            text_header: vec![b'C'; TEXT_HEADER_SIZE],
            pkeys: vec!["CDP".into(), "INLINE".into()],
            boundary: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
        }
    }

    #[test_traced]
    fn test_encode_decode() {
        let state = sample();
        let decoded = State::decode(&state.encode()).unwrap();
        assert!(decoded.null_value.is_nan());
        // NaN breaks PartialEq, so compare with a finite null value
        let mut state = state;
        state.null_value = -999.25;
        assert_eq!(State::decode(&state.encode()).unwrap(), state);
    }

    #[test_traced]
    fn test_truncated() {
        let encoded = sample().encode();
        for len in [0, 1, 10, encoded.len() / 2, encoded.len() - 1] {
            assert!(matches!(
                State::decode(&encoded[..len]),
                Err(Error::Corrupt(_))
            ));
        }
        let mut extended = encoded;
        extended.push(0);
        assert!(matches!(State::decode(&extended), Err(Error::Corrupt(_))));
    }
}
