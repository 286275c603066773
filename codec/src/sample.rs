//! Convert trace samples between their on-disk [SampleFormat] and `f32`.

use crate::{Endian, Error, SampleFormat};
use bytes::{Buf, BufMut};

const IBM_SIGN: u32 = 0x8000_0000;
const IBM_MANTISSA: u32 = 0x00ff_ffff;

/// Convert an IBM hexadecimal float (already in native bit order) to IEEE.
///
/// `value = sign * 0.mantissa * 16^(exponent - 64)`. Values beyond the `f32` range saturate to
/// infinity and values below it flush to zero.
pub fn ibm_to_ieee(bits: u32) -> f32 {
    let mantissa = (bits & IBM_MANTISSA) as f64 / (1u64 << 24) as f64;
    if mantissa == 0.0 {
        return 0.0;
    }
    let exponent = ((bits >> 24) & 0x7f) as i32 - 64;
    let magnitude = mantissa * 16f64.powi(exponent);
    let value = if bits & IBM_SIGN != 0 {
        -magnitude
    } else {
        magnitude
    };
    value as f32
}

/// Convert an IEEE float to an IBM hexadecimal float (in native bit order).
///
/// Every finite `f32` is representable; the mantissa is rounded to 24 bits.
pub fn ieee_to_ibm(value: f32) -> Result<u32, Error> {
    if !value.is_finite() {
        return Err(Error::SampleOverflow {
            value,
            format: SampleFormat::Ibm,
        });
    }
    if value == 0.0 {
        return Ok(0);
    }
    let sign = if value < 0.0 { IBM_SIGN } else { 0 };
    let magnitude = (value as f64).abs();

    // magnitude = m * 2^exp2 with m in [0.5, 1)
    let exp2 = ((magnitude.to_bits() >> 52) & 0x7ff) as i32 - 1022;

    // Smallest hex exponent with magnitude < 16^exp16
    let mut exp16 = (exp2 + 3).div_euclid(4);
    let fraction = magnitude * 2f64.powi(-4 * exp16);
    let mut mantissa = (fraction * (1u64 << 24) as f64).round() as u32;
    if mantissa > IBM_MANTISSA {
        mantissa >>= 4;
        exp16 += 1;
    }
    let biased = (exp16 + 64) as u32;
    Ok(sign | (biased << 24) | mantissa)
}

fn overflow(value: f32, format: SampleFormat) -> Error {
    Error::SampleOverflow { value, format }
}

/// Decode `out.len()` samples from `buf`.
///
/// `buf` must hold at least `out.len() * format.size()` bytes.
pub fn decode(
    mut buf: &[u8],
    format: SampleFormat,
    endian: Endian,
    out: &mut [f32],
) -> Result<(), Error> {
    let needed = out.len() * format.size();
    if buf.len() < needed {
        return Err(Error::EndOfBuffer("trace samples"));
    }
    for sample in out.iter_mut() {
        *sample = match (format, endian) {
            (SampleFormat::Ibm, Endian::Big) => ibm_to_ieee(buf.get_u32()),
            (SampleFormat::Ibm, Endian::Little) => ibm_to_ieee(buf.get_u32_le()),
            (SampleFormat::Int4, Endian::Big) => buf.get_i32() as f32,
            (SampleFormat::Int4, Endian::Little) => buf.get_i32_le() as f32,
            (SampleFormat::Int2, Endian::Big) => buf.get_i16() as f32,
            (SampleFormat::Int2, Endian::Little) => buf.get_i16_le() as f32,
            (SampleFormat::Ieee, Endian::Big) => buf.get_f32(),
            (SampleFormat::Ieee, Endian::Little) => buf.get_f32_le(),
            (SampleFormat::Int1, _) => buf.get_i8() as f32,
        };
    }
    Ok(())
}

/// Encode `samples` into `buf`.
///
/// Integer formats round to the nearest integer and reject values outside their range.
pub fn encode(
    samples: &[f32],
    format: SampleFormat,
    endian: Endian,
    buf: &mut impl BufMut,
) -> Result<(), Error> {
    for &sample in samples {
        match format {
            SampleFormat::Ibm => {
                let bits = ieee_to_ibm(sample)?;
                match endian {
                    Endian::Big => buf.put_u32(bits),
                    Endian::Little => buf.put_u32_le(bits),
                }
            }
            SampleFormat::Ieee => match endian {
                Endian::Big => buf.put_f32(sample),
                Endian::Little => buf.put_f32_le(sample),
            },
            SampleFormat::Int4 => {
                let v = sample.round();
                if !v.is_finite() || v < i32::MIN as f32 || v >= i32::MAX as f32 {
                    return Err(overflow(sample, format));
                }
                match endian {
                    Endian::Big => buf.put_i32(v as i32),
                    Endian::Little => buf.put_i32_le(v as i32),
                }
            }
            SampleFormat::Int2 => {
                let v = sample.round();
                if !v.is_finite() || v < i16::MIN as f32 || v > i16::MAX as f32 {
                    return Err(overflow(sample, format));
                }
                match endian {
                    Endian::Big => buf.put_i16(v as i16),
                    Endian::Little => buf.put_i16_le(v as i16),
                }
            }
            SampleFormat::Int1 => {
                let v = sample.round();
                if !v.is_finite() || v < i8::MIN as f32 || v > i8::MAX as f32 {
                    return Err(overflow(sample, format));
                }
                buf.put_i8(v as i8);
            }
        }
    }
    Ok(())
}
