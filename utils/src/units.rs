//! Convert length, temporal and angular quantities between units.
//!
//! Units are identified by short, case-insensitive names (`"m"`, `"ft"`, `"ms"`, `"deg"`, ...).
//! An empty unit name on either side means "no conversion" and yields a factor of `1.0`.
//! Converting between units of different kinds (for example `"m"` to `"s"`) or involving an
//! unknown unit fails with [Error::UnsupportedConversion].

use crate::Error;

/// The physical dimension of a quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Dimensionless,
    Length,
    Temporal,
    Angular,
}

/// Factors relative to the base unit of each kind (metre, second, radian).
const UNITS: &[(&str, UnitKind, f64)] = &[
    ("m", UnitKind::Length, 1.0),
    ("meter", UnitKind::Length, 1.0),
    ("metre", UnitKind::Length, 1.0),
    ("km", UnitKind::Length, 1000.0),
    ("cm", UnitKind::Length, 0.01),
    ("mm", UnitKind::Length, 0.001),
    ("ft", UnitKind::Length, 0.3048),
    ("foot", UnitKind::Length, 0.3048),
    ("feet", UnitKind::Length, 0.3048),
    ("us_ft", UnitKind::Length, 1200.0 / 3937.0),
    ("in", UnitKind::Length, 0.0254),
    ("s", UnitKind::Temporal, 1.0),
    ("sec", UnitKind::Temporal, 1.0),
    ("ms", UnitKind::Temporal, 1e-3),
    ("msec", UnitKind::Temporal, 1e-3),
    ("us", UnitKind::Temporal, 1e-6),
    ("usec", UnitKind::Temporal, 1e-6),
    ("rad", UnitKind::Angular, 1.0),
    ("deg", UnitKind::Angular, std::f64::consts::PI / 180.0),
    ("dega", UnitKind::Angular, std::f64::consts::PI / 180.0),
];

fn lookup(unit: &str) -> Option<(UnitKind, f64)> {
    let unit = unit.trim();
    UNITS
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(unit))
        .map(|(_, kind, factor)| (*kind, *factor))
}

/// Return the kind of `unit`, or `None` if it is unknown.
///
/// The empty unit is [UnitKind::Dimensionless].
pub fn kind(unit: &str) -> Option<UnitKind> {
    if unit.trim().is_empty() {
        return Some(UnitKind::Dimensionless);
    }
    lookup(unit).map(|(kind, _)| kind)
}

/// Return the multiplier that converts a value expressed in `from` into `to`.
pub fn factor(from: &str, to: &str) -> Result<f64, Error> {
    if from.trim().is_empty() || to.trim().is_empty() {
        return Ok(1.0);
    }
    let unsupported = || Error::UnsupportedConversion {
        from: from.to_string(),
        to: to.to_string(),
    };
    let (from_kind, from_factor) = lookup(from).ok_or_else(unsupported)?;
    let (to_kind, to_factor) = lookup(to).ok_or_else(unsupported)?;
    if from_kind != to_kind {
        return Err(unsupported());
    }
    Ok(from_factor / to_factor)
}

/// Convert a single value.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, Error> {
    Ok(value * factor(from, to)?)
}

/// Convert every value in place.
pub fn convert_all(values: &mut [f64], from: &str, to: &str) -> Result<(), Error> {
    let factor = factor(from, to)?;
    if factor != 1.0 {
        values.iter_mut().for_each(|v| *v *= factor);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;
    use test_case::test_case;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test_case("m", "ft", 1.0 / 0.3048; "metre to foot")]
    #[test_case("km", "m", 1000.0; "kilometre to metre")]
    #[test_case("ms", "s", 0.001; "millisecond to second")]
    #[test_case("us", "ms", 0.001; "microsecond to millisecond")]
    #[test_case("deg", "rad", std::f64::consts::PI / 180.0; "degree to radian")]
    #[test_case("M", "FT", 1.0 / 0.3048; "case insensitive")]
    fn test_factor(from: &str, to: &str, expected: f64) {
        let found = factor(from, to).expect("conversion should be supported");
        assert!(approx(found, expected), "{found} != {expected}");
    }

    #[test_traced]
    fn test_empty_means_no_conversion() {
        assert_eq!(factor("", "ft"), Ok(1.0));
        assert_eq!(factor("m", ""), Ok(1.0));
        assert_eq!(convert(12.5, "", ""), Ok(12.5));
    }

    #[test_traced]
    fn test_unsupported() {
        // Mismatched kinds
        assert_eq!(
            factor("m", "s"),
            Err(Error::UnsupportedConversion {
                from: "m".into(),
                to: "s".into()
            })
        );

        // Unknown unit
        assert!(matches!(
            convert(1.0, "furlong", "m"),
            Err(Error::UnsupportedConversion { .. })
        ));
    }

    #[test_traced]
    fn test_convert_all() {
        let mut values = vec![1000.0, 2500.0, -500.0];
        convert_all(&mut values, "m", "km").expect("failed to convert");
        assert!(approx(values[0], 1.0));
        assert!(approx(values[1], 2.5));
        assert!(approx(values[2], -0.5));
    }

    #[test_traced]
    fn test_kind() {
        assert_eq!(kind(""), Some(UnitKind::Dimensionless));
        assert_eq!(kind("ft"), Some(UnitKind::Length));
        assert_eq!(kind("usec"), Some(UnitKind::Temporal));
        assert_eq!(kind("dega"), Some(UnitKind::Angular));
        assert_eq!(kind("parsec"), None);
    }
}
