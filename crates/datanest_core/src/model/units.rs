//! SI unit parsing and prefix scaling.
//!
//! # Invariants
//! - Only atomic units (`[prefix]base[^power]`) are scalable.
//! - Compound units joined by `*` or `/` are valid but only equal to themselves.
//! - `None`, an empty string and `"none"` all mean "no unit".

use once_cell::sync::Lazy;
use regex::Regex;

static SI_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Y|Z|E|P|T|G|M|k|h|da|d|c|m|u|µ|n|p|f|a|z|y)?(m|g|s|A|K|mol|cd|Hz|N|Pa|J|W|C|V|F|S|Wb|T|H|lm|lx|Bq|Gy|Sv|kat|l|L|Ohm|%|dB|rad)(\^[+-]?[1-9][0-9]*)?$",
    )
    .expect("valid SI unit regex")
});

/// An atomic SI unit split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiUnit {
    pub prefix: Option<String>,
    pub base: String,
    pub power: i32,
}

/// Parses an atomic SI unit such as `mV`, `s` or `cm^2`.
pub fn parse_si_unit(unit: &str) -> Option<SiUnit> {
    let captures = SI_UNIT_RE.captures(unit.trim())?;
    let prefix = captures.get(1).map(|m| m.as_str().to_string());
    let base = captures.get(2)?.as_str().to_string();
    let power = match captures.get(3) {
        Some(m) => m.as_str().trim_start_matches('^').parse().ok()?,
        None => 1,
    };
    Some(SiUnit {
        prefix,
        base,
        power,
    })
}

/// True for atomic or compound SI units.
pub fn is_si_unit(unit: &str) -> bool {
    let unit = unit.trim();
    !unit.is_empty()
        && unit
            .split(['*', '/'])
            .all(|part| parse_si_unit(part).is_some())
}

/// True when the value means "dimensionless".
pub fn is_unitless(unit: Option<&str>) -> bool {
    match unit {
        None => true,
        Some(unit) => {
            let unit = unit.trim();
            unit.is_empty() || unit.eq_ignore_ascii_case("none")
        }
    }
}

/// Decimal exponent of an SI prefix.
pub fn prefix_exponent(prefix: Option<&str>) -> i32 {
    match prefix {
        Some("Y") => 24,
        Some("Z") => 21,
        Some("E") => 18,
        Some("P") => 15,
        Some("T") => 12,
        Some("G") => 9,
        Some("M") => 6,
        Some("k") => 3,
        Some("h") => 2,
        Some("da") => 1,
        Some("d") => -1,
        Some("c") => -2,
        Some("m") => -3,
        Some("u") | Some("µ") => -6,
        Some("n") => -9,
        Some("p") => -12,
        Some("f") => -15,
        Some("a") => -18,
        Some("z") => -21,
        Some("y") => -24,
        _ => 0,
    }
}

/// True when both units measure the same quantity and differ only by prefix.
pub fn is_scalable(origin: &str, destination: &str) -> bool {
    scaling(origin, destination).is_some()
}

/// Factor that converts a value in `origin` units into `destination` units.
///
/// Returns `None` when the units are not scalable versions of each other.
pub fn scaling(origin: &str, destination: &str) -> Option<f64> {
    let (origin, destination) = (origin.trim(), destination.trim());
    if origin == destination {
        return Some(1.0);
    }
    let from = parse_si_unit(origin)?;
    let to = parse_si_unit(destination)?;
    if from.base != to.base || from.power != to.power {
        return None;
    }
    let exponent = (prefix_exponent(from.prefix.as_deref())
        - prefix_exponent(to.prefix.as_deref()))
        * from.power;
    Some(10f64.powi(exponent))
}

#[cfg(test)]
mod tests {
    use super::{is_scalable, is_si_unit, is_unitless, parse_si_unit, scaling};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn parses_prefix_base_and_power() {
        let unit = parse_si_unit("mV^2").unwrap();
        assert_eq!(unit.prefix.as_deref(), Some("m"));
        assert_eq!(unit.base, "V");
        assert_eq!(unit.power, 2);

        let metre = parse_si_unit("m").unwrap();
        assert_eq!(metre.prefix, None);
        assert_eq!(metre.base, "m");

        let mole = parse_si_unit("mol").unwrap();
        assert_eq!(mole.prefix, None);
        assert_eq!(mole.base, "mol");
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(parse_si_unit("parsec").is_none());
        assert!(!is_si_unit(""));
        assert!(is_si_unit("mV/cm"));
        assert!(!is_si_unit("mV/bogus"));
    }

    #[test]
    fn scaling_between_prefixes() {
        assert!(close(scaling("ms", "s").unwrap(), 1e-3));
        assert!(close(scaling("s", "ms").unwrap(), 1e3));
        assert!(close(scaling("cm^2", "m^2").unwrap(), 1e-4));
        assert!(close(scaling("kHz", "Hz").unwrap(), 1e3));
    }

    #[test]
    fn different_quantities_are_not_scalable() {
        assert!(!is_scalable("V", "s"));
        assert!(!is_scalable("m^2", "m"));
        assert!(scaling("mV", "ms").is_none());
    }

    #[test]
    fn unitless_spellings() {
        assert!(is_unitless(None));
        assert!(is_unitless(Some("")));
        assert!(is_unitless(Some("none")));
        assert!(!is_unitless(Some("s")));
    }
}
