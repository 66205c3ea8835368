use std::sync::OnceLock;
use crate::error::{Error, Result};

/// Unit families recognized for a latitude axis (CF `units` attribute values).
pub const LATITUDE_UNITS: &[&str] = &[
    "degrees_north", "degree_north", "degree_N", "degrees_N", "degreeN", "degreesN",
];

/// Unit families recognized for a longitude axis.
pub const LONGITUDE_UNITS: &[&str] = &[
    "degrees_east", "degree_east", "degree_E", "degrees_E", "degreeE", "degreesE",
];

pub fn is_latitude_unit(unit: &str) -> bool {
    LATITUDE_UNITS.contains(&unit)
}

pub fn is_longitude_unit(unit: &str) -> bool {
    LONGITUDE_UNITS.contains(&unit)
}

/// An affine unit conversion: `to_canonical = value * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conversion {
    pub scale: f64,
    pub offset: f64,
}

impl Conversion {
    pub const IDENTITY: Conversion = Conversion { scale: 1.0, offset: 0.0 };

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// The in-scope stand-in for the external UDUNITS-style service referenced
/// by the original system: a small, process-wide, lazily-initialized table
/// of known unit synonyms and their affine conversion to a canonical unit.
///
/// A real NetCDF/UDUNITS deployment would replace this with a binding to the
/// external library; that binding is out of scope here (spec.md §1).
pub struct UnitSystem {
    degree_aliases: Vec<&'static str>,
}

impl UnitSystem {
    fn new() -> Self {
        let mut degree_aliases = vec!["degrees", "degree", "deg"];
        degree_aliases.extend_from_slice(LATITUDE_UNITS);
        degree_aliases.extend_from_slice(LONGITUDE_UNITS);
        Self { degree_aliases }
    }

    /// Returns the conversion taking a value expressed in `from` to a value
    /// expressed in `to`. All of the angular unit synonyms this system
    /// knows about share one canonical scale, so the conversion between any
    /// two of them is the identity; an unknown unit pair is a `UnitError`.
    pub fn convert(&self, from: &str, to: &str) -> Result<Conversion> {
        if from == to {
            return Ok(Conversion::IDENTITY);
        }
        let from_is_degrees = self.degree_aliases.contains(&from);
        let to_is_degrees = self.degree_aliases.contains(&to);

        if from_is_degrees && to_is_degrees {
            return Ok(Conversion::IDENTITY);
        }
        match (from, to) {
            ("m/s", "deg/s") | ("deg/s", "m/s") => Err(Error::UnitError(format!(
                "refusing an implicit m/s <-> deg/s conversion ({from} -> {to}); this \
                 depends on latitude and must be handled by the caller"
            ))),
            _ => Err(Error::UnitError(format!("no known conversion from '{from}' to '{to}'"))),
        }
    }
}

static UNIT_SYSTEM: OnceLock<UnitSystem> = OnceLock::new();

pub fn unit_system() -> &'static UnitSystem {
    UNIT_SYSTEM.get_or_init(UnitSystem::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_units_convert_trivially() {
        let c = unit_system().convert("degrees_north", "degrees_north").unwrap();
        assert_eq!(c, Conversion::IDENTITY);
    }

    #[test]
    fn degree_synonyms_are_identity() {
        let c = unit_system().convert("degrees_east", "degrees").unwrap();
        assert!(c.is_identity());
    }

    #[test]
    fn unrelated_units_error() {
        assert!(unit_system().convert("m/s", "kelvin").is_err());
    }
}
