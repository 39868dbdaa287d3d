//! Parameter Sets

use crate::error::*;
use crate::geometry::*;
use crate::lm::*;
use crate::spectrum::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A named parameter value list.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSetItem<T> {
    /// The values.
    pub values: Vec<T>,
}

impl<T> ParamSetItem<T> {
    /// Create a new item.
    ///
    /// * `values` - The values.
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }
}

/// A hashmap of parameter sets stored by name.
pub type ParamSetMap<T> = HashMap<String, ParamSetItem<T>>;

/// Component configuration: parameter values of different types stored by
/// name. Factories look values up with a default.
#[derive(Clone, Debug, Default)]
pub struct ParamSet {
    pub bools: ParamSetMap<bool>,
    pub ints: ParamSetMap<Int>,
    pub floats: ParamSetMap<Float>,
    pub vector3fs: ParamSetMap<Vector3f>,
    pub spectra: ParamSetMap<Spectrum>,
    pub strings: ParamSetMap<String>,
}

/// Define a macro that can be used to generate a function for adding/replacing
/// parameter set item.
macro_rules! paramset_add {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&mut self, name: &str, values: &[$t]) {
            self.$paramset
                .insert(String::from(name), ParamSetItem::new(values.to_vec()));
        }
    };
}

/// Define a macro that can be used to generate a builder style function that
/// adds a single value.
macro_rules! paramset_with {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(mut self, name: &str, value: $t) -> Self {
            self.$paramset
                .insert(String::from(name), ParamSetItem::new(vec![value]));
            self
        }
    };
}

/// Define a macro that can be used to generate a function for finding
/// parameter set item that is stored as a single item.
macro_rules! paramset_find_one {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&self, name: &str, default: $t) -> $t {
            match self.$paramset.get(name) {
                Some(param) if param.values.len() == 1 => param.values[0].clone(),
                _ => default,
            }
        }
    };
}

/// Define a macro that can be used to generate a function for finding
/// parameter set item that is stored as a list.
macro_rules! paramset_find {
    ($func: ident, $t: ty, $paramset: ident) => {
        pub fn $func(&self, name: &str) -> Vec<$t> {
            match self.$paramset.get(name) {
                Some(param) => param.values.clone(),
                None => vec![],
            }
        }
    };
}

/// Define a macro that can be used to print parameter set items.
macro_rules! display_param {
    ($params: expr, $param_type: literal, $formatter: expr) => {
        let mut names: Vec<&String> = $params.keys().collect();
        names.sort();
        for name in names {
            let values: Vec<String> = $params[name].values.iter().map(|v| format!("{}", v)).collect();
            writeln!($formatter, "\"{} {}\" [{}]", $param_type, name, values.join(" "))?;
        }
    };
}

impl ParamSet {
    /// Returns a new `ParamSet`.
    pub fn new() -> Self {
        Self::default()
    }

    paramset_find_one!(find_one_int, Int, ints);
    paramset_find!(find_int, Int, ints);
    paramset_add!(add_int, Int, ints);
    paramset_with!(with_int, Int, ints);

    paramset_find_one!(find_one_bool, bool, bools);
    paramset_find!(find_bool, bool, bools);
    paramset_add!(add_bool, bool, bools);
    paramset_with!(with_bool, bool, bools);

    paramset_find_one!(find_one_float, Float, floats);
    paramset_find!(find_float, Float, floats);
    paramset_add!(add_float, Float, floats);
    paramset_with!(with_float, Float, floats);

    paramset_find_one!(find_one_vector3f, Vector3f, vector3fs);
    paramset_find!(find_vector3f, Vector3f, vector3fs);
    paramset_add!(add_vector3f, Vector3f, vector3fs);
    paramset_with!(with_vector3f, Vector3f, vector3fs);

    paramset_find_one!(find_one_spectrum, Spectrum, spectra);
    paramset_find!(find_spectrum, Spectrum, spectra);
    paramset_add!(add_spectrum, Spectrum, spectra);
    paramset_with!(with_spectrum, Spectrum, spectra);

    paramset_find_one!(find_one_string, String, strings);
    paramset_find!(find_string, String, strings);
    paramset_add!(add_string, String, strings);

    /// Builder style function that adds a single string.
    ///
    /// * `name`  - Parameter name.
    /// * `value` - The value.
    pub fn with_string(mut self, name: &str, value: &str) -> Self {
        self.add_string(name, &[value.to_string()]);
        self
    }

    /// Add/replace an RGB spectrum.
    ///
    /// * `name`   - Parameter name.
    /// * `values` - RGB values in a linear slice.
    pub fn add_rgb_spectrum(&mut self, name: &str, values: &[Float]) {
        let n = values.len();
        assert!(n % 3 == 0, "RGB spectrum values % 3 != 0");

        self.spectra.insert(
            String::from(name),
            ParamSetItem::new(
                (0..n)
                    .step_by(3)
                    .map(|i| Spectrum::new(values[i], values[i + 1], values[i + 2]))
                    .collect(),
            ),
        );
    }

    /// Returns a required string parameter.
    ///
    /// * `name` - Parameter name.
    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.strings.get(name) {
            Some(param) if param.values.len() == 1 => Ok(param.values[0].clone()),
            _ => Err(Error::config(format!("missing parameter '{}'", name))),
        }
    }

    /// Returns a required spectrum parameter.
    ///
    /// * `name` - Parameter name.
    pub fn get_spectrum(&self, name: &str) -> Result<Spectrum> {
        match self.spectra.get(name) {
            Some(param) if param.values.len() == 1 => Ok(param.values[0]),
            _ => Err(Error::config(format!("missing parameter '{}'", name))),
        }
    }

    /// Parse a string parameter into an enumeration, falling back to a default
    /// name when absent.
    ///
    /// * `name`    - Parameter name.
    /// * `default` - Default value name.
    pub fn find_one_enum<T>(&self, name: &str, default: &str) -> Result<T>
    where
        T: FromStr<Err = Error>,
    {
        self.find_one_string(name, default.to_string()).parse::<T>()
    }

    /// Returns a positive float parameter or a configuration error.
    ///
    /// * `name`    - Parameter name.
    /// * `default` - Default value.
    pub fn find_one_positive_float(&self, name: &str, default: Float) -> Result<Float> {
        let v = self.find_one_float(name, default);
        if v > 0.0 && v.is_finite() {
            Ok(v)
        } else {
            Err(Error::config(format!("'{}' must be positive, got {}", name, v)))
        }
    }

    /// Clear all parameter set items.
    pub fn clear(&mut self) {
        self.bools.clear();
        self.ints.clear();
        self.floats.clear();
        self.vector3fs.clear();
        self.spectra.clear();
        self.strings.clear();
    }
}

impl fmt::Display for ParamSet {
    /// Formats the value using the given formatter.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_param!(self.bools, "bool", f);
        display_param!(self.ints, "integer", f);
        display_param!(self.floats, "float", f);
        display_param!(self.vector3fs, "vector3", f);
        display_param!(self.spectra, "color", f);
        display_param!(self.strings, "string", f);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngType;

    #[test]
    fn find_one_uses_default() {
        let ps = ParamSet::new().with_float("rr_depth", 5.0);
        assert_eq!(ps.find_one_float("rr_depth", 1.0), 5.0);
        assert_eq!(ps.find_one_float("missing", 1.0), 1.0);
        assert_eq!(ps.find_one_int("missing", -1), -1);
    }

    #[test]
    fn lists_are_not_single_values() {
        let mut ps = ParamSet::new();
        ps.add_float("kernel_sizes", &[1.0 / 1024.0, 1.0 / 64.0]);
        assert_eq!(ps.find_one_float("kernel_sizes", 0.0), 0.0);
        assert_eq!(ps.find_float("kernel_sizes").len(), 2);
    }

    #[test]
    fn enums_parse_and_report_errors() {
        let ps = ParamSet::new().with_string("rng", "sfmt");
        assert_eq!(ps.find_one_enum::<RngType>("rng", "standardmt").unwrap(), RngType::Sfmt);
        let bad = ParamSet::new().with_string("rng", "xorshift");
        assert!(matches!(bad.find_one_enum::<RngType>("rng", "standardmt"), Err(Error::Config(_))));
    }

    #[test]
    fn required_values() {
        let mut ps = ParamSet::new();
        ps.add_rgb_spectrum("luminance", &[1.0, 2.0, 3.0]);
        assert_eq!(ps.get_spectrum("luminance").unwrap(), Spectrum::new(1.0, 2.0, 3.0));
        assert!(ps.get_string("path").is_err());
    }
}
