//! Level-2 range filters
//!
//! A range filter constrains one numeric metric of the loaded items. The
//! graph representation keeps *inclusive bounds*: `value1` is the lower
//! bound and `value2` the upper bound. Exclusive table operators are turned
//! into inclusive bounds by shifting them one [`EPSILON`] inward, rounded to
//! four decimal places, so `< 5` is stored as `value2 = 4.9999`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Boundary shift used when an exclusive bound becomes an inclusive one
pub const EPSILON: f64 = 0.0001;

/// Round to the four decimal places filter bounds are compared at
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Comparison operator carried by a range filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "between")]
    Between,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Between => "between",
        }
    }

    /// Parse the wire symbol (`"<="`, `"between"`, ...)
    pub fn parse(symbol: &str) -> Result<Operator> {
        match symbol.trim() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "<=" => Ok(Operator::Lte),
            ">=" => Ok(Operator::Gte),
            "between" => Ok(Operator::Between),
            other => Err(Error::InvalidFilter(format!("Unknown operator: {}", other))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One level-2 constraint on a metric parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeFilter {
    pub parameter_name: String,
    pub operator: Operator,
    pub value1: Option<f64>,
    pub value2: Option<f64>,
}

impl RangeFilter {
    /// Build a validated filter
    ///
    /// `=` is normalized to equal lower and upper bounds.
    pub fn new(
        parameter_name: impl Into<String>,
        operator: Operator,
        value1: Option<f64>,
        value2: Option<f64>,
    ) -> Result<Self> {
        let value2 = match operator {
            Operator::Eq => value1,
            _ => value2,
        };
        let filter = Self {
            parameter_name: parameter_name.into(),
            operator,
            value1,
            value2,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Inclusive `[lower, upper]` filter
    pub fn between(parameter_name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            operator: Operator::Between,
            value1: Some(lower),
            value2: Some(upper),
        }
    }

    /// Check the filter is complete and self-consistent
    ///
    /// Incomplete custom ranges (operator chosen but no value) are rejected
    /// here so they never reach the network.
    pub fn validate(&self) -> Result<()> {
        if self.parameter_name.trim().is_empty() {
            return Err(Error::InvalidFilter("Parameter name is empty".to_string()));
        }

        for value in [self.value1, self.value2].into_iter().flatten() {
            if !value.is_finite() {
                return Err(Error::InvalidFilter(format!(
                    "{}: bound {} is not a finite number",
                    self.parameter_name, value
                )));
            }
        }

        let missing = |what: &str| {
            Err(Error::InvalidFilter(format!(
                "{} {}: missing {}",
                self.parameter_name, self.operator, what
            )))
        };

        match self.operator {
            Operator::Between => {
                if self.value1.is_none() {
                    return missing("lower bound");
                }
                if self.value2.is_none() {
                    return missing("upper bound");
                }
            }
            Operator::Lt | Operator::Lte => {
                if self.value2.is_none() {
                    return missing("upper bound");
                }
            }
            Operator::Gt | Operator::Gte | Operator::Eq | Operator::Ne => {
                if self.value1.is_none() {
                    return missing("value");
                }
            }
        }

        if self.operator != Operator::Ne {
            if let (Some(lower), Some(upper)) = (self.value1, self.value2) {
                if lower > upper {
                    return Err(Error::InvalidFilter(format!(
                        "{}: lower bound {} exceeds upper bound {}",
                        self.parameter_name, lower, upper
                    )));
                }
            }
        }

        Ok(())
    }

    /// Whether `value` passes, given the observed range of the parameter
    ///
    /// A missing bound falls back to the observed minimum/maximum, so a
    /// lower-bound-only filter still respects the observed upper bound.
    pub fn accepts(&self, value: f64, observed_min: f64, observed_max: f64) -> bool {
        if self.operator == Operator::Ne {
            return self.value1.map_or(true, |excluded| value != excluded);
        }
        let lower = self.value1.unwrap_or(observed_min);
        let upper = self.value2.unwrap_or(observed_max);
        value >= lower && value <= upper
    }
}

impl fmt::Display for RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "{} {} [{}, {}]",
            self.parameter_name,
            self.operator,
            show(self.value1),
            show(self.value2)
        )
    }
}

/// Parses `parameter:operator:value[:value]`, e.g. `Cap:between:0:10`
///
/// The single value of `<`/`<=` is the upper bound, every other operator
/// takes it as `value1`.
impl FromStr for RangeFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(Error::InvalidFilter(format!(
                "Expected parameter:operator:value[:value], got '{}'",
                s
            )));
        }

        let operator = Operator::parse(parts[1])?;
        let parse_value = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| Error::InvalidFilter(format!("Not a number: '{}'", raw)))
        };
        let first = parse_value(parts[2])?;
        let second = parts.get(3).map(|raw| parse_value(*raw)).transpose()?;

        match operator {
            Operator::Lt | Operator::Lte => RangeFilter::new(parts[0], operator, None, Some(first)),
            _ => RangeFilter::new(parts[0], operator, Some(first), second),
        }
    }
}
