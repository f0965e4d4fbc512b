//! Exact fraction value type for share arithmetic
//!
//! Wraps `num_rational::BigRational`: values are always in lowest terms with the
//! sign on the numerator and a positive denominator. No floating point is used
//! except by [`Rational::to_percentage`], which exists for display only.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use std::sync::LazyLock;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::error::{DomainError, DomainResult};

/// `n/d` or `n`, optional sign on the numerator only
static FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[+-]?)(?P<num>[0-9]+)(?:/(?P<den>[0-9]+))?$").expect("valid fraction pattern")
});

/// finite decimal, e.g. `0.25`, `-1.5`, `.5`, `2.`
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[+-]?)(?P<whole>[0-9]*)\.(?P<frac>[0-9]*)$").expect("valid decimal pattern")
});

/// An exact rational number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rational(BigRational);

impl Rational {
    pub fn zero() -> Self {
        Self(BigRational::zero())
    }

    pub fn one() -> Self {
        Self(BigRational::one())
    }

    pub fn from_integer(value: i64) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }

    /// Build `numer/denom`, reduced. Fails on a zero denominator.
    pub fn new(numer: i64, denom: i64) -> DomainResult<Self> {
        if denom == 0 {
            return Err(DomainError::parse(
                format!("{numer}/{denom}"),
                "zero denominator",
            ));
        }
        Ok(Self(BigRational::new(BigInt::from(numer), BigInt::from(denom))))
    }

    /// Parse `"n/d"`, `"n"` or a finite decimal such as `"0.25"`.
    ///
    /// Surrounding whitespace is ignored. Malformed text and zero denominators
    /// fail with [`DomainError::Parse`]; nothing defaults silently.
    pub fn parse(text: &str) -> DomainResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::parse(text, "empty input"));
        }

        if let Some(caps) = FRACTION_RE.captures(trimmed) {
            let numer = parse_digits(text, &caps["num"])?;
            let denom = match caps.name("den") {
                Some(den) => parse_digits(text, den.as_str())?,
                None => BigInt::one(),
            };
            if denom.is_zero() {
                return Err(DomainError::parse(text, "zero denominator"));
            }
            let numer = if &caps["sign"] == "-" { -numer } else { numer };
            return Ok(Self(BigRational::new(numer, denom)));
        }

        if let Some(caps) = DECIMAL_RE.captures(trimmed) {
            let whole = &caps["whole"];
            let frac = &caps["frac"];
            if whole.is_empty() && frac.is_empty() {
                return Err(DomainError::parse(text, "no digits"));
            }
            let digits = format!("{whole}{frac}");
            let numer = parse_digits(text, &digits)?;
            let denom = BigInt::from(10u32).pow(frac.len());
            let numer = if &caps["sign"] == "-" { -numer } else { numer };
            return Ok(Self(BigRational::new(numer, denom)));
        }

        Err(DomainError::parse(
            text,
            "expected 'numerator/denominator', an integer or a decimal",
        ))
    }

    pub fn numer(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denom(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Divide, failing instead of producing an infinite value.
    pub fn divide(&self, divisor: &Rational) -> DomainResult<Rational> {
        if divisor.is_zero() {
            return Err(DomainError::Arithmetic(format!(
                "cannot divide {self} by zero"
            )));
        }
        Ok(Self(&self.0 / &divisor.0))
    }

    /// Canonical `n/d` form, or `n` when the denominator is 1.
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }

    /// Approximate percentage of the whole (`1` = 100%). Display only.
    pub fn to_percentage(&self) -> f64 {
        self.0.to_f64().map(|v| v * 100.0).unwrap_or(f64::NAN)
    }
}

fn parse_digits(input: &str, digits: &str) -> DomainResult<BigInt> {
    BigInt::from_str(digits).map_err(|e| DomainError::parse(input, e.to_string()))
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.denom().is_one() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl FromStr for Rational {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Add<&Rational> for &Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Rational {
        Rational(&self.0 + &rhs.0)
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        Rational(self.0 + rhs.0)
    }
}

impl Sub<&Rational> for &Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Rational {
        Rational(&self.0 - &rhs.0)
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        Rational(self.0 - rhs.0)
    }
}

impl Mul<&Rational> for &Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Rational {
        Rational(&self.0 * &rhs.0)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        Rational(self.0 * rhs.0)
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational(-self.0)
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, r| acc + r)
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |acc, r| &acc + r)
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Rational::parse(&text).map_err(serde::de::Error::custom)
    }
}
