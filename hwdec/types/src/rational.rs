/*!
    Rational number type for frame rates.
*/

use std::fmt;

/**
    A rational number represented as a numerator and denominator.

    Used for frame rates as reported by the stream (e.g., 30000/1001 for 29.97 fps).
    A zero denominator means the rate is unknown.
*/
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    /**
        Create a new rational number.
    */
    #[inline]
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /**
        Returns true if the denominator is non-zero.
    */
    #[inline]
    pub const fn is_known(self) -> bool {
        self.den != 0
    }

    /**
        Convert to f64, or `None` if the denominator is zero.
    */
    #[inline]
    pub fn to_f64(self) -> Option<f64> {
        self.is_known()
            .then(|| f64::from(self.num) / f64::from(self.den))
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_f64() {
            Some(rate) => write!(f, "{rate:.2}"),
            None => write!(f, "unknown"),
        }
    }
}

impl From<(u32, u32)> for Rational {
    fn from((num, den): (u32, u32)) -> Self {
        Self::new(num, den)
    }
}
