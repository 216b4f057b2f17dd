use crate::error::AnalyticsError;
use configuration::BinningConfig;
use core_types::BinIndex;
use serde::{Deserialize, Serialize};

/// Bin indices stay below 2^53 in magnitude, where `f64` still counts every integer,
/// so that `bounds` of an assigned bin always contains the value.
const MAX_BIN_MAGNITUDE: f64 = 9_007_199_254_740_992.0;

/// Partition of the return axis into half-open bins `[lower, upper)`.
///
/// Losses are spread over narrow bins and gains over wide ones: with the default
/// widths, bin `-1` is `[-10%, 0%)`, bin `0` is `[0%, 100%)`, bin `2` is `[200%, 300%)`.
/// Every finite return of a sane magnitude falls into exactly one bin; returns whose
/// bin index cannot be represented exactly are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinningScheme {
    negative_width: f64,
    positive_width: f64,
}

impl Default for BinningScheme {
    fn default() -> Self {
        Self {
            negative_width: 10.0,
            positive_width: 100.0,
        }
    }
}

impl BinningScheme {
    pub fn new(negative_width: f64, positive_width: f64) -> Result<Self, AnalyticsError> {
        for (name, width) in [
            ("negative_width", negative_width),
            ("positive_width", positive_width),
        ] {
            if !width.is_finite() || width <= 0.0 {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "{name} must be a positive number, got {width}"
                )));
            }
        }
        Ok(Self {
            negative_width,
            positive_width,
        })
    }

    pub fn from_config(config: &BinningConfig) -> Result<Self, AnalyticsError> {
        Self::new(config.negative_width, config.positive_width)
    }

    pub fn negative_width(&self) -> f64 {
        self.negative_width
    }

    pub fn positive_width(&self) -> f64 {
        self.positive_width
    }

    /// Maps a return (in percent) to its bin.
    ///
    /// `floor(r / negative_width)` for `r < 0`, `floor(r / positive_width)` otherwise.
    pub fn assign_bin(&self, return_value: f64) -> Result<BinIndex, AnalyticsError> {
        if !return_value.is_finite() {
            return Err(AnalyticsError::InvalidInput(format!(
                "return value {return_value} is not a finite number"
            )));
        }

        let width = if return_value < 0.0 {
            self.negative_width
        } else {
            self.positive_width
        };
        let quotient = (return_value / width).floor();
        if quotient.abs() >= MAX_BIN_MAGNITUDE {
            return Err(AnalyticsError::InvalidInput(format!(
                "return value {return_value} is outside the binnable range"
            )));
        }

        let index = quotient as i64;
        if return_value < 0.0 {
            // A tiny negative quotient can underflow to -0.0; it still belongs to bin -1.
            Ok(BinIndex(index.min(-1)))
        } else {
            Ok(BinIndex(index))
        }
    }

    /// The `[lower, upper)` interval covered by a bin.
    pub fn bounds(&self, bin: BinIndex) -> (f64, f64) {
        let width = if bin.0 < 0 {
            self.negative_width
        } else {
            self.positive_width
        };
        let lower = bin.0 as f64 * width;
        (lower, lower + width)
    }

    /// Human readable range, e.g. `-40% ~ -30%`.
    pub fn label(&self, bin: BinIndex) -> String {
        let (lower, upper) = self.bounds(bin);
        format!("{lower}% ~ {upper}%")
    }
}

/// Bins a return with the default 10/100 point widths.
pub fn assign_bin(return_value: f64) -> Result<BinIndex, AnalyticsError> {
    BinningScheme::default().assign_bin(return_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_example_bins_exactly() {
        let returns = [-35.0, -35.0, -5.0, 5.0, 50.0, 250.0];
        let bins: Vec<i64> = returns
            .iter()
            .map(|r| assign_bin(*r).unwrap().0)
            .collect();
        assert_eq!(bins, vec![-4, -4, -1, 0, 0, 2]);
    }

    #[test]
    fn boundaries_belong_to_the_upper_bin() {
        assert_eq!(assign_bin(0.0).unwrap(), BinIndex(0));
        assert_eq!(assign_bin(-0.0).unwrap(), BinIndex(0));
        assert_eq!(assign_bin(-10.0).unwrap(), BinIndex(-1));
        assert_eq!(assign_bin(-10.000001).unwrap(), BinIndex(-2));
        assert_eq!(assign_bin(100.0).unwrap(), BinIndex(1));
        assert_eq!(assign_bin(99.999).unwrap(), BinIndex(0));
        assert_eq!(assign_bin(-100.0).unwrap(), BinIndex(-10));
    }

    #[test]
    fn tiny_negative_returns_stay_negative() {
        assert_eq!(assign_bin(-f64::MIN_POSITIVE).unwrap(), BinIndex(-1));
        assert_eq!(assign_bin(-5e-324).unwrap(), BinIndex(-1));
    }

    #[test]
    fn huge_returns_are_invalid_input() {
        for value in [1e300, -1e300, f64::MAX, f64::MIN, 1e18, -1e17] {
            assert!(
                matches!(assign_bin(value), Err(AnalyticsError::InvalidInput(_))),
                "{value} should not be binned"
            );
        }

        let scheme = BinningScheme::default();
        for value in [1e17, -1e16] {
            let bin = scheme.assign_bin(value).unwrap();
            let (lower, upper) = scheme.bounds(bin);
            assert!(lower <= value && value < upper, "{value} not in {lower}..{upper}");
        }
    }

    #[test]
    fn non_finite_returns_are_invalid_input() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                assign_bin(value),
                Err(AnalyticsError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn every_value_lands_inside_its_bounds() {
        let scheme = BinningScheme::default();
        let mut value = -250.0;
        while value < 1200.0 {
            let bin = scheme.assign_bin(value).unwrap();
            let (lower, upper) = scheme.bounds(bin);
            assert!(lower <= value && value < upper, "{value} not in {bin} {lower}..{upper}");
            // Exactly one bin: neighbours must not contain the value.
            for neighbour in [BinIndex(bin.0 - 1), BinIndex(bin.0 + 1)] {
                let (lo, hi) = scheme.bounds(neighbour);
                assert!(!(lo <= value && value < hi));
            }
            assert_eq!(scheme.assign_bin(value).unwrap(), bin);
            value += 2.5;
        }
    }

    #[test]
    fn rejects_non_positive_widths() {
        assert!(matches!(
            BinningScheme::new(0.0, 100.0),
            Err(AnalyticsError::InvalidConfig(_))
        ));
        assert!(BinningScheme::new(10.0, f64::NAN).is_err());
        assert!(BinningScheme::new(5.0, 50.0).is_ok());
    }

    #[test]
    fn labels_read_as_ranges() {
        let scheme = BinningScheme::default();
        assert_eq!(scheme.label(BinIndex(-4)), "-40% ~ -30%");
        assert_eq!(scheme.label(BinIndex(2)), "200% ~ 300%");
    }
}
