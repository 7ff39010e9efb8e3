// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). σ is the population standard deviation of
// exactly the window the SMA averaged, taken around that exact mean so a
// constant window has zero variance.

use super::sma::calculate_sma;
use super::Series;

/// Aligned Bollinger Band output.
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// Each position is defined where `calculate_sma(closes, period)` is, unless
/// the band width overflows, in which case all three bands are undefined.
/// Zero variance collapses all three bands onto the middle.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> BollingerSeries {
    let mut middle = calculate_sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for i in 0..middle.len() {
        let Some(mid) = middle[i] else { continue };
        let window = &closes[i + 1 - period..=i];
        let variance = window.iter().map(|x| (x - mid).powi(2)).sum::<f64>() / period as f64;
        let offset = num_std * variance.sqrt();
        let (up, low) = (mid + offset, mid - offset);
        if offset.is_finite() && up.is_finite() && low.is_finite() {
            upper[i] = Some(up);
            lower[i] = Some(low);
        } else {
            middle[i] = None;
        }
    }

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0);
        let (u, m, l) = (bb.upper[19].unwrap(), bb.middle[19].unwrap(), bb.lower[19].unwrap());
        assert!(u > m);
        assert!(l < m);
        // Population σ of 1..=20 is sqrt(33.25).
        assert!((u - m - 2.0 * 33.25_f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let bb = calculate_bollinger(&[1.0, 2.0, 3.0], 20, 2.0);
        assert!(bb.upper.iter().all(Option::is_none));
        assert!(bb.middle.iter().all(Option::is_none));
        assert!(bb.lower.iter().all(Option::is_none));
    }

    #[test]
    fn bollinger_empty_and_zero_period() {
        assert!(calculate_bollinger(&[], 20, 2.0).middle.is_empty());
        let bb = calculate_bollinger(&[1.0, 2.0], 0, 2.0);
        assert_eq!(bb.upper, vec![None, None]);
    }

    #[test]
    fn bollinger_flat() {
        let bb = calculate_bollinger(&[100.0; 25], 20, 2.0);
        for i in 19..25 {
            assert_eq!(bb.upper[i], Some(100.0));
            assert_eq!(bb.middle[i], Some(100.0));
            assert_eq!(bb.lower[i], Some(100.0));
        }
    }

    #[test]
    fn bollinger_flat_inexact_prices_collapse() {
        for price in [100.1, 0.1, 187.37] {
            let bb = calculate_bollinger(&vec![price; 20], 20, 2.0);
            assert_eq!(bb.upper[19], Some(price), "upper at {price}");
            assert_eq!(bb.middle[19], Some(price), "middle at {price}");
            assert_eq!(bb.lower[19], Some(price), "lower at {price}");
        }
    }

    #[test]
    fn bollinger_overflowing_width_leaves_all_bands_undefined() {
        // Mean of [-1e300, 1e300] is 0, but the squared deviations overflow.
        let closes = vec![-1e300, 1e300, 1e300];
        let bb = calculate_bollinger(&closes, 2, 2.0);
        assert!(bb.upper[1].is_none());
        assert!(bb.middle[1].is_none());
        assert!(bb.lower[1].is_none());
        assert_eq!(bb.middle[2], Some(1e300));
        assert_eq!(bb.upper[2], Some(1e300));
    }

    #[test]
    fn bollinger_band_ordering() {
        let closes = vec![
            12.0, 11.4, 13.9, 15.2, 14.8, 14.1, 16.7, 15.9, 17.3, 16.2, 18.8, 19.1, 17.6,
        ];
        for num_std in [0.0, 0.5, 2.0, 3.0] {
            let bb = calculate_bollinger(&closes, 5, num_std);
            for i in 0..closes.len() {
                assert_eq!(bb.upper[i].is_some(), i >= 4);
                if let (Some(u), Some(m), Some(l)) = (bb.upper[i], bb.middle[i], bb.lower[i]) {
                    assert!(u >= m && m >= l, "ordering broken at {i}");
                }
            }
        }
    }

    #[test]
    fn bollinger_nan_is_undefined() {
        let mut closes = vec![10.0; 25];
        closes[22] = f64::NAN;
        let bb = calculate_bollinger(&closes, 20, 2.0);
        assert!(bb.upper[21].is_some());
        assert!(bb.upper[22].is_none());
        assert!(bb.lower[24].is_none());
    }
}
