//! Airtime model
//!
//! Computes how long a frame occupies the medium at a given rate, including
//! the PLCP preamble and header of the rate's family. Two rates with the same
//! PHY bitrate can deliver different useful throughput: an 11 Mbps frame with
//! a long preamble spends 192 µs before the first payload bit, while an OFDM
//! frame spends 20 µs.

use std::time::Duration;

use crate::{PhyFamily, Preamble, RateEntry};

/// Reference frame length used to compare rates (bytes)
pub const DEFAULT_FRAME_LEN: usize = 1400;

/// DSSS long PLCP preamble (144 bits) plus header (48 bits) at 1 Mbps
const DSSS_LONG_PLCP_US: f64 = 192.0;
/// DSSS short PLCP preamble (72 bits at 1 Mbps) plus header (48 bits at 2 Mbps)
const DSSS_SHORT_PLCP_US: f64 = 96.0;

/// Legacy OFDM preamble (16 µs) plus SIGNAL field (4 µs)
const OFDM_PREAMBLE_US: f64 = 20.0;
/// HT mixed-format preamble with one long training field
const HT_PREAMBLE_US: f64 = 36.0;
/// VHT preamble with one long training field and SIG-B
const VHT_PREAMBLE_US: f64 = 40.0;
/// OFDM symbol duration with long guard interval
const OFDM_SYMBOL_US: f64 = 4.0;
const OFDM_SERVICE_BITS: usize = 16;
const OFDM_TAIL_BITS: usize = 6;

fn ofdm_preamble_us(family: PhyFamily) -> f64 {
    match family {
        PhyFamily::Ht => HT_PREAMBLE_US,
        PhyFamily::Vht => VHT_PREAMBLE_US,
        PhyFamily::Dsss | PhyFamily::Ofdm => OFDM_PREAMBLE_US,
    }
}

/// Airtime of a `len_bytes` frame in microseconds
pub fn tx_time_us(entry: &RateEntry, len_bytes: usize) -> f64 {
    let bits = len_bytes * 8;
    if entry.is_dsss() {
        let plcp = match entry.preamble {
            Some(Preamble::Short) => DSSS_SHORT_PLCP_US,
            Some(Preamble::Long) | None => DSSS_LONG_PLCP_US,
        };
        plcp + bits as f64 / entry.mbps
    } else {
        // Data bits per symbol; 4 µs symbols so N_DBPS = Mbps * 4
        let n_dbps = (entry.mbps * OFDM_SYMBOL_US).round().max(1.0) as usize;
        let symbols = (OFDM_SERVICE_BITS + bits + OFDM_TAIL_BITS).div_ceil(n_dbps);
        ofdm_preamble_us(entry.family) + symbols as f64 * OFDM_SYMBOL_US
    }
}

/// Airtime of a `len_bytes` frame
pub fn tx_time(entry: &RateEntry, len_bytes: usize) -> Duration {
    Duration::from_nanos((tx_time_us(entry, len_bytes) * 1000.0).round() as u64)
}

/// Useful throughput in Mbps when frames of `len_bytes` succeed with
/// probability `probability`
pub fn effective_throughput_mbps(entry: &RateEntry, len_bytes: usize, probability: f64) -> f64 {
    let airtime = tx_time_us(entry, len_bytes);
    if airtime <= 0.0 {
        return 0.0;
    }
    (len_bytes * 8) as f64 / airtime * probability.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RateCatalog, RateId};

    fn rate(id: u16) -> RateEntry {
        *RateCatalog::standard().lookup(RateId(id)).unwrap()
    }

    #[test]
    fn test_dsss_long_preamble_airtime() {
        // 1 Mbps long: 192 µs PLCP + 11200 µs payload
        let t = tx_time_us(&rate(0), DEFAULT_FRAME_LEN);
        assert!((t - 11392.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_preamble_beats_long() {
        let long = tx_time_us(&rate(3), DEFAULT_FRAME_LEN);
        let short = tx_time_us(&rate(6), DEFAULT_FRAME_LEN);
        assert!((long - short - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_ofdm_symbol_rounding() {
        // 54 Mbps: N_DBPS = 216, (16 + 11200 + 6) / 216 -> 52 symbols
        let t = tx_time_us(&rate(14), DEFAULT_FRAME_LEN);
        assert!((t - (20.0 + 52.0 * 4.0)).abs() < 1e-9);
        assert_eq!(tx_time(&rate(14), DEFAULT_FRAME_LEN), Duration::from_micros(228));
    }

    #[test]
    fn test_ht_preamble_longer_than_legacy() {
        // HT MCS0 (6.5 Mbps) and OFDM 6 Mbps have close bitrates but HT
        // carries a longer preamble
        let ht = tx_time_us(&rate(15), 0);
        let ofdm = tx_time_us(&rate(7), 0);
        assert!(ht > ofdm);
    }

    #[test]
    fn test_effective_throughput_below_phy_rate() {
        let catalog = RateCatalog::standard();
        for entry in catalog.entries() {
            let tput = effective_throughput_mbps(entry, DEFAULT_FRAME_LEN, 1.0);
            assert!(tput > 0.0 && tput < entry.mbps, "{}", entry.key);
        }
    }

    #[test]
    fn test_effective_throughput_scales_with_probability() {
        let entry = rate(11);
        let full = effective_throughput_mbps(&entry, DEFAULT_FRAME_LEN, 1.0);
        let half = effective_throughput_mbps(&entry, DEFAULT_FRAME_LEN, 0.5);
        assert!((full / 2.0 - half).abs() < 1e-9);
        assert_eq!(effective_throughput_mbps(&entry, DEFAULT_FRAME_LEN, 0.0), 0.0);
    }

    #[test]
    fn test_cck_11_long_beats_5_5_short() {
        let fast = effective_throughput_mbps(&rate(3), DEFAULT_FRAME_LEN, 1.0);
        let slow = effective_throughput_mbps(&rate(5), DEFAULT_FRAME_LEN, 1.0);
        assert!(fast > slow);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn airtime_grows_with_frame_length(id in 0u16..33, len in 0usize..4000, extra in 1usize..200) {
                let entry = rate(id);
                prop_assert!(tx_time_us(&entry, len + extra) >= tx_time_us(&entry, len));
            }

            #[test]
            fn faster_rate_in_family_is_never_slower(len in 1usize..4000) {
                let catalog = RateCatalog::standard();
                for family in catalog.families() {
                    let ofdm: Vec<_> = catalog.family_rates(family).filter(|e| e.is_ofdm()).collect();
                    for pair in ofdm.windows(2) {
                        prop_assert!(tx_time_us(pair[1], len) <= tx_time_us(pair[0], len));
                    }
                }
            }
        }
    }
}
