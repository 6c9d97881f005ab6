use meter_client::Device;
use serde::Serialize;

/// Figures behind the dashboard's percentage rings and user counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub tampered: usize,
    pub outages: usize,
    pub tampered_pct: u8,
    pub outage_pct: u8,
    /// Records without tampering.
    pub normal_tampering: usize,
    /// Records without an outage.
    pub normal_outage: usize,
}

/// `round(100 * count / total)` with halves rounded up; 0 for an empty total.
pub fn percentage(count: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let count = count.min(total);
    let pct = (200 * count + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

pub fn dashboard_stats(devices: &[Device]) -> DashboardStats {
    let total = devices.len();
    let tampered = devices.iter().filter(|d| d.tampering).count();
    let outages = devices.iter().filter(|d| d.outage).count();

    DashboardStats {
        total,
        tampered,
        outages,
        tampered_pct: percentage(tampered, total),
        outage_pct: percentage(outages, total),
        normal_tampering: total - tampered,
        normal_outage: total - outages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, tampering: bool, outage: bool) -> Device {
        Device {
            id: id.to_string(),
            tampering,
            outage,
            ..Device::default()
        }
    }

    #[test]
    fn empty_collection_is_all_zero() {
        assert_eq!(dashboard_stats(&[]), DashboardStats::default());
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 200), 1);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn percentage_stays_within_bounds() {
        for total in 1..=60 {
            for count in 0..=total {
                let p = percentage(count, total);
                assert!(p <= 100, "{count}/{total} -> {p}");
                assert_eq!(p == 0, count * 200 < total, "{count}/{total} -> {p}");
            }
        }
        assert_eq!(percentage(7, 3), 100);
    }

    #[test]
    fn counts_flags_independently() {
        let devices = vec![
            device("a", true, true),
            device("b", true, false),
            device("c", false, false),
            device("d", false, false),
        ];
        let s = dashboard_stats(&devices);
        assert_eq!(s.total, 4);
        assert_eq!(s.tampered, 2);
        assert_eq!(s.outages, 1);
        assert_eq!(s.tampered_pct, 50);
        assert_eq!(s.outage_pct, 25);
        assert_eq!(s.normal_tampering, 2);
        assert_eq!(s.normal_outage, 3);
    }
}
