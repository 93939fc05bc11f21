use spectrumcore::model::ScanConfig;

/// Which synthetic signal shapes a template's spectrum receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFamily {
    Wifi,
    Bluetooth,
    Cellular,
    FmBroadcast,
    Generic,
}

/// Analyzer sweep settings for one survey type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanTemplate {
    pub name: &'static str,
    pub cf: f64,
    pub span: f64,
    pub sample_amount: usize,
    pub rbw: f64,
    pub vbw: f64,
    pub ref_level: f64,
}

const fn template(
    name: &'static str,
    cf: f64,
    span: f64,
    sample_amount: usize,
    rbw: f64,
    vbw: f64,
    ref_level: f64,
) -> ScanTemplate {
    ScanTemplate {
        name,
        cf,
        span,
        sample_amount,
        rbw,
        vbw,
        ref_level,
    }
}

pub const TEMPLATES: [ScanTemplate; 15] = [
    template("WiFi_Ch1_Survey", 2412.0, 20.0, 1000, 0.1, 0.3, -30.0),
    template("WiFi_Ch6_Survey", 2437.0, 20.0, 1000, 0.1, 0.3, -30.0),
    template("WiFi_Ch11_Survey", 2462.0, 20.0, 1000, 0.1, 0.3, -30.0),
    template("ISM_2.4G_Wideband", 2450.0, 100.0, 2000, 1.0, 1.0, -40.0),
    template("Bluetooth_Analysis", 2440.0, 80.0, 1600, 1.0, 3.0, -35.0),
    template("WiFi_5G_Ch36", 5180.0, 20.0, 1000, 0.1, 0.3, -30.0),
    template("WiFi_5G_Ch44", 5220.0, 20.0, 1000, 0.1, 0.3, -30.0),
    template("WiFi_5G_Wideband", 5250.0, 200.0, 2000, 1.0, 1.0, -40.0),
    template("LTE_Band7_DL", 2655.0, 70.0, 1400, 1.0, 1.0, -25.0),
    template("LTE_Band3_UL", 1747.5, 75.0, 1500, 1.0, 1.0, -25.0),
    template("Cellular_850", 850.0, 50.0, 1000, 1.0, 3.0, -30.0),
    template("FM_Radio_Band", 100.0, 20.0, 2000, 0.01, 0.03, -20.0),
    template("GPS_L1_Survey", 1575.42, 20.0, 1000, 0.1, 0.1, -50.0),
    template("UHF_TV_Band", 600.0, 100.0, 2000, 1.0, 3.0, -30.0),
    template("Amateur_2m", 145.0, 4.0, 800, 0.01, 0.03, -40.0),
];

pub const INSTANCE_NAMES: [&str; 10] = [
    "SA_Lab_001",
    "SA_Lab_002",
    "SA_Mobile_Alpha",
    "SA_Mobile_Beta",
    "SA_Remote_001",
    "Portable_Analyzer_A",
    "Portable_Analyzer_B",
    "Base_Station_SA",
    "Field_Unit_1",
    "Field_Unit_2",
];

/// 2.4 GHz WiFi channel centres, MHz.
pub const WIFI_CHANNELS_MHZ: [f64; 11] = [
    2412.0, 2417.0, 2422.0, 2427.0, 2432.0, 2437.0, 2442.0, 2447.0, 2452.0, 2457.0, 2462.0,
];

impl ScanTemplate {
    pub fn family(&self) -> SignalFamily {
        let name = self.name;
        if name.contains("WiFi") || name.contains("2.4G") {
            SignalFamily::Wifi
        } else if name.contains("Bluetooth") {
            SignalFamily::Bluetooth
        } else if name.contains("Cellular") || name.contains("LTE") {
            SignalFamily::Cellular
        } else if name.contains("FM") {
            SignalFamily::FmBroadcast
        } else {
            SignalFamily::Generic
        }
    }

    /// Sweep configuration, retuned to `cf`.
    pub fn config(&self, cf: f64) -> ScanConfig {
        let mut config = ScanConfig::new(self.name, cf, self.span, self.sample_amount);
        config.rbw = Some(self.rbw);
        config.vbw = Some(self.vbw);
        config.ref_level = Some(self.ref_level);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_follow_template_names() {
        let family = |name: &str| {
            TEMPLATES
                .iter()
                .find(|t| t.name == name)
                .map(ScanTemplate::family)
                .unwrap()
        };
        assert_eq!(family("ISM_2.4G_Wideband"), SignalFamily::Wifi);
        assert_eq!(family("WiFi_5G_Ch36"), SignalFamily::Wifi);
        assert_eq!(family("Bluetooth_Analysis"), SignalFamily::Bluetooth);
        assert_eq!(family("LTE_Band3_UL"), SignalFamily::Cellular);
        assert_eq!(family("FM_Radio_Band"), SignalFamily::FmBroadcast);
        assert_eq!(family("GPS_L1_Survey"), SignalFamily::Generic);
    }

    #[test]
    fn config_carries_analyzer_settings() {
        let config = TEMPLATES[0].config(2413.5);
        assert_eq!(config.name.as_deref(), Some("WiFi_Ch1_Survey"));
        assert_eq!(config.cf, 2413.5);
        assert_eq!(config.sample_amount, 1000);
        assert_eq!(config.rbw, Some(0.1));
    }
}
