//! Persisted setting keys and their compiled-in defaults

use shared::SettingValue;

/// Every persisted configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    /// Device identity; survives reset-to-defaults
    DeviceId,
    StationName,
    PrinterName,
    LabelTemplate,
    AutoPrint,
    TareLb,
    ScanMinLength,
    ScanIntervalMs,
    ScanDebounceMs,
    ScanAlphanumeric,
    ReportEmail,
    BackupEnabled,
}

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        Self::DeviceId,
        Self::StationName,
        Self::PrinterName,
        Self::LabelTemplate,
        Self::AutoPrint,
        Self::TareLb,
        Self::ScanMinLength,
        Self::ScanIntervalMs,
        Self::ScanDebounceMs,
        Self::ScanAlphanumeric,
        Self::ReportEmail,
        Self::BackupEnabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceId => "device_id",
            Self::StationName => "station_name",
            Self::PrinterName => "printer_name",
            Self::LabelTemplate => "label_template",
            Self::AutoPrint => "auto_print",
            Self::TareLb => "tare_lb",
            Self::ScanMinLength => "scan_min_length",
            Self::ScanIntervalMs => "scan_interval_ms",
            Self::ScanDebounceMs => "scan_debounce_ms",
            Self::ScanAlphanumeric => "scan_alphanumeric",
            Self::ReportEmail => "report_email",
            Self::BackupEnabled => "backup_enabled",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Local store key, e.g. `settings.station_name`
    pub fn storage_key(&self) -> String {
        format!("{}{}", crate::store::SETTINGS_PREFIX, self.as_str())
    }

    /// Compiled-in default
    pub fn default_value(&self) -> SettingValue {
        match self {
            Self::DeviceId => SettingValue::from(""),
            Self::StationName => SettingValue::from("Station 1"),
            Self::PrinterName => SettingValue::from(""),
            Self::LabelTemplate => SettingValue::from("standard"),
            Self::AutoPrint => SettingValue::from(true),
            Self::TareLb => SettingValue::from(0.0),
            Self::ScanMinLength => SettingValue::from(14.0),
            Self::ScanIntervalMs => SettingValue::from(80.0),
            Self::ScanDebounceMs => SettingValue::from(2000.0),
            Self::ScanAlphanumeric => SettingValue::from(false),
            Self::ReportEmail => SettingValue::from(""),
            Self::BackupEnabled => SettingValue::from(true),
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_and_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
            assert!(seen.insert(key.as_str()));
        }
        assert_eq!(SettingKey::parse("unknown"), None);
    }
}
