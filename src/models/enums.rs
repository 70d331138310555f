use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Frequency {
    Once => "once",
    Twice => "twice",
    Thrice => "thrice",
    Custom => "custom",
});

// Declaration order is chronological within a day; sorting relies on it.
str_enum!(DoseSlot {
    Morning => "morning",
    Afternoon => "afternoon",
    Evening => "evening",
});

str_enum!(DayStatus {
    Completed => "completed",
    Partial => "partial",
    Missed => "missed",
});

str_enum!(EligibilityMode {
    TimeOfDay => "time_of_day",
    DateInclusive => "date_inclusive",
});

str_enum!(BackendKind {
    Memory => "memory",
    Json => "json",
    Sqlite => "sqlite",
});

impl DoseSlot {
    pub const ALL: [DoseSlot; 3] = [DoseSlot::Morning, DoseSlot::Afternoon, DoseSlot::Evening];
}

impl Frequency {
    /// Fixed slots for this frequency. `Custom` has none: its slots are
    /// whichever ones the caller configured a time for.
    pub fn fixed_slots(&self) -> &'static [DoseSlot] {
        match self {
            Self::Once => &[DoseSlot::Morning],
            Self::Twice => &[DoseSlot::Morning, DoseSlot::Evening],
            Self::Thrice => &[DoseSlot::Morning, DoseSlot::Afternoon, DoseSlot::Evening],
            Self::Custom => &[],
        }
    }

    /// Parse the frequency descriptors written on prescriptions.
    ///
    /// Accepts the plain names, the common clinical abbreviations
    /// (OD, BD/BID, TDS/TID) and "N times daily" wording. The
    /// morning-afternoon-evening pattern ("1-0-1") is always `Custom`.
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let lower = descriptor.trim().to_lowercase();
        if parse_slot_pattern(&lower).is_some() {
            return Some(Self::Custom);
        }
        match lower.as_str() {
            "once" | "once daily" | "once a day" | "od" | "qd" | "daily" => Some(Self::Once),
            "twice" | "twice daily" | "twice a day" | "bd" | "bid" | "two times daily" => {
                Some(Self::Twice)
            }
            "thrice" | "thrice daily" | "three times a day" | "three times daily" | "tds"
            | "tid" => Some(Self::Thrice),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Parse a "1-0-1" style pattern into the slots it enables.
///
/// Returns `None` unless the input is exactly three dash-separated digits.
pub fn parse_slot_pattern(pattern: &str) -> Option<Vec<DoseSlot>> {
    let parts: Vec<&str> = pattern.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let mut slots = Vec::new();
    for (part, slot) in parts.iter().zip(DoseSlot::ALL) {
        let count: u32 = part.trim().parse().ok()?;
        if count > 0 {
            slots.push(slot);
        }
    }
    Some(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn frequency_round_trip() {
        for (variant, s) in [
            (Frequency::Once, "once"),
            (Frequency::Twice, "twice"),
            (Frequency::Thrice, "thrice"),
            (Frequency::Custom, "custom"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Frequency::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn dose_slot_round_trip() {
        for (variant, s) in [
            (DoseSlot::Morning, "morning"),
            (DoseSlot::Afternoon, "afternoon"),
            (DoseSlot::Evening, "evening"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(DoseSlot::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Frequency::from_str("weekly").is_err());
        assert!(DoseSlot::from_str("night").is_err());
        assert!(EligibilityMode::from_str("").is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EligibilityMode::DateInclusive).unwrap();
        assert_eq!(json, "\"date_inclusive\"");
        let kind: BackendKind = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(kind, BackendKind::Sqlite);
    }

    #[test]
    fn slots_sort_chronologically() {
        let mut slots = vec![DoseSlot::Evening, DoseSlot::Morning, DoseSlot::Afternoon];
        slots.sort();
        assert_eq!(slots, DoseSlot::ALL.to_vec());
    }

    #[test]
    fn fixed_slots_per_frequency() {
        assert_eq!(Frequency::Once.fixed_slots().len(), 1);
        assert_eq!(Frequency::Twice.fixed_slots(), &[DoseSlot::Morning, DoseSlot::Evening]);
        assert_eq!(Frequency::Thrice.fixed_slots().len(), 3);
        assert!(Frequency::Custom.fixed_slots().is_empty());
    }

    #[test]
    fn descriptor_abbreviations() {
        assert_eq!(Frequency::from_descriptor("BD"), Some(Frequency::Twice));
        assert_eq!(Frequency::from_descriptor(" tds "), Some(Frequency::Thrice));
        assert_eq!(Frequency::from_descriptor("Once daily"), Some(Frequency::Once));
        assert_eq!(Frequency::from_descriptor("1-0-1"), Some(Frequency::Custom));
        assert_eq!(Frequency::from_descriptor("every full moon"), None);
    }

    #[test]
    fn slot_pattern_parsing() {
        assert_eq!(
            parse_slot_pattern("1-0-1"),
            Some(vec![DoseSlot::Morning, DoseSlot::Evening])
        );
        assert_eq!(parse_slot_pattern("0-0-0"), Some(vec![]));
        assert_eq!(parse_slot_pattern("1-1"), None);
        assert_eq!(parse_slot_pattern("a-b-c"), None);
    }
}
