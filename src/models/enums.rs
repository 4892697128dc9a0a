use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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

            /// Every variant, in declaration order.
            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
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

str_enum!(UserRole {
    Admin => "admin",
    Doctor => "doctor",
    Patient => "patient",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
});

str_enum!(MedicationCategory {
    Antibiotic => "antibiotic",
    Vitamin => "vitamin",
    Analgesic => "analgesic",
    Antihypertensive => "antihypertensive",
    Antidiabetic => "antidiabetic",
    Other => "other",
});

str_enum!(ConsumptionStatus {
    Taken => "taken",
    Late => "late",
    Missed => "missed",
});

impl ConsumptionStatus {
    /// Taken and late doses both count towards compliance.
    pub fn counts_as_taken(&self) -> bool {
        matches!(self, Self::Taken | Self::Late)
    }
}
