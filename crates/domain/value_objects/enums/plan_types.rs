use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Yearly,
}

impl PlanType {
    pub const ALL: [PlanType; 2] = [PlanType::Monthly, PlanType::Yearly];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::Yearly => "yearly",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(PlanType::Monthly),
            "yearly" => Some(PlanType::Yearly),
            _ => None,
        }
    }

    /// Length of one billing period in calendar months.
    pub fn period_months(&self) -> u32 {
        match self {
            PlanType::Monthly => 1,
            PlanType::Yearly => 12,
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
