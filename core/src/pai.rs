//! Principal Adverse Impact indicators and the KPI → PAI rule table.
//!
//! The 14 mandatory indicators all start as `value: null`,
//! `data_quality: "estimated"`. KPIs populate them through PAI_RULES,
//! a keyword table matched against the lower-cased KPI name. Indicators
//! without a rule are a known coverage gap and stay estimated.

use crate::model::EsgKpi;
use serde::{
    de::Error as _,
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::collections::BTreeMap;

/// (id, name, unit) for every mandatory indicator.
pub const PAI_CATALOG: [(u8, &str, &str); 14] = [
    (1, "GHG emissions", "tCO2e"),
    (2, "Carbon footprint", "tCO2e per million EUR invested"),
    (3, "GHG intensity of investee companies", "tCO2e per million EUR revenue"),
    (4, "Exposure to companies in fossil fuel sector", "percentage"),
    (5, "Share of non-renewable energy consumption", "percentage"),
    (6, "Energy consumption intensity", "GWh per million EUR revenue"),
    (7, "Activities negatively affecting biodiversity", "percentage"),
    (8, "Emissions to water", "tonnes"),
    (9, "Hazardous waste ratio", "tonnes"),
    (10, "Violations of UN Global Compact principles", "number"),
    (11, "Lack of processes for UN Global Compact", "percentage"),
    (12, "Unadjusted gender pay gap", "percentage"),
    (13, "Board gender diversity", "percentage"),
    (14, "Exposure to controversial weapons", "percentage"),
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Estimated,
    Reported,
    Calculated,
}

/// How a KPI name is matched.
#[derive(Debug, Clone, Copy)]
pub enum KeywordMatch {
    /// Any one keyword appears in the name.
    Any(&'static [&'static str]),
    /// Every keyword appears in the name.
    All(&'static [&'static str]),
}

impl KeywordMatch {
    pub fn matches(&self, name_lower: &str) -> bool {
        match self {
            Self::Any(words) => words.iter().any(|w| name_lower.contains(w)),
            Self::All(words) => words.iter().all(|w| name_lower.contains(w)),
        }
    }
}

/// How the KPI's current value becomes the indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaiTransform {
    /// Copy current value as reported (a missing value is copied too).
    Reported,
    /// `100 − current`; skipped unless current is set and non-zero.
    Complement,
}

#[derive(Debug, Clone, Copy)]
pub struct PaiRule {
    pub indicator_id: u8,
    pub pattern: KeywordMatch,
    pub transform: PaiTransform,
}

pub const PAI_RULES: &[PaiRule] = &[
    PaiRule {
        indicator_id: 1,
        pattern: KeywordMatch::Any(&["carbon", "emission", "ghg"]),
        transform: PaiTransform::Reported,
    },
    PaiRule {
        indicator_id: 5,
        pattern: KeywordMatch::All(&["energy", "renewable"]),
        transform: PaiTransform::Complement,
    },
    PaiRule {
        indicator_id: 8,
        pattern: KeywordMatch::Any(&["water"]),
        transform: PaiTransform::Reported,
    },
    PaiRule {
        indicator_id: 9,
        pattern: KeywordMatch::Any(&["waste"]),
        transform: PaiTransform::Reported,
    },
    PaiRule {
        indicator_id: 13,
        pattern: KeywordMatch::Any(&["gender", "diversity"]),
        transform: PaiTransform::Reported,
    },
];

/// Indicator ids no rule can ever populate.
pub fn unmapped_indicators() -> Vec<u8> {
    PAI_CATALOG
        .iter()
        .map(|(id, _, _)| *id)
        .filter(|id| !PAI_RULES.iter().any(|r| r.indicator_id == *id))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaiIndicator {
    pub name: String,
    pub value: Option<f64>,
    pub unit: String,
    pub data_quality: DataQuality,
}

/// All 14 indicators, serialized as `{"pai_1": {...}, ..., "pai_14": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaiIndicators {
    entries: Vec<(u8, PaiIndicator)>,
}

impl PaiIndicators {
    pub fn estimated() -> Self {
        let entries = PAI_CATALOG
            .iter()
            .map(|(id, name, unit)| {
                (
                    *id,
                    PaiIndicator {
                        name: (*name).to_string(),
                        value: None,
                        unit: (*unit).to_string(),
                        data_quality: DataQuality::Estimated,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Apply PAI_RULES to every KPI in order; later KPIs overwrite earlier.
    pub fn from_kpis(kpis: &[EsgKpi]) -> Self {
        let mut indicators = Self::estimated();
        for kpi in kpis {
            let name = kpi.name_lower();
            for rule in PAI_RULES.iter().filter(|r| r.pattern.matches(&name)) {
                indicators.apply(rule, kpi.current_value);
            }
        }
        indicators
    }

    fn apply(&mut self, rule: &PaiRule, current: Option<f64>) {
        let Some(indicator) = self.get_mut(rule.indicator_id) else { return };
        match rule.transform {
            PaiTransform::Reported => {
                indicator.value = current;
                indicator.data_quality = DataQuality::Reported;
            }
            PaiTransform::Complement => {
                if let Some(c) = current.filter(|c| *c != 0.0) {
                    indicator.value = Some(100.0 - c);
                    indicator.data_quality = DataQuality::Calculated;
                }
            }
        }
    }

    pub fn get(&self, id: u8) -> Option<&PaiIndicator> {
        self.entries.iter().find(|(i, _)| *i == id).map(|(_, p)| p)
    }

    fn get_mut(&mut self, id: u8) -> Option<&mut PaiIndicator> {
        self.entries.iter_mut().find(|(i, _)| *i == id).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &PaiIndicator)> {
        self.entries.iter().map(|(id, p)| (*id, p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indicators with a non-estimated value.
    pub fn populated_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, p)| p.data_quality != DataQuality::Estimated)
            .count()
    }
}

impl Serialize for PaiIndicators {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, indicator) in &self.entries {
            map.serialize_entry(&format!("pai_{id}"), indicator)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PaiIndicators {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, PaiIndicator>::deserialize(deserializer)?;
        let mut entries = raw
            .into_iter()
            .map(|(key, indicator)| {
                key.strip_prefix("pai_")
                    .and_then(|n| n.parse::<u8>().ok())
                    .map(|id| (id, indicator))
                    .ok_or_else(|| D::Error::custom(format!("unexpected PAI key: {key}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|(id, _)| *id);
        Ok(Self { entries })
    }
}
