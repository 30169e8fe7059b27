use serde::{Deserialize, Serialize};

/// Alert color shown with a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertColor {
    Red,
    Orange,
    Yellow,
    Green,
}

impl AlertColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertColor::Red => "red",
            AlertColor::Orange => "orange",
            AlertColor::Yellow => "yellow",
            AlertColor::Green => "green",
        }
    }
}

/// Outlook bucket for a days-until-bloom prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomStage {
    /// Fewer than 7 days
    Imminent,
    /// 7 to 13 days
    Approaching,
    /// 14 to 29 days
    ActiveDevelopment,
    /// 30 days or more
    Vegetative,
}

impl BloomStage {
    /// Bucket whole days (predictions are floored before bucketing)
    pub fn for_days(days: i64) -> Self {
        match days {
            d if d < 7 => BloomStage::Imminent,
            d if d < 14 => BloomStage::Approaching,
            d if d < 30 => BloomStage::ActiveDevelopment,
            _ => BloomStage::Vegetative,
        }
    }

    /// Confidence percentage attached to the bucket
    pub fn probability(&self) -> u8 {
        match self {
            BloomStage::Imminent => 95,
            BloomStage::Approaching => 85,
            BloomStage::ActiveDevelopment => 75,
            BloomStage::Vegetative => 70,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            BloomStage::Imminent => "Imminent bloom - critical preparation",
            BloomStage::Approaching => "Approaching bloom - alert phase",
            BloomStage::ActiveDevelopment => "Active development - regular monitoring",
            BloomStage::Vegetative => "Vegetative phase - advance planning",
        }
    }

    pub fn color(&self) -> AlertColor {
        match self {
            BloomStage::Imminent => AlertColor::Red,
            BloomStage::Approaching => AlertColor::Orange,
            BloomStage::ActiveDevelopment => AlertColor::Yellow,
            BloomStage::Vegetative => AlertColor::Green,
        }
    }
}

/// Current conditions a narrative is written about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    /// Whole days until bloom
    pub days_until_bloom: i64,
    /// Confidence percentage of the outlook bucket
    pub confidence: u8,
    pub ndvi: f64,
    /// Celsius
    pub temperature: f64,
    /// Millimetres over the trailing 7 days
    pub precipitation_7d: f64,
    pub area_hectares: f64,
}

/// The three-part explanation returned to farmers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeAnalysis {
    pub key_indicators: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// Where a narrative came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Narrative {
    External { analysis: NarrativeAnalysis },
    Fallback {
        analysis: NarrativeAnalysis,
        /// Why the external service was not used
        reason: String,
    },
}

impl Narrative {
    pub fn analysis(&self) -> &NarrativeAnalysis {
        match self {
            Narrative::External { analysis } | Narrative::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Narrative::Fallback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(BloomStage::for_days(-2), BloomStage::Imminent);
        assert_eq!(BloomStage::for_days(6), BloomStage::Imminent);
        assert_eq!(BloomStage::for_days(7), BloomStage::Approaching);
        assert_eq!(BloomStage::for_days(13), BloomStage::Approaching);
        assert_eq!(BloomStage::for_days(14), BloomStage::ActiveDevelopment);
        assert_eq!(BloomStage::for_days(29), BloomStage::ActiveDevelopment);
        assert_eq!(BloomStage::for_days(30), BloomStage::Vegetative);
    }

    #[test]
    fn test_stage_presentation() {
        let stage = BloomStage::for_days(10);
        assert_eq!(stage.probability(), 85);
        assert_eq!(stage.color(), AlertColor::Orange);
        assert_eq!(stage.status_label(), "Approaching bloom - alert phase");
    }

    #[test]
    fn test_narrative_serializes_source_tag() {
        let narrative = Narrative::Fallback {
            analysis: NarrativeAnalysis::default(),
            reason: "no service configured".to_string(),
        };
        let json = serde_json::to_value(&narrative).unwrap();
        assert_eq!(json["source"], "fallback");
        assert!(narrative.is_fallback());
    }
}
