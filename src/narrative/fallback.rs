//! Rule-based narrative used whenever the external text service is unavailable
//!
//! Deterministic: the same context always yields the same text.

use crate::narrative::types::{BloomStage, NarrativeAnalysis, NarrativeContext};

/// Risk thresholds
const LOW_CONFIDENCE_PCT: u8 = 70;
const COLD_TEMPERATURE_C: f64 = 10.0;
const HOT_TEMPERATURE_C: f64 = 35.0;
const DRY_PRECIP_7D_MM: f64 = 5.0;
const LOW_NDVI: f64 = 0.4;
const WET_PRECIP_7D_MM: f64 = 40.0;

pub const NO_SIGNIFICANT_RISK: &str =
    "No significant risk factors detected; conditions favour the predicted bloom";

pub struct NarrativeFallbackGenerator;

impl NarrativeFallbackGenerator {
    pub fn generate(ctx: &NarrativeContext) -> NarrativeAnalysis {
        NarrativeAnalysis {
            key_indicators: Self::key_indicators(ctx),
            recommendations: Self::recommendations(ctx),
            risk_factors: Self::risk_factors(ctx),
        }
    }

    fn precision_label(confidence: u8) -> &'static str {
        match confidence {
            95 => "high precision",
            c if c >= 75 => "good precision",
            _ => "moderate precision",
        }
    }

    fn key_indicators(ctx: &NarrativeContext) -> Vec<String> {
        let favourable = ctx.temperature > 15.0 && ctx.precipitation_7d > 10.0;
        vec![
            format!(
                "The {}-day prediction is based on the vegetation index NDVI ({:.3}) and current climate conditions, which show a consistent vegetative development pattern.",
                ctx.days_until_bloom, ctx.ndvi
            ),
            format!(
                "A confidence level of {}% indicates {} in the prediction from the model trained on historical flowering data.",
                ctx.confidence,
                Self::precision_label(ctx.confidence)
            ),
            format!(
                "Current conditions (temperature: {:.1}°C, precipitation: {:.1}mm/7 days) {} optimal development towards flowering.",
                ctx.temperature,
                ctx.precipitation_7d,
                if favourable { "favour" } else { "need attention for" }
            ),
        ]
    }

    fn recommendations(ctx: &NarrativeContext) -> Vec<String> {
        let days = ctx.days_until_bloom;
        let confidence = ctx.confidence;
        let ndvi = ctx.ndvi;

        match BloomStage::for_days(days) {
            BloomStage::Imminent => vec![
                format!(
                    "With only {} days to flowering at {}% confidence, start daily monitoring of flower buds and prepare harvest equipment.",
                    days, confidence
                ),
                "Check the short-term weather forecast to protect emerging flowers from extreme events.".to_string(),
                format!(
                    "Given the current NDVI of {:.3}, {} irrigation to ensure uniform flowering.",
                    ndvi,
                    if ndvi > 0.6 { "maintain" } else { "optimise" }
                ),
            ],
            BloomStage::Approaching => vec![
                format!(
                    "{} days remain until flowering at {}% confidence. Plan harvest logistics and secure staff availability.",
                    days, confidence
                ),
                "Apply a final fertilisation if needed, allowing for uptake time before flowering.".to_string(),
                format!(
                    "The current temperature of {:.1}°C {} for floral development. {}",
                    ctx.temperature,
                    if ctx.temperature > 18.0 { "is optimal" } else { "should be monitored" },
                    if ctx.temperature < 15.0 {
                        "Consider frost protection."
                    } else {
                        "Keep current conditions."
                    }
                ),
            ],
            BloomStage::ActiveDevelopment => vec![
                format!(
                    "With {} days of lead time at {}% confidence, prepare for flowering: review irrigation, nutrition and plant protection.",
                    days, confidence
                ),
                format!(
                    "An NDVI of {:.3} {}. Adjust management accordingly.",
                    ndvi,
                    if ndvi > 0.5 {
                        "indicates good vegetative vigour"
                    } else {
                        "suggests growing conditions need improvement"
                    }
                ),
                "Set up a weekly monitoring schedule to refine the prediction as the estimated date approaches.".to_string(),
            ],
            BloomStage::Vegetative => vec![
                format!(
                    "The prediction indicates {} days until flowering at {}% confidence. Use this time to optimise growing conditions.",
                    days, confidence
                ),
                "Implement a balanced nutrition and water management programme to maximise flowering potential.".to_string(),
                format!(
                    "Current conditions show {}. Monitor crop progress every two weeks.",
                    if ndvi > 0.4 { "a good starting point" } else { "room for improvement" }
                ),
            ],
        }
    }

    fn risk_factors(ctx: &NarrativeContext) -> Vec<String> {
        let mut risks = Vec::new();

        if ctx.confidence < LOW_CONFIDENCE_PCT {
            risks.push(format!(
                "A confidence level of {}% suggests variable conditions; monitor more frequently",
                ctx.confidence
            ));
        }
        if ctx.temperature < COLD_TEMPERATURE_C {
            risks.push(format!(
                "Very low temperature ({:.1}°C) may delay the flowering predicted in {} days",
                ctx.temperature, ctx.days_until_bloom
            ));
        }
        if ctx.temperature > HOT_TEMPERATURE_C {
            risks.push(format!(
                "Very high temperature ({:.1}°C) may accelerate or stress floral development",
                ctx.temperature
            ));
        }
        if ctx.precipitation_7d < DRY_PRECIP_7D_MM {
            risks.push(format!(
                "Insufficient precipitation ({:.1}mm) may affect flowering; supplementary irrigation recommended",
                ctx.precipitation_7d
            ));
        }
        if ctx.ndvi < LOW_NDVI {
            risks.push(format!(
                "Low NDVI ({:.3}) indicates vegetative stress that could affect the {}-day prediction",
                ctx.ndvi, ctx.days_until_bloom
            ));
        }
        if ctx.days_until_bloom < 7 && ctx.precipitation_7d > WET_PRECIP_7D_MM {
            risks.push("Excess precipitation close to flowering may cause flower drop".to_string());
        }

        if risks.is_empty() {
            risks.push(NO_SIGNIFICANT_RISK.to_string());
        }
        risks
    }
}
