use crate::narrative::fallback::NarrativeFallbackGenerator;
use crate::narrative::service::{extract_json_object, NarrativeService};
use crate::narrative::types::{Narrative, NarrativeAnalysis, NarrativeContext};
use std::sync::Arc;
use std::time::Duration;

/// Dispatches to the external service and falls back to the rule-based
/// narrative on any failure
#[derive(Clone)]
pub struct NarrativeGenerator {
    service: Option<Arc<dyn NarrativeService>>,
    timeout: Duration,
}

impl NarrativeGenerator {
    pub fn new(service: Arc<dyn NarrativeService>, timeout: Duration) -> Self {
        Self {
            service: Some(service),
            timeout,
        }
    }

    /// Always uses the rule-based narrative
    pub fn fallback_only() -> Self {
        Self {
            service: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    pub async fn generate(&self, ctx: &NarrativeContext) -> Narrative {
        let Some(service) = &self.service else {
            return Self::fallback(ctx, "no narrative service configured".to_string());
        };

        match self.request(service.as_ref(), ctx).await {
            Ok(analysis) => Narrative::External { analysis },
            Err(reason) => {
                tracing::warn!("Narrative service failed, using fallback: {}", reason);
                Self::fallback(ctx, reason)
            }
        }
    }

    async fn request(&self, service: &dyn NarrativeService, ctx: &NarrativeContext) -> Result<NarrativeAnalysis, String> {
        let prompt = build_prompt(ctx);
        let reply = tokio::time::timeout(self.timeout, service.complete(&prompt))
            .await
            .map_err(|_| format!("no reply within {:?}", self.timeout))?
            .map_err(|e| e.to_string())?;

        let json = extract_json_object(&reply).ok_or_else(|| "reply contained no JSON object".to_string())?;
        serde_json::from_str::<NarrativeAnalysis>(json).map_err(|e| format!("unparsable reply: {}", e))
    }

    fn fallback(ctx: &NarrativeContext, reason: String) -> Narrative {
        Narrative::Fallback {
            analysis: NarrativeFallbackGenerator::generate(ctx),
            reason,
        }
    }
}

/// Prompt asking for the three-part analysis as bare JSON
pub fn build_prompt(ctx: &NarrativeContext) -> String {
    let days = ctx.days_until_bloom;
    let confidence = ctx.confidence;
    format!(
        r#"You are an agronomist specialised in crop flowering prediction.

PREDICTION DATA:
- Days until flowering: {days} days
- Confidence level: {confidence}%
- Current NDVI: {ndvi:.3}
- Temperature: {temperature:.1}°C
- Precipitation (7 days): {precip:.1}mm
- Parcel area: {area:.2} hectares

Write a professional, explanatory analysis for farmers. Reply ONLY with JSON in exactly this structure:

{{
  "key_indicators": [
    "Indicator 1 explaining why flowering is expected in {days} days",
    "Indicator 2 about the {confidence}% confidence level",
    "Indicator 3 about current environmental conditions"
  ],
  "recommendations": [
    "Specific recommendation 1 given {days} days remain",
    "Specific recommendation 2 based on the confidence level",
    "Specific recommendation 3 about preparing for flowering"
  ],
  "risk_factors": [
    "Risk factor 1 (if any)",
    "Risk factor 2 (if any)"
  ]
}}

Explain why the prediction indicates {days} days and what a {confidence}% confidence level means. Be specific and practical, and ground the analysis in the satellite data."#,
        ndvi = ctx.ndvi,
        temperature = ctx.temperature,
        precip = ctx.precipitation_7d,
        area = ctx.area_hectares,
    )
}
