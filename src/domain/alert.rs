use serde::Serialize;

use super::entities::CocktailPricing;
use super::evaluation::Evaluation;

pub const ALERT_CHANNEL: &str = "alerts";
pub const LOW_MARGIN_EVENT: &str = "low-margin";

/// Notification sent to management when a drink falls under the margin floor.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAlert {
    pub subject: String,
    pub margin_percent: f64,
    pub timestamp: String,
}

impl MarginAlert {
    /// Builds the alert payload when the evaluation calls for one.
    pub fn for_evaluation(
        pricing: &CocktailPricing,
        evaluation: &Evaluation,
        timestamp: String,
    ) -> Option<Self> {
        evaluation.should_alert.then(|| Self {
            subject: pricing.name.clone(),
            margin_percent: evaluation.result.margin_percent,
            timestamp,
        })
    }
}
