use serde::Deserialize;

/// `POST /waste-calculator` form. Both fields stay raw text until validated.
#[derive(Debug, Deserialize)]
pub struct CalculationForm {
    #[serde(default)]
    pub waste_class: String,
    #[serde(default)]
    pub volume: String,
}
