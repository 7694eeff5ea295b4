use serde::{Deserialize, Serialize};

/// Hazard classes accepted by the disposal tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteClass {
    I,
    II,
}

impl WasteClass {
    pub const ALL: [WasteClass; 2] = [WasteClass::I, WasteClass::II];

    pub const fn code(self) -> &'static str {
        match self {
            WasteClass::I => "I",
            WasteClass::II => "II",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WasteClass::I => "I класс",
            WasteClass::II => "II класс",
        }
    }

    /// Roubles per tonne, excluding VAT.
    pub const fn rate(self) -> f64 {
        match self {
            WasteClass::I => 222_907.36,
            WasteClass::II => 62_468.26,
        }
    }

    /// Accepts the bare code (`"I"`) or the menu label (`"I класс"`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| raw == c.code() || raw == c.label())
    }
}

/// Rate for `waste_class` times `volume`, rounded to kopecks. Unknown classes price at zero.
pub fn price(waste_class: &str, volume: f64) -> f64 {
    let rate = WasteClass::parse(waste_class)
        .map(WasteClass::rate)
        .unwrap_or(0.0);
    round2(rate * volume)
}

/// Values too large to scale by 100 are returned as-is.
pub fn round2(v: f64) -> f64 {
    let scaled = v * 100.0;
    if !scaled.is_finite() {
        return v;
    }
    scaled.round() / 100.0
}
