use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::calculator::ledger::{self, HISTORY_LIMIT};
use crate::calculator::rates::{self, WasteClass};
use crate::calculator::repo::LedgerRepo;
use crate::calculator::repo_types::{Calculation, NewCalculation};

#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub fn parse_waste_class(raw: &str) -> Result<WasteClass, CalcError> {
    WasteClass::parse(raw)
        .ok_or_else(|| CalcError::Validation("Выберите класс отходов из списка".into()))
}

/// Tonnes, with either `,` or `.` as the decimal separator. Must be positive.
pub fn parse_volume(raw: &str) -> Result<f64, CalcError> {
    let invalid = || CalcError::Validation("Введите корректный объём (например, 5.2)".into());
    let v = raw
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| invalid())?;
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid());
    }
    Ok(v)
}

/// Prices the request and appends it to the user's history. Nothing is written
/// when the input does not validate.
pub async fn calculate(
    repo: &dyn LedgerRepo,
    user_id: Uuid,
    waste_class: &str,
    volume: &str,
) -> Result<Calculation, CalcError> {
    let class = parse_waste_class(waste_class)?;
    let volume = parse_volume(volume)?;
    let price = rates::price(class.code(), volume);
    if !price.is_finite() {
        return Err(CalcError::Validation(
            "Объём слишком велик для расчёта".into(),
        ));
    }

    let calc = repo
        .append(&NewCalculation {
            user_id,
            created_at: OffsetDateTime::now_utc(),
            price,
            waste_class: class.code().to_string(),
            volume,
        })
        .await?;

    info!(%user_id, waste_class = class.code(), volume, price, "calculation recorded");
    Ok(calc)
}

pub async fn history(repo: &dyn LedgerRepo, user_id: Uuid) -> anyhow::Result<Vec<Calculation>> {
    repo.recent(user_id, HISTORY_LIMIT as i64).await
}

/// The user's history in the delimited line format, newest first.
pub async fn export_history(repo: &dyn LedgerRepo, user_id: Uuid) -> anyhow::Result<String> {
    let entries = history(repo, user_id).await?;
    let blob = entries.iter().rev().fold(String::new(), |blob, calc| {
        ledger::prepend_capped(Some(blob.as_str()), &calc.to_history_line())
    });
    Ok(blob)
}
