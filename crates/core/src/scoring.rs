use crate::domain::{Allocation, Category, Valuation};

/// Value a party assigns to a share: `Σ valuationᵢ · allocationᵢ`.
pub fn score(valuation: &Valuation, allocation: &Allocation) -> u32 {
    Category::ALL
        .iter()
        .map(|category| valuation.get(*category).saturating_mul(allocation.get(*category)))
        .fold(0, u32::saturating_add)
}

/// Rounds to two decimals, the precision every probability and expectation
/// is reported at. Ties go to the even hundredth, so `0.125` becomes `0.12`.
pub fn round_to_hundredths(value: f64) -> f64 {
    let scaled = value * 100.0;
    let nearest = scaled.round();
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 { 2.0 * (scaled / 2.0).round() } else { nearest };
    rounded / 100.0
}
