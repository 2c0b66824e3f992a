/// Rough USD→PYG rate for dashboard estimates when a row carries no rate.
/// Never used for statements or anything accounting-grade.
pub const ESTIMATE_USD_PYG: f64 = 7300.0;

/// Whether a rollup may fall back to [`ESTIMATE_USD_PYG`] for USD rows without a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxPolicy {
    /// USD without a positive rate contributes nothing.
    RequireRate,
    /// USD without a positive rate is estimated at [`ESTIMATE_USD_PYG`].
    AllowEstimate,
}

/// Converts `amount` in `currency` into guaraníes.
///
/// Blank currency is PYG. Currencies other than PYG/USD are excluded (0)
/// rather than guessed, as are non-finite amounts.
pub fn convert_to_pyg(amount: f64, currency: Option<&str>, fx_rate: Option<f64>, policy: FxPolicy) -> f64 {
    if !amount.is_finite() {
        return 0.0;
    }
    let currency = currency.map(str::trim).unwrap_or_default().to_ascii_uppercase();
    match currency.as_str() {
        "" | "PYG" => amount,
        "USD" => match (fx_rate.filter(|rate| rate.is_finite() && *rate > 0.0), policy) {
            (Some(rate), _) => amount * rate,
            (None, FxPolicy::AllowEstimate) => amount * ESTIMATE_USD_PYG,
            (None, FxPolicy::RequireRate) => 0.0,
        },
        _ => 0.0,
    }
}
