//! BCRP series codes used by the advisor.
//!
//! Catalogue: <https://estadisticas.bcrp.gob.pe/estadisticas/series/>

// Exchange rate (S/ per US$)
pub const EXCHANGE_RATE_AVERAGE: &str = "PD04637PD";
pub const EXCHANGE_RATE_BUY: &str = "PD04638PD";
pub const EXCHANGE_RATE_SELL: &str = "PD04639PD";

// Interest rates
pub const REFERENCE_RATE: &str = "PD04711PD";
pub const INTERBANK_RATE: &str = "PD04706PD";
pub const TAMN_DEPOSITS: &str = "PD04718PD";
pub const TAMEX_DEPOSITS: &str = "PD04719PD";
pub const TCEA_PERSONAL_LOANS_PEN: &str = "PD04720PD";
pub const TCEA_PERSONAL_LOANS_USD: &str = "PD04721PD";

// Inflation
pub const CPI_NATIONAL: &str = "PN01270PM";
pub const CPI_LIMA: &str = "PN01271PM";
pub const ANNUAL_INFLATION: &str = "PN01272PM";

// Output
pub const GDP_REAL: &str = "PN01755AQ";
pub const GDP_NOMINAL: &str = "PN01758AQ";

// Reserves and money
pub const NET_INTERNATIONAL_RESERVES: &str = "PD04635PD";
pub const PRIMARY_EMISSION: &str = "PD04641PD";

// Trade balance
pub const EXPORTS: &str = "PN01306PM";
pub const IMPORTS: &str = "PN01307PM";

// Credit to the private sector
pub const TOTAL_CREDIT: &str = "PD04725PD";
pub const MORTGAGE_CREDIT: &str = "PD04733PD";

/// Average, buy, sell. Fetched together in one request.
pub const EXCHANGE_RATE_SERIES: [&str; 3] = [EXCHANGE_RATE_AVERAGE, EXCHANGE_RATE_BUY, EXCHANGE_RATE_SELL];

/// Reference rate, TAMN deposits, TAMEX deposits. Fetched together in one request.
pub const INTEREST_RATE_SERIES: [&str; 3] = [REFERENCE_RATE, TAMN_DEPOSITS, TAMEX_DEPOSITS];

/// Friendly description for a series, when one is known.
pub fn describe(code: &str) -> Option<&'static str> {
    let description = match code {
        EXCHANGE_RATE_AVERAGE => "Tipo de cambio promedio (S/ por US$)",
        EXCHANGE_RATE_BUY => "Tipo de cambio compra (S/ por US$)",
        EXCHANGE_RATE_SELL => "Tipo de cambio venta (S/ por US$)",
        REFERENCE_RATE => "Tasa de referencia del BCRP (%)",
        INTERBANK_RATE => "Tasa interbancaria (%)",
        TAMN_DEPOSITS => "TAMN - Tasa activa de depósitos en soles (%)",
        TAMEX_DEPOSITS => "TAMEX - Tasa activa de depósitos en dólares (%)",
        TCEA_PERSONAL_LOANS_PEN => "TCEA préstamos personales en soles (%)",
        TCEA_PERSONAL_LOANS_USD => "TCEA préstamos personales en dólares (%)",
        CPI_NATIONAL => "IPC Nacional - Variación mensual (%)",
        ANNUAL_INFLATION => "Inflación anual (%)",
        NET_INTERNATIONAL_RESERVES => "Reservas Internacionales Netas (millones US$)",
        GDP_REAL => "PBI real - Variación trimestral (%)",
        _ => return None,
    };
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_descriptions() {
        assert_eq!(describe(ANNUAL_INFLATION), Some("Inflación anual (%)"));
        assert_eq!(
            describe(EXCHANGE_RATE_AVERAGE),
            Some("Tipo de cambio promedio (S/ por US$)")
        );
    }

    #[test]
    fn undescribed_series() {
        assert_eq!(describe(CPI_LIMA), None);
        assert_eq!(describe("XX00000XX"), None);
    }
}
