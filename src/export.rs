use polars::prelude::*;

use crate::error::RebalanceError;
use crate::schema::export::OUTPUT_COLUMNS;

/// Fixed-order export view over the rebalanced table.
///
/// Thin shaping only: selects the workbook's output columns in their fixed
/// order, silently skipping names the frame does not carry.
pub fn select_output(df: &DataFrame) -> Result<DataFrame, RebalanceError> {
    let present: Vec<&str> = OUTPUT_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.column(name).is_ok())
        .collect();
    Ok(df.select(present)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{columns, defaults, input};

    #[test]
    fn selects_existing_columns_in_fixed_order() {
        let df = df!(
            defaults::UP => [1.0],
            "Extra" => ["ignored"],
            defaults::PROJECT => ["OBR-001"],
            input::REGIONAL_PRODUCAO => ["Sudeste"],
        )
        .unwrap();
        let out = select_output(&df).unwrap();

        let names: Vec<&str> = out.get_column_names_str();
        assert_eq!(
            names,
            vec![input::REGIONAL_PRODUCAO, defaults::PROJECT, defaults::UP]
        );
    }

    #[test]
    fn reporting_columns_stay_out_of_the_export() {
        assert!(!OUTPUT_COLUMNS.contains(&columns::AMP_QUARTIL));
        assert!(!OUTPUT_COLUMNS.contains(&columns::VP_REAL));
        assert!(OUTPUT_COLUMNS.contains(&columns::C4_TIPO));
    }
}
