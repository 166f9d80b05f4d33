use polars::prelude::*;

use crate::error::RebalanceError;
use crate::rebalance::{contiguous_groups, f64_values, sum_present, ColumnSpec};
use crate::schema::columns;

/// Cumulative-share and month-over-month variation pass.
///
/// Runs after the weighting pass, which leaves each project's rows
/// contiguous and the table ascending by project key. Shares accumulate each
/// row's adjusted quantity over the blended-scenario totals: the quartile and
/// median shares over the blended-median total, the real share over the
/// blended-real total. A null contribution gives a null share at that row
/// without resetting the running sum; a total of zero or less leaves the
/// whole family null for that project.
pub fn add_cumulative_shares(
    df: &DataFrame,
    spec: &ColumnSpec,
) -> Result<DataFrame, RebalanceError> {
    if df.height() == 0 {
        return Ok(df.clone());
    }

    let height = df.height();
    let mut share_quartile: Vec<Option<f64>> = Vec::with_capacity(height);
    let mut share_median: Vec<Option<f64>> = Vec::with_capacity(height);
    let mut share_real: Vec<Option<f64>> = Vec::with_capacity(height);
    let mut variation_quartile: Vec<Option<f64>> = Vec::with_capacity(height);
    let mut variation_median: Vec<Option<f64>> = Vec::with_capacity(height);
    let mut variation_real: Vec<Option<f64>> = Vec::with_capacity(height);

    for (offset, len) in contiguous_groups(df, &spec.project)? {
        let group = df.slice(offset as i64, len);
        let c1 = f64_values(&group, columns::C1_UP)?;
        let c2 = f64_values(&group, columns::C2_UP)?;
        let c3 = f64_values(&group, columns::C3_UP)?;
        let c4 = f64_values(&group, columns::C4_UP)?;
        let real = f64_values(&group, columns::REAL_UP)?;

        let total_blended_median = sum_present(&c3);
        let total_blended_real = sum_present(&c4);

        let quartile = cumulative_share(&c1, total_blended_median);
        let median = cumulative_share(&c2, total_blended_median);
        let real = cumulative_share(&real, total_blended_real);

        variation_quartile.extend(first_difference(&quartile));
        variation_median.extend(first_difference(&median));
        variation_real.extend(first_difference(&real));
        share_quartile.extend(quartile);
        share_median.extend(median);
        share_real.extend(real);
    }

    let mut out = df.clone();
    out.with_column(Series::new(columns::AMP_QUARTIL.into(), share_quartile))?;
    out.with_column(Series::new(columns::AMP_MEDIANA.into(), share_median))?;
    out.with_column(Series::new(columns::AMP_REAL.into(), share_real))?;
    out.with_column(Series::new(columns::VP_QUARTIL.into(), variation_quartile))?;
    out.with_column(Series::new(columns::VP_MEDIANA.into(), variation_median))?;
    out.with_column(Series::new(columns::VP_REAL.into(), variation_real))?;
    Ok(out)
}

fn cumulative_share(values: &[Option<f64>], total: f64) -> Vec<Option<f64>> {
    if !(total > 0.0) {
        return vec![None; values.len()];
    }
    let mut running = 0.0;
    values
        .iter()
        .map(|v| {
            v.map(|x| {
                running += x / total;
                running
            })
        })
        .collect()
}

fn first_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        if i == 0 {
            out.push(None);
        } else {
            out.push(match (values[i - 1], v) {
                (Some(prev), Some(curr)) => Some(curr - prev),
                _ => None,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebalance::{rebalance_projects, DAYFIRST_FORMAT};
    use crate::schema::{defaults, input};
    use chrono::{NaiveDate, NaiveTime};

    fn us(date: &str) -> i64 {
        NaiveDate::parse_from_str(date, DAYFIRST_FORMAT)
            .unwrap()
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_micros()
    }

    fn pipeline(months: &[&str], qty: &[f64], forecast: &str) -> DataFrame {
        let n = months.len();
        let df = df!(
            defaults::PROJECT => vec!["OBR-001"; n],
            input::REGIONAL_PRODUCAO => vec!["Sudeste"; n],
            input::ABERTURA_REGIONAL => vec!["SP Capital"; n],
            defaults::MONTH => months.to_vec(),
            defaults::STRUCTURE_START => vec!["01/01/2025"; n],
            defaults::COEF_QUARTILE => vec![1.0; n],
            defaults::COEF_MEDIAN => vec![1.0; n],
            defaults::COEF_REAL => vec![1.0; n],
            defaults::UP => qty.to_vec(),
        )
        .unwrap();
        let spec = ColumnSpec::default();
        let balanced = rebalance_projects(&df, &spec, us(forecast)).unwrap();
        add_cumulative_shares(&balanced, &spec).unwrap()
    }

    fn col_f64(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        f64_values(df, name).unwrap()
    }

    #[test]
    fn shares_accumulate_and_variation_starts_null() {
        let out = pipeline(&["01/06/2025", "01/07/2025"], &[100.0, 300.0], "01/06/2025");

        assert_eq!(
            col_f64(&out, columns::AMP_QUARTIL),
            vec![Some(0.25), Some(1.0)]
        );
        assert_eq!(
            col_f64(&out, columns::VP_QUARTIL),
            vec![None, Some(0.75)]
        );
    }

    #[test]
    fn real_share_is_null_before_pivot_and_keeps_running_sum() {
        // The May row predates the pivot, so its real helper quantity is
        // null; the share skips it while the quartile share does not.
        let out = pipeline(
            &["01/05/2025", "01/06/2025", "01/07/2025"],
            &[100.0, 100.0, 100.0],
            "01/06/2025",
        );

        let real = col_f64(&out, columns::AMP_REAL);
        assert_eq!(real[0], None);
        assert!((real[1].unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((real[2].unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let quartile = col_f64(&out, columns::AMP_QUARTIL);
        assert!((quartile[0].unwrap() - 1.0 / 3.0).abs() < 1e-12);

        // Variation across a null share stays null on both sides of it.
        let vp_real = col_f64(&out, columns::VP_REAL);
        assert_eq!(vp_real[0], None);
        assert_eq!(vp_real[1], None);
        assert!((vp_real[2].unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_total_leaves_shares_null() {
        let out = pipeline(&["01/06/2025", "01/07/2025"], &[0.0, 0.0], "01/06/2025");

        for name in [
            columns::AMP_QUARTIL,
            columns::AMP_MEDIANA,
            columns::AMP_REAL,
            columns::VP_QUARTIL,
            columns::VP_MEDIANA,
            columns::VP_REAL,
        ] {
            assert!(col_f64(&out, name).iter().all(|v| v.is_none()));
        }
    }

    #[test]
    fn variation_restarts_at_each_project() {
        let df = df!(
            defaults::PROJECT => ["OBR-A", "OBR-A", "OBR-B", "OBR-B"],
            input::REGIONAL_PRODUCAO => ["Sudeste"; 4],
            input::ABERTURA_REGIONAL => ["SP Capital"; 4],
            defaults::MONTH => ["01/06/2025", "01/07/2025", "01/06/2025", "01/07/2025"],
            defaults::STRUCTURE_START => ["01/01/2025"; 4],
            defaults::COEF_QUARTILE => [1.0; 4],
            defaults::COEF_MEDIAN => [1.0; 4],
            defaults::COEF_REAL => [1.0; 4],
            defaults::UP => [100.0, 100.0, 50.0, 150.0],
        )
        .unwrap();
        let spec = ColumnSpec::default();
        let balanced = rebalance_projects(&df, &spec, us("01/06/2025")).unwrap();
        let out = add_cumulative_shares(&balanced, &spec).unwrap();

        let vp = col_f64(&out, columns::VP_QUARTIL);
        assert_eq!(vp[0], None);
        assert_eq!(vp[1], Some(0.5));
        assert_eq!(vp[2], None);
        assert_eq!(vp[3], Some(0.75));
    }
}
