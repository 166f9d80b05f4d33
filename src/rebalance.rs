use chrono::{DateTime, Datelike, NaiveDate};
use polars::prelude::*;

use crate::error::RebalanceError;
use crate::schema::{columns, defaults, input, tags};

/// Day-before-month format of the upstream workbook.
pub(crate) const DAYFIRST_FORMAT: &str = "%d/%m/%Y";

/// Caller-supplied names of the required input columns.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub month: String,
    pub up: String,
    pub structure_start: String,
    pub coef_quartile: String,
    pub coef_median: String,
    pub coef_real: String,
    pub project: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            month: defaults::MONTH.into(),
            up: defaults::UP.into(),
            structure_start: defaults::STRUCTURE_START.into(),
            coef_quartile: defaults::COEF_QUARTILE.into(),
            coef_median: defaults::COEF_MEDIAN.into(),
            coef_real: defaults::COEF_REAL.into(),
            project: defaults::PROJECT.into(),
        }
    }
}

impl ColumnSpec {
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        month: Option<String>,
        up: Option<String>,
        structure_start: Option<String>,
        coef_quartile: Option<String>,
        coef_median: Option<String>,
        coef_real: Option<String>,
        project: Option<String>,
    ) -> Self {
        let mut spec = Self::default();
        if let Some(name) = month {
            spec.month = name;
        }
        if let Some(name) = up {
            spec.up = name;
        }
        if let Some(name) = structure_start {
            spec.structure_start = name;
        }
        if let Some(name) = coef_quartile {
            spec.coef_quartile = name;
        }
        if let Some(name) = coef_median {
            spec.coef_median = name;
        }
        if let Some(name) = coef_real {
            spec.coef_real = name;
        }
        if let Some(name) = project {
            spec.project = name;
        }
        spec
    }

    /// All columns the weighting pass reads, including the two hard-wired
    /// regional labels.
    pub(crate) fn required(&self) -> [&str; 9] {
        [
            &self.month,
            &self.up,
            &self.structure_start,
            &self.coef_quartile,
            &self.coef_median,
            &self.coef_real,
            &self.project,
            input::REGIONAL_PRODUCAO,
            input::ABERTURA_REGIONAL,
        ]
    }
}

/// One of the four fixed weighting scenarios (the C1..C4 column families).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Quartile,
    Median,
    ThreeMonthMedianThenQuartile,
    ThreeMonthRealThenQuartile,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Quartile,
        Scenario::Median,
        Scenario::ThreeMonthMedianThenQuartile,
        Scenario::ThreeMonthRealThenQuartile,
    ];

    pub fn adjusted_col(self) -> &'static str {
        match self {
            Scenario::Quartile => columns::C1_UP,
            Scenario::Median => columns::C2_UP,
            Scenario::ThreeMonthMedianThenQuartile => columns::C3_UP,
            Scenario::ThreeMonthRealThenQuartile => columns::C4_UP,
        }
    }

    pub fn mean_col(self) -> &'static str {
        match self {
            Scenario::Quartile => columns::C1_MEDIA,
            Scenario::Median => columns::C2_MEDIA,
            Scenario::ThreeMonthMedianThenQuartile => columns::C3_MEDIA,
            Scenario::ThreeMonthRealThenQuartile => columns::C4_MEDIA,
        }
    }

    pub fn total_col(self) -> &'static str {
        match self {
            Scenario::Quartile => columns::C1_TOTAL,
            Scenario::Median => columns::C2_TOTAL,
            Scenario::ThreeMonthMedianThenQuartile => columns::C3_TOTAL,
            Scenario::ThreeMonthRealThenQuartile => columns::C4_TOTAL,
        }
    }

    pub fn diff_col(self) -> &'static str {
        match self {
            Scenario::Quartile => columns::C1_DIFERENCA,
            Scenario::Median => columns::C2_DIFERENCA,
            Scenario::ThreeMonthMedianThenQuartile => columns::C3_DIFERENCA,
            Scenario::ThreeMonthRealThenQuartile => columns::C4_DIFERENCA,
        }
    }

    pub fn stretch_col(self) -> &'static str {
        match self {
            Scenario::Quartile => columns::C1_MESES_A_ESTICAR,
            Scenario::Median => columns::C2_MESES_A_ESTICAR,
            Scenario::ThreeMonthMedianThenQuartile => columns::C3_MESES_A_ESTICAR,
            Scenario::ThreeMonthRealThenQuartile => columns::C4_MESES_A_ESTICAR,
        }
    }
}

/// Per-project aggregates for one scenario, measured before reconciliation.
#[derive(Debug, Clone, Copy)]
struct ScenarioStats {
    mean: f64,
    diff: f64,
    stretch: i64,
}

impl ScenarioStats {
    fn compute(values: &[Option<f64>], original_total: f64) -> Self {
        let mean = mean_nonzero(values);
        let diff = sum_present(values) - original_total;
        // ceil of an unsigned ratio over a signed mean; a negative mean is
        // the only way this goes negative.
        let stretch = if mean != 0.0 {
            (diff.abs() / mean).ceil() as i64
        } else {
            0
        };
        Self { mean, diff, stretch }
    }

    /// Uniform increment distributed over this scenario's synthetic months.
    /// A magnitude, regardless of the difference's sign.
    fn fill_value(&self) -> f64 {
        if self.stretch > 0 {
            self.diff.abs() / self.stretch as f64
        } else {
            0.0
        }
    }
}

// ── Weighting pass ──────────────────────────────────────────────────────────

/// Rebalance every project group against the forecast date.
///
/// First grouped pass of the pipeline: weighting split, per-scenario
/// aggregates, then stretch/retraction reconciliation. Rows with a null
/// project key are dropped; groups come out ascending by project key with
/// each group's rows in original input order (synthetic months trail).
pub fn rebalance_projects(
    df: &DataFrame,
    spec: &ColumnSpec,
    forecast_us: i64,
) -> Result<DataFrame, RebalanceError> {
    require_columns(df, &spec.required())?;

    let df = df
        .clone()
        .lazy()
        .filter(col(spec.project.as_str()).is_not_null())
        .collect()?;
    let df = parse_datetime_column(df, &spec.month, columns::DATA_MENSAL)?;
    let df = parse_datetime_column(df, &spec.structure_start, columns::DATA_ESTRUTURA)?;
    let df = df.sort(
        [spec.project.as_str()],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;

    let groups = contiguous_groups(&df, &spec.project)?;
    if groups.is_empty() {
        return Ok(df);
    }

    let mut rebalanced: Vec<DataFrame> = Vec::with_capacity(groups.len());
    for (offset, len) in groups {
        let group = df.slice(offset as i64, len);
        rebalanced.push(rebalance_group(&group, spec, forecast_us)?);
    }

    let mut out = rebalanced.remove(0);
    for part in &rebalanced {
        out.vstack_mut(part)?;
    }
    Ok(out)
}

fn rebalance_group(
    group: &DataFrame,
    spec: &ColumnSpec,
    forecast_us: i64,
) -> Result<DataFrame, RebalanceError> {
    let height = group.height();
    let months = datetime_us_values(group, columns::DATA_MENSAL)?;
    let qty = f64_values(group, &spec.up)?;

    // Project-level constants come from the first row; divergent values in
    // later rows are not detected.
    let coef_quartile = first_f64(group, &spec.coef_quartile)?;
    let coef_median = first_f64(group, &spec.coef_median)?;
    let coef_real = first_f64(group, &spec.coef_real)?;
    let structure_start = datetime_us_values(group, columns::DATA_ESTRUTURA)?
        .first()
        .copied()
        .flatten();

    // Pivot: the later of forecast and structure start. A null structure
    // date loses the comparison, so the forecast wins.
    let pivot_us = match structure_start {
        Some(start) if start > forecast_us => start,
        _ => forecast_us,
    };
    let forecast_ge_structure = structure_start.map_or(false, |start| forecast_us >= start);

    // Classification happens on a chronological view (nulls last) while the
    // output keeps original row order. A null month never tests posterior.
    let mut chrono_order: Vec<usize> = (0..height).collect();
    chrono_order.sort_by_key(|&i| (months[i].is_none(), months[i]));
    let posterior: Vec<usize> = chrono_order
        .iter()
        .copied()
        .filter(|&i| months[i].map_or(false, |month| month >= pivot_us))
        .collect();

    let mut c1 = qty.clone();
    let mut c2 = qty.clone();
    let mut c3 = qty.clone();
    let mut c4 = qty.clone();
    let mut real_qty: Vec<Option<f64>> = vec![None; height];
    let mut c3_tags: Vec<&'static str> = vec![tags::UP_ORIGINAL; height];
    let mut c4_tags: Vec<&'static str> = vec![tags::UP_ORIGINAL; height];

    for (rank, &i) in posterior.iter().enumerate() {
        let quartile = scale(qty[i], coef_quartile);
        let median = scale(qty[i], coef_median);
        let real = scale(qty[i], coef_real);
        c1[i] = quartile;
        c2[i] = median;
        real_qty[i] = real;
        if forecast_ge_structure {
            if rank < 3 {
                c3[i] = median;
                c3_tags[i] = tags::MEDIANA_3M;
                c4[i] = real;
                c4_tags[i] = tags::REAL_3M;
            } else {
                c3[i] = quartile;
                c3_tags[i] = tags::QUARTIL_RESTANTES;
                c4[i] = quartile;
                c4_tags[i] = tags::QUARTIL_RESTANTES;
            }
        } else {
            c3[i] = quartile;
            c3_tags[i] = tags::QUARTIL_PRE_ESTRUTURA;
            c4[i] = quartile;
            c4_tags[i] = tags::QUARTIL_PRE_ESTRUTURA;
        }
    }

    let original_total = sum_present(&qty);
    let scenario_values = [&c1, &c2, &c3, &c4];
    let stats = [
        ScenarioStats::compute(&c1, original_total),
        ScenarioStats::compute(&c2, original_total),
        ScenarioStats::compute(&c3, original_total),
        ScenarioStats::compute(&c4, original_total),
    ];
    // One row count for all four scenarios: the one needing the most months.
    let composite = stats.iter().map(|s| s.stretch).max().unwrap_or(0);

    // Row layout after reconciliation: kept original rows (indices into the
    // group) plus `extra` trailing synthetic months. Retraction reorders to
    // chronological order before trimming, as the source does.
    let (kept, extra): (Vec<usize>, usize) = if composite > 0 {
        ((0..height).collect(), composite as usize)
    } else if composite < 0 {
        let keep = height.saturating_sub(composite.unsigned_abs() as usize);
        (chrono_order[..keep].to_vec(), 0)
    } else {
        ((0..height).collect(), 0)
    };
    let out_height = kept.len() + extra;

    let synthetic_dates: Vec<Option<i64>> = if extra > 0 {
        let last = months.iter().flatten().copied().max();
        (1..=extra)
            .map(|n| last.and_then(|l| add_months_us(l, n as u32)))
            .collect()
    } else {
        Vec::new()
    };

    let base = if composite < 0 {
        let indices: Vec<IdxSize> = kept.iter().map(|&i| i as IdxSize).collect();
        group.take(&IdxCa::from_vec("keep".into(), indices))?
    } else {
        group.clone()
    };

    // Synthetic rows inherit the project key, the regional labels and the
    // parsed structure date; every other input column stays null.
    let inherited = [
        spec.project.as_str(),
        input::REGIONAL_PRODUCAO,
        input::ABERTURA_REGIONAL,
        columns::DATA_ESTRUTURA,
    ];
    let mut out_cols: Vec<Column> = Vec::with_capacity(base.width());
    for column in base.get_columns() {
        let mut series = column.as_materialized_series().clone();
        if extra > 0 {
            let name = series.name().clone();
            let ext = if inherited.contains(&name.as_str()) {
                let value = group.column(&name)?.get(0)?.into_static();
                Series::from_any_values_and_dtype(name, &vec![value; extra], series.dtype(), true)?
            } else {
                Series::full_null(name, extra, series.dtype())
            };
            series.append(&ext)?;
        }
        out_cols.push(series.into());
    }
    let mut out = DataFrame::new(out_cols)?;

    for (idx, scenario) in Scenario::ALL.into_iter().enumerate() {
        let st = &stats[idx];
        let adjusted = gather_rows(&kept, extra, scenario_values[idx], |synth_row| {
            if (synth_row as i64) < st.stretch {
                Some(st.fill_value())
            } else {
                None
            }
        });
        out.with_column(Series::new(scenario.adjusted_col().into(), adjusted))?;
        out.with_column(Series::new(
            scenario.mean_col().into(),
            constant_rows(kept.len(), extra, Some(st.mean), None),
        ))?;
        // Normalization: totals are forced back to the original total on
        // every row, synthetic months included.
        out.with_column(Series::new(
            scenario.total_col().into(),
            vec![Some(original_total); out_height],
        ))?;
        out.with_column(Series::new(
            scenario.diff_col().into(),
            constant_rows(kept.len(), extra, Some(st.diff), None),
        ))?;
        out.with_column(Series::new(
            scenario.stretch_col().into(),
            constant_rows(kept.len(), extra, Some(st.stretch as f64), None),
        ))?;
    }

    out.with_column(Series::new(
        columns::REAL_UP.into(),
        gather_rows(&kept, extra, &real_qty, |_| None),
    ))?;
    out.with_column(tag_rows(columns::C3_TIPO, &kept, extra, &c3_tags))?;
    out.with_column(tag_rows(columns::C4_TIPO, &kept, extra, &c4_tags))?;
    out.with_column(Series::new(
        columns::UNIDADE_TOTAIS.into(),
        constant_rows(kept.len(), extra, Some(original_total), None),
    ))?;
    out.with_column(datetime_series(
        columns::DATA_INICIO_PONDERACAO,
        vec![Some(pivot_us); out_height],
    )?)?;

    let rebalanced_dates: Vec<Option<i64>> = kept
        .iter()
        .map(|&i| months[i])
        .chain(synthetic_dates.iter().copied())
        .collect();
    out.with_column(datetime_series(columns::DATA_REBALANC, rebalanced_dates)?)?;

    // Reporting columns start null; the cumulative-share pass fills them.
    for name in [
        columns::AMP_QUARTIL,
        columns::AMP_MEDIANA,
        columns::AMP_REAL,
        columns::VP_QUARTIL,
        columns::VP_MEDIANA,
        columns::VP_REAL,
    ] {
        out.with_column(Series::full_null(name.into(), out_height, &DataType::Float64))?;
    }

    Ok(out)
}

// ── Column helpers ──────────────────────────────────────────────────────────

pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), RebalanceError> {
    for &name in required {
        if df.column(name).is_err() {
            return Err(RebalanceError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Parse `source` into a Datetime column named `target`. String columns go
/// through a day-first strptime where unparseable values coerce to null;
/// date/datetime columns are cast through unchanged.
pub(crate) fn parse_datetime_column(
    df: DataFrame,
    source: &str,
    target: &str,
) -> Result<DataFrame, RebalanceError> {
    let dtype = df.column(source)?.dtype().clone();
    let expr = match dtype {
        DataType::String => col(source)
            .str()
            .strip_chars(lit(" \t\r\n"))
            .str()
            .to_datetime(
                Some(TimeUnit::Microseconds),
                None,
                StrptimeOptions {
                    format: Some(DAYFIRST_FORMAT.into()),
                    strict: false,
                    ..Default::default()
                },
                lit("raise"),
            ),
        DataType::Date | DataType::Datetime(_, _) => {
            col(source).cast(DataType::Datetime(TimeUnit::Microseconds, None))
        }
        other => {
            return Err(RebalanceError::InvalidData(format!(
                "column '{source}' has unsupported dtype {other} for a date"
            )))
        }
    };
    Ok(df.lazy().with_columns([expr.alias(target)]).collect()?)
}

/// Offsets and lengths of the contiguous runs of equal `key` values.
/// Assumes the frame is sorted by `key`.
pub(crate) fn contiguous_groups(
    df: &DataFrame,
    key: &str,
) -> Result<Vec<(usize, usize)>, RebalanceError> {
    let column = df.column(key)?;
    let mut runs = Vec::new();
    let mut start = 0usize;
    for i in 1..df.height() {
        if column.get(i)? != column.get(start)? {
            runs.push((start, i - start));
            start = i;
        }
    }
    if df.height() > 0 {
        runs.push((start, df.height() - start));
    }
    Ok(runs)
}

fn datetime_us_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, RebalanceError> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .collect())
}

pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, RebalanceError> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect())
}

fn first_f64(df: &DataFrame, name: &str) -> Result<Option<f64>, RebalanceError> {
    Ok(f64_values(df, name)?.first().copied().flatten())
}

fn datetime_series(name: &str, values_us: Vec<Option<i64>>) -> Result<Series, RebalanceError> {
    Ok(Series::new(name.into(), values_us)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?)
}

fn tag_rows(name: &str, kept: &[usize], extra: usize, row_tags: &[&'static str]) -> Series {
    let values: Vec<&str> = kept
        .iter()
        .map(|&i| row_tags[i])
        .chain(std::iter::repeat(tags::MES_ADICIONAL).take(extra))
        .collect();
    Series::new(name.into(), values)
}

fn gather_rows(
    kept: &[usize],
    extra: usize,
    values: &[Option<f64>],
    synthetic: impl Fn(usize) -> Option<f64>,
) -> Vec<Option<f64>> {
    kept.iter()
        .map(|&i| values[i])
        .chain((0..extra).map(synthetic))
        .collect()
}

fn constant_rows(
    kept_len: usize,
    extra: usize,
    kept_value: Option<f64>,
    synthetic_value: Option<f64>,
) -> Vec<Option<f64>> {
    let mut values = vec![kept_value; kept_len];
    values.extend(std::iter::repeat(synthetic_value).take(extra));
    values
}

// ── Scalar helpers ──────────────────────────────────────────────────────────

fn scale(qty: Option<f64>, coef: Option<f64>) -> Option<f64> {
    match (qty, coef) {
        (Some(q), Some(c)) => Some(q * c),
        _ => None,
    }
}

pub(crate) fn sum_present(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().copied().sum()
}

fn mean_nonzero(values: &[Option<f64>]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.iter().flatten() {
        if *v != 0.0 {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Step a microsecond timestamp forward by whole calendar months, clamping
/// the day to the target month's length (31 Jan + 1 month = 28/29 Feb).
pub(crate) fn add_months_us(timestamp_us: i64, months: u32) -> Option<i64> {
    let datetime = DateTime::from_timestamp_micros(timestamp_us)?.naive_utc();
    let date = datetime.date();
    let shifted = date.year() * 12 + date.month0() as i32 + months as i32;
    let (year, month0) = (shifted.div_euclid(12), shifted.rem_euclid(12) as u32);
    let day = date.day().min(days_in_month(year, month0 + 1));
    let shifted_date = NaiveDate::from_ymd_opt(year, month0 + 1, day)?;
    Some(
        shifted_date
            .and_time(datetime.time())
            .and_utc()
            .timestamp_micros(),
    )
}

fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some())
        .unwrap_or(28)
}
