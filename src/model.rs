use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDateTime;
use pyo3_polars::PyDataFrame;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::RebalanceError;
use crate::export::select_output;
use crate::rebalance::{
    parse_datetime_column, rebalance_projects, require_columns, ColumnSpec, DAYFIRST_FORMAT,
};
use crate::report::add_cumulative_shares;
use crate::schema::defaults;

#[pyclass]
pub struct RebalanceModel {
    base_path: PathBuf,
    base: Option<DataFrame>,
    result: Option<DataFrame>,
}

#[pymethods]
impl RebalanceModel {
    #[new]
    fn new(base_path: String) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
            base: None,
            result: None,
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load any CSV into a Polars DataFrame with all columns as strings.
    /// Optionally rename columns via a map.
    #[pyo3(signature = (filename, rename=None))]
    fn load_csv(
        &self,
        filename: &str,
        rename: Option<HashMap<String, String>>,
    ) -> PyResult<PyDataFrame> {
        let df = self.read_csv_as_strings(filename, rename)?;
        Ok(PyDataFrame(df))
    }

    /// Load the principal production table.
    ///
    /// Required columns: the seven caller-named columns (month, quantity,
    /// structure start, the three coefficients, project id) plus the two
    /// hard-wired regional labels. A missing column aborts the load. The
    /// month and structure-start columns are parsed day-first with
    /// unparseable cells coerced to null; the quantity and coefficient
    /// columns are cast to floats. The frame is stored on the model.
    #[pyo3(signature = (
        filename=None, rename=None,
        month_col=None, up_col=None, structure_col=None,
        coef_quartile_col=None, coef_median_col=None, coef_real_col=None,
        project_col=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn load_base(
        &mut self,
        filename: Option<&str>,
        rename: Option<HashMap<String, String>>,
        month_col: Option<String>,
        up_col: Option<String>,
        structure_col: Option<String>,
        coef_quartile_col: Option<String>,
        coef_median_col: Option<String>,
        coef_real_col: Option<String>,
        project_col: Option<String>,
    ) -> PyResult<PyDataFrame> {
        let spec = ColumnSpec::with_overrides(
            month_col,
            up_col,
            structure_col,
            coef_quartile_col,
            coef_median_col,
            coef_real_col,
            project_col,
        );
        let df = self.load_base_frame(
            filename.unwrap_or(defaults::BASE_FILENAME),
            rename,
            &spec,
        )?;
        self.base = Some(df.clone());
        self.result = None;
        Ok(PyDataFrame(df))
    }

    // ── Rebalancing ─────────────────────────────────────────────────────────

    /// Run the full pipeline: per-project weighting and reconciliation, then
    /// cumulative shares and variations. Works on `df` when given, otherwise
    /// on the stored base table; the result is stored and returned.
    ///
    /// `reference_date` accepts a `datetime.date`, a naive
    /// `datetime.datetime`, or a day-first `"dd/mm/yyyy"` string.
    #[pyo3(signature = (
        reference_date, df=None,
        month_col=None, up_col=None, structure_col=None,
        coef_quartile_col=None, coef_median_col=None, coef_real_col=None,
        project_col=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn rebalance(
        &mut self,
        reference_date: &Bound<'_, PyAny>,
        df: Option<PyDataFrame>,
        month_col: Option<String>,
        up_col: Option<String>,
        structure_col: Option<String>,
        coef_quartile_col: Option<String>,
        coef_median_col: Option<String>,
        coef_real_col: Option<String>,
        project_col: Option<String>,
    ) -> PyResult<PyDataFrame> {
        let forecast = extract_reference_date(reference_date)?;
        let spec = ColumnSpec::with_overrides(
            month_col,
            up_col,
            structure_col,
            coef_quartile_col,
            coef_median_col,
            coef_real_col,
            project_col,
        );
        let input = match df {
            Some(frame) => frame.0,
            None => self
                .base
                .clone()
                .ok_or_else(|| RebalanceError::NotLoaded("base".into()))?,
        };

        let balanced =
            rebalance_projects(&input, &spec, forecast.and_utc().timestamp_micros())?;
        let result = add_cumulative_shares(&balanced, &spec)?;
        self.result = Some(result.clone());
        Ok(PyDataFrame(result))
    }

    /// Fixed-order export view over `df` or the stored result; output
    /// columns absent from the frame are skipped.
    #[pyo3(signature = (df=None))]
    fn select_output(&self, df: Option<PyDataFrame>) -> PyResult<PyDataFrame> {
        let frame = match df {
            Some(frame) => frame.0,
            None => self
                .result
                .clone()
                .ok_or_else(|| RebalanceError::NotLoaded("result".into()))?,
        };
        Ok(PyDataFrame(select_output(&frame)?))
    }

    // ── Parse helpers ───────────────────────────────────────────────────────

    /// Parse a column to Datetime, day-first (dd/mm/yyyy). Unparseable
    /// values become null.
    #[staticmethod]
    fn parse_date(df: PyDataFrame, column: &str) -> PyResult<PyDataFrame> {
        let result = parse_datetime_column(df.0, column, column)?;
        Ok(PyDataFrame(result))
    }

    /// Parse a string column to Float64.
    #[staticmethod]
    fn parse_float(df: PyDataFrame, column: &str) -> PyResult<PyDataFrame> {
        let result =
            df.0.lazy()
                .with_columns([col(column)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .cast(DataType::Float64)])
                .collect()
                .map_err(RebalanceError::from)?;
        Ok(PyDataFrame(result))
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn base_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self.base.clone().map(PyDataFrame))
    }

    #[getter]
    fn result_df(&self) -> PyResult<Option<PyDataFrame>> {
        Ok(self.result.clone().map(PyDataFrame))
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl RebalanceModel {
    /// Read a CSV file with all columns as String dtype.
    /// Trims whitespace from column names and applies optional rename.
    fn read_csv_as_strings(
        &self,
        filename: &str,
        rename: Option<HashMap<String, String>>,
    ) -> Result<DataFrame, RebalanceError> {
        let path = self.base_path.join(filename);
        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;

        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;

        if let Some(map) = rename {
            let old: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
            let new: Vec<&str> = map.values().map(|s| s.as_str()).collect();
            df = df.lazy().rename(old, new, true).collect()?;
        }

        Ok(df)
    }

    fn load_base_frame(
        &self,
        filename: &str,
        rename: Option<HashMap<String, String>>,
        spec: &ColumnSpec,
    ) -> Result<DataFrame, RebalanceError> {
        let df = self.read_csv_as_strings(filename, rename)?;
        require_columns(&df, &spec.required())?;

        let df = parse_datetime_column(df, &spec.month, &spec.month)?;
        let df = parse_datetime_column(df, &spec.structure_start, &spec.structure_start)?;

        let numeric = [
            &spec.up,
            &spec.coef_quartile,
            &spec.coef_median,
            &spec.coef_real,
        ];
        let casts: Vec<Expr> = numeric
            .iter()
            .map(|name| {
                col(name.as_str())
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .cast(DataType::Float64)
            })
            .collect();
        Ok(df.lazy().with_columns(casts).collect()?)
    }
}

/// Accept the forecast date as a naive datetime, a date, or a day-first
/// string. Timezone-aware datetimes are rejected.
fn extract_reference_date(value: &Bound<'_, PyAny>) -> PyResult<NaiveDateTime> {
    if let Ok(datetime) = value.extract::<NaiveDateTime>() {
        return Ok(datetime);
    }
    if value.is_instance_of::<PyDateTime>() {
        return Err(PyValueError::new_err(
            "reference_date requires a naive datetime (no timezone info). \
             Use datetime(2025, 6, 1) instead of datetime(..., tzinfo=...)",
        ));
    }
    if let Ok(date) = value.extract::<NaiveDate>() {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    if let Ok(text) = value.extract::<String>() {
        return NaiveDate::parse_from_str(text.trim(), DAYFIRST_FORMAT)
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|_| {
                PyValueError::new_err(format!(
                    "Could not parse reference date '{text}' as day-first dd/mm/yyyy"
                ))
            });
    }
    Err(PyValueError::new_err(
        "reference_date must be a date, a naive datetime or a 'dd/mm/yyyy' string",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_CSV: &str = "\
Regional Produção,Abertura Regional,Obra,Mensal,Início Estrutura,Coeficiente Quartil,Coeficiente Mediana,Coeficiente Real,UP
Sudeste,SP Capital,OBR-001,01/06/2025,01/01/2025,0.8,1.0,1.2,100
Sudeste,SP Capital,OBR-001,01/07/2025,01/01/2025,0.8,1.0,1.2,sem valor
";

    fn model_with_csv(content: &str) -> (tempfile::TempDir, RebalanceModel) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(defaults::BASE_FILENAME), content).unwrap();
        let model = RebalanceModel::new(dir.path().to_string_lossy().into_owned());
        (dir, model)
    }

    #[test]
    fn load_base_parses_dates_and_casts_numbers() {
        let (_dir, model) = model_with_csv(BASE_CSV);
        let df = model
            .load_base_frame(defaults::BASE_FILENAME, None, &ColumnSpec::default())
            .unwrap();

        assert!(matches!(
            df.column(defaults::MONTH).unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
        assert_eq!(df.column(defaults::UP).unwrap().dtype(), &DataType::Float64);
        // "sem valor" coerces to null rather than dropping the row.
        assert_eq!(
            df.column(defaults::UP)
                .unwrap()
                .as_materialized_series()
                .null_count(),
            1
        );
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn load_base_rejects_missing_required_column() {
        let truncated = BASE_CSV.replace(",UP", "").replace(",100", "").replace(",sem valor", "");
        let (_dir, model) = model_with_csv(&truncated);
        let err = model
            .load_base_frame(defaults::BASE_FILENAME, None, &ColumnSpec::default())
            .unwrap_err();

        assert!(matches!(err, RebalanceError::MissingColumn(name) if name == defaults::UP));
    }

    #[test]
    fn read_csv_trims_headers_and_renames() {
        let csv = " Obra ,Mes\nOBR-001,01/06/2025\n";
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tabela.csv"), csv).unwrap();
        let model = RebalanceModel::new(dir.path().to_string_lossy().into_owned());

        let rename = HashMap::from([("Mes".to_string(), defaults::MONTH.to_string())]);
        let df = model.read_csv_as_strings("tabela.csv", Some(rename)).unwrap();

        let names = df.get_column_names_str();
        assert_eq!(names, vec![defaults::PROJECT, defaults::MONTH]);
        assert_eq!(df.height(), 1);
    }
}
