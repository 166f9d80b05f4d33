use pyo3::prelude::*;
use pyo3::types::PyModule;

mod error;
mod export;
mod model;
mod rebalance;
mod report;
mod schema;

use model::RebalanceModel;

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Default input column names
    let defaults = PyModule::new(m.py(), "defaults")?;
    defaults.add("MONTH", schema::defaults::MONTH)?;
    defaults.add("UP", schema::defaults::UP)?;
    defaults.add("STRUCTURE_START", schema::defaults::STRUCTURE_START)?;
    defaults.add("COEF_QUARTILE", schema::defaults::COEF_QUARTILE)?;
    defaults.add("COEF_MEDIAN", schema::defaults::COEF_MEDIAN)?;
    defaults.add("COEF_REAL", schema::defaults::COEF_REAL)?;
    defaults.add("PROJECT", schema::defaults::PROJECT)?;
    defaults.add("BASE_FILENAME", schema::defaults::BASE_FILENAME)?;
    m.add_submodule(&defaults)?;

    // Hard-wired input columns
    let input = PyModule::new(m.py(), "input")?;
    input.add("REGIONAL_PRODUCAO", schema::input::REGIONAL_PRODUCAO)?;
    input.add("ABERTURA_REGIONAL", schema::input::ABERTURA_REGIONAL)?;
    input.add("RECURSO_CEI016", schema::input::RECURSO_CEI016)?;
    m.add_submodule(&input)?;

    // Computed output columns
    let columns = PyModule::new(m.py(), "columns")?;
    columns.add("DATA_MENSAL", schema::columns::DATA_MENSAL)?;
    columns.add("DATA_ESTRUTURA", schema::columns::DATA_ESTRUTURA)?;
    columns.add(
        "DATA_INICIO_PONDERACAO",
        schema::columns::DATA_INICIO_PONDERACAO,
    )?;
    columns.add("DATA_REBALANC", schema::columns::DATA_REBALANC)?;
    columns.add("C1_UP", schema::columns::C1_UP)?;
    columns.add("C2_UP", schema::columns::C2_UP)?;
    columns.add("C3_UP", schema::columns::C3_UP)?;
    columns.add("C4_UP", schema::columns::C4_UP)?;
    columns.add("REAL_UP", schema::columns::REAL_UP)?;
    columns.add("C3_TIPO", schema::columns::C3_TIPO)?;
    columns.add("C4_TIPO", schema::columns::C4_TIPO)?;
    columns.add("C1_MEDIA", schema::columns::C1_MEDIA)?;
    columns.add("C2_MEDIA", schema::columns::C2_MEDIA)?;
    columns.add("C3_MEDIA", schema::columns::C3_MEDIA)?;
    columns.add("C4_MEDIA", schema::columns::C4_MEDIA)?;
    columns.add("C1_TOTAL", schema::columns::C1_TOTAL)?;
    columns.add("C2_TOTAL", schema::columns::C2_TOTAL)?;
    columns.add("C3_TOTAL", schema::columns::C3_TOTAL)?;
    columns.add("C4_TOTAL", schema::columns::C4_TOTAL)?;
    columns.add("C1_DIFERENCA", schema::columns::C1_DIFERENCA)?;
    columns.add("C2_DIFERENCA", schema::columns::C2_DIFERENCA)?;
    columns.add("C3_DIFERENCA", schema::columns::C3_DIFERENCA)?;
    columns.add("C4_DIFERENCA", schema::columns::C4_DIFERENCA)?;
    columns.add(
        "C1_MESES_A_ESTICAR",
        schema::columns::C1_MESES_A_ESTICAR,
    )?;
    columns.add(
        "C2_MESES_A_ESTICAR",
        schema::columns::C2_MESES_A_ESTICAR,
    )?;
    columns.add(
        "C3_MESES_A_ESTICAR",
        schema::columns::C3_MESES_A_ESTICAR,
    )?;
    columns.add(
        "C4_MESES_A_ESTICAR",
        schema::columns::C4_MESES_A_ESTICAR,
    )?;
    columns.add("UNIDADE_TOTAIS", schema::columns::UNIDADE_TOTAIS)?;
    columns.add("AMP_QUARTIL", schema::columns::AMP_QUARTIL)?;
    columns.add("AMP_MEDIANA", schema::columns::AMP_MEDIANA)?;
    columns.add("AMP_REAL", schema::columns::AMP_REAL)?;
    columns.add("VP_QUARTIL", schema::columns::VP_QUARTIL)?;
    columns.add("VP_MEDIANA", schema::columns::VP_MEDIANA)?;
    columns.add("VP_REAL", schema::columns::VP_REAL)?;
    m.add_submodule(&columns)?;

    // Weighting provenance tags
    let tags = PyModule::new(m.py(), "tags")?;
    tags.add("UP_ORIGINAL", schema::tags::UP_ORIGINAL)?;
    tags.add("MEDIANA_3M", schema::tags::MEDIANA_3M)?;
    tags.add("REAL_3M", schema::tags::REAL_3M)?;
    tags.add("QUARTIL_RESTANTES", schema::tags::QUARTIL_RESTANTES)?;
    tags.add(
        "QUARTIL_PRE_ESTRUTURA",
        schema::tags::QUARTIL_PRE_ESTRUTURA,
    )?;
    tags.add("MES_ADICIONAL", schema::tags::MES_ADICIONAL)?;
    m.add_submodule(&tags)?;

    // Export view
    let export = PyModule::new(m.py(), "export")?;
    export.add("OUTPUT_COLUMNS", schema::export::OUTPUT_COLUMNS.to_vec())?;
    m.add_submodule(&export)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<RebalanceModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
