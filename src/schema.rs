/// Column-name constants for the rebalancer schema.
/// Single source of truth - exported to Python via PyO3.

// ── Default input column names ──────────────────────────────────────────────
// The caller may rename any of these per invocation; the defaults match the
// headers of the upstream "Base Principal" workbook.
pub mod defaults {
    pub const MONTH: &str = "Mensal";
    pub const UP: &str = "UP";
    pub const STRUCTURE_START: &str = "Início Estrutura";
    pub const COEF_QUARTILE: &str = "Coeficiente Quartil";
    pub const COEF_MEDIAN: &str = "Coeficiente Mediana";
    pub const COEF_REAL: &str = "Coeficiente Real";
    pub const PROJECT: &str = "Obra";

    pub const BASE_FILENAME: &str = "base_principal.csv";
}

// ── Hard-wired input columns ────────────────────────────────────────────────
// Read by name regardless of the caller's column mapping.
pub mod input {
    pub const REGIONAL_PRODUCAO: &str = "Regional Produção";
    pub const ABERTURA_REGIONAL: &str = "Abertura Regional";
    /// Passthrough resource column of the upstream workbook; only referenced
    /// by the export view, never required.
    pub const RECURSO_CEI016: &str = "Recurso CEI016";
}

// ── Computed output columns ─────────────────────────────────────────────────
pub mod columns {
    pub const DATA_MENSAL: &str = "data_mensal";
    pub const DATA_ESTRUTURA: &str = "data_estrutura";
    pub const DATA_INICIO_PONDERACAO: &str = "data_inicio_ponderacao";
    pub const DATA_REBALANC: &str = "Data_rebalanc.";

    pub const C1_UP: &str = "C1: UP balanc. 1ºQ";
    pub const C2_UP: &str = "C2: UP balanc. Med.";
    pub const C3_UP: &str = "C3: 3m Med. + 1ºQ";
    pub const C4_UP: &str = "C4: 3m Real. + 1ºQ";
    /// Real-coefficient helper quantity; null before the pivot, feeds the
    /// real cumulative share.
    pub const REAL_UP: &str = "UP balanceada real";

    pub const C3_TIPO: &str = "C3: tipo_ponderacao";
    pub const C4_TIPO: &str = "C4: tipo_ponderacao";

    pub const C1_MEDIA: &str = "C1: Média UP";
    pub const C2_MEDIA: &str = "C2: Média UP";
    pub const C3_MEDIA: &str = "C3: Média UP";
    pub const C4_MEDIA: &str = "C4: Média UP";

    pub const C1_TOTAL: &str = "C1: Total UP";
    pub const C2_TOTAL: &str = "C2: Total UP";
    pub const C3_TOTAL: &str = "C3: Total UP";
    pub const C4_TOTAL: &str = "C4: Total UP";

    pub const C1_DIFERENCA: &str = "C1: Diferença UP";
    pub const C2_DIFERENCA: &str = "C2: Diferença UP";
    pub const C3_DIFERENCA: &str = "C3: Diferença UP";
    pub const C4_DIFERENCA: &str = "C4: Diferença UP";

    pub const C1_MESES_A_ESTICAR: &str = "C1 - Meses a esticar";
    pub const C2_MESES_A_ESTICAR: &str = "C2 - Meses a esticar";
    pub const C3_MESES_A_ESTICAR: &str = "C3 - Meses a esticar";
    pub const C4_MESES_A_ESTICAR: &str = "C4 - Meses a esticar";

    pub const UNIDADE_TOTAIS: &str = "Unidade Totais";

    pub const AMP_QUARTIL: &str = "%AMP quartil";
    pub const AMP_MEDIANA: &str = "%AMP mediana";
    pub const AMP_REAL: &str = "%AMP real";
    pub const VP_QUARTIL: &str = "VP Bruta quartil";
    pub const VP_MEDIANA: &str = "VP Bruta mediana";
    pub const VP_REAL: &str = "VP Bruta real";
}

// ── Weighting provenance tags ───────────────────────────────────────────────
pub mod tags {
    pub const UP_ORIGINAL: &str = "UP Original (Forecast)";
    pub const MEDIANA_3M: &str = "Mediana (3 próximos meses)";
    pub const REAL_3M: &str = "Real (3 próximos meses)";
    pub const QUARTIL_RESTANTES: &str = "Quartil (meses restantes)";
    pub const QUARTIL_PRE_ESTRUTURA: &str = "Quartil (data_forecast < estrutura)";
    pub const MES_ADICIONAL: &str = "Mês adicional";
}

// ── Export view ─────────────────────────────────────────────────────────────
pub mod export {
    use super::{columns, defaults, input};

    /// Fixed output column order of the rebalanced workbook. Names absent
    /// from the result are skipped, never an error.
    pub const OUTPUT_COLUMNS: [&str; 32] = [
        input::REGIONAL_PRODUCAO,
        input::ABERTURA_REGIONAL,
        defaults::PROJECT,
        defaults::MONTH,
        columns::DATA_REBALANC,
        defaults::UP,
        columns::UNIDADE_TOTAIS,
        defaults::STRUCTURE_START,
        input::RECURSO_CEI016,
        columns::DATA_INICIO_PONDERACAO,
        columns::C1_UP,
        columns::C1_MEDIA,
        columns::C1_TOTAL,
        columns::C1_DIFERENCA,
        columns::C1_MESES_A_ESTICAR,
        columns::C2_UP,
        columns::C2_MEDIA,
        columns::C2_TOTAL,
        columns::C2_DIFERENCA,
        columns::C2_MESES_A_ESTICAR,
        columns::C3_UP,
        columns::C3_MEDIA,
        columns::C3_TOTAL,
        columns::C3_DIFERENCA,
        columns::C3_MESES_A_ESTICAR,
        columns::C3_TIPO,
        columns::C4_UP,
        columns::C4_MEDIA,
        columns::C4_TOTAL,
        columns::C4_DIFERENCA,
        columns::C4_MESES_A_ESTICAR,
        columns::C4_TIPO,
    ];
}
