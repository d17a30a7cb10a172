//! Tabular export of a batch of records.
//!
//! A [`Report`] is four named sheets of string cells, built purely from the
//! record schema: a per-file summary, the web-derived fields of every
//! successfully scraped file, the PDF-derived fields of every file whose
//! text layer matched, and aggregate statistics. It serialises to one JSON
//! document that spreadsheet tooling can import sheet by sheet.
//!
//! Building a report is the only batch operation that fails: an empty batch
//! has nothing meaningful to report and yields [`CsfError::EmptyBatch`].

use crate::error::CsfError;
use crate::record::{ResultRecord, TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const SHEET_SUMMARY: &str = "Resumen Scraping";
pub const SHEET_WEB: &str = "Datos Extraídos";
pub const SHEET_PDF: &str = "Datos del PDF";
pub const SHEET_STATS: &str = "Estadísticas";

/// (column header, record key)
type Column = (&'static str, &'static str);

const WEB_COLUMNS: &[Column] = &[
    ("Archivo PDF", "archivo_pdf"),
    ("RFC", "web_rfc"),
    ("CURP (Web)", "web_curp"),
    ("Nombre (Web)", "web_nombre"),
    ("Apellido Paterno (Web)", "web_apellido_paterno"),
    ("Apellido Materno (Web)", "web_apellido_materno"),
    ("Fecha Nacimiento (Web)", "web_fecha_nacimiento"),
    ("Fecha Inicio Operaciones (Web)", "web_fecha_inicio_operaciones"),
    ("Situación Contribuyente (Web)", "web_situacion_contribuyente"),
    ("Fecha Último Cambio (Web)", "web_fecha_ultimo_cambio"),
    ("Entidad Federativa (Web)", "web_entidad_federativa"),
    ("Municipio (Web)", "web_municipio"),
    ("Localidad (Web)", "web_localidad"),
    ("Tipo Vialidad (Web)", "web_tipo_vialidad"),
    ("Nombre Vialidad (Web)", "web_nombre_vialidad"),
    ("Número Exterior (Web)", "web_numero_exterior"),
    ("Número Interior (Web)", "web_numero_interior"),
    ("CP (Web)", "web_cp"),
    ("Correo Electrónico (Web)", "web_correo_electronico"),
    ("AL (Web)", "web_al"),
    ("Régimen (Web)", "web_regimen"),
    ("Fecha Alta (Web)", "web_fecha_alta"),
    ("URL Original", "url"),
];

const PDF_COLUMNS: &[Column] = &[
    ("Archivo PDF", "archivo_pdf"),
    ("RFC (PDF)", "pdf_rfc"),
    ("CURP (PDF)", "pdf_curp"),
    ("Nombre(s)", "pdf_nombre"),
    ("Primer Apellido", "pdf_primer_apellido"),
    ("Segundo Apellido", "pdf_segundo_apellido"),
    ("Fecha Inicio Operaciones", "pdf_fecha_inicio_operaciones"),
    ("Estatus en el Padrón", "pdf_estatus_padron"),
    ("Fecha Último Cambio Estado", "pdf_fecha_ultimo_cambio"),
    ("Nombre Comercial", "pdf_nombre_comercial"),
    ("Código Postal", "pdf_codigo_postal"),
    ("Tipo de Vialidad", "pdf_tipo_vialidad"),
    ("Nombre de Vialidad", "pdf_nombre_vialidad"),
    ("Número Exterior", "pdf_numero_exterior"),
    ("Número Interior", "pdf_numero_interior"),
    ("Nombre de la Colonia", "pdf_nombre_colonia"),
    ("Nombre de la Localidad", "pdf_nombre_localidad"),
    ("Municipio o Demarcación", "pdf_municipio"),
    ("Entidad Federativa", "pdf_entidad_federativa"),
    ("Entre Calle", "pdf_entre_calle"),
];

const SUMMARY_COLUMNS: [&str; 10] = [
    "Archivo PDF",
    "RFC",
    "Scraping Exitoso",
    "Nombre Completo",
    "CURP",
    "Situación",
    "Municipio",
    "Estado",
    "Error",
    "URL",
];

/// One named table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    fn new(name: &str, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Cell at `row`, under the header `column`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

/// The four-sheet export of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Write the report as pretty JSON, atomically.
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CsfError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| CsfError::Internal(format!("report serialisation: {e}")))?;
        write_atomic(path, &json).await?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Build the report for `records`.
///
/// # Errors
/// [`CsfError::EmptyBatch`] when `records` is empty.
pub fn build_report(records: &[ResultRecord]) -> Result<Report, CsfError> {
    if records.is_empty() {
        return Err(CsfError::EmptyBatch);
    }

    let mut summary = Sheet::new(SHEET_SUMMARY, SUMMARY_COLUMNS);
    summary.rows = records.iter().map(summary_row).collect();

    let mut web = Sheet::new(SHEET_WEB, WEB_COLUMNS.iter().map(|(h, _)| *h));
    web.rows = records
        .iter()
        .filter(|r| r.scraping_exitoso)
        .map(|r| project(r, WEB_COLUMNS))
        .collect();

    let mut pdf = Sheet::new(SHEET_PDF, PDF_COLUMNS.iter().map(|(h, _)| *h));
    pdf.rows = records
        .iter()
        .filter(|r| r.extraccion_pdf_exitosa)
        .map(|r| project(r, PDF_COLUMNS))
        .collect();

    Ok(Report {
        sheets: vec![summary, web, pdf, stats_sheet(records)],
    })
}

/// Write the raw records as a pretty JSON array, atomically.
pub async fn write_records_json(
    records: &[ResultRecord],
    path: impl AsRef<Path>,
) -> Result<(), CsfError> {
    let path = path.as_ref();
    let json = serde_json::to_vec_pretty(records)
        .map_err(|e| CsfError::Internal(format!("record serialisation: {e}")))?;
    write_atomic(path, &json).await
}

// ── Sheet builders ───────────────────────────────────────────────────────

fn field(r: &ResultRecord, key: &str) -> String {
    let row = r.to_row();
    row.get(key).cloned().unwrap_or_default()
}

fn project(r: &ResultRecord, columns: &[Column]) -> Vec<String> {
    let row = r.to_row();
    columns
        .iter()
        .map(|(_, key)| row.get(*key).cloned().unwrap_or_default())
        .collect()
}

fn first_of(r: &ResultRecord, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| r.get(k).filter(|v| !v.is_empty()))
        .unwrap_or_default()
        .to_string()
}

fn full_name(r: &ResultRecord) -> String {
    let join = |parts: [&str; 3]| {
        parts
            .iter()
            .map(|k| r.get(k).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    };
    if r.get("web_nombre").is_some() && r.get("web_apellido_paterno").is_some() {
        join(["web_nombre", "web_apellido_paterno", "web_apellido_materno"])
    } else if r.get("pdf_nombre").is_some() && r.get("pdf_primer_apellido").is_some() {
        join(["pdf_nombre", "pdf_primer_apellido", "pdf_segundo_apellido"])
    } else {
        String::new()
    }
}

fn summary_row(r: &ResultRecord) -> Vec<String> {
    vec![
        r.archivo_pdf.clone(),
        first_of(r, &["web_rfc", "pdf_rfc"]),
        if r.scraping_exitoso { "SÍ" } else { "NO" }.to_string(),
        full_name(r),
        first_of(r, &["web_curp", "pdf_curp"]),
        field(r, "web_situacion_contribuyente"),
        first_of(r, &["web_municipio", "pdf_municipio"]),
        first_of(r, &["web_entidad_federativa", "pdf_entidad_federativa"]),
        r.error.clone().unwrap_or_default(),
        r.url.clone(),
    ]
}

/// `part / total` as a percentage with one decimal, e.g. `66.7%`.
pub fn rate(part: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / total as f64)
}

fn stats_sheet(records: &[ResultRecord]) -> Sheet {
    let total = records.len();
    let scraped = records.iter().filter(|r| r.scraping_exitoso).count();
    let pdf = records.iter().filter(|r| r.extraccion_pdf_exitosa).count();
    let urls = records.iter().filter(|r| r.url_encontrada).count();
    let errors = records.iter().filter(|r| r.error.is_some()).count();

    let mut sheet = Sheet::new(SHEET_STATS, ["Métrica", "Valor"]);
    sheet.rows = [
        ("Total PDFs procesados", total.to_string()),
        ("Scraping web exitoso", scraped.to_string()),
        ("Extracción PDF exitosa", pdf.to_string()),
        ("Scraping web fallido", (total - scraped).to_string()),
        ("Extracción PDF fallida", (total - pdf).to_string()),
        ("URLs encontradas", urls.to_string()),
        ("Errores encontrados", errors.to_string()),
        ("Tasa éxito scraping web", rate(scraped, total)),
        ("Tasa éxito extracción PDF", rate(pdf, total)),
        (
            "Fecha procesamiento",
            chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        ),
    ]
    .into_iter()
    .map(|(k, v)| vec![k.to_string(), v])
    .collect();
    sheet
}

// ── Output ───────────────────────────────────────────────────────────────

/// Write `bytes` to a sibling temp file, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CsfError> {
    let fail = |source: std::io::Error| CsfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}
