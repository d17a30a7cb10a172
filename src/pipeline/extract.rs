//! Field extraction: tiered regex pattern sets over a block of text.
//!
//! ## Why two tiers?
//!
//! The certificate template is not consistent across issuance dates. The
//! primary patterns target the common layout and are precise. The alternates
//! widen character classes and relax anchors, which recovers data from
//! layout variants but raises the false-positive rate. They therefore only
//! run when the primary tier yields fewer fields than a threshold, and only
//! for fields the primary tier left empty. A primary value is never
//! overwritten.

use crate::error::CsfError;
use crate::pipeline::patterns::{FieldSpec, PDF_FIELDS, PDF_THRESHOLD, WEB_FIELDS, WEB_THRESHOLD};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use tracing::debug;

/// Extracted field name → trimmed value.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone)]
struct CompiledField {
    field: String,
    primary: Regex,
    alternate: Option<Regex>,
}

/// A compiled, named set of field patterns plus its alternate-tier threshold.
#[derive(Debug, Clone)]
pub struct PatternSet {
    name: &'static str,
    fields: Vec<CompiledField>,
    threshold: usize,
}

impl PatternSet {
    /// Compile a pattern table. Every pattern is case-insensitive and
    /// multi-line.
    pub fn compile(
        name: &'static str,
        specs: &[FieldSpec],
        threshold: usize,
    ) -> Result<Self, CsfError> {
        let fields = specs
            .iter()
            .map(|s| {
                Ok(CompiledField {
                    field: s.field.to_string(),
                    primary: build_regex(s.field, s.primary)?,
                    alternate: s
                        .alternate
                        .map(|alt| build_regex(s.field, alt))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>, CsfError>>()?;

        Ok(Self {
            name,
            fields,
            threshold,
        })
    }

    /// The certificate text-layer set (`pdf_*` fields).
    pub fn pdf() -> Result<Self, CsfError> {
        Self::compile("pdf", PDF_FIELDS, PDF_THRESHOLD)
    }

    /// The validator page set (`web_*` fields).
    pub fn web() -> Result<Self, CsfError> {
        Self::compile("web", WEB_FIELDS, WEB_THRESHOLD)
    }

    /// Replace the alternate-tier threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of fields in the set.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply the set to `text`.
    pub fn extract(&self, text: &str) -> FieldMap {
        let mut out = FieldMap::new();

        // ── Tier 1: primary patterns ─────────────────────────────────────
        for f in &self.fields {
            if let Some(v) = first_capture(&f.primary, text) {
                out.insert(f.field.clone(), v);
            }
        }
        let primary_hits = out.len();

        // ── Tier 2: alternates for the gaps, only on shortfall ───────────
        if primary_hits < self.threshold {
            for f in &self.fields {
                if out.contains_key(&f.field) {
                    continue;
                }
                let Some(ref alt) = f.alternate else {
                    continue;
                };
                if let Some(v) = first_capture(alt, text) {
                    out.insert(f.field.clone(), v);
                }
            }
        }

        debug!(
            "Pattern set '{}': {} primary, {} total (threshold {})",
            self.name,
            primary_hits,
            out.len(),
            self.threshold
        );
        out
    }
}

fn build_regex(field: &str, pattern: &str) -> Result<Regex, CsfError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|source| CsfError::InvalidPattern {
            field: field.to_string(),
            source,
        })
}

/// Group 1 of the first match, trimmed; `None` unless longer than one char.
fn first_capture(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str().trim();
    (value.chars().count() > 1).then(|| value.to_string())
}

// ── Validator URL parameters ─────────────────────────────────────────────

static RE_D3: Lazy<Regex> = Lazy::new(|| Regex::new(r"D3=(\d+)_([A-Z0-9]+)").unwrap());

/// Registration number and RFC carried in the validator URL's `D3`
/// parameter (`D3=<registro>_<RFC>`).
pub fn url_fields(url: &str) -> FieldMap {
    let mut out = FieldMap::new();
    if let Some(caps) = RE_D3.captures(url) {
        out.insert("web_numero_registro".into(), caps[1].to_string());
        out.insert("web_rfc".into(), caps[2].to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(field: &'static str, primary: &'static str, alternate: Option<&'static str>) -> FieldSpec {
        FieldSpec {
            field,
            primary,
            alternate,
        }
    }

    const PDF_SAMPLE: &str = "CÉDULA DE IDENTIFICACIÓN FISCAL RFC: GODE561231GR8 \
        CURP: GODE561231HDFRRN04 Nombre (s): EMILIANO Primer Apellido: GOMEZ \
        Segundo Apellido: DIAZ Fecha inicio de operaciones: 01 DE ENERO DE 2010 \
        Estatus en el padrón: ACTIVO Fecha de último cambio de estado: 01 DE ENERO DE 2010 \
        Nombre Comercial: Datos del domicilio registrado Código Postal: 06000 \
        Tipo de Vialidad: CALLE Nombre de Vialidad: REFORMA Número Exterior: 10 \
        Número Interior: Nombre de la Colonia: CENTRO Nombre de la Localidad: CUAUHTEMOC \
        Nombre del Municipio o Demarcación Territorial: CUAUHTEMOC \
        Nombre de la Entidad Federativa: CIUDAD DE MEXICO Entre Calle: MADERO";

    #[test]
    fn pdf_primary_tier_extracts_common_layout() {
        let set = PatternSet::pdf().unwrap();
        let m = set.extract(PDF_SAMPLE);
        assert_eq!(m["pdf_rfc"], "GODE561231GR8");
        assert_eq!(m["pdf_curp"], "GODE561231HDFRRN04");
        assert_eq!(m["pdf_nombre"], "EMILIANO");
        assert_eq!(m["pdf_primer_apellido"], "GOMEZ");
        assert_eq!(m["pdf_segundo_apellido"], "DIAZ");
        assert_eq!(m["pdf_estatus_padron"], "ACTIVO");
        assert_eq!(m["pdf_codigo_postal"], "06000");
        assert_eq!(m["pdf_nombre_colonia"], "CENTRO");
        assert_eq!(m["pdf_entidad_federativa"], "CIUDAD DE MEXICO");
        assert_eq!(m["pdf_entre_calle"], "MADERO");
        assert!(!m.contains_key("pdf_numero_interior"), "empty capture kept");
    }

    #[test]
    fn alternate_never_overwrites_primary() {
        let set = PatternSet::compile(
            "t",
            &[s("t_rfc", r"RFC:\s*(\w+)", Some(r"(ALT\w+)"))],
            5,
        )
        .unwrap();
        let m = set.extract("RFC: PRIMARY ALTVALUE");
        assert_eq!(m["t_rfc"], "PRIMARY");
    }

    #[test]
    fn alternate_fills_gap_on_shortfall() {
        let set = PatternSet::compile(
            "t",
            &[
                s("t_a", r"A:\s*(\w+)", None),
                s("t_b", r"B:\s*(\w+)", Some(r"B\s+(\w+)")),
            ],
            5,
        )
        .unwrap();
        let m = set.extract("A: uno B dos");
        assert_eq!(m["t_a"], "uno");
        assert_eq!(m["t_b"], "dos");
    }

    #[test]
    fn alternates_skipped_when_primary_meets_threshold() {
        let set = PatternSet::compile(
            "t",
            &[
                s("t_a", r"A:\s*(\w+)", None),
                s("t_b", r"B:\s*(\w+)", Some(r"B\s+(\w+)")),
            ],
            1,
        )
        .unwrap();
        let m = set.extract("A: uno B dos");
        assert!(!m.contains_key("t_b"));
    }

    #[test]
    fn single_character_capture_is_rejected() {
        let set = PatternSet::compile("t", &[s("t_x", r"X:\s*(\S+)", None)], 0).unwrap();
        assert!(set.extract("X: Z").is_empty());
        assert!(set.extract("X: ;").is_empty());
        assert_eq!(set.extract("X: ZZ")["t_x"], "ZZ");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let set = PatternSet::pdf().unwrap();
        let m = set.extract("rfc: gode561231gr8");
        assert_eq!(m["pdf_rfc"], "gode561231gr8");
    }

    #[test]
    fn web_set_extracts_validator_text() {
        let text = "CURP: GODE561231HDFRRN04 Nombre: EMILIANO Apellido Paterno: GOMEZ \
            Apellido Materno: DIAZ Fecha Nacimiento: 31-12-1956 \
            Fecha de Inicio de operaciones: 01-01-2010 Situación del contribuyente: ACTIVO \
            Fecha del último cambio de situación: 01-01-2010 Entidad Federativa: CIUDAD DE MEXICO \
            Municipio o delegación: CUAUHTEMOC Localidad: CENTRO Tipo de vialidad: CALLE \
            Nombre de la vialidad: REFORMA Número exterior: 10 Número interior: CP: 06000 \
            Correo electrónico: persona@example.com AL: CIUDAD DE MEXICO 1 Características fiscales \
            Régimen: Sueldos y Salarios Fecha de alta: 01-01-2010";
        let m = PatternSet::web().unwrap().extract(text);
        assert_eq!(m["web_nombre"], "EMILIANO");
        assert_eq!(m["web_apellido_paterno"], "GOMEZ");
        assert_eq!(m["web_apellido_materno"], "DIAZ");
        assert_eq!(m["web_fecha_nacimiento"], "31-12-1956");
        assert_eq!(m["web_situacion_contribuyente"], "ACTIVO");
        assert_eq!(m["web_municipio"], "CUAUHTEMOC");
        assert_eq!(m["web_cp"], "06000");
        assert_eq!(m["web_correo_electronico"], "persona@example.com");
        assert_eq!(m["web_al"], "CIUDAD DE MEXICO 1");
        assert_eq!(m["web_regimen"], "Sueldos y Salarios");
        assert_eq!(m["web_fecha_alta"], "01-01-2010");
    }

    #[test]
    fn no_literal_defaults_when_nothing_matches() {
        assert!(PatternSet::web().unwrap().extract("sin datos").is_empty());
        assert!(PatternSet::pdf().unwrap().extract("sin datos").is_empty());
    }

    #[test]
    fn url_fields_from_d3() {
        let m = url_fields(
            "https://siat.sat.gob.mx/app/qr/faces/pages/mobile/validadorqr.jsf?D1=10&D2=1&D3=12345678901_GODE561231GR8",
        );
        assert_eq!(m["web_numero_registro"], "12345678901");
        assert_eq!(m["web_rfc"], "GODE561231GR8");
        assert!(url_fields("https://example.com").is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported_with_field() {
        let err = PatternSet::compile("t", &[s("t_bad", r"(unclosed", None)], 0).unwrap_err();
        assert!(matches!(err, CsfError::InvalidPattern { ref field, .. } if field == "t_bad"));
    }
}
