//! Declarative pattern tables for the CSF template family.
//!
//! Every entry names the output field, the primary pattern and, for fields
//! the template is known to vary on, a looser alternate. Group 1 is the
//! value. Patterns are compiled case-insensitive and multi-line by
//! [`crate::pipeline::extract::PatternSet`].
//!
//! The `regex` crate has no look-around, so a trailing label that bounds a
//! lazy capture is matched and consumed instead of asserted. Only group 1 is
//! read, so the result is the same.

/// One extractable field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Output key, e.g. `pdf_rfc`.
    pub field: &'static str,
    /// Pattern for the common layout.
    pub primary: &'static str,
    /// Wider pattern for layout variants; tried only when the primary tier
    /// under-performs and only for fields it left empty.
    pub alternate: Option<&'static str>,
}

const fn spec(field: &'static str, primary: &'static str) -> FieldSpec {
    FieldSpec {
        field,
        primary,
        alternate: None,
    }
}

const fn spec_alt(field: &'static str, primary: &'static str, alternate: &'static str) -> FieldSpec {
    FieldSpec {
        field,
        primary,
        alternate: Some(alternate),
    }
}

/// Primary-tier yield below which PDF alternates run.
pub const PDF_THRESHOLD: usize = 8;

/// Primary-tier yield below which web alternates run.
pub const WEB_THRESHOLD: usize = 10;

// ── PDF text layer ───────────────────────────────────────────────────────

/// Fields of the certificate's own text layer (whitespace-collapsed).
pub const PDF_FIELDS: &[FieldSpec] = &[
    spec_alt(
        "pdf_rfc",
        r"RFC:\s*([A-Z0-9]{12,13})",
        r"([A-Z]{4}\d{6}[A-Z0-9]{3})",
    ),
    spec_alt(
        "pdf_curp",
        r"CURP:\s*([A-Z0-9]{18})",
        r"([A-Z]{4}\d{6}[HM][A-Z]{5}[0-9A-Z]\d)",
    ),
    spec_alt(
        "pdf_nombre",
        r"Nombre\s*\(s\):\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Primer|$)",
        r"Nombre[^:]*:?\s*([A-ZÁÉÍÓÚÑ\s]+?)\s*(?:Primer|Apellido)",
    ),
    spec_alt(
        "pdf_primer_apellido",
        r"Primer Apellido:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Segundo|$)",
        r"Primer Apellido[^:]*:?\s*([A-ZÁÉÍÓÚÑ\s]+?)\s*Segundo",
    ),
    spec_alt(
        "pdf_segundo_apellido",
        r"Segundo Apellido:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Fecha|$)",
        r"Segundo Apellido[^:]*:?\s*([A-ZÁÉÍÓÚÑ\s]+?)\s*Fecha",
    ),
    spec(
        "pdf_fecha_inicio_operaciones",
        r"Fecha inicio de operaciones:\s*([0-9A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Estatus|$)",
    ),
    spec(
        "pdf_estatus_padron",
        r"Estatus en el padrón:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Fecha|$)",
    ),
    spec(
        "pdf_fecha_ultimo_cambio",
        r"Fecha de último cambio de estado:\s*([0-9A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Nombre|$)",
    ),
    spec(
        "pdf_nombre_comercial",
        r"Nombre Comercial:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Datos|$)",
    ),
    spec_alt(
        "pdf_codigo_postal",
        r"Código Postal:\s*(\d{5})",
        r"Código Postal[^:]*:?\s*(\d{5})",
    ),
    spec(
        "pdf_tipo_vialidad",
        r"Tipo de Vialidad:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Nombre|$)",
    ),
    spec(
        "pdf_nombre_vialidad",
        r"Nombre de Vialidad:\s*([A-ZÁÉÍÓÚÑ0-9\s]+?)(?:\s*Número|$)",
    ),
    spec(
        "pdf_numero_exterior",
        r"Número Exterior:\s*([A-ZÁÉÍÓÚÑ0-9\s]+?)(?:\s*Número|$)",
    ),
    spec(
        "pdf_numero_interior",
        r"Número Interior:\s*([A-ZÁÉÍÓÚÑ0-9\s]*?)(?:\s*Nombre|$)",
    ),
    spec(
        "pdf_nombre_colonia",
        r"Nombre de la Colonia:\s*([A-ZÁÉÍÓÚÑ\s]*?)(?:\s*Nombre|$)",
    ),
    spec(
        "pdf_nombre_localidad",
        r"Nombre de la Localidad:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Nombre|$)",
    ),
    spec(
        "pdf_municipio",
        r"Nombre del Municipio o Demarcación Territorial:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Nombre|$)",
    ),
    spec_alt(
        "pdf_entidad_federativa",
        r"Nombre de la Entidad Federativa:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:\s*Entre|$)",
        r"Entidad Federativa[^:]*:?\s*([A-ZÁÉÍÓÚÑ\s]+?)\s*(?:Entre|$)",
    ),
    spec("pdf_entre_calle", r"Entre Calle:\s*([A-ZÁÉÍÓÚÑ\s]+?)\s*$"),
];

// ── Validator page ───────────────────────────────────────────────────────

/// Fields of the validator page's visible text (normalised).
pub const WEB_FIELDS: &[FieldSpec] = &[
    spec_alt(
        "web_curp",
        r"CURP:\s*([A-Z0-9]{18})",
        r"([A-Z]{4}\d{6}[HM][A-Z]{5}[0-9A-Z]\d)",
    ),
    spec_alt(
        "web_nombre",
        r"Nombre:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Apellido|$)",
        r"Nombre[:\s]*([A-ZÁÉÍÓÚÑ\s]+?)Apellido",
    ),
    spec_alt(
        "web_apellido_paterno",
        r"Apellido Paterno:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Apellido|$)",
        r"Apellido Paterno[:\s]*([A-ZÁÉÍÓÚÑ\s]+?)(?:Apellido|Fecha)",
    ),
    spec(
        "web_apellido_materno",
        r"Apellido Materno:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Fecha|$)",
    ),
    spec_alt(
        "web_fecha_nacimiento",
        r"Fecha Nacimiento:\s*(\d{2}-\d{2}-\d{4})",
        r"Fecha Nacimiento[:\s]*(\d{2}-\d{2}-\d{4})",
    ),
    spec(
        "web_fecha_inicio_operaciones",
        r"Fecha de Inicio de operaciones:\s*(\d{2}-\d{2}-\d{4})",
    ),
    spec(
        "web_situacion_contribuyente",
        r"Situación del contribuyente:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Fecha|$)",
    ),
    spec(
        "web_fecha_ultimo_cambio",
        r"Fecha del último cambio de situación:\s*(\d{2}-\d{2}-\d{4})",
    ),
    spec_alt(
        "web_entidad_federativa",
        r"Entidad Federativa:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Municipio|$)",
        r"Entidad Federativa[:\s]*([A-ZÁÉÍÓÚÑ\s]+?)Municipio",
    ),
    spec_alt(
        "web_municipio",
        r"Municipio o delegación:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Localidad|$)",
        r"Municipio[^:]*[:\s]*([A-ZÁÉÍÓÚÑ\s]+?)(?:Localidad|Tipo)",
    ),
    spec_alt(
        "web_localidad",
        r"Localidad:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Tipo|$|[0-9])",
        r"Localidad:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Tipo|[0-9]|$)",
    ),
    spec(
        "web_tipo_vialidad",
        r"Tipo de vialidad:\s*([A-ZÁÉÍÓÚÑ\s]+?)(?:Nombre|$)",
    ),
    spec(
        "web_nombre_vialidad",
        r"Nombre de la vialidad:\s*([A-ZÁÉÍÓÚÑ0-9\s]+?)(?:Número|$)",
    ),
    spec(
        "web_numero_exterior",
        r"Número exterior:\s*([A-ZÁÉÍÓÚÑ0-9\s]+?)(?:Número|CP|$)",
    ),
    spec(
        "web_numero_interior",
        r"Número interior:\s*([A-ZÁÉÍÓÚÑ0-9\s]*?)(?:CP|$)",
    ),
    spec_alt("web_cp", r"CP:\s*(\d{5})", r"(?:CP|C\.P\.)[:\s]*(\d{5})"),
    spec(
        "web_correo_electronico",
        r"Correo electrónico:\s*([A-Za-z0-9@._-]+)",
    ),
    spec("web_al", r"\bAL:\s*([A-ZÁÉÍÓÚÑ\s0-9]+?)(?:Características|$)"),
    spec("web_regimen", r"Régimen:\s*([^\n]+?)(?:Fecha|$)"),
    spec("web_fecha_alta", r"Fecha de alta:\s*(\d{2}-\d{2}-\d{4})"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique_and_prefixed() {
        for (prefix, table) in [("pdf_", PDF_FIELDS), ("web_", WEB_FIELDS)] {
            let names: HashSet<_> = table.iter().map(|f| f.field).collect();
            assert_eq!(names.len(), table.len());
            assert!(table.iter().all(|f| f.field.starts_with(prefix)));
        }
    }

    #[test]
    fn every_pattern_has_one_capture_group() {
        for f in PDF_FIELDS.iter().chain(WEB_FIELDS) {
            for p in std::iter::once(f.primary).chain(f.alternate) {
                let re = regex::Regex::new(p).unwrap();
                assert_eq!(re.captures_len(), 2, "{}: {p}", f.field);
            }
        }
    }
}
