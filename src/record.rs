//! The per-document output record.
//!
//! Status fields are always present and typed (`bool` flags, an optional
//! error string). Extracted values live in a flat `pdf_*` / `web_*` map that
//! is serialised alongside the status fields, so one JSON object per record
//! carries the whole row and absent fields are simply missing keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel stored in [`ResultRecord::url`] when no URL was recovered.
pub const URL_NOT_FOUND: &str = "No encontrada";

/// Filename stored on cache entries, replaced on every cache hit.
pub const CACHED_FILENAME: &str = "cached";

/// Timestamp format of `fecha_extraccion`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Status keys every record carries, in export order.
pub const STATUS_KEYS: [&str; 7] = [
    "archivo_pdf",
    "fecha_extraccion",
    "url_encontrada",
    "url",
    "extraccion_pdf_exitosa",
    "scraping_exitoso",
    "error",
];

/// One result row per input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub archivo_pdf: String,
    pub fecha_extraccion: String,
    pub url_encontrada: bool,
    pub url: String,
    pub extraccion_pdf_exitosa: bool,
    pub scraping_exitoso: bool,
    pub error: Option<String>,
    /// `pdf_*` and `web_*` values. Never contains a status key.
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl ResultRecord {
    /// A fresh record stamped with the current local time; every flag false.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            archivo_pdf: filename.into(),
            fecha_extraccion: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            url_encontrada: false,
            url: URL_NOT_FOUND.to_string(),
            extraccion_pdf_exitosa: false,
            scraping_exitoso: false,
            error: None,
            fields: BTreeMap::new(),
        }
    }

    /// Look up an extracted field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Extracted fields whose key starts with `prefix`.
    pub fn fields_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge extracted fields; status keys are ignored.
    pub fn merge_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in fields {
            if !STATUS_KEYS.contains(&k.as_str()) {
                self.fields.insert(k, v);
            }
        }
    }

    /// Flatten into a string map: status keys first (`error` omitted when
    /// absent), then every extracted field.
    pub fn to_row(&self) -> BTreeMap<String, String> {
        let mut row = self.fields.clone();
        row.insert("archivo_pdf".into(), self.archivo_pdf.clone());
        row.insert("fecha_extraccion".into(), self.fecha_extraccion.clone());
        row.insert("url_encontrada".into(), self.url_encontrada.to_string());
        row.insert("url".into(), self.url.clone());
        row.insert(
            "extraccion_pdf_exitosa".into(),
            self.extraccion_pdf_exitosa.to_string(),
        );
        row.insert("scraping_exitoso".into(), self.scraping_exitoso.to_string());
        if let Some(ref e) = self.error {
            row.insert("error".into(), e.clone());
        }
        row
    }

    /// Same record, ignoring only the extraction timestamp. The filename
    /// still counts. Used to compare reruns of one document.
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            fecha_extraccion: String::new(),
            ..self.clone()
        } == Self {
            fecha_extraccion: String::new(),
            ..other.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_status_defaults() {
        let r = ResultRecord::new("a.pdf");
        assert_eq!(r.archivo_pdf, "a.pdf");
        assert_eq!(r.url, URL_NOT_FOUND);
        assert!(!r.url_encontrada && !r.extraccion_pdf_exitosa && !r.scraping_exitoso);
        assert!(r.error.is_none());
        assert_eq!(r.fecha_extraccion.len(), 19, "got {}", r.fecha_extraccion);
    }

    #[test]
    fn serialises_flat_with_boolean_flags() {
        let mut r = ResultRecord::new("a.pdf");
        r.merge_fields([("pdf_rfc".to_string(), "XAXX010101000".to_string())]);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["pdf_rfc"], "XAXX010101000");
        assert_eq!(v["url_encontrada"], false);
        assert!(v.get("fields").is_none());
    }

    #[test]
    fn merge_ignores_status_keys() {
        let mut r = ResultRecord::new("a.pdf");
        r.merge_fields([
            ("archivo_pdf".to_string(), "evil".to_string()),
            ("web_cp".to_string(), "06000".to_string()),
        ]);
        assert_eq!(r.archivo_pdf, "a.pdf");
        assert!(r.get("archivo_pdf").is_none());
        assert_eq!(r.get("web_cp"), Some("06000"));
    }

    #[test]
    fn row_omits_absent_error() {
        let r = ResultRecord::new("a.pdf");
        let row = r.to_row();
        assert!(!row.contains_key("error"));
        assert_eq!(row["scraping_exitoso"], "false");
    }

    #[test]
    fn prefix_filter() {
        let mut r = ResultRecord::new("a.pdf");
        r.merge_fields([
            ("pdf_rfc".to_string(), "A".to_string()),
            ("web_rfc".to_string(), "B".to_string()),
        ]);
        let web: Vec<_> = r.fields_with_prefix("web_").collect();
        assert_eq!(web, vec![("web_rfc", "B")]);
    }

    #[test]
    fn same_content_ignores_only_the_timestamp() {
        let mut a = ResultRecord::new("a.pdf");
        a.merge_fields([("web_rfc".to_string(), "A".to_string())]);
        let mut b = a.clone();
        b.fecha_extraccion = "1999-01-01 00:00:00".into();
        assert!(a.same_content(&b));

        b.archivo_pdf = "b.pdf".into();
        assert!(!a.same_content(&b));
    }
}
