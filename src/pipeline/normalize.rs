//! Text normalisation for fetched validator pages.
//!
//! ## Why repair mojibake?
//!
//! The validator sometimes declares one charset and serves another, so
//! Spanish letters arrive as UTF-8 bytes decoded as Latin-1 / CP1252
//! (`Ã³` for `ó`, `Ã±` for `ñ`). The field patterns are written against the
//! real letters (`Situación`, `Número`), so the page text is repaired before
//! extraction. The table covers the letters the template uses plus the
//! typographic punctuation that appears in régimen descriptions.

use crate::pipeline::extract::FieldMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// UTF-8 sequences mis-decoded as CP1252 or Latin-1, and their repair.
///
/// Each uppercase letter appears twice: the CP1252 rendering of the second
/// byte and the raw Latin-1 C1 control character.
const MOJIBAKE: &[(&str, &str)] = &[
    ("Ã¡", "á"),
    ("Ã©", "é"),
    ("Ã\u{AD}", "í"),
    ("Ã³", "ó"),
    ("Ãº", "ú"),
    ("Ã±", "ñ"),
    ("Ã¼", "ü"),
    ("Ã\u{81}", "Á"),
    ("Ã‰", "É"),
    ("Ã\u{89}", "É"),
    ("Ã\u{8D}", "Í"),
    ("Ã“", "Ó"),
    ("Ã\u{93}", "Ó"),
    ("Ãš", "Ú"),
    ("Ã\u{9A}", "Ú"),
    ("Ã‘", "Ñ"),
    ("Ã\u{91}", "Ñ"),
    ("Ãœ", "Ü"),
    ("Ã\u{9C}", "Ü"),
    ("â€œ", "“"),
    ("â€\u{9D}", "”"),
    ("â€™", "’"),
    ("â€˜", "‘"),
    ("â€“", "–"),
    ("â€”", "—"),
    ("Â\u{A0}", " "),
    ("Â°", "°"),
];

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SEL_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static SEL_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static SEL_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());

/// Replace known mis-decoded sequences with the intended characters.
pub fn repair_mojibake(text: &str) -> String {
    // Fast path: every entry starts with Ã, â or Â.
    if !text.contains(['Ã', 'â', 'Â']) {
        return text.to_string();
    }
    MOJIBAKE
        .iter()
        .fold(text.to_string(), |acc, (bad, good)| acc.replace(bad, good))
}

/// Collapse every whitespace run to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Mojibake repair followed by whitespace collapse.
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&repair_mojibake(text))
}

/// Visible text of an HTML document, normalised.
///
/// Text inside `script`, `style` and `noscript` is skipped; text nodes are
/// joined with a space so adjacent cells never fuse into one token.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            parts.push(text);
        }
    }

    normalize_text(&parts.join(" "))
}

/// Every `<table>` with at least one non-empty cell, as `web_tabla_<n>`
/// (1-based over all tables in document order) holding the rows as a JSON
/// array of string arrays.
pub fn html_tables(html: &str) -> FieldMap {
    let doc = Html::parse_document(html);
    let mut out = FieldMap::new();

    for (i, table) in doc.select(&SEL_TABLE).enumerate() {
        let rows: Vec<Vec<String>> = table
            .select(&SEL_ROW)
            .map(|row| {
                row.select(&SEL_CELL)
                    .map(|cell| normalize_text(&cell.text().collect::<String>()))
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        if rows.is_empty() {
            continue;
        }
        if let Ok(json) = serde_json::to_string(&rows) {
            out.insert(format!("web_tabla_{}", i + 1), json);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_lowercase_accents() {
        assert_eq!(
            repair_mojibake("SituaciÃ³n del contribuyente: NÃºmero"),
            "Situación del contribuyente: Número"
        );
        assert_eq!(repair_mojibake("ZÃ±iga RÃ©gimen"), "Zñiga Régimen");
    }

    #[test]
    fn repairs_uppercase_and_punctuation() {
        assert_eq!(repair_mojibake("MUÃ‘OZ"), "MUÑOZ");
        assert_eq!(repair_mojibake("â€œRÃ©gimenâ€\u{9D}"), "“Régimen”");
    }

    #[test]
    fn clean_text_is_untouched() {
        let s = "Régimen de Sueldos y Salarios";
        assert_eq!(repair_mojibake(s), s);
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let html = "<html><head><style>.x{}</style><script>var a = 1;</script></head>\
                    <body><p>CURP:</p><p>GODE561231HDFRRN04</p><noscript>enable js</noscript></body></html>";
        let text = visible_text(html);
        assert_eq!(text, "CURP: GODE561231HDFRRN04");
    }

    #[test]
    fn visible_text_repairs_encoding() {
        let text = visible_text("<p>SituaciÃ³n del contribuyente:</p><p>ACTIVO</p>");
        assert_eq!(text, "Situación del contribuyente: ACTIVO");
    }

    #[test]
    fn tables_are_numbered_over_all_tables() {
        let html = "<table><tr><td> </td></tr></table>\
                    <table><tr><th>Régimen</th><th>Fecha</th></tr>\
                    <tr><td>Sueldos</td><td>01-01-2010</td></tr><tr></tr></table>";
        let t = html_tables(html);
        assert!(!t.contains_key("web_tabla_1"));
        let rows: Vec<Vec<String>> = serde_json::from_str(&t["web_tabla_2"]).unwrap();
        assert_eq!(rows, vec![vec!["Régimen", "Fecha"], vec!["Sueldos", "01-01-2010"]]);
    }
}
