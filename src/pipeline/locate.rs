//! QR/URL recovery from a scanned certificate.
//!
//! The certificate's QR code encodes the validator URL. Decoding the
//! rendered first page is the normal path; when that fails (low-contrast
//! scans, re-printed PDFs) the locator falls back, in order, to link
//! annotations, the text layer and the embedded image objects. The first
//! stage that yields a URL wins.
//!
//! ```text
//! RasterQr ──▶ LinkAnnotation ──▶ PageText ──▶ EmbeddedImage
//! (rqrr)       (URI action)       (regex)      (rqrr, then byte search)
//! ```

use crate::config::ScraperConfig;
use crate::error::CsfError;
use crate::pipeline::chain::{first_success, Labelled};
use crate::pipeline::document::PdfScan;
use image::GrayImage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// One fallback stage of the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStage {
    /// QR decode of the upscaled first-page raster.
    RasterQr,
    /// Link annotation whose URI contains the expected domain.
    LinkAnnotation,
    /// URL (or bare validator query) in the page text.
    PageText,
    /// QR decode of embedded images, then a byte search of their buffers.
    EmbeddedImage,
}

impl LocatorStage {
    /// Stages in the order they are attempted.
    pub const ORDER: [LocatorStage; 4] = [
        LocatorStage::RasterQr,
        LocatorStage::LinkAnnotation,
        LocatorStage::PageText,
        LocatorStage::EmbeddedImage,
    ];
}

impl Labelled for LocatorStage {
    fn label(&self) -> &str {
        match self {
            LocatorStage::RasterQr => "raster-qr",
            LocatorStage::LinkAnnotation => "link-annotation",
            LocatorStage::PageText => "page-text",
            LocatorStage::EmbeddedImage => "embedded-image",
        }
    }
}

/// A recovered URL and the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedUrl {
    pub url: String,
    pub stage: LocatorStage,
}

static RE_VALIDATOR_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"D1=\d+&D2=\d+&D3=\S*_\S*").unwrap());

/// Runs the locator stages over a [`PdfScan`].
#[derive(Debug, Clone)]
pub struct UrlLocator {
    domain: String,
    validator_base_url: String,
    text_url: Regex,
    image_urls: [regex::bytes::Regex; 2],
}

impl UrlLocator {
    /// Build a locator accepting URLs on `domain`.
    pub fn new(
        domain: impl Into<String>,
        validator_base_url: impl Into<String>,
    ) -> Result<Self, CsfError> {
        let domain = domain.into();
        let escaped = regex::escape(&domain);
        let compile = |field: &str, pattern: String| {
            Regex::new(&pattern).map_err(|source| CsfError::InvalidPattern {
                field: field.to_string(),
                source,
            })
        };
        let compile_bytes = |field: &str, pattern: String| {
            regex::bytes::Regex::new(&pattern).map_err(|source| CsfError::InvalidPattern {
                field: field.to_string(),
                source,
            })
        };

        Ok(Self {
            text_url: compile("text_url", format!(r"https?://\S*{escaped}\S*"))?,
            image_urls: [
                compile_bytes(
                    "image_url",
                    format!(r"https?://[A-Za-z0-9.-]*{escaped}/[^\s\x00]+"),
                )?,
                compile_bytes("image_fragment", format!(r"{escaped}/[^\s\x00]+"))?,
            ],
            domain,
            validator_base_url: validator_base_url.into(),
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, CsfError> {
        Self::new(&config.expected_domain, &config.validator_base_url)
    }

    /// First URL any stage recovers, or `None`.
    pub fn locate(&self, scan: &PdfScan) -> Option<LocatedUrl> {
        let (_, located) = first_success("qr-locator", &LocatorStage::ORDER, |stage| {
            self.run_stage(*stage, scan).map(|url| LocatedUrl { url, stage: *stage })
        })?;
        info!("URL recovered via {}: {}", located.stage.label(), located.url);
        Some(located)
    }

    /// Run a single stage.
    pub fn run_stage(&self, stage: LocatorStage, scan: &PdfScan) -> Option<String> {
        match stage {
            LocatorStage::RasterQr => scan.first_page.as_ref().and_then(decode_qr),
            LocatorStage::LinkAnnotation => scan
                .link_uris
                .iter()
                .find(|uri| uri.contains(&self.domain))
                .cloned(),
            LocatorStage::PageText => self
                .url_in_text(&scan.first_page_text)
                .or_else(|| self.url_in_text(&scan.text)),
            LocatorStage::EmbeddedImage => scan
                .embedded_images
                .iter()
                .find_map(|img| decode_qr(&img.gray))
                .or_else(|| {
                    scan.embedded_images
                        .iter()
                        .find_map(|img| self.url_in_bytes(&img.bytes))
                }),
        }
    }

    /// A full URL on the domain, else a bare validator query rebuilt
    /// against the validator base URL.
    fn url_in_text(&self, text: &str) -> Option<String> {
        if let Some(m) = self.text_url.find(text) {
            return Some(m.as_str().to_string());
        }
        RE_VALIDATOR_QUERY.find(text).map(|m| {
            debug!("Rebuilding validator URL from bare query");
            format!("{}?{}", self.validator_base_url, m.as_str())
        })
    }

    fn url_in_bytes(&self, bytes: &[u8]) -> Option<String> {
        self.image_urls.iter().find_map(|re| {
            let found = String::from_utf8_lossy(re.find(bytes)?.as_bytes()).into_owned();
            Some(if found.starts_with("http") {
                found
            } else {
                format!("https://{found}")
            })
        })
    }
}

/// Decode the first readable QR code in a greyscale image.
pub fn decode_qr(gray: &GrayImage) -> Option<String> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        w as usize,
        h as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    debug!("QR detector found {} candidate grid(s)", grids.len());
    grids
        .iter()
        .find_map(|grid| grid.decode().ok())
        .map(|(_, content)| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_VALIDATOR_URL;
    use crate::pipeline::document::EmbeddedImage;

    const URL: &str = "https://siat.sat.gob.mx/app/qr/faces/pages/mobile/validadorqr.jsf?D1=10&D2=1&D3=12345678901_GODE561231GR8";

    fn locator() -> UrlLocator {
        UrlLocator::new("sat.gob.mx", DEFAULT_VALIDATOR_URL).unwrap()
    }

    fn blank() -> GrayImage {
        GrayImage::from_pixel(64, 64, image::Luma([255]))
    }

    #[test]
    fn blank_raster_has_no_qr() {
        assert_eq!(decode_qr(&blank()), None);
        assert_eq!(decode_qr(&GrayImage::new(0, 0)), None);
    }

    #[test]
    fn empty_scan_yields_none() {
        assert_eq!(locator().locate(&PdfScan::default()), None);
    }

    #[test]
    fn link_annotation_on_domain() {
        let scan = PdfScan {
            first_page: Some(blank()),
            link_uris: vec!["https://example.com/help".into(), URL.into()],
            first_page_text: "https://siat.sat.gob.mx/other".into(),
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.stage, LocatorStage::LinkAnnotation);
        assert_eq!(found.url, URL);
    }

    #[test]
    fn off_domain_links_are_ignored() {
        let scan = PdfScan {
            link_uris: vec!["https://example.com/help".into()],
            ..PdfScan::default()
        };
        assert_eq!(locator().locate(&scan), None);
    }

    #[test]
    fn text_url_found() {
        let scan = PdfScan {
            text: format!("Valide en {URL} su constancia"),
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.stage, LocatorStage::PageText);
        assert_eq!(found.url, URL);
    }

    #[test]
    fn bare_query_is_rebuilt() {
        let scan = PdfScan {
            first_page_text: "codigo D1=10&D2=1&D3=12345678901_GODE561231GR8 fin".into(),
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.url, URL);
    }

    fn qr_raster(content: &str) -> GrayImage {
        qrcode::QrCode::new(content.as_bytes())
            .unwrap()
            .render::<image::Luma<u8>>()
            .module_dimensions(6, 6)
            .build()
    }

    /// A baseline JPEG stream with a COM segment spliced in after SOI, the
    /// way encoders embed free-text metadata.
    fn jpeg_with_comment(comment: &[u8]) -> Vec<u8> {
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode_image(&blank())
            .unwrap();
        let len = (comment.len() + 2) as u16;
        let mut segment = vec![0xFF, 0xFE];
        segment.extend_from_slice(&len.to_be_bytes());
        segment.extend_from_slice(comment);
        jpeg.splice(2..2, segment);
        jpeg
    }

    #[test]
    fn decodes_rendered_qr() {
        assert_eq!(decode_qr(&qr_raster(URL)).as_deref(), Some(URL));
    }

    #[test]
    fn raster_qr_wins_over_later_stages() {
        let scan = PdfScan {
            first_page: Some(qr_raster(URL)),
            link_uris: vec!["https://siat.sat.gob.mx/other".into()],
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.stage, LocatorStage::RasterQr);
        assert_eq!(found.url, URL);
        assert!(found.url.starts_with("https://") && found.url.contains("D3="));
    }

    #[test]
    fn qr_in_embedded_image() {
        let scan = PdfScan {
            first_page: Some(blank()),
            embedded_images: vec![EmbeddedImage {
                gray: qr_raster(URL),
                bytes: Vec::new(),
            }],
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.stage, LocatorStage::EmbeddedImage);
        assert_eq!(found.url, URL);
    }

    #[test]
    fn byte_search_in_embedded_image_stream() {
        let bytes = jpeg_with_comment(b"sat.gob.mx/app/qr?D3=1_X");
        assert_eq!(&bytes[..4], &[0xFF, 0xD8, 0xFF, 0xFE]);
        let scan = PdfScan {
            embedded_images: vec![EmbeddedImage {
                gray: blank(),
                bytes,
            }],
            ..PdfScan::default()
        };
        let found = locator().locate(&scan).unwrap();
        assert_eq!(found.stage, LocatorStage::EmbeddedImage);
        assert_eq!(found.url, "https://sat.gob.mx/app/qr?D3=1_X");
    }

    #[test]
    fn decoded_pixels_carry_no_url() {
        let scan = PdfScan {
            embedded_images: vec![EmbeddedImage {
                gray: blank(),
                bytes: blank().into_raw(),
            }],
            ..PdfScan::default()
        };
        assert_eq!(locator().locate(&scan), None);
    }

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(LocatorStage::ORDER[0], LocatorStage::RasterQr);
        assert_eq!(LocatorStage::ORDER[3], LocatorStage::EmbeddedImage);
    }
}
