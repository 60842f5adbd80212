//! The closed registry of supported document formats.
//!
//! Everything here is a pure function over a fixed table — no I/O, no state.
//! The registry is deliberately a closed enum rather than a string: a
//! `FormatKey` that exists is always convertible, and the compiler enforces
//! that every match arm handles every format when a new one is added.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// One of the supported document formats.
///
/// Declaration order is registry order: [`conversion_targets`] and every
/// user-facing listing enumerate formats in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKey {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl FormatKey {
    /// All registry keys, in declaration order.
    pub const ALL: [FormatKey; 4] = [
        FormatKey::Pdf,
        FormatKey::Docx,
        FormatKey::Pptx,
        FormatKey::Xlsx,
    ];

    /// Canonical lowercase name, also used as the output file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            FormatKey::Pdf => "pdf",
            FormatKey::Docx => "docx",
            FormatKey::Pptx => "pptx",
            FormatKey::Xlsx => "xlsx",
        }
    }

    /// Human-readable label for listings ("PDF", "DOCX", …).
    pub fn label(self) -> &'static str {
        match self {
            FormatKey::Pdf => "PDF",
            FormatKey::Docx => "DOCX",
            FormatKey::Pptx => "PPTX",
            FormatKey::Xlsx => "XLSX",
        }
    }
}

impl fmt::Display for FormatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatKey {
    type Err = EngineError;

    /// Parse a registry key name (`"pdf"`, `"docx"`, …), case-insensitively.
    ///
    /// Accepts only canonical names, not the legacy extensions that
    /// [`detect_format`] maps (`"doc"` is a valid upload extension but not a
    /// conversion target name).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(FormatKey::Pdf),
            "docx" => Ok(FormatKey::Docx),
            "pptx" => Ok(FormatKey::Pptx),
            "xlsx" => Ok(FormatKey::Xlsx),
            _ => Err(EngineError::UnknownFormatName { name: s.to_string() }),
        }
    }
}

/// Map a filename to a registry key by its extension, case-insensitively.
///
/// The extension table covers the legacy Office extensions as well:
///
/// | Extension        | Key    |
/// |------------------|--------|
/// | `pdf`            | `Pdf`  |
/// | `doc`, `docx`    | `Docx` |
/// | `ppt`, `pptx`    | `Pptx` |
/// | `xls`, `xlsx`    | `Xlsx` |
///
/// Anything else — including filenames without an extension — yields `None`.
pub fn detect_format(filename: &str) -> Option<FormatKey> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(FormatKey::Pdf),
        "doc" | "docx" => Some(FormatKey::Docx),
        "ppt" | "pptx" => Some(FormatKey::Pptx),
        "xls" | "xlsx" => Some(FormatKey::Xlsx),
        _ => None,
    }
}

/// All formats a document of `source` format can be converted to.
///
/// Always exactly `ALL.len() - 1` entries, in registry order, never
/// containing `source` itself.
pub fn conversion_targets(source: FormatKey) -> Vec<FormatKey> {
    FormatKey::ALL.iter().copied().filter(|f| *f != source).collect()
}

/// Derive the output filename for a conversion: the original name with its
/// final extension replaced by the target's canonical extension.
///
/// A name without any extension gets the target extension appended.
pub fn converted_filename(original: &str, target: FormatKey) -> String {
    match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{target}"),
        _ => format!("{original}.{target}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_follows_extension_table() {
        assert_eq!(detect_format("report.pdf"), Some(FormatKey::Pdf));
        assert_eq!(detect_format("letter.doc"), Some(FormatKey::Docx));
        assert_eq!(detect_format("letter.docx"), Some(FormatKey::Docx));
        assert_eq!(detect_format("slides.ppt"), Some(FormatKey::Pptx));
        assert_eq!(detect_format("slides.pptx"), Some(FormatKey::Pptx));
        assert_eq!(detect_format("sheet.xls"), Some(FormatKey::Xlsx));
        assert_eq!(detect_format("sheet.xlsx"), Some(FormatKey::Xlsx));
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(detect_format("x.PDF"), Some(FormatKey::Pdf));
        assert_eq!(detect_format("x.DocX"), Some(FormatKey::Docx));
        assert_eq!(detect_format("ARCHIVE.XLSX"), Some(FormatKey::Xlsx));
    }

    #[test]
    fn detection_rejects_everything_else() {
        assert_eq!(detect_format("x.txt"), None);
        assert_eq!(detect_format("x.pdf.gz"), None);
        assert_eq!(detect_format("no_extension"), None);
        assert_eq!(detect_format(""), None);
    }

    #[test]
    fn targets_exclude_source_and_keep_order() {
        for source in FormatKey::ALL {
            let targets = conversion_targets(source);
            assert_eq!(targets.len(), 3, "{source} should have 3 targets");
            assert!(!targets.contains(&source));
        }
        assert_eq!(
            conversion_targets(FormatKey::Docx),
            vec![FormatKey::Pdf, FormatKey::Pptx, FormatKey::Xlsx]
        );
    }

    #[test]
    fn output_filename_replaces_extension() {
        assert_eq!(converted_filename("slides.pptx", FormatKey::Pdf), "slides.pdf");
        assert_eq!(converted_filename("a.b.docx", FormatKey::Xlsx), "a.b.xlsx");
        assert_eq!(converted_filename("noext", FormatKey::Pdf), "noext.pdf");
        // A leading-dot name has no stem to preserve; the suffix is appended.
        assert_eq!(converted_filename(".hidden", FormatKey::Pdf), ".hidden.pdf");
    }

    #[test]
    fn key_name_round_trip() {
        for key in FormatKey::ALL {
            assert_eq!(key.as_str().parse::<FormatKey>().unwrap(), key);
        }
        assert!("doc".parse::<FormatKey>().is_err());
        assert!("md".parse::<FormatKey>().is_err());
    }
}
