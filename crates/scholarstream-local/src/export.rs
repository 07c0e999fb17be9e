//! Chat transcript export: Markdown, wrapped plain text, or PDF.
//!
//! PDF rendering goes through `genpdf`, which needs a TrueType family on disk
//! (`<Name>-Regular.ttf`, `-Bold`, `-Italic`, `-BoldItalic`). We look in
//! `SCHOLARSTREAM_FONT_DIR` first and then in the usual system font dirs.

use crate::config::env;
use genpdf::elements::{Break, Paragraph};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Document, PaperSize, SimplePageDecorator};
use scholarstream_core::{Error, Result, Role, Transcript};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_TEXT_WIDTH: usize = 80;
pub const DEFAULT_FONT_NAME: &str = "LiberationSans";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Text,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }

    /// Guess from a file extension (`.md`, `.txt`, `.pdf`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ext.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "text" | "txt" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            other => Err(Error::InvalidInput(format!(
                "unknown export format {other:?} (allowed: markdown, text, pdf)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FontSource {
    pub dir: Option<PathBuf>,
    pub name: String,
}

impl Default for FontSource {
    fn default() -> Self {
        Self {
            dir: None,
            name: DEFAULT_FONT_NAME.to_string(),
        }
    }
}

impl FontSource {
    pub fn from_env() -> Self {
        Self {
            dir: env("SCHOLARSTREAM_FONT_DIR").map(PathBuf::from),
            name: env("SCHOLARSTREAM_FONT_NAME").unwrap_or_else(|| DEFAULT_FONT_NAME.to_string()),
        }
    }

    /// Directories searched, in order. An explicit dir is never skipped.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Some(d) = &self.dir {
            out.push(d.clone());
        }
        if let Some(d) = dirs::font_dir() {
            out.push(d);
        }
        for d in [
            "/usr/share/fonts/truetype/liberation",
            "/usr/share/fonts/liberation",
            "/usr/share/fonts/TTF",
            "/System/Library/Fonts",
            "/Library/Fonts",
        ] {
            out.push(PathBuf::from(d));
        }
        out
    }

    fn load(&self) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>> {
        for dir in self.candidates() {
            match genpdf::fonts::from_files(&dir, &self.name, None) {
                Ok(f) => return Ok(f),
                Err(e) => tracing::debug!(dir = %dir.display(), error = %e, "font family not found"),
            }
        }
        Err(Error::Export(format!(
            "no TrueType family {:?} found; set SCHOLARSTREAM_FONT_DIR",
            self.name
        )))
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub text_width: usize,
    pub fonts: FontSource,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            text_width: DEFAULT_TEXT_WIDTH,
            fonts: FontSource::default(),
        }
    }
}

pub fn render_markdown(t: &Transcript) -> String {
    let mut out = String::from("# Chat history\n");
    for e in t.iter() {
        out.push_str(&format!("\n**{}**\n\n", e.role.label()));
        let body = e.text.lines().collect::<Vec<_>>().join("  \n");
        out.push_str(&body);
        out.push('\n');
    }
    out
}

pub fn render_text(t: &Transcript, width: usize) -> String {
    let width = width.max(20);
    let mut out = String::new();
    for (i, e) in t.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(e.role.label());
        out.push('\n');
        for line in e.text.lines() {
            if line.trim().is_empty() {
                out.push('\n');
                continue;
            }
            for w in textwrap::wrap(line, width) {
                out.push_str(&w);
                out.push('\n');
            }
        }
    }
    out
}

fn entry_style(role: Role) -> Style {
    match role {
        Role::User => Style::new().with_color(Color::Greyscale(30)),
        Role::Assistant => Style::new().with_color(Color::Greyscale(60)),
    }
}

pub fn write_pdf(t: &Transcript, fonts: &FontSource, path: &Path) -> Result<()> {
    let family = fonts.load()?;
    let mut doc = Document::new(family);
    doc.set_title("Chat history");
    doc.set_paper_size(PaperSize::A4);
    doc.set_font_size(12);
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    for e in t.iter() {
        doc.push(Paragraph::new(StyledString::new(
            e.role.label().to_string(),
            entry_style(e.role).bold(),
        )));
        for line in e.text.lines() {
            if line.trim().is_empty() {
                doc.push(Break::new(1));
            } else {
                doc.push(Paragraph::new(StyledString::new(
                    line.to_string(),
                    entry_style(e.role),
                )));
            }
        }
        doc.push(Break::new(1));
    }

    doc.render_to_file(path)
        .map_err(|e| Error::Export(format!("render pdf: {e}")))
}

pub fn export_transcript(
    t: &Transcript,
    format: ExportFormat,
    path: &Path,
    opts: &ExportOptions,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match format {
        ExportFormat::Markdown => std::fs::write(path, render_markdown(t))?,
        ExportFormat::Text => std::fs::write(path, render_text(t, opts.text_width))?,
        ExportFormat::Pdf => write_pdf(t, &opts.fonts, path)?,
    }
    tracing::info!(path = %path.display(), format = %format, entries = t.len(), "transcript exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        let mut t = Transcript::new();
        t.push_user("What is new in protein folding?");
        t.push_assistant("Quite a lot.<br />AlphaFold changed the field, and follow-up work extends it to complexes and dynamics.");
        t
    }

    #[test]
    fn markdown_labels_and_line_breaks() {
        let md = render_markdown(&sample());
        assert!(md.starts_with("# Chat history\n"));
        assert!(md.contains("**You:**\n\nWhat is new in protein folding?\n"));
        assert!(md.contains("**AI Assistant:**\n\nQuite a lot.  \nAlphaFold"));
    }

    #[test]
    fn text_is_wrapped_to_width() {
        let txt = render_text(&sample(), 30);
        assert!(txt.starts_with("You:\n"));
        assert!(txt.contains("\nAI Assistant:\nQuite a lot.\n"));
        assert!(txt.lines().all(|l| l.chars().count() <= 30), "{txt}");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(
            ExportFormat::from_path(Path::new("out/chat_history.pdf")),
            Some(ExportFormat::Pdf)
        );
        assert_eq!(ExportFormat::from_path(Path::new("chat")), None);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn export_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/chat.txt");
        export_transcript(&sample(), ExportFormat::Text, &path, &ExportOptions::default())
            .unwrap();
        let s = std::fs::read_to_string(&path).unwrap();
        assert!(s.contains("AI Assistant:"));
    }

    #[test]
    fn pdf_without_fonts_is_an_export_error() {
        let tmp = tempfile::tempdir().unwrap();
        let fonts = FontSource {
            dir: Some(tmp.path().to_path_buf()),
            name: "NoSuchFamilyForScholarstreamTests".to_string(),
        };
        let err = write_pdf(&sample(), &fonts, &tmp.path().join("chat.pdf")).unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }
}
