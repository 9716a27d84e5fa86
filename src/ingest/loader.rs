//! Folder loader: extracts raw text from PDF, Word, text, HTML and Markdown
//! files and tags every page with its file name and inferred domain.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

use crate::ingest::domain::infer_domain;
use crate::models::DocumentPage;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Text,
    Html,
    Markdown,
}

impl DocumentKind {
    /// Map a file name to its format using the text after the last `.`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" | "doc" => Some(DocumentKind::Word),
            "txt" => Some(DocumentKind::Text),
            "html" => Some(DocumentKind::Html),
            "md" => Some(DocumentKind::Markdown),
            _ => None,
        }
    }
}

/// A file that was not loaded, with the reason
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Everything loaded from one folder
#[derive(Debug, Default)]
pub struct LoadedFolder {
    pub pages: Vec<DocumentPage>,
    pub files_loaded: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Load every supported file directly inside `dir`.
///
/// Unsupported or unreadable files are logged and skipped; only a missing or
/// unreadable folder is an error.
pub fn load_folder(dir: &Path) -> Result<LoadedFolder> {
    if !dir.is_dir() {
        anyhow::bail!("Documents folder not found: {}", dir.display());
    }

    let mut loaded = LoadedFolder::default();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    tracing::info!("Found {} files in {}: {:?}", names.len(), dir.display(), names);

    for filename in names {
        let Some(kind) = DocumentKind::from_filename(&filename) else {
            tracing::warn!("Unsupported format, skipping {filename}");
            loaded.skipped.push(SkippedFile {
                filename,
                reason: "unsupported format".to_string(),
            });
            continue;
        };

        tracing::info!("Loading {filename} ({kind:?})");
        match load_file(&dir.join(&filename), kind) {
            Ok(sections) => {
                let domain = infer_domain(&filename);
                tracing::info!("Loaded {filename} with {} page(s)", sections.len());
                loaded.files_loaded += 1;
                loaded
                    .pages
                    .extend(sections.into_iter().map(|(page, text)| DocumentPage {
                        source: filename.clone(),
                        domain,
                        page,
                        text,
                    }));
            }
            Err(e) => {
                tracing::error!("Failed to load {filename}: {e:#}");
                loaded.skipped.push(SkippedFile {
                    filename,
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    tracing::info!("Loaded {} page(s) in total", loaded.pages.len());
    Ok(loaded)
}

/// Extract `(page, text)` sections from one file.
pub fn load_file(path: &Path, kind: DocumentKind) -> Result<Vec<(Option<usize>, String)>> {
    match kind {
        DocumentKind::Pdf => extract_pdf(path),
        DocumentKind::Word => Ok(vec![(None, extract_docx(path)?)]),
        DocumentKind::Text => Ok(vec![(None, read_lossy(path)?)]),
        DocumentKind::Html => {
            let html = read_lossy(path)?;
            Ok(vec![(None, html_to_text(&html))])
        }
        DocumentKind::Markdown => {
            let md = read_lossy(path)?;
            Ok(vec![(None, markdown_to_text(&md))])
        }
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ─── PDF ─────────────────────────────────────────────────

fn extract_pdf(path: &Path) -> Result<Vec<(Option<usize>, String)>> {
    let document = lopdf::Document::load(path)
        .with_context(|| format!("Failed to parse PDF {}", path.display()))?;

    let results = document
        .get_pages()
        .keys()
        .map(|&page_number| (page_number, document.extract_text(&[page_number])))
        .collect::<Vec<_>>();
    Ok(collect_pdf_pages(path, results))
}

/// Keep every readable page. Pages whose text cannot be decoded are logged
/// and kept empty so page numbers still line up.
fn collect_pdf_pages<E: std::fmt::Display>(
    path: &Path,
    results: Vec<(u32, std::result::Result<String, E>)>,
) -> Vec<(Option<usize>, String)> {
    results
        .into_iter()
        .map(|(page_number, result)| {
            let text = result.unwrap_or_else(|e| {
                tracing::warn!(
                    "Skipping unreadable page {page_number} of {}: {e}",
                    path.display()
                );
                String::new()
            });
            (Some(page_number as usize), text)
        })
        .collect()
}

// ─── Word ────────────────────────────────────────────────

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .context("Not an OOXML Word document (legacy .doc files are not supported)")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("Word document has no word/document.xml")?
        .read_to_string(&mut xml)?;
    docx_xml_to_text(&xml)
}

/// Extract plain text from a `word/document.xml` body: one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> Result<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("Malformed document.xml")? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

// ─── HTML ────────────────────────────────────────────────

/// Visible text of an HTML document, one line per text node.
pub fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "head" | "title"));
        if hidden {
            continue;
        }
        let line = normalize_ws(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ─── Markdown ────────────────────────────────────────────

/// Render Markdown to plain text with block elements separated by blank lines.
pub fn markdown_to_text(md: &str) -> String {
    use pulldown_cmark::{Event, Parser, TagEnd};

    let mut out = String::new();
    for event in Parser::new(md) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                out.push_str("\n\n")
            }
            Event::End(TagEnd::Item) => out.push('\n'),
            _ => {}
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::domain::Domain;

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("a.doc"), Some(DocumentKind::Word));
        assert_eq!(DocumentKind::from_filename("a.docx"), Some(DocumentKind::Word));
        assert_eq!(DocumentKind::from_filename("notes.v2.md"), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_filename("page.html"), Some(DocumentKind::Html));
        assert_eq!(DocumentKind::from_filename("data.csv"), None);
        assert_eq!(DocumentKind::from_filename("Makefile"), None);
    }

    #[test]
    fn test_unreadable_pdf_page_kept_empty() {
        let results = vec![
            (1, Ok("Page une".to_string())),
            (2, Err("unsupported font encoding")),
            (3, Ok("Page trois".to_string())),
        ];
        let pages = collect_pdf_pages(Path::new("rapport.pdf"), results);
        assert_eq!(
            pages,
            vec![
                (Some(1), "Page une".to_string()),
                (Some(2), String::new()),
                (Some(3), "Page trois".to_string()),
            ]
        );
    }

    #[test]
    fn test_docx_xml_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Premier</w:t></w:r><w:r><w:t xml:space="preserve"> paragraphe</w:t></w:r></w:p>
            <w:p><w:r><w:t>A &amp; B</w:t><w:tab/><w:t>col</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = docx_xml_to_text(xml).unwrap();
        assert_eq!(text, "Premier paragraphe\nA & B\tcol\n");
    }

    #[test]
    fn test_html_skips_scripts_and_styles() {
        let html = "<html><head><title>T</title><style>p{}</style></head>\
                    <body><h1>Titre</h1><p>Corps   du\n texte</p><script>var x=1;</script></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "Titre\nCorps du texte");
    }

    #[test]
    fn test_markdown_strips_markup() {
        let md = "# Heading\n\nSome **bold** and `code`.\n\n- one\n- two\n";
        let text = markdown_to_text(md);
        assert!(text.starts_with("Heading\n\nSome bold and code."));
        assert!(text.contains("one\ntwo"));
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
    }

    #[test]
    fn test_load_folder_tags_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("budget_2024.txt"), "Le budget annuel.").unwrap();
        std::fs::write(dir.path().join("guide.md"), "# Guide\n\nTexte.").unwrap();
        std::fs::write(dir.path().join("table.csv"), "a,b").unwrap();
        std::fs::write(dir.path().join("broken.docx"), "not a zip").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();

        let loaded = load_folder(dir.path()).unwrap();
        assert_eq!(loaded.files_loaded, 2);
        assert_eq!(loaded.pages.len(), 2);

        let budget = loaded.pages.iter().find(|p| p.source == "budget_2024.txt").unwrap();
        assert_eq!(budget.domain, Domain::Finance);
        assert_eq!(budget.text, "Le budget annuel.");
        assert!(budget.page.is_none());

        let skipped: Vec<&str> = loaded.skipped.iter().map(|s| s.filename.as_str()).collect();
        assert!(skipped.contains(&"table.csv"));
        assert!(skipped.contains(&"broken.docx"));
        assert!(!skipped.contains(&".hidden.txt"));
    }

    #[test]
    fn test_load_folder_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_folder(&dir.path().join("nope")).is_err());
    }
}
