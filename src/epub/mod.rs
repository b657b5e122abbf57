//! EPUB writer. Consumes a finished `Book` and writes one EPUB 3 package (mimetype,
//! container, OPF, nav, NCX, stylesheet, one XHTML page per chapter).

use crate::model::Book;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const STYLESHEET_HREF: &str = "style/nav.css";

const STYLESHEET: &str = r#"body { font-family: "Microsoft YaHei", sans-serif; font-size: 1em; line-height: 1.6; }
h1 { font-size: 1.8em; border-bottom: 1px solid #ccc; padding-bottom: 0.5em; }
"#;

/// Errors from the EPUB writer.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book author is empty.")]
    EmptyAuthor,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Cannot write EPUB: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Path the book will be written to inside `output_dir`: `<title>.epub`.
pub fn epub_path(output_dir: &Path, title: &str) -> PathBuf {
    output_dir.join(format!("{}.epub", file_stem(title)))
}

/// Write `book` to `<output_dir>/<title>.epub`, creating `output_dir` if needed.
/// Returns the absolute path of the written file. An existing file is overwritten.
pub fn write_epub(book: &Book, output_dir: &Path) -> Result<PathBuf, EpubError> {
    validate_book(book)?;

    std::fs::create_dir_all(output_dir).map_err(|e| EpubError::Io {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let path = epub_path(output_dir, &book.title);
    let file = std::fs::File::create(&path).map_err(|e| EpubError::CreateFile {
        path: path.clone(),
        source: e,
    })?;
    write_package(book, file)?;

    std::fs::canonicalize(&path).map_err(|e| EpubError::Io { path, source: e })
}

/// Write the EPUB archive for `book` into `writer` and return the writer.
///
/// Entry timestamps are fixed, so the same book always produces the same bytes.
pub fn write_package<W: Write + Seek>(book: &Book, writer: W) -> Result<W, EpubError> {
    validate_book(book)?;
    let mut zip = ZipWriter::new(writer);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    // Mimetype first, uncompressed (required by EPUB).
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(book, &mut zip, options_deflate)?;
    write_nav_xhtml(book, &mut zip, options_deflate)?;
    write_ncx(book, &mut zip, options_deflate)?;

    zip.start_file(
        format!("{}{}", OEBPS_PREFIX, STYLESHEET_HREF),
        options_deflate,
    )?;
    zip.write_all(STYLESHEET.as_bytes())?;

    write_chapters(book, &mut zip, options_deflate)?;

    Ok(zip.finish()?)
}

fn validate_book(book: &Book) -> Result<(), EpubError> {
    if book.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if book.author.trim().is_empty() {
        return Err(EpubError::EmptyAuthor);
    }
    if book.chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

/// File name stem from a book title: path separators and characters Windows rejects become
/// `_`. Non-ASCII titles are kept as-is.
fn file_stem(title: &str) -> String {
    let s: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let s = s.trim_matches('.').to_string();
    if s.is_empty() {
        "book".to_string()
    } else {
        s
    }
}

fn chapter_href(index: usize) -> String {
    format!("chap_{}.xhtml", index + 1)
}

fn identifier(book: &Book) -> String {
    match &book.source_url {
        Some(url) => url.clone(),
        None => format!("urn:novelscrape:{}", book.title),
    }
}

/// Primary language subtag for chapter pages (`zh-CN` -> `zh`).
fn page_language(book: &Book) -> &str {
    book.language.split('-').next().unwrap_or("en")
}

fn write_opf(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut manifest = String::from(
        r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="style_nav" href="style/nav.css" media-type="text/css"/>
"#,
    );
    for i in 0..book.chapters.len() {
        manifest.push_str(&format!(
            "    <item id=\"chapter_{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            i + 1,
            chapter_href(i)
        ));
    }

    // Reading order: navigation page first, then chapters in index order.
    let mut spine = String::from("    <itemref idref=\"nav\"/>\n");
    for i in 0..book.chapters.len() {
        spine.push_str(&format!("    <itemref idref=\"chapter_{}\"/>\n", i + 1));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <dc:language>{language}</dc:language>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        id = xml_escape(&identifier(book)),
        title = xml_escape(&book.title),
        creator = xml_escape(&book.author),
        language = xml_escape(&book.language),
        manifest = manifest,
        spine = spine,
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::new();
    for (i, ch) in book.chapters.iter().enumerate() {
        nav_links.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_href(i),
            xml_escape(&ch.title)
        ));
    }
    let lang = xml_escape(page_language(book));
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
        lang = lang,
        title = xml_escape(&book.title),
        css = STYLESHEET_HREF,
        links = nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    for (i, ch) in book.chapters.iter().enumerate() {
        nav_points.push_str(&format!(
            r#"    <navPoint id="navpoint-{n}" playOrder="{n}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{href}"/>
    </navPoint>
"#,
            n = i + 1,
            label = xml_escape(&ch.title),
            href = chapter_href(i)
        ));
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
        xml_escape(&identifier(book)),
        xml_escape(&book.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

fn write_chapters(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let lang = xml_escape(page_language(book));
    for (i, ch) in book.chapters.iter().enumerate() {
        let title = xml_escape(&ch.title);
        let html = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="{css}"/>
</head>
<body>
  <h1>{title}</h1>
  <p>{body}</p>
</body>
</html>
"#,
            lang = lang,
            title = title,
            css = STYLESHEET_HREF,
            body = paragraphs(&ch.body)
        );
        zip.start_file(format!("{}{}", OEBPS_PREFIX, chapter_href(i)), options)?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}

/// Escaped body text with each newline turned into a paragraph break. Blunt substitution:
/// callers wrap the result in one outer `<p>`.
fn paragraphs(body: &str) -> String {
    xml_escape(body).replace('\n', "</p><p>")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
