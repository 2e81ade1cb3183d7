//! Text extraction from stored uploads, chosen by file extension.
use async_trait::async_trait;
use log::*;
use quick_xml::events::Event;
use quick_xml::Reader;
use review_ai::traits::extraction::Extractor;
use review_ai::Error as AiError;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Format {
    Pdf,
    Text,
    Docx,
    Odt,
}

impl Format {
    fn detect(path: &Path, content_type: &str) -> Result<Self, AiError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match (extension.as_deref(), content_type) {
            (Some("pdf"), _) | (_, "application/pdf") => Ok(Format::Pdf),
            (Some("txt"), _) | (_, "text/plain") => Ok(Format::Text),
            (Some("docx"), _)
            | (_, "application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
                Ok(Format::Docx)
            }
            (Some("odt"), _) | (_, "application/vnd.oasis.opendocument.text") => Ok(Format::Odt),
            _ => Err(AiError::UnsupportedFormat(format!(
                "{} ({content_type})",
                path.display()
            ))),
        }
    }
}

/// Reads PDF, plain text, DOCX and ODT files from local storage. Legacy `.doc`
/// files and scanned images are not supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalExtractor;

#[async_trait]
impl Extractor for LocalExtractor {
    async fn extract_text(&self, path: &Path, content_type: &str) -> Result<String, AiError> {
        let format = Format::detect(path, content_type)?;
        let owned: PathBuf = path.to_path_buf();

        let text = tokio::task::spawn_blocking(move || read(&owned, format))
            .await
            .map_err(|e| AiError::Other(Box::new(e)))??;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AiError::NoTextExtracted(path.display().to_string()));
        }
        debug!(
            "Extracted {} characters from {} as {format:?}",
            text.len(),
            path.display()
        );
        Ok(text)
    }
}

fn read(path: &Path, format: Format) -> Result<String, AiError> {
    match format {
        Format::Text => std::fs::read_to_string(path).map_err(io_error),
        Format::Pdf => pdf_extract::extract_text(path).map_err(|e| {
            warn!("Failed to read PDF {}: {e:?}", path.display());
            AiError::NoTextExtracted(format!("{}: {e:?}", path.display()))
        }),
        Format::Docx => {
            let xml = archive_entry(path, "word/document.xml")?;
            xml_text(&xml, b"w:t", &[b"w:p".as_slice()], &[b"w:tab".as_slice()])
        }
        Format::Odt => {
            let xml = archive_entry(path, "content.xml")?;
            xml_text(
                &xml,
                b"",
                &[b"text:p".as_slice(), b"text:h"],
                &[b"text:tab".as_slice(), b"text:s"],
            )
        }
    }
}

fn archive_entry(path: &Path, entry: &str) -> Result<String, AiError> {
    let file = std::fs::File::open(path).map_err(io_error)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        AiError::NoTextExtracted(format!("{} is not a valid archive: {e}", path.display()))
    })?;
    let mut xml = String::new();
    archive
        .by_name(entry)
        .map_err(|e| AiError::NoTextExtracted(format!("{}: {entry}: {e}", path.display())))?
        .read_to_string(&mut xml)
        .map_err(io_error)?;
    Ok(xml)
}

/// Collects the character data of an office XML body. With a non-empty
/// `text_tag` only text inside that element counts; `breaks` end a line and
/// `spaces` insert a blank.
fn xml_text(
    xml: &str,
    text_tag: &[u8],
    breaks: &[&[u8]],
    spaces: &[&[u8]],
) -> Result<String, AiError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut inside = text_tag.is_empty();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == text_tag => inside = true,
            Ok(Event::End(e)) if e.name().as_ref() == text_tag => inside = false,
            Ok(Event::End(e)) if breaks.contains(&e.name().as_ref()) => text.push('\n'),
            Ok(Event::Empty(e)) if breaks.contains(&e.name().as_ref()) => text.push('\n'),
            Ok(Event::Empty(e)) if spaces.contains(&e.name().as_ref()) => text.push(' '),
            Ok(Event::Text(e)) if inside => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| AiError::NoTextExtracted(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AiError::NoTextExtracted(format!(
                    "malformed document XML at {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }
    Ok(text)
}

fn io_error(e: std::io::Error) -> AiError {
    AiError::Other(Box::new(e))
}
