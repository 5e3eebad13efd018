// Flat text format: `header SEP slide SEP slide ... SEP footer`.
// Every slide segment written here starts with a `%%SLIDEDEX-BASENAME` line,
// followed by the slide's basename once it has one. Segments without that
// line come from older files and are taken verbatim.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BuildError, BuildResult};

use super::{Document, Slide};

pub const SEPARATOR: &str = "\n%%SLIDEEDIT%%\n";
pub const BASENAME_MARKER: &str = "%%SLIDEDEX-BASENAME";

static BASENAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%SLIDEDEX-BASENAME(?: ([0-9A-Za-z_]+))?$").unwrap());

pub fn parse(text: &str) -> BuildResult<Document> {
    let segments: Vec<&str> = text.split(SEPARATOR).collect();
    if segments.len() < 2 {
        return Err(BuildError::DocumentFormat(
            "expected at least a header and a footer segment".to_string(),
        ));
    }

    let header = segments[0].to_string();
    let footer = segments[segments.len() - 1].to_string();
    let mut document = Document::new(header, footer);

    for segment in &segments[1..segments.len() - 1] {
        let (basename, content) = split_basename(segment);
        document.push_loaded_slide(Slide::with_basename(content.to_string(), basename));
    }

    Ok(document)
}

pub fn write(document: &Document) -> String {
    let mut out = String::from(document.header().content());

    for slide in document.slides().iter() {
        out.push_str(SEPARATOR);
        out.push_str(BASENAME_MARKER);
        if let Some(basename) = slide.entity().basename() {
            out.push(' ');
            out.push_str(basename);
        }
        out.push('\n');
        out.push_str(slide.content());
    }

    out.push_str(SEPARATOR);
    out.push_str(document.footer().content());
    out
}

fn split_basename(segment: &str) -> (Option<String>, &str) {
    let (first, rest) = match segment.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (segment, ""),
    };

    match BASENAME_LINE.captures(first) {
        Some(caps) => (caps.get(1).map(|name| name.as_str().to_string()), rest),
        None => (None, segment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_format() {
        let text = format!("H{SEPARATOR}one{SEPARATOR}% ztmpnotes\ntwo{SEPARATOR}F");
        let doc = parse(&text).unwrap();

        assert_eq!(doc.header().content(), "H");
        assert_eq!(doc.footer().content(), "F");
        assert_eq!(doc.slides().len(), 2);
        assert_eq!(doc.slides().get(1).unwrap().content(), "% ztmpnotes\ntwo");
        assert!(doc.slides().iter().all(|s| s.entity().basename().is_none()));
        assert!(!doc.order_changed());
    }

    #[test]
    fn test_parse_stored_basenames() {
        let text = format!(
            "H{SEPARATOR}{BASENAME_MARKER} ztmpab_12\nbody{SEPARATOR}{BASENAME_MARKER}\n{SEPARATOR}F"
        );
        let doc = parse(&text).unwrap();

        let first = doc.slides().get(0).unwrap();
        assert_eq!(first.entity().basename(), Some("ztmpab_12"));
        assert_eq!(first.content(), "body");

        let second = doc.slides().get(1).unwrap();
        assert_eq!(second.entity().basename(), None);
        assert_eq!(second.content(), "");
    }

    #[test]
    fn test_comment_that_looks_like_a_basename_survives_reload() {
        let mut doc = Document::new("H".to_string(), "F".to_string());
        let content = "% ztmpnotes\n\\begin{frame}x\\end{frame}";
        doc.append_slide(content.to_string());

        let reloaded = parse(&write(&doc)).unwrap();
        let slide = reloaded.slides().get(0).unwrap();

        assert_eq!(slide.content(), content);
        assert_eq!(slide.entity().basename(), None);
    }

    #[test]
    fn test_write_then_parse_keeps_basenames() {
        let text = format!(
            "H{SEPARATOR}{BASENAME_MARKER} ztmpab\nbody{SEPARATOR}{BASENAME_MARKER}\nplain{SEPARATOR}F"
        );
        let doc = parse(&text).unwrap();
        assert_eq!(write(&doc), text);
    }

    #[test]
    fn test_legacy_file_is_upgraded_on_write() {
        let doc = parse(&format!("H{SEPARATOR}plain{SEPARATOR}F")).unwrap();
        assert_eq!(
            write(&doc),
            format!("H{SEPARATOR}{BASENAME_MARKER}\nplain{SEPARATOR}F")
        );
    }

    #[test]
    fn test_no_slides_is_valid() {
        let doc = parse(&format!("H{SEPARATOR}F")).unwrap();
        assert!(doc.slides().is_empty());
    }

    #[test]
    fn test_missing_separator_is_error() {
        assert!(matches!(
            parse("just some text"),
            Err(BuildError::DocumentFormat(_))
        ));
    }
}
