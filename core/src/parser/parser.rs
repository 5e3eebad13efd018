use super::entry::{LogComponent, LogEntry, LogLevel};
use once_cell::sync::Lazy;
use regex::Regex;

static LATEX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^! LaTeX Error: (.+)$").unwrap());
static TEX_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^! (.+)$").unwrap());
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^l\.(\d+)\s?(.*)$").unwrap());
static LATEX_WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:LaTeX|Package \w+) Warning: (.+?)(?: on input line (\d+))?\.?$").unwrap()
});
static BOX_WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:Overfull|Underfull) \\[hv]box .*?)(?: (?:at|in paragraph at) lines (\d+)--\d+)?$")
        .unwrap()
});
static OUTPUT_WRITTEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Output written on (.+?) \((.+)\)\.?$").unwrap());
static GHOSTSCRIPT_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Error: (.+)$").unwrap());
static DVIPS_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^dvips: (.+)$").unwrap());
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

// Classifies stage output lines into log entries.
// The queue never looks at these; they only feed the console.
#[derive(Clone)]
pub struct TexOutputParser {
    component: LogComponent,
    source: Option<String>,
    log_index: usize,
}

impl TexOutputParser {
    pub fn new(component: LogComponent) -> Self {
        Self {
            component,
            source: None,
            log_index: 0,
        }
    }

    pub fn for_program(program: &str) -> Self {
        let name = std::path::Path::new(program)
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let component = if name.ends_with("tex") {
            LogComponent::Typesetter
        } else {
            LogComponent::Converter
        };
        Self::new(component)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn parse_line(&mut self, line: &str) -> LogEntry {
        let stripped = strip_ansi(line);
        let index = self.log_index;
        self.log_index += 1;

        if let Some(caps) = LATEX_ERROR.captures(&stripped) {
            return self.entry(LogLevel::Error, &caps[1], line, index);
        }

        if let Some(caps) = TEX_ERROR.captures(&stripped) {
            return self.entry(LogLevel::Error, &caps[1], line, index);
        }

        if let Some(caps) = ERROR_LINE.captures(&stripped) {
            let line_number = caps.get(1).and_then(|m| m.as_str().parse().ok());
            return self
                .entry(LogLevel::Error, caps[2].trim(), line, index)
                .with_location(self.source.clone(), line_number);
        }

        if let Some(caps) = LATEX_WARNING.captures(&stripped) {
            let line_number = caps.get(2).and_then(|m| m.as_str().parse().ok());
            return self
                .entry(LogLevel::Warning, &caps[1], line, index)
                .with_location(self.source.clone(), line_number);
        }

        if let Some(caps) = BOX_WARNING.captures(&stripped) {
            let line_number = caps.get(2).and_then(|m| m.as_str().parse().ok());
            return self
                .entry(LogLevel::Warning, &caps[1], line, index)
                .with_location(self.source.clone(), line_number);
        }

        if let Some(caps) = OUTPUT_WRITTEN.captures(&stripped) {
            let message = format!("wrote {} ({})", &caps[1], &caps[2]);
            return self.entry(LogLevel::Info, &message, line, index);
        }

        if let Some(caps) = GHOSTSCRIPT_ERROR.captures(&stripped) {
            return self.entry(LogLevel::Error, &caps[1], line, index);
        }

        if let Some(caps) = DVIPS_ERROR.captures(&stripped) {
            return self.entry(LogLevel::Warning, &caps[1], line, index);
        }

        LogEntry::new(
            LogLevel::Debug,
            stripped,
            line.to_string(),
            self.component.clone(),
            index,
        )
    }

    pub fn reset(&mut self) {
        self.log_index = 0;
    }

    fn entry(&self, level: LogLevel, message: &str, raw: &str, index: usize) -> LogEntry {
        LogEntry::new(
            level,
            message.to_string(),
            raw.to_string(),
            self.component.clone(),
            index,
        )
    }
}

fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latex_error_parsing() {
        let mut parser = TexOutputParser::for_program("latex");
        let entry = parser.parse_line("! LaTeX Error: Environment fram undefined.");

        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.component, LogComponent::Typesetter);
        assert_eq!(entry.message, "Environment fram undefined.");
    }

    #[test]
    fn test_error_line_location() {
        let mut parser = TexOutputParser::for_program("/usr/bin/pdflatex").with_source("ztmpab12.tex");
        let entry = parser.parse_line("l.14 \\foo");

        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.line_number, Some(14));
        assert_eq!(entry.file_path, Some("ztmpab12.tex".to_string()));
        assert_eq!(entry.message, "\\foo");
    }

    #[test]
    fn test_warning_with_input_line() {
        let mut parser = TexOutputParser::for_program("latex");
        let entry =
            parser.parse_line("LaTeX Warning: Reference `fig' on page 1 undefined on input line 7.");

        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.line_number, Some(7));
        assert_eq!(entry.message, "Reference `fig' on page 1 undefined");
    }

    #[test]
    fn test_overfull_box() {
        let mut parser = TexOutputParser::for_program("latex");
        let entry = parser.parse_line("Overfull \\hbox (12.0pt too wide) in paragraph at lines 3--5");

        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.line_number, Some(3));
    }

    #[test]
    fn test_converter_component_and_fallthrough() {
        let mut parser = TexOutputParser::for_program("ps2pdf");
        let entry = parser.parse_line("some chatter");

        assert_eq!(entry.level, LogLevel::Debug);
        assert_eq!(entry.component, LogComponent::Converter);
        assert_eq!(entry.index, 0);
        assert_eq!(parser.parse_line("Error: /undefined in foo").level, LogLevel::Error);
    }

    #[test]
    fn test_ansi_stripping() {
        let ansi_str = "\x1b[31mError:\x1b[0m Something went wrong";
        let stripped = strip_ansi(ansi_str);
        assert_eq!(stripped, "Error: Something went wrong");
    }
}
