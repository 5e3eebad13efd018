use std::path::Path;

use crate::error::{BuildError, BuildResult};
use crate::stage::Stage;

pub const BASENAME_PLACEHOLDER: &str = "{fn}";

pub const DEFAULT_COMMAND: &str = "latex -halt-on-error {fn} ; dvips {fn} ; ps2pdf {fn}.ps";

// A parsed `cmd args ; cmd args ; ...` pipeline.
// Stages are split on `;` and then on whitespace; the basename
// placeholder is substituted per token, so a basename containing
// spaces stays a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    stages: Vec<Vec<String>>,
}

impl CommandTemplate {
    pub fn parse(raw: &str) -> BuildResult<Self> {
        if raw.trim().is_empty() {
            return Err(BuildError::Configuration("command template is empty".to_string()));
        }

        let mut stages = Vec::new();
        for (index, part) in raw.split(';').enumerate() {
            let tokens: Vec<String> = part.split_whitespace().map(str::to_string).collect();
            if tokens.is_empty() {
                return Err(BuildError::Configuration(format!(
                    "stage {} of `{}` has no program",
                    index + 1,
                    raw
                )));
            }
            if tokens[0].contains(BASENAME_PLACEHOLDER) {
                return Err(BuildError::Configuration(format!(
                    "stage {} of `{}` uses the basename placeholder as its program",
                    index + 1,
                    raw
                )));
            }
            stages.push(tokens);
        }

        Ok(Self {
            raw: raw.to_string(),
            stages,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    // Expands the template for `basename` (absolute, extension stripped).
    pub fn expand(&self, basename: &Path, working_directory: &Path) -> Vec<Stage> {
        let basename = basename.display().to_string();

        self.stages
            .iter()
            .map(|tokens| {
                let program = tokens[0].clone();
                let arguments = tokens[1..]
                    .iter()
                    .map(|token| token.replace(BASENAME_PLACEHOLDER, &basename))
                    .collect();
                Stage::new(program, arguments, working_directory)
            })
            .collect()
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_COMMAND).expect("default command template is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_expansion() {
        let template = CommandTemplate::default();
        let stages = template.expand(Path::new("/docs/ztmpab12"), Path::new("/docs"));

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].argv(), vec!["latex", "-halt-on-error", "/docs/ztmpab12"]);
        assert_eq!(stages[1].argv(), vec!["dvips", "/docs/ztmpab12"]);
        assert_eq!(stages[2].argv(), vec!["ps2pdf", "/docs/ztmpab12.ps"]);
        assert!(stages.iter().all(|s| s.working_directory() == Path::new("/docs")));
    }

    #[test]
    fn test_basename_with_spaces_stays_one_argument() {
        let template = CommandTemplate::parse("pdflatex {fn}").unwrap();
        let stages = template.expand(Path::new("/my docs/talk"), Path::new("/my docs"));

        assert_eq!(stages[0].arguments(), &["/my docs/talk".to_string()]);
    }

    #[test]
    fn test_empty_stage_is_configuration_error() {
        assert!(matches!(
            CommandTemplate::parse("latex {fn} ;; dvips {fn}"),
            Err(BuildError::Configuration(_))
        ));
        assert!(matches!(
            CommandTemplate::parse("   "),
            Err(BuildError::Configuration(_))
        ));
        assert!(matches!(
            CommandTemplate::parse("latex {fn} ;"),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_placeholder_as_program_rejected() {
        assert!(CommandTemplate::parse("{fn} --run").is_err());
    }
}
