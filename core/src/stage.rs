use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    program: String,
    arguments: Vec<String>,
    working_directory: PathBuf,
}

impl Stage {
    pub fn new(
        program: impl Into<String>,
        arguments: Vec<String>,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            arguments,
            working_directory: working_directory.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.arguments.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.arguments {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        let stage = Stage::new("dvips", vec!["/tmp/talk".to_string()], "/tmp");
        assert_eq!(format!("{}", stage), "dvips /tmp/talk");
    }

    #[test]
    fn test_stage_argv() {
        let stage = Stage::new(
            "latex",
            vec!["-halt-on-error".to_string(), "/tmp/a".to_string()],
            "/tmp",
        );
        assert_eq!(stage.argv(), vec!["latex", "-halt-on-error", "/tmp/a"]);
        assert_eq!(stage.working_directory(), Path::new("/tmp"));
    }
}
