use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "slidedex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short = 'C',
        long = "directory",
        value_name = "DIR",
        help = "Run as if started in DIR"
    )]
    pub directory: Option<PathBuf>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Show debug output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Initialize a new slidedex.toml configuration")]
    Init,

    #[command(about = "Create a new presentation file")]
    New {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(long, default_value_t = 1, help = "Number of slides to start with")]
        slides: usize,

        #[arg(long, default_value = "blank", help = "Skeleton used for each slide")]
        skeleton: String,
    },

    #[command(about = "Compile stale slides and the whole presentation")]
    Compile {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(long, value_name = "N", help = "Compile only slide N (1-based)")]
        slide: Option<usize>,

        #[arg(long, help = "Do not halt the queue when a stage fails")]
        keep_going: bool,
    },

    #[command(about = "Show per-slide build state")]
    Status {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    #[command(about = "Insert a slide")]
    AddSlide {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(long, value_name = "N", help = "Insert after slide N (default: at the end)")]
        after: Option<usize>,

        #[arg(long, default_value = "blank", help = "Skeleton for the new slide")]
        skeleton: String,
    },

    #[command(about = "Delete a slide and its build files")]
    DeleteSlide {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(value_name = "N", help = "Slide number (1-based)")]
        index: usize,
    },

    #[command(about = "Move a range of slides")]
    MoveSlide {
        #[arg(help = "Presentation file")]
        file: PathBuf,

        #[arg(value_name = "FROM", help = "First slide to move (1-based)")]
        from: usize,

        #[arg(value_name = "TO", help = "Position of the first moved slide afterwards (1-based)")]
        to: usize,

        #[arg(long, default_value_t = 1, help = "Number of slides to move")]
        count: usize,
    },

    #[command(about = "Remove every build file belonging to the presentation")]
    Clean {
        #[arg(help = "Presentation file")]
        file: PathBuf,
    },

    #[command(about = "List available slide skeletons")]
    Skeletons,
}

impl Commands {
    pub fn file(&self) -> Option<&std::path::Path> {
        match self {
            Commands::New { file, .. }
            | Commands::Compile { file, .. }
            | Commands::Status { file, .. }
            | Commands::AddSlide { file, .. }
            | Commands::DeleteSlide { file, .. }
            | Commands::MoveSlide { file, .. }
            | Commands::Clean { file } => Some(file.as_path()),
            Commands::Init | Commands::Skeletons => None,
        }
    }
}

impl Cli {
    pub fn working_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn resolve(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory().join(path)
        }
    }
}
