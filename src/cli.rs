use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::error::ErrorKind;
use crate::pak::archive::is_http_url;

#[derive(Parser, Debug)]
#[command(name = "expak")]
#[command(version)]
#[command(about = "Extract resources from Quake-style pak files", long_about = None)]
#[command(after_help = "Arguments ending in .pak (or http/https URLs) are archives; \
  later archives override earlier ones.\nAny other argument names a resource to extract.\n\n\
Examples:\n  \
  expak pak0.pak pak1.pak                  extract everything from both paks\n  \
  expak pak1.pak sound/misc/basekey.wav    extract one resource\n  \
  expak -l pak0.pak --prefix maps/         list the maps in pak0.pak\n  \
  expak -p pak0.pak default.cfg | more     send a resource into more")]
pub struct Cli {
    /// Pak files and resource names, in any order
    #[arg(value_name = "PAK|RESOURCE", required = true)]
    pub args: Vec<String>,

    /// List resources (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely: length, offset and owning pak
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Only list resources whose name starts with this prefix
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Extract resources to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract resources into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub extract_dir: String,

    /// Exclude resources that follow
    #[arg(short = 'x', value_name = "RESOURCE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// Arguments naming archives, in command-line order
    pub fn sources(&self) -> Vec<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|a| is_pak_source(a))
            .collect()
    }

    /// Arguments naming resources
    pub fn resources(&self) -> Vec<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .filter(|a| !is_pak_source(a))
            .collect()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn should_overwrite(&self) -> bool {
        self.overwrite && !self.never_overwrite
    }

    /// Default log level when `RUST_LOG` is unset
    pub fn log_level(&self) -> LevelFilter {
        match self.quiet {
            0 => LevelFilter::INFO,
            1 => LevelFilter::ERROR,
            _ => LevelFilter::OFF,
        }
    }
}

/// Whether a command-line argument names an archive rather than a resource.
pub fn is_pak_source(arg: &str) -> bool {
    is_http_url(arg) || arg.to_ascii_lowercase().ends_with(".pak")
}

/// Process exit status for each error kind. Clap itself exits with 2 on
/// usage errors.
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Format => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::Io => 5,
        ErrorKind::State => 6,
    }
}

/// Check if a pattern contains glob wildcard characters.
pub fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters, including `/`
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Whether `name` is excluded by one of the `-x` patterns.
pub fn is_excluded(excludes: &[String], name: &str) -> bool {
    excludes
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sources_and_resources() {
        let cli = Cli::parse_from([
            "expak",
            "id1/PAK0.PAK",
            "maps/e1m1.bsp",
            "https://example.com/pak1.pak",
            "sound/misc/basekey.wav",
        ]);
        assert_eq!(
            cli.sources(),
            vec!["id1/PAK0.PAK", "https://example.com/pak1.pak"]
        );
        assert_eq!(
            cli.resources(),
            vec!["maps/e1m1.bsp", "sound/misc/basekey.wav"]
        );
        assert_eq!(cli.extract_dir, ".");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["expak", "-qq", "-o", "-n", "pak0.pak"]);
        assert!(cli.is_quiet());
        assert!(cli.is_very_quiet());
        assert!(!cli.should_overwrite());
        assert_eq!(cli.log_level(), LevelFilter::OFF);

        let cli = Cli::parse_from(["expak", "-p", "pak0.pak", "default.cfg"]);
        assert!(cli.is_quiet());
        assert_eq!(cli.log_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            exit_code(ErrorKind::Format),
            exit_code(ErrorKind::NotFound),
            exit_code(ErrorKind::Io),
            exit_code(ErrorKind::State),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(*a > 2);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.wav", "sound/misc/basekey.wav"));
        assert!(glob_match("maps/e?m1.bsp", "maps/e1m1.bsp"));
        assert!(!glob_match("*.wav", "progs.dat"));
        assert!(has_glob_chars("maps/*"));
        assert!(!has_glob_chars("maps/e1m1.bsp"));
    }

    #[test]
    fn test_is_excluded() {
        let excludes = vec!["sound/".to_string(), "*.lmp".to_string()];
        assert!(is_excluded(&excludes, "sound/misc/basekey.wav"));
        assert!(is_excluded(&excludes, "gfx/palette.lmp"));
        assert!(!is_excluded(&excludes, "maps/e1m1.bsp"));
    }
}
