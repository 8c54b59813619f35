use clap::Parser;
use crossword_layout::errors::GenerationError;
use crossword_layout::layout_config::LayoutConfig;
use crossword_layout::logging::init_logger;
use crossword_layout::puzzle::{generate_compact_layout, generate_layout, LatticeCell, Puzzle};
use crossword_layout::word_list::WordList;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// crossword_layout: Command-line crossword layout tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the word file, with one `word<TAB>hint[<TAB>flag]` entry per line. Words whose
    /// flag starts with B, O, T, or E are optional.
    word_path: String,

    /// Largest allowed width or height [default: unbounded]
    #[arg(long)]
    max_extent: Option<usize>,

    /// Search for the smallest square extent, starting from one based on the total letter count
    #[arg(long)]
    compact: bool,

    /// Number of independent search attempts
    #[arg(long, default_value_t = 4)]
    attempts: usize,

    /// Base seed for the attempts' tie-breaking
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Backtracks allowed in the first attempt
    #[arg(long, default_value_t = 500)]
    max_backtracks: usize,

    /// Wall-clock budget for the whole search, in milliseconds [default: none]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Stop early once a layout's density (filled cells / area) reaches this value
    #[arg(long)]
    quality_threshold: Option<f32>,

    /// Drop required words that can't be placed instead of failing
    #[arg(long)]
    relaxed: bool,

    /// Log each attempt's outcome
    #[arg(long)]
    debug: bool,
}

struct Error(String);

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0) // Print error unquoted
    }
}

impl From<GenerationError> for Error {
    fn from(error: GenerationError) -> Self {
        Error(error.display_detailed())
    }
}

fn render_lattice(puzzle: &Puzzle) -> String {
    puzzle
        .lattice
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    LatticeCell::Boundary => '#',
                    LatticeCell::Void => '.',
                    LatticeCell::Letter { letter, .. } => *letter,
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_logger(args.debug);

    if args
        .quality_threshold
        .is_some_and(|threshold| !(0.0..=1.0).contains(&threshold))
    {
        return Err(Error("Quality threshold must be between 0 and 1".into()));
    }

    let word_list = WordList::from_file(&args.word_path).map_err(|err| Error(err.to_string()))?;

    #[allow(clippy::comparison_chain)]
    if word_list.errors.len() == 1 {
        return Err(Error(word_list.errors[0].to_string()));
    } else if word_list.errors.len() > 1 {
        let mut full_error: String = "".into();
        for error in &word_list.errors {
            full_error.push_str(&format!("\n- {error}"));
        }
        return Err(Error(full_error));
    }

    let config = LayoutConfig {
        max_extent: args.max_extent,
        max_backtracks: args.max_backtracks,
        timeout: args.timeout_ms.map(Duration::from_millis),
        attempts: args.attempts,
        parallel: true,
        quality_threshold: args.quality_threshold,
        seed: args.seed,
        skip_unplaceable_required: args.relaxed,
        abort: None,
    };

    let puzzle = if args.compact {
        generate_compact_layout(&word_list.entries, &config)?
    } else {
        generate_layout(&word_list.entries, &config)?
    };

    println!("{}\n", render_lattice(&puzzle));

    println!("Across:");
    for word in puzzle.across() {
        println!("{:>3}. {} ({})", word.number, word.hint, word.text.chars().count());
    }

    println!("\nDown:");
    for word in puzzle.down() {
        println!("{:>3}. {} ({})", word.number, word.hint, word.text.chars().count());
    }

    if !puzzle.skipped.is_empty() {
        println!("\nSkipped:");
        for entry in &puzzle.skipped {
            println!("- {}", entry.text);
        }
    }

    for warning in &puzzle.warnings {
        eprintln!("warning: {}", warning.display_detailed());
    }

    Ok(())
}
