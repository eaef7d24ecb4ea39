use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use lexmine_core::audit::{false_positives, AuditMode, GroundTruth};
use lexmine_core::config::{DataPaths, EngineConfig};
use lexmine_core::core::tokenizer::TextMasker;
use lexmine_core::discovery::Candidate;
use lexmine_core::persistence::Store;
use lexmine_core::review::Reviewer;
use lexmine_core::{LexError, Lexicon, MiningEngine, Record, Result, TagClass, TermKey};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{stdin, stdout, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lexmine", about = "Grow a lexicon from the contexts its terms appear in")]
struct Cli {
    /// Directory holding records, lexicon, rejected set and statistics
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// JSON file overriding engine thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a JSON-lines file of {"id", "text"} objects into the record store
    Ingest { input: PathBuf },
    /// Build the lexicon from a text file with one entry per line
    Lexicon { input: PathBuf },
    /// Train the context model and save it with its position statistics
    Train,
    /// Print the top unlisted candidates
    Discover {
        #[arg(long, default_value_t = 50)]
        top: usize,
    },
    /// Add fuzzy variants of lexicon entries
    Fuzzy,
    /// Triage candidates in the terminal
    Review,
    /// Tag every record with the current lexicon
    Extract,
    /// Report false positives against the annotated records
    Audit {
        #[arg(long, default_value = "soft")]
        mode: AuditMode,
        /// Extra entry to test, space separated tokens; repeatable
        #[arg(long = "entry")]
        entries: Vec<String>,
    },
    /// Mark or unmark a position as a true match
    Annotate {
        #[arg(long)]
        record: String,
        #[arg(long)]
        line: usize,
        #[arg(long)]
        pos: usize,
        #[arg(long)]
        remove: bool,
    },
}

#[derive(Deserialize)]
struct RawRecord {
    id: String,
    text: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "[ERROR]".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let store = Store::new(DataPaths::new(&cli.data_dir));

    match cli.command {
        Commands::Ingest { input } => {
            let masker = TextMasker::new();
            let text = fs::read_to_string(&input).map_err(|e| LexError::io(&input, e))?;
            let mut records = Vec::new();
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                let raw: RawRecord = serde_json::from_str(line)?;
                records.push(masker.record(raw.id, &raw.text));
            }
            store.save_records(&records)?;
            println!("Ingested {} records into '{}'", records.len(), cli.data_dir.display());
        }
        Commands::Lexicon { input } => {
            let text = fs::read_to_string(&input).map_err(|e| LexError::io(&input, e))?;
            let lexicon = Lexicon::from_text(&text, &TextMasker::new());
            store.save_lexicon(&lexicon)?;
            println!("Saved lexicon with {} entries", lexicon.len());
        }
        Commands::Train => {
            let mut engine = MiningEngine::load_all(&store, config)?;
            let accepted = engine.train().accepted().len();
            engine.save_all(&store)?;
            println!("Accepted {} contexts", accepted);
        }
        Commands::Discover { top } => {
            let mut engine = MiningEngine::load_all(&store, config)?;
            for c in engine.discover().iter().take(top) {
                println!("{:>6}  {}", c.count, c.span.to_string().bold());
            }
        }
        Commands::Fuzzy => {
            let mut engine = MiningEngine::load_all(&store, config)?;
            let before = engine.lexicon.len();
            for m in engine.extend_fuzzy() {
                println!("{:.3}  {} -> {}", m.similarity, m.candidate.yellow(), m.target);
            }
            engine.save_all(&store)?;
            println!("Lexicon grew from {} to {} entries", before, engine.lexicon.len());
        }
        Commands::Review => {
            let mut engine = MiningEngine::load_all(&store, config)?;
            engine.discover();
            let accepted = engine.review(&mut TerminalReviewer { input: stdin().lock() });
            engine.save_all(&store)?;
            println!("Accepted {} candidates", accepted);
        }
        Commands::Extract => {
            let mut engine = MiningEngine::load_all(&store, config)?;
            engine.extract();
            print_tag_summary(&engine.records);
            engine.save_all(&store)?;
        }
        Commands::Audit { mode, entries } => {
            let records = store.load_records()?;
            let lexicon = store.load_lexicon()?;
            let stats = if store.paths().position_stats().exists() {
                Some(store.load_position_stats()?)
            } else {
                None
            };
            let truth = store.load_ground_truth()?;
            let extra = entries
                .iter()
                .map(|e| TermKey::parse(e))
                .collect::<Result<Vec<_>>>()?;
            let found = false_positives(
                &records,
                &lexicon,
                stats.as_ref(),
                &truth,
                &extra,
                mode,
                &config.extract,
            );
            for fp in &found {
                println!(
                    "{}  {} {:?}  [{}]",
                    fp.token.clone().red(),
                    fp.record,
                    fp.position,
                    fp.window.join(" ")
                );
            }
            println!("{} false positives", found.len());
        }
        Commands::Annotate {
            record,
            line,
            pos,
            remove,
        } => {
            let mut truth = if store.paths().ground_truth().exists() {
                store.load_ground_truth()?
            } else {
                GroundTruth::new()
            };
            if remove {
                truth.remove(&record, (line, pos));
            } else {
                truth.add(&record, (line, pos));
            }
            store.save_ground_truth(&truth)?;
        }
    }
    Ok(())
}

fn print_tag_summary(records: &[Record]) {
    let mut per_class: BTreeMap<TagClass, usize> = BTreeMap::new();
    for tag in records.iter().flat_map(|r| r.tags.values()) {
        *per_class.entry(tag.class).or_insert(0) += 1;
    }
    for (class, n) in per_class {
        println!("{:>10}: {}", class.to_string(), n);
    }
}

/// Reads decisions line by line: `3` accepts candidate 3, `3a` accepts it as
/// ambiguous, an empty line rejects the rest of the batch. `q` or end of
/// input stops the session without rejecting the unanswered batch.
struct TerminalReviewer<R> {
    input: R,
}

impl<R: BufRead> Reviewer for TerminalReviewer<R> {
    fn review_batch(&mut self, batch: &[Candidate]) -> Option<Vec<(TermKey, TagClass)>> {
        println!("\n{}", "Candidates (e.g. '1 4a 7', enter for none, q to stop)".bold());
        for (i, c) in batch.iter().enumerate() {
            println!("  {:>3}: {} ({})", i + 1, c.span.to_string().cyan(), c.count);
        }
        print!("> ");
        stdout().flush().ok()?;

        let mut input = String::new();
        if self.input.read_line(&mut input).ok()? == 0 {
            return None;
        }
        let input = input.trim();
        if input.eq_ignore_ascii_case("q") {
            return None;
        }
        Some(parse_decisions(input, batch))
    }
}

fn parse_decisions(input: &str, batch: &[Candidate]) -> Vec<(TermKey, TagClass)> {
    let mut decisions = Vec::new();
    for word in input.split_whitespace() {
        let (number, class) = match word.strip_suffix('a') {
            Some(n) => (n, TagClass::Ambiguous),
            None => (word, TagClass::Regular),
        };
        match number.parse::<usize>() {
            Ok(n) if (1..=batch.len()).contains(&n) => {
                decisions.push((batch[n - 1].span.clone(), class));
            }
            _ => println!("{} '{}'", "ignored".yellow(), word),
        }
    }
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexmine_core::core::context::Context;
    use lexmine_core::review::{ReviewParams, ReviewSession};
    use std::collections::HashSet;

    fn candidates(spans: &[&str]) -> Vec<Candidate> {
        spans
            .iter()
            .map(|s| Candidate {
                span: TermKey::parse(s).unwrap(),
                count: 1,
                example: Context::from_slots(Vec::new()),
            })
            .collect()
    }

    #[test]
    fn parses_numbers_and_ambiguous_suffix() {
        let batch = candidates(&["ibuprofen", "mono cedocard", "daily"]);
        let decisions = parse_decisions("1 2a 9 x", &batch);
        assert_eq!(
            decisions,
            vec![
                (TermKey::parse("ibuprofen").unwrap(), TagClass::Regular),
                (TermKey::parse("mono cedocard").unwrap(), TagClass::Ambiguous),
            ]
        );
    }

    #[test]
    fn closed_input_stops_without_rejecting() {
        let batch = candidates(&["ibuprofen", "paracetamol"]);
        let mut reviewer = TerminalReviewer { input: &b""[..] };
        assert!(reviewer.review_batch(&batch).is_none());

        let outcome = ReviewSession::new(ReviewParams::default()).run(
            &batch,
            &HashSet::new(),
            &mut TerminalReviewer { input: &b""[..] },
        );
        assert!(outcome.rejected.is_empty());
        assert!(outcome.shown.is_empty());
    }

    #[test]
    fn empty_line_rejects_the_batch() {
        let batch = candidates(&["ibuprofen", "paracetamol"]);
        let outcome = ReviewSession::new(ReviewParams::default()).run(
            &batch,
            &HashSet::new(),
            &mut TerminalReviewer { input: &b"2\n"[..] },
        );
        assert_eq!(outcome.accepted.len(), 1);
        assert!(outcome.rejected.contains(&TermKey::parse("ibuprofen").unwrap()));
    }
}
