use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use weekplan::aggregate::AggregateOptions;
use weekplan::core::{Aggregation, IsoWeekRef, SpanRole, WeekData};
use weekplan::isoweek::{format_iso_date, parse_week_id, week_info};
use weekplan::projectors::deadline_projector::{self, DeadlineItem, DeadlineOptions};
use weekplan::projectors::matrix_projector::{self, WeekMatrix};
use weekplan::resolver::{self, ResolveContext};
use weekplan::{JsonPlannerSource, PlannerSource, PlannerState, split_items};

#[derive(Debug, Parser)]
#[command(
    name = "weekplan",
    about = "Week planner for uploaded syllabus documents",
    version
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Aggregate a planner input file into the per-week grid.
    Aggregate(AggregateArgs),

    /// Resolve a bare week number to a concrete ISO week.
    Resolve(ResolveArgs),

    /// Split homework text into individual items.
    Split(SplitArgs),

    /// List tests and hand-in dates across all subjects.
    Deadlines(DeadlinesArgs),

    /// Show subjects against a run of consecutive weeks.
    Matrix(MatrixArgs),
}

#[derive(Debug, Args)]
struct AggregateArgs {
    /// Planner input JSON (documents plus rows per document).
    input: PathBuf,
    /// Reference day for proximity resolution. Defaults to today.
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Emit JSON instead of a human-readable listing.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Week number as written in the document.
    #[arg(long, allow_negative_numbers = true)]
    week: i64,
    /// School year such as 2024/2025.
    #[arg(long)]
    school_year: Option<String>,
    /// Candidate dates found on the row (repeatable).
    #[arg(long = "date")]
    dates: Vec<NaiveDate>,
    /// Reference day for proximity resolution. Defaults to today.
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Emit JSON instead of a single line.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SplitArgs {
    /// Homework text to split.
    #[arg(required = true)]
    text: Vec<String>,
}

#[derive(Debug, Args)]
struct DeadlinesArgs {
    input: PathBuf,
    /// Inclusive first week (YYYY-Www).
    #[arg(long, value_parser = parse_week_arg)]
    from: Option<IsoWeekRef>,
    /// Inclusive last week (YYYY-Www).
    #[arg(long, value_parser = parse_week_arg)]
    to: Option<IsoWeekRef>,
    #[arg(long)]
    today: Option<NaiveDate>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct MatrixArgs {
    input: PathBuf,
    /// First week of the matrix (YYYY-Www).
    #[arg(long, value_parser = parse_week_arg)]
    start: IsoWeekRef,
    /// Number of consecutive weeks.
    #[arg(long, default_value_t = 4)]
    count: usize,
    #[arg(long)]
    today: Option<NaiveDate>,
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Aggregate(args) => handle_aggregate(args),
        Commands::Resolve(args) => handle_resolve(args),
        Commands::Split(args) => handle_split(args),
        Commands::Deadlines(args) => handle_deadlines(args),
        Commands::Matrix(args) => handle_matrix(args),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "weekplan=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_week_arg(raw: &str) -> Result<IsoWeekRef, String> {
    parse_week_id(raw).ok_or_else(|| format!("{raw:?} is not an existing ISO week (YYYY-Www)"))
}

fn load_state(path: &Path, today: Option<NaiveDate>) -> Result<PlannerState> {
    debug!("loading planner input {:?}", path);
    let input = JsonPlannerSource
        .load(path)
        .with_context(|| format!("loading planner input {:?}", path))?;
    let state = PlannerState::from_input(input, AggregateOptions { today });
    for diag in &state.snapshot().diagnostics {
        warn!(
            document = %diag.document_id,
            row = ?diag.row_index,
            reason = ?diag.reason,
            "row not placed in the grid"
        );
    }
    Ok(state)
}

fn handle_aggregate(args: AggregateArgs) -> Result<()> {
    let AggregateArgs { input, today, json } = args;
    let snapshot = load_state(&input, today)?.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    } else if snapshot.weeks.is_empty() {
        eprintln!("No weeks found in {:?}.", input);
    } else {
        print!("{}", render_aggregation(&snapshot));
    }
    Ok(())
}

fn handle_resolve(args: ResolveArgs) -> Result<()> {
    let ResolveArgs {
        week,
        school_year,
        dates,
        today,
        json,
    } = args;
    let ctx = ResolveContext {
        school_year: school_year.as_deref(),
        candidate_dates: &dates,
        today,
    };
    let at = resolver::resolve(Some(week), &ctx).context("week could not be resolved")?;
    let info = week_info(at).with_context(|| format!("no calendar range for {at}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!(
            "{} {}..{}",
            info.id,
            format_iso_date(info.start),
            format_iso_date(info.end)
        );
    }
    Ok(())
}

fn handle_split(args: SplitArgs) -> Result<()> {
    let text = args.text.join(" ");
    for item in split_items(&text) {
        println!("{item}");
    }
    Ok(())
}

fn handle_deadlines(args: DeadlinesArgs) -> Result<()> {
    let DeadlinesArgs {
        input,
        from,
        to,
        today,
        json,
    } = args;
    if let Some((from, to)) = from.zip(to).filter(|(from, to)| from > to) {
        anyhow::bail!("--from {from} is after --to {to}");
    }
    let snapshot = load_state(&input, today)?.snapshot();
    let items = deadline_projector::project(&snapshot, DeadlineOptions { from, to });
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        eprintln!("No deadlines found for the provided inputs.");
    } else {
        print!("{}", render_deadlines(&items));
    }
    Ok(())
}

fn handle_matrix(args: MatrixArgs) -> Result<()> {
    let MatrixArgs {
        input,
        start,
        count,
        today,
        json,
    } = args;
    if count == 0 {
        anyhow::bail!("--count must be at least 1");
    }
    let snapshot = load_state(&input, today)?.snapshot();
    let matrix = matrix_projector::project(&snapshot, start, count);
    if json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
    } else {
        print!("{}", render_matrix(&matrix));
    }
    Ok(())
}

/* ------------------------------ Rendering ------------------------------ */

fn render_aggregation(agg: &Aggregation) -> String {
    let mut out = String::new();
    for (idx, info) in agg.weeks.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "== {} ({}..{}) ==\n",
            info.id,
            format_iso_date(info.start),
            format_iso_date(info.end)
        ));
        let Some(subjects) = agg.by_week.get(&info.id) else {
            continue;
        };
        for (subject, data) in subjects {
            out.push_str(&format!("{subject}\n"));
            if let Some(lesson) = &data.lesson {
                out.push_str(&format!("  lesstof: {}\n", lesson.replace('\n', "; ")));
            }
            for item in &data.homework_items {
                out.push_str(&format!("  - {item}\n"));
            }
            for deadline in &data.deadline_items {
                out.push_str(&format!("  ! {deadline}\n"));
            }
            if let Some(notes) = &data.notes {
                out.push_str(&format!("  opmerkingen: {}\n", notes.replace('\n', "; ")));
            }
            for span in &data.spans {
                let role = match span.role {
                    SpanRole::Start => "start",
                    SpanRole::Continue => "vervolg",
                };
                let range = match (span.from_week, span.to_week) {
                    (Some(from), Some(to)) => format!(" weken {from}-{to}"),
                    _ => String::new(),
                };
                let label = span
                    .label
                    .as_deref()
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default();
                out.push_str(&format!("  ~ {role}{range}{label}\n"));
            }
        }
    }
    out
}

fn render_deadlines(items: &[DeadlineItem]) -> String {
    items
        .iter()
        .map(|item| {
            let date = item
                .date
                .map(format_iso_date)
                .unwrap_or_else(|| "-".to_string());
            format!("{} {:<10} {:<14} {}\n", item.week_id, date, item.subject, item.label)
        })
        .collect()
}

fn cell_summary(cell: Option<&WeekData>) -> String {
    let Some(data) = cell else {
        return ".".to_string();
    };
    let mut parts = Vec::new();
    if !data.homework_items.is_empty() {
        parts.push(format!("{}hw", data.homework_items.len()));
    }
    if !data.deadline_items.is_empty() {
        parts.push(format!("{}dl", data.deadline_items.len()));
    }
    if parts.is_empty() {
        parts.push(if data.lesson.is_some() { "les" } else { "." }.to_string());
    }
    parts.join(" ")
}

fn render_matrix(matrix: &WeekMatrix) -> String {
    let width = matrix
        .rows
        .iter()
        .map(|r| r.subject.chars().count())
        .max()
        .unwrap_or(0)
        .max("vak".len());
    let mut out = format!("{:<width$}", "vak");
    for info in &matrix.weeks {
        out.push_str(&format!(" | {:<8}", info.id));
    }
    out.push('\n');
    for row in &matrix.rows {
        out.push_str(&format!("{:<width$}", row.subject));
        for cell in &row.cells {
            out.push_str(&format!(" | {:<8}", cell_summary(cell.as_ref())));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const INPUT: &str = r#"{
        "documents": [
            { "id": "wi", "vak": "Wiskunde", "schooljaar": "2024/2025" },
            { "id": "en", "vak": "Engels", "schooljaar": "2024/2025" }
        ],
        "rows": {
            "wi": [
                { "week": 40, "huiswerk": "Lees par. 2.1 en maak opgave 1 t/m 5",
                  "toets": { "type": "SO", "weging": 1 } },
                { "week": 41, "onderwerp": "Hoofdstuk 3" }
            ],
            "en": [
                { "week": 40, "huiswerk": "Learn vocabulary unit 2" },
                { "huiswerk": "no week" }
            ]
        }
    }"#;

    fn write_input() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("planner.json");
        fs::write(&path, INPUT).expect("write input");
        (tmp, path)
    }

    #[test]
    fn load_state_aggregates_input_file() {
        let (_tmp, path) = write_input();
        let state = load_state(&path, NaiveDate::from_ymd_opt(2024, 10, 1)).expect("load");
        let snap = state.snapshot();
        let ids: Vec<_> = snap.weeks.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["2024-W40", "2024-W41"]);
        assert_eq!(snap.diagnostics.len(), 1);
    }

    #[test]
    fn load_state_reports_missing_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = load_state(&tmp.path().join("absent.json"), None).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }

    #[test]
    fn renders_week_listing() {
        let (_tmp, path) = write_input();
        let snap = load_state(&path, None).expect("load").snapshot();
        let text = render_aggregation(&snap);
        assert!(text.starts_with("== 2024-W40 (2024-09-30..2024-10-06) ==\n"));
        assert!(text.contains("  - Lees par. 2.1\n"));
        assert!(text.contains("  ! SO (weging 1)\n"));
        assert!(text.contains("Hoofdstuk 3"));
    }

    #[test]
    fn renders_matrix_with_empty_cells() {
        let (_tmp, path) = write_input();
        let snap = load_state(&path, None).expect("load").snapshot();
        let start = parse_week_arg("2024-W40").expect("week");
        let text = render_matrix(&matrix_projector::project(&snap, start, 2));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("2024-W41"));
        assert!(lines[1].starts_with("Engels"));
        assert!(lines[1].trim_end().ends_with("| ."));
        assert!(lines[2].contains("1dl"));
    }

    #[test]
    fn week_arguments_are_validated() {
        assert!(parse_week_arg("2020-W53").is_ok());
        assert!(parse_week_arg("2023-W53").is_err());
        assert!(parse_week_arg("week 5").is_err());

        let cli = Cli::try_parse_from([
            "weekplan", "matrix", "in.json", "--start", "2024-W50", "--count", "6",
        ])
        .expect("parse");
        match cli.command {
            Commands::Matrix(args) => {
                assert_eq!(args.start.id(), "2024-W50");
                assert_eq!(args.count, 6);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["weekplan", "matrix", "in.json", "--start", "2024-W99"]).is_err());
    }

    #[test]
    fn resolve_accepts_repeated_dates() {
        let cli = Cli::try_parse_from([
            "weekplan",
            "--verbose",
            "resolve",
            "--week",
            "1",
            "--date",
            "2025-01-02",
            "--date",
            "2025-01-03",
        ])
        .expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Commands::Resolve(args) => assert_eq!(args.dates.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
