use analytics::{
    Aggregation, Aggregator, BinStatistic, BinningScheme, Drilldown, DrilldownFilter,
    EventStudyReport, Heatmap, HitGroup, build_heatmap, drilldown_bin, drilldown_hit_group,
    run_event_study, run_hit_study,
};
use analyzer::Analyzer;
use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, init_tracing, load_config};
use core_types::{
    AggregationMethod, BinIndex, Metric, Observation, StudyWindow, SymbolOutcome, WeeklyReturn,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Rows shown by a drill-down when `--limit` is not given.
const DEFAULT_DRILLDOWN_LIMIT: usize = 50;

/// The main entry point for the RevenueLab analysis tool.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    // The guard flushes the log file on drop, so it lives until main returns.
    let _log_guard = init_tracing(&config.logging)?;

    match cli.command {
        Commands::Bins(args) => handle_bins(args, &config, cli.json),
        Commands::Heatmap(args) => handle_heatmap(args, &config, cli.json),
        Commands::Hits(args) => handle_hits(args, &config, cli.json),
        Commands::Events(args) => handle_events(args, &config, cli.json),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Relates monthly revenue growth to subsequent stock returns.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Print the report as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group observations into return bins and summarize the growth metric per bin.
    Bins(BinsArgs),
    /// Growth metric per return bin and reporting month.
    Heatmap(HeatmapArgs),
    /// Relate how often a symbol hit a growth range to its return.
    Hits(HitsArgs),
    /// Returns in windows around the first growth breakout announcement.
    Events(EventsArgs),
}

#[derive(Parser)]
struct BinsArgs {
    /// JSON array of observations.
    #[arg(long)]
    input: PathBuf,

    /// Overrides `aggregation.metric`.
    #[arg(long, value_enum)]
    metric: Option<Metric>,

    /// Overrides `aggregation.trim_fraction`.
    #[arg(long)]
    trim: Option<f64>,

    /// Also list empty bins between the lowest and highest populated one.
    #[arg(long)]
    dense: bool,

    /// Order bins by composite score. Requires `[scoring.weights]` in the config.
    #[arg(long)]
    rank: bool,

    /// List the companies in this bin instead of the bin statistics.
    #[arg(long, allow_negative_numbers = true)]
    bin: Option<i64>,

    /// Overrides `aggregation.study_year` for the drill-down.
    #[arg(long, requires = "bin")]
    year: Option<i32>,

    /// Keep only reports whose company name or remark contains this text.
    #[arg(long, requires = "bin")]
    keyword: Option<String>,

    /// Maximum number of companies listed.
    #[arg(long, requires = "bin")]
    limit: Option<usize>,
}

#[derive(Parser)]
struct HeatmapArgs {
    /// JSON array of observations.
    #[arg(long)]
    input: PathBuf,

    /// Overrides `aggregation.metric`.
    #[arg(long, value_enum)]
    metric: Option<Metric>,

    /// Overrides `aggregation.method`.
    #[arg(long, value_enum)]
    method: Option<AggregationMethod>,

    /// Overrides `aggregation.study_year`.
    #[arg(long)]
    year: Option<i32>,
}

#[derive(Parser)]
struct HitsArgs {
    /// JSON array of observations.
    #[arg(long)]
    input: PathBuf,

    /// JSON array of per-symbol returns over the study horizon.
    #[arg(long)]
    outcomes: PathBuf,

    /// Overrides `hit_study.low`.
    #[arg(long)]
    low: Option<f64>,

    /// Overrides `hit_study.high`.
    #[arg(long)]
    high: Option<f64>,

    /// Overrides `hit_study.study_year`.
    #[arg(long)]
    year: Option<i32>,

    /// List the companies that hit the range this many times.
    #[arg(long)]
    hits: Option<usize>,

    /// Keep only reports whose company name or remark contains this text.
    #[arg(long, requires = "hits")]
    keyword: Option<String>,

    /// Maximum number of companies listed.
    #[arg(long, requires = "hits")]
    limit: Option<usize>,
}

#[derive(Parser)]
struct EventsArgs {
    /// JSON array of observations.
    #[arg(long)]
    input: PathBuf,

    /// JSON array of weekly returns.
    #[arg(long)]
    weekly: PathBuf,

    /// Overrides `event_study.threshold`.
    #[arg(long)]
    threshold: Option<f64>,

    /// Overrides `event_study.study_year`.
    #[arg(long)]
    year: Option<i32>,

    /// Overrides `event_study.keyword`.
    #[arg(long)]
    keyword: Option<String>,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

fn handle_bins(args: BinsArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let observations: Vec<Observation> = read_json(&args.input)?;
    let metric = args.metric.unwrap_or(config.aggregation.metric);

    let mut aggregation_config = config.aggregation.clone();
    if let Some(trim) = args.trim {
        aggregation_config.trim_fraction = trim;
    }
    let aggregator = Aggregator::from_config(&config.binning, &aggregation_config)?;

    if let Some(bin) = args.bin {
        aggregation_config.study_year = args.year.or(aggregation_config.study_year);
        let filter = DrilldownFilter {
            window: aggregation_config.window()?,
            keyword: args.keyword,
            limit: Some(args.limit.unwrap_or(DEFAULT_DRILLDOWN_LIMIT)),
        };
        let drilldown = drilldown_bin(&observations, aggregator.scheme(), BinIndex(bin), &filter)?;
        if json {
            return print_json(&drilldown);
        }
        println!("{}: {}", BinIndex(bin), aggregator.scheme().label(BinIndex(bin)));
        print_drilldown(&drilldown, filter.window);
        return Ok(());
    }

    let analyzer = if args.rank {
        let scoring = config
            .scoring
            .as_ref()
            .context("--rank needs [scoring.weights] in the configuration")?;
        Some(Analyzer::new(scoring)?)
    } else {
        None
    };

    tracing::info!(
        observations = observations.len(),
        %metric,
        trim_fraction = aggregation_config.trim_fraction,
        "Aggregating observations by return bin."
    );
    let aggregation = aggregator.aggregate(&observations, metric);

    if let Some(analyzer) = &analyzer {
        let ranked = analyzer.rank_bins(&aggregation);
        if json {
            return print_json(&ranked);
        }
        let rows: Vec<(&BinStatistic, Option<f64>)> = ranked
            .iter()
            .map(|r| (&r.statistic, Some(r.score)))
            .collect();
        print_bins(&aggregation, rows, true);
        return Ok(());
    }

    if json {
        return print_json(&aggregation);
    }
    let dense: Vec<BinStatistic> = match (args.dense, aggregation.bin_range()) {
        (true, Some((from, to))) => aggregation
            .dense_bins(from, to, config.binning.max_dense_bins)?
            .collect(),
        _ => aggregation.bins.values().cloned().collect(),
    };
    print_bins(&aggregation, dense.iter().map(|s| (s, None)).collect(), false);
    Ok(())
}

fn handle_heatmap(args: HeatmapArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let observations: Vec<Observation> = read_json(&args.input)?;
    let metric = args.metric.unwrap_or(config.aggregation.metric);
    let method = args.method.unwrap_or(config.aggregation.method);
    let scheme = BinningScheme::from_config(&config.binning)?;

    let mut aggregation_config = config.aggregation.clone();
    aggregation_config.study_year = args.year.or(aggregation_config.study_year);
    let window = aggregation_config.window()?;

    let heatmap = build_heatmap(&observations, &scheme, metric, method, window);
    if json {
        return print_json(&heatmap);
    }
    print_heatmap(&heatmap, &scheme);
    Ok(())
}

fn handle_hits(args: HitsArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let observations: Vec<Observation> = read_json(&args.input)?;
    let outcomes: Vec<SymbolOutcome> = read_json(&args.outcomes)?;

    let mut hit_config = config.hit_study.clone();
    hit_config.low = args.low.unwrap_or(hit_config.low);
    hit_config.high = args.high.unwrap_or(hit_config.high);
    hit_config.study_year = args.year.or(hit_config.study_year);
    hit_config.validate()?;

    if let Some(hits) = args.hits {
        // Members are described over the 13 reports that go with the year's price move.
        let filter = DrilldownFilter {
            window: hit_config
                .study_year
                .map(StudyWindow::with_prior_december)
                .transpose()?,
            keyword: args.keyword,
            limit: Some(args.limit.unwrap_or(DEFAULT_DRILLDOWN_LIMIT)),
        };
        let drilldown =
            drilldown_hit_group(&observations, &outcomes, &hit_config, hits, &filter)?;
        if json {
            return print_json(&drilldown);
        }
        println!("{} hits in [{}, {})", hits, hit_config.low, hit_config.high);
        print_drilldown(&drilldown, filter.window);
        return Ok(());
    }

    let ranked;
    let study;
    let (rows, unmatched): (Vec<(&HitGroup, Option<f64>)>, usize) = match &config.scoring {
        Some(scoring) => {
            ranked = Analyzer::new(scoring)?.run_hit_study(&observations, &outcomes, &hit_config)?;
            if json {
                return print_json(&ranked);
            }
            let rows: Vec<(&HitGroup, Option<f64>)> =
                ranked.groups.iter().map(|r| (&r.group, Some(r.score))).collect();
            (rows, ranked.unmatched)
        }
        None => {
            study = run_hit_study(&observations, &outcomes, &hit_config)?;
            if json {
                return print_json(&study);
            }
            (study.groups.iter().map(|g| (g, None)).collect(), study.unmatched)
        }
    };

    let mut table = new_table();
    table.set_header(vec![
        "Hits", "Symbols", "Mean Return %", "Win Rate %", "Double Rate %", "E[Gain]",
        "E[Loss]", "Score",
    ]);
    for (group, score) in rows {
        table.add_row(vec![
            group.hits.to_string(),
            group.symbols.len().to_string(),
            format!("{:.2}", group.mean_return),
            format!("{:.1}", group.win_rate_pct),
            format!("{:.1}", group.double_rate_pct),
            format!("{:.2}", group.outcome.expected_gain),
            format!("{:.2}", group.outcome.expected_loss),
            fmt_opt(score),
        ]);
    }
    println!(
        "{} in [{}, {}): {} symbols without outcome",
        hit_config.metric, hit_config.low, hit_config.high, unmatched
    );
    println!("{table}");
    Ok(())
}

fn handle_events(args: EventsArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let observations: Vec<Observation> = read_json(&args.input)?;
    let weekly: Vec<WeeklyReturn> = read_json(&args.weekly)?;

    let mut event_config = config.event_study.clone();
    event_config.threshold = args.threshold.unwrap_or(event_config.threshold);
    event_config.study_year = args.year.or(event_config.study_year);
    event_config.keyword = args.keyword.or(event_config.keyword);

    let report = run_event_study(&observations, &weekly, &event_config)?;
    if json {
        return print_json(&report);
    }
    print_events(&report, event_config.move_threshold_pct);
    Ok(())
}

// ==============================================================================
// Output Helpers
// ==============================================================================

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn print_bins(aggregation: &Aggregation, rows: Vec<(&BinStatistic, Option<f64>)>, ranked: bool) {
    let mut table = new_table();
    let mut header = vec![
        "Bin".to_string(),
        "Return Range".to_string(),
        "Count".to_string(),
        "Excluded".to_string(),
        "Median Return %".to_string(),
        format!("Median {}", aggregation.metric),
        "P25".to_string(),
        "P75".to_string(),
        "Mean".to_string(),
        "Skew".to_string(),
        "Kurt".to_string(),
        "CV".to_string(),
        "E[Gain]".to_string(),
        "E[Loss]".to_string(),
        "P(Hit)".to_string(),
    ];
    if ranked {
        header.push("Score".to_string());
    }
    table.set_header(header);

    for (stat, score) in rows {
        let mut row = vec![
            stat.bin.to_string(),
            aggregation.scheme.label(stat.bin),
            stat.count.to_string(),
            stat.excluded.to_string(),
            fmt_opt(stat.median_return),
            fmt_opt(stat.metric.median),
            fmt_opt(stat.metric.p25),
            fmt_opt(stat.metric.p75),
            fmt_opt(stat.metric.mean),
            fmt_opt(stat.metric.skewness),
            fmt_opt(stat.metric.kurtosis),
            fmt_opt(stat.metric.coefficient_of_variation),
            fmt_opt(stat.outcome.map(|o| o.expected_gain)),
            fmt_opt(stat.outcome.map(|o| o.expected_loss)),
            fmt_opt(stat.outcome.map(|o| o.hit_probability)),
        ];
        if ranked {
            row.push(fmt_opt(score));
        }
        table.add_row(row);
    }

    println!(
        "{} observations binned, {} rejected, {} trimmed",
        aggregation.total_count(),
        aggregation.rejected,
        aggregation.excluded
    );
    println!("{table}");
}

fn print_heatmap(heatmap: &Heatmap, scheme: &BinningScheme) {
    let periods: Vec<_> = heatmap.periods().into_iter().collect();
    let mut table = new_table();
    let mut header = vec!["Return Range".to_string()];
    header.extend(periods.iter().map(ToString::to_string));
    table.set_header(header);

    // Highest returns on top.
    for (bin, row) in heatmap.rows.iter().rev() {
        let mut cells = vec![scheme.label(*bin)];
        cells.extend(periods.iter().map(|period| {
            row.get(period)
                .map_or_else(|| "-".to_string(), |c| format!("{:.1} ({})", c.value, c.symbols))
        }));
        table.add_row(cells);
    }

    let scope = heatmap
        .window
        .map_or_else(|| "all reports".to_string(), |w| w.to_string());
    println!(
        "{} by return bin, {:?} per cell, {} symbols, {} rejected, {}",
        heatmap.metric,
        heatmap.method,
        heatmap.total_symbols(),
        heatmap.rejected,
        scope
    );
    println!("{table}");
}

fn print_drilldown(drilldown: &Drilldown, window: Option<StudyWindow>) {
    let mut table = new_table();
    table.set_header(vec![
        "Symbol", "Name", "Return %", "Mean YoY %", "Mean MoM %", "Reports", "Latest Remark",
    ]);
    for member in &drilldown.members {
        table.add_row(vec![
            member.symbol.clone(),
            member.name.clone().unwrap_or_default(),
            format!("{:.1}", member.return_pct),
            fmt_opt(member.mean_yoy),
            fmt_opt(member.mean_mom),
            member.reports.to_string(),
            member.latest_remark.clone().unwrap_or_default(),
        ]);
    }

    let scope = window.map_or_else(|| "all reports".to_string(), |w| w.to_string());
    println!(
        "{} of {} companies, {}",
        drilldown.members.len(),
        drilldown.matched,
        scope
    );
    println!("{table}");
}

fn print_events(report: &EventStudyReport, move_threshold_pct: f64) {
    let mut table = new_table();
    table.set_header(vec![
        "Window".to_string(),
        "Events".to_string(),
        "Mean %".to_string(),
        "Median %".to_string(),
        format!("Rise > {move_threshold_pct}%"),
        format!("Fall > {move_threshold_pct}%"),
        "RTC".to_string(),
        "TDIR".to_string(),
        "<-5 / -5~-1 / -1~1 / 1~5 / >5".to_string(),
    ]);
    for summary in &report.summaries {
        let d = &summary.distribution;
        table.add_row(vec![
            summary.window.clone(),
            summary.count.to_string(),
            fmt_opt(summary.mean),
            fmt_opt(summary.median),
            fmt_opt(summary.rise_rate_pct),
            fmt_opt(summary.fall_rate_pct),
            fmt_opt(summary.right_tail_concentration),
            fmt_opt(summary.top_decile_intensity),
            format!(
                "{} / {} / {} / {} / {}",
                d.big_drop, d.small_drop, d.flat, d.small_rise, d.big_rise
            ),
        ]);
    }

    println!("{} breakout events", report.events.len());
    println!("{table}");
}
