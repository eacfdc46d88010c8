//! Command line front end for VSV/Delta colocalization.
//!
//! # Usage
//!
//! ```bash
//! # Full analysis of one image pair, VSV labels produced ahead of time
//! virocoloc analyze --vsv cell3_GREEN.tif --delta cell3_RED.tif --vsv-labels cell3_GREEN_masks.tif
//!
//! # Same, running an external segmentation program
//! virocoloc analyze --vsv cell3_GREEN.tif --delta cell3_RED.tif --segmenter-cmd ./segment.sh --area 120
//!
//! # Report over every analysis record in a folder
//! virocoloc summarize /data/experiment1
//!
//! # Print a stored record
//! virocoloc inspect /data/experiment1/cell3_ANALYSIS.json.gz
//!
//! # Interactive operator session
//! virocoloc session --vsv-labels cell3_GREEN_masks.tif
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use virocoloc::config::AnalysisConfig;
use virocoloc::image::{write_label_tiff, TiffLoader};
use virocoloc::overlap::colocalize;
use virocoloc::params::ThresholdField;
use virocoloc::segmenter::{CommandSegmenter, InstanceSegmenter, LabelFileSegmenter};
use virocoloc::session::{NoPrompt, PathPrompt, Session, StdinPrompt};
use virocoloc::store;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Folder for rolling log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    /// YAML or JSON analysis configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one image pair and save its analysis record
    Analyze {
        /// VSV channel image
        #[arg(long)]
        vsv: PathBuf,

        /// Delta channel image
        #[arg(long)]
        delta: PathBuf,

        #[command(flatten)]
        segmenter: SegmenterArgs,

        #[command(flatten)]
        thresholds: ThresholdArgs,

        /// Write the VSV and Delta label maps as TIFFs into this folder
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Only print the colocalization
        #[arg(long)]
        no_save: bool,
    },

    /// Write the colocalization report for every record in a folder
    Summarize {
        /// Folder holding analysis records
        dir: PathBuf,

        /// Report path (default: <dir>/ColocRecap_Journal.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the contents of an analysis record
    Inspect {
        record: PathBuf,
    },

    /// Interactive session reading commands from stdin
    Session {
        #[command(flatten)]
        segmenter: SegmenterArgs,
    },
}

#[derive(Args)]
struct SegmenterArgs {
    /// Precomputed VSV label TIFF
    #[arg(long, conflicts_with = "segmenter_cmd")]
    vsv_labels: Option<PathBuf>,

    /// External segmentation program
    #[arg(long)]
    segmenter_cmd: Option<String>,

    /// Extra argument passed to the segmentation program, repeatable
    #[arg(long = "segmenter-arg", allow_hyphen_values = true)]
    segmenter_args: Vec<String>,
}

impl SegmenterArgs {
    fn build(&self) -> Result<Box<dyn InstanceSegmenter>> {
        match (&self.vsv_labels, &self.segmenter_cmd) {
            (Some(path), _) => Ok(Box::new(LabelFileSegmenter::new(path))),
            (None, Some(program)) => Ok(Box::new(CommandSegmenter::new(
                program.clone(),
                self.segmenter_args.clone(),
            ))),
            (None, None) => bail!("Either --vsv-labels or --segmenter-cmd is required"),
        }
    }
}

#[derive(Args)]
struct ThresholdArgs {
    #[arg(long)]
    thickness: Option<String>,
    #[arg(long)]
    upper_ratio: Option<String>,
    #[arg(long)]
    lower_ratio: Option<String>,
    #[arg(long)]
    area: Option<String>,
}

impl ThresholdArgs {
    fn overrides(&self) -> impl Iterator<Item = (ThresholdField, &str)> {
        [
            (ThresholdField::Thickness, &self.thickness),
            (ThresholdField::UpperRatio, &self.upper_ratio),
            (ThresholdField::LowerRatio, &self.lower_ratio),
            (ThresholdField::Area, &self.area),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|text| (field, text)))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    common::log_setup::setup_logging("virocoloc", &cli.log_level, &cli.log_dir)?;

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path).with_context(|| format!("Loading {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            vsv,
            delta,
            segmenter,
            thresholds,
            export_dir,
            no_save,
        } => {
            let mut session = new_session(config, segmenter.build()?, Box::new(NoPrompt));
            apply_overrides(&mut session, &thresholds);
            analyze(&mut session, vsv, delta, export_dir.as_deref(), no_save)
        }
        Commands::Summarize { dir, output } => summarize(&config, &dir, output),
        Commands::Inspect { record } => inspect(&config, &record),
        Commands::Session { segmenter } => {
            let session = new_session(config, segmenter.build()?, Box::new(StdinPrompt));
            interactive(session)
        }
    }
}

fn new_session(
    config: AnalysisConfig,
    segmenter: Box<dyn InstanceSegmenter>,
    prompt: Box<dyn PathPrompt>,
) -> Session {
    Session::new(config, Box::new(TiffLoader), segmenter, prompt)
}

/// Apply threshold flags. A rejected value is reported and the previous
/// value stays in effect.
fn apply_overrides(session: &mut Session, thresholds: &ThresholdArgs) {
    for (field, text) in thresholds.overrides() {
        if let Err(err) = session.set_threshold(field, text) {
            eprintln!("{err}, keeping {}", session.thresholds().get(field));
        }
    }
}

fn analyze(
    session: &mut Session,
    vsv: PathBuf,
    delta: PathBuf,
    export_dir: Option<&Path>,
    no_save: bool,
) -> Result<()> {
    session.load_data(Some(vsv), Some(delta))?;
    session.segment_vsv()?;
    session.filter_vsv()?;
    session.segment_delta()?;

    let coloc = session.colocalization()?;
    println!("Delta on VSV: {:.2}% of {} particles", coloc.delta_on_vsv, coloc.delta_count);
    println!("VSV on Delta: {:.2}% of {} objects", coloc.vsv_on_delta, coloc.vsv_count);

    if let Some(dir) = export_dir {
        export_labels(session, dir)?;
    }
    if !no_save {
        let path = session.save_analysis()?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn export_labels(session: &Session, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    let stem = session
        .raw()
        .and_then(|raw| raw.delta.path.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("analysis")
        .to_string();

    let maps = [
        ("vsv_unfiltered", session.vsv_unfiltered()),
        ("vsv_filtered", session.vsv_filter().map(|f| &f.filtered)),
        ("vsv_removed_outline", session.vsv_filter().map(|f| &f.outline)),
        ("delta", session.delta()),
    ];
    for (name, mask) in maps {
        let Some(mask) = mask else { continue };
        let path = dir.join(format!("{stem}_{name}.tif"));
        write_label_tiff(&path, mask).with_context(|| format!("Writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "Exported label map");
    }
    Ok(())
}

fn summarize(config: &AnalysisConfig, dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let report = store::summarize(dir, config.expansion_distance)?;
    let path = output.unwrap_or_else(|| dir.join(store::REPORT_FILE_NAME));
    store::write_report(&report, &path)?;
    println!("{} records summarized into {}", report.rows.len(), path.display());
    Ok(())
}

fn inspect(config: &AnalysisConfig, path: &Path) -> Result<()> {
    let record = store::load(path)?;
    let (width, height) = record.vsv_mask.dimensions();
    let coloc = colocalize(&record.delta_mask, &record.vsv_mask, config.expansion_distance);

    println!("Record:       {}", path.display());
    println!("Size:         {width}x{height}");
    println!("Thresholds:   {}", record.thresholds);
    println!("VSV objects:  {}", coloc.vsv_count);
    println!("Delta spots:  {}", coloc.delta_count);
    println!("Delta on VSV: {:.2}%", coloc.delta_on_vsv);
    println!("VSV on Delta: {:.2}%", coloc.vsv_on_delta);
    Ok(())
}

const SESSION_HELP: &str = "\
Commands:
  load [vsv delta]          load an image pair
  segment-vsv               run VSV segmentation
  filter                    apply the geometric thresholds
  segment-delta             detect Delta particles
  set <field> <value>       thickness, upper_ratio, lower_ratio or area
  thresholds                show current thresholds
  coloc                     print colocalization
  save                      save the analysis record
  load-analysis [vsv delta] reload a pair with its stored thresholds
  summarize [dir]           write the folder report
  quit";

fn interactive(mut session: Session) -> Result<()> {
    println!("{SESSION_HELP}");
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        match run_command(&mut session, command, args) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => println!("{err}"),
        }
    }
}

/// Run one session command. Returns `false` once the operator quits.
fn run_command(session: &mut Session, command: &str, args: &[&str]) -> virocoloc::Result<bool> {
    match command {
        "load" => session.load_data(path_arg(args, 0), path_arg(args, 1))?,
        "segment-vsv" => session.segment_vsv()?,
        "filter" => session.filter_vsv()?,
        "segment-delta" => session.segment_delta()?,
        "set" => match args {
            [field, value] => match field.parse::<ThresholdField>() {
                Ok(field) => {
                    session.set_threshold(field, value)?;
                }
                Err(err) => println!("{err}"),
            },
            _ => println!("usage: set <field> <value>"),
        },
        "thresholds" => println!("{}", session.thresholds()),
        "coloc" => {
            let c = session.colocalization()?;
            println!("Delta on VSV: {:.2}% of {}", c.delta_on_vsv, c.delta_count);
            println!("VSV on Delta: {:.2}% of {}", c.vsv_on_delta, c.vsv_count);
        }
        "save" => println!("Saved {}", session.save_analysis()?.display()),
        "load-analysis" => session.load_analysis(path_arg(args, 0), path_arg(args, 1))?,
        "summarize" => println!("Report written to {}", session.summarize(path_arg(args, 0))?.display()),
        "quit" | "exit" => return Ok(false),
        _ => println!("{SESSION_HELP}"),
    }
    Ok(true)
}

fn path_arg(args: &[&str], index: usize) -> Option<PathBuf> {
    args.get(index).map(PathBuf::from)
}
