use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};

use dental_xray_ai::annotate::{draw_added_label, label_font, scale_viewport_rect};
use dental_xray_ai::colors::color_for;
use dental_xray_ai::config::ConfigStore;
use dental_xray_ai::detections::{load_inference_json, Detection, InferenceResult};
use dental_xray_ai::image_utils::{load_rgb, save_annotated_jpeg};
use dental_xray_ai::legend::Legend;
use dental_xray_ai::percentage::class_percentages;
use dental_xray_ai::pipeline::{
    annotate_xray, legends_path, predictions_path, run_processing_files,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "dental-xray-ai", version, about = "Annotate dental X-rays from stored AI detections")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Annotate a batch of X-rays; detections are read from the
    /// `<stem>.predictions.json` files next to each image.
    Process {
        /// Image files to process. With --all, the stored work list is used.
        files: Vec<String>,
        /// Process every X-ray on the stored work list.
        #[arg(long)]
        all: bool,
    },
    /// Annotate one X-ray and print its class percentages.
    Annotate {
        image: PathBuf,
        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Add a manual annotation to an annotated image. Coordinates are in
    /// the 480x400 editor viewport.
    AddLabel {
        image: PathBuf,
        #[arg(long)]
        text: String,
        /// Display color, defaults to the class table entry for the text.
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print class percentages for a stored inference response.
    Percentages { predictions: PathBuf },
    /// Manage the inference model registry.
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
    /// Manage the X-ray work list.
    Xrays {
        #[command(subcommand)]
        command: XraysCommand,
    },
    /// Show the current configuration.
    Config,
}

#[derive(Subcommand)]
enum ModelsCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        project: String,
        #[arg(long, default_value_t = 1)]
        version: i64,
    },
    Remove { id: i64 },
    Activate { id: i64 },
}

#[derive(Subcommand)]
enum XraysCommand {
    List,
    Add { paths: Vec<String> },
    Remove { path: String },
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), BoxError> {
    match cli.command {
        Command::Process { files, all } => cmd_process(files, all),
        Command::Annotate { image, output_dir } => cmd_annotate(&image, output_dir),
        Command::AddLabel {
            image,
            text,
            color,
            x,
            y,
            width,
            height,
            output_dir,
        } => cmd_add_label(&image, &text, color, (x, y, width, height), output_dir),
        Command::Percentages { predictions } => cmd_percentages(&predictions),
        Command::Models { command } => cmd_models(command),
        Command::Xrays { command } => cmd_xrays(command),
        Command::Config => {
            let store = ConfigStore::open()?;
            println!("{}", serde_json::to_string_pretty(&store.load_config()?)?);
            Ok(())
        }
    }
}

fn cmd_process(mut files: Vec<String>, all: bool) -> Result<(), BoxError> {
    let store = ConfigStore::open()?;
    let config = store.load_config()?;
    if all {
        files = store.list_xray_paths()?;
    }

    let cancel = AtomicBool::new(false);
    run_processing_files(
        &files,
        &config,
        &cancel,
        |msg| println!("{}", msg),
        |_| {},
        |done| {
            println!(
                "{} annotated, {} failed ({} detections across {} classes)",
                done.successful, done.failed, done.total_detections, done.distinct_classes
            );
        },
    )
}

fn cmd_annotate(image: &Path, output_dir: Option<PathBuf>) -> Result<(), BoxError> {
    let store = ConfigStore::open()?;
    let mut config = store.load_config()?;
    if let Some(dir) = output_dir {
        config.analyzed_dir = dir.display().to_string();
    }

    let outcome = annotate_xray(image, &config, &label_font())?;
    println!("Annotated image: {}", outcome.output.display());
    print_legends(&outcome.legends);
    Ok(())
}

fn cmd_add_label(
    image: &Path,
    text: &str,
    color: Option<String>,
    viewport_rect: (f64, f64, f64, f64),
    output_dir: Option<PathBuf>,
) -> Result<(), BoxError> {
    let store = ConfigStore::open()?;
    let config = store.load_config()?;
    let out_dir = output_dir
        .unwrap_or_else(|| PathBuf::from(&config.analyzed_dir));
    let color_hex = color.unwrap_or_else(|| color_for(text).to_string());

    let mut img = load_rgb(image)?;
    let (vx, vy, vw, vh) = viewport_rect;
    let (rx, ry, rw, rh) = scale_viewport_rect(vx, vy, vw, vh, img.width(), img.height());
    draw_added_label(&mut img, text, &color_hex, rx, ry, rw, rh, &label_font());
    let out = save_annotated_jpeg(&img, &out_dir, config.jpeg_quality_value())?;

    // Record the annotation alongside the model's detections so the next
    // full re-render keeps it. Stored with centroid coordinates like every
    // other detection.
    let predictions_file = predictions_path(image);
    let mut result = if predictions_file.exists() {
        load_inference_json(&predictions_file)?
    } else {
        InferenceResult { predictions: Vec::new(), image: None }
    };
    result.predictions.push(Detection {
        class_name: text.to_string(),
        x: rx as f64 + rw as f64 / 2.0,
        y: ry as f64 + rh as f64 / 2.0,
        width: rw as f64,
        height: rh as f64,
        confidence: 1.0,
        points: None,
    });
    std::fs::write(&predictions_file, serde_json::to_string(&result)?)?;

    // Manual annotations start at 0% like any label without model area.
    let legends_file = legends_path(image);
    let mut legends: Vec<Legend> = if legends_file.exists() {
        serde_json::from_str(&std::fs::read_to_string(&legends_file)?)?
    } else {
        Vec::new()
    };
    if !legends.iter().any(|l| l.name == text) {
        legends.push(Legend {
            name: text.to_string(),
            color_hex: color_hex.clone(),
            percentage: 0.0,
            include: true,
        });
        std::fs::write(&legends_file, serde_json::to_string_pretty(&legends)?)?;
    }

    println!("Annotated image: {}", out.display());
    Ok(())
}

fn cmd_percentages(predictions: &Path) -> Result<(), BoxError> {
    let result = load_inference_json(predictions)?;
    let percentages = class_percentages(&result.predictions);
    let mut entries: Vec<_> = percentages.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, percentage) in entries {
        println!("{:6.2}%  {}  ({})", percentage, name, color_for(&name));
    }
    Ok(())
}

fn cmd_models(command: ModelsCommand) -> Result<(), BoxError> {
    let store = ConfigStore::open()?;
    match command {
        ModelsCommand::List => {
            for m in store.list_models()? {
                let marker = if m.is_active { "*" } else { " " };
                println!("{} [{}] {} ({} v{})", marker, m.id, m.name, m.project, m.version);
            }
        }
        ModelsCommand::Add { name, project, version } => {
            let m = store.add_model(&name, &project, version)?;
            println!("Added model [{}] {}", m.id, m.name);
        }
        ModelsCommand::Remove { id } => store.remove_model(id)?,
        ModelsCommand::Activate { id } => store.set_active_model(id)?,
    }
    Ok(())
}

fn cmd_xrays(command: XraysCommand) -> Result<(), BoxError> {
    let store = ConfigStore::open()?;
    match command {
        XraysCommand::List => {
            for p in store.list_xray_paths()? {
                println!("{}", p);
            }
        }
        XraysCommand::Add { paths } => {
            let added = store.add_xray_paths(paths)?;
            println!("Added {} path(s)", added);
        }
        XraysCommand::Remove { path } => store.remove_xray_path(&path)?,
    }
    Ok(())
}

fn print_legends(legends: &[Legend]) {
    for legend in legends {
        let marker = if legend.include { " " } else { "x" };
        println!(
            "{} {:6.2}%  {}  ({})",
            marker, legend.percentage, legend.name, legend.color_hex
        );
    }
}
