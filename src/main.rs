use anyhow::Result;
use clap::Parser;
use food_detect::{
    config::{Config, YoloParams},
    web::serve,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "food-detect")]
#[command(about = "Food detection service backed by one or two ONNX models")]
struct Args {
    /// Server bind address
    #[arg(long, env = "FOOD_DETECT_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Number of worker threads
    #[arg(long, env = "FOOD_DETECT_WORKERS")]
    workers: Option<usize>,

    /// Log level
    #[arg(long, env = "FOOD_DETECT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory holding weights and label files
    #[arg(long, env = "FOOD_DETECT_MODELS_DIR", default_value = "models")]
    models_dir: String,

    /// Primary weights file inside the models directory
    #[arg(long, env = "FOOD_DETECT_PRIMARY_MODEL", default_value = "best.onnx")]
    primary_model: String,

    /// Secondary weights file; auto-detected when omitted
    #[arg(long, env = "FOOD_DETECT_SECONDARY_MODEL")]
    secondary_model: Option<String>,

    /// Fuse both models when both load
    #[arg(long, env = "FOOD_DETECT_ENSEMBLE")]
    ensemble: bool,

    /// Minimum detection confidence
    #[arg(long, env = "FOOD_DETECT_CONF_THRESHOLD", default_value_t = 0.25)]
    conf_threshold: f32,

    /// NMS IoU threshold
    #[arg(long, env = "FOOD_DETECT_IOU_THRESHOLD", default_value_t = 0.45)]
    iou_threshold: f32,

    /// Enable development mode
    #[arg(long, env = "FOOD_DETECT_DEV")]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting food detection service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let config = Config::new(args.bind, args.models_dir, args.workers, args.dev)?
        .with_models(args.primary_model, args.secondary_model, args.ensemble)
        .with_yolo_params(YoloParams {
            conf_threshold: args.conf_threshold,
            iou_threshold: args.iou_threshold,
            ..YoloParams::default()
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
