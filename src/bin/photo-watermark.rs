use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use photo_watermark::{
    default_output_path, FontSet, ImageSource, LocationFix, ProcessResult, Viewport,
    WatermarkCompositor, WatermarkInfo, WatermarkStyle,
};

#[derive(Parser)]
#[command(
    name = "photo-watermark",
    about = "Stamp photos with a time, location, name and company bar",
    version,
    after_help = "Simple usage: photo-watermark <image> --name \"Zhang San\"  \
                  (writes <image>_watermarked.jpg, time defaults to now)\n\n\
                  Info and style can also be loaded from JSON with --info / --style;\n\
                  flags override the loaded values."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_watermarked.jpg)
    #[arg(short, long)]
    output: Option<String>,

    /// Capture time as "YYYY-MM-DD HH:MM:SS" (default: now)
    #[arg(long)]
    time: Option<String>,

    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lng")]
    lat: Option<f64>,

    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lng: Option<f64>,

    /// Treat --lat/--lng as raw GPS (WGS-84) and correct them to GCJ-02
    #[arg(long, requires = "lat")]
    wgs84: bool,

    /// Address line
    #[arg(long)]
    address: Option<String>,

    /// Photographer name
    #[arg(long)]
    name: Option<String>,

    /// Company name
    #[arg(long)]
    company: Option<String>,

    /// Load watermark info from a JSON file
    #[arg(long, value_name = "FILE")]
    info: Option<PathBuf>,

    /// Load watermark style from a JSON file
    #[arg(long, value_name = "FILE")]
    style: Option<PathBuf>,

    /// Viewport width in logical pixels (default: source width)
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Viewport height in logical pixels (default: source height)
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Device pixel ratio of the viewport (default: 1)
    #[arg(long, requires = "width")]
    dpr: Option<f32>,

    /// Bar height in logical pixels
    #[arg(long)]
    bar_height: Option<f32>,

    /// Base font size in logical pixels
    #[arg(long)]
    font_size: Option<f32>,

    /// Bar background color (CSS syntax)
    #[arg(long)]
    background: Option<String>,

    /// Text and divider color (CSS syntax)
    #[arg(long)]
    text_color: Option<String>,

    /// TrueType/OpenType font for regular text
    #[arg(long, value_name = "FILE")]
    font: Option<PathBuf>,

    /// TrueType/OpenType font for bold text (default: --font)
    #[arg(long, value_name = "FILE", requires = "font")]
    bold_font: Option<PathBuf>,

    /// Extra font tried for characters the main fonts lack (repeatable).
    /// An installed CJK system font is always tried last.
    #[arg(long, value_name = "FILE")]
    fallback_font: Vec<PathBuf>,

    /// Print the result as a data URI on stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    data_uri: bool,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if cli.dpr.is_some_and(|dpr| !(dpr.is_finite() && dpr > 0.0)) {
        eprintln!("Error: --dpr must be a positive number");
        process::exit(1);
    }

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let info = build_info(&cli).unwrap_or_else(|e| fatal(&e));
    let style = build_style(&cli).unwrap_or_else(|e| fatal(&e));
    let compositor = build_compositor(&cli).unwrap_or_else(|e| fatal(&e));
    debug!(?info, ?style, "resolved watermark settings");

    if cli.data_uri {
        if input_path.is_dir() {
            eprintln!("Error: --data-uri takes a single image");
            process::exit(1);
        }
        match compositor.composite(&ImageSource::from(input_path), &info, &style) {
            Ok(encoded) => println!("{}", encoded.to_data_uri()),
            Err(e) => fatal(&format!("{}: {e}", input_path.display())),
        }
        return;
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: photo-watermark <input_dir> -o <output_dir>");
            process::exit(1);
        };
        compositor.process_directory(input_path, &output_dir, &info, &style)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![compositor.process_file(input_path, &output_path, &info, &style)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, &cli);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Stamped: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fatal(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn build_info(cli: &Cli) -> Result<WatermarkInfo, String> {
    let mut info: WatermarkInfo = match &cli.info {
        Some(path) => load_json(path)?,
        None => WatermarkInfo::default(),
    };

    if let Some(time) = &cli.time {
        info.time = Some(time.clone());
    } else if info.time.is_none() {
        info.time = Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    }

    if let (Some(lat), Some(lng)) = (cli.lat, cli.lng) {
        let fix = if cli.wgs84 {
            LocationFix::wgs84(lat, lng)
        } else {
            LocationFix::gcj02(lat, lng)
        };
        info = info.with_location(&fix);
    }

    for (field, value) in [
        (&mut info.address, &cli.address),
        (&mut info.name, &cli.name),
        (&mut info.company, &cli.company),
    ] {
        if value.is_some() {
            field.clone_from(value);
        }
    }

    Ok(info)
}

fn build_style(cli: &Cli) -> Result<WatermarkStyle, String> {
    let mut style: WatermarkStyle = match &cli.style {
        Some(path) => load_json(path)?,
        None => WatermarkStyle::default(),
    };

    if let Some(h) = cli.bar_height {
        style.bar_height = h;
    }
    if let Some(size) = cli.font_size {
        style.font_size = size;
    }
    if let Some(c) = &cli.background {
        style.background_color.clone_from(c);
    }
    if let Some(c) = &cli.text_color {
        style.text_color.clone_from(c);
    }

    if style.bar_height <= 0.0 || style.font_size <= 0.0 {
        warn!(
            bar_height = style.bar_height,
            font_size = style.font_size,
            "non-positive sizes draw nothing visible"
        );
    }

    Ok(style)
}

fn build_compositor(cli: &Cli) -> Result<WatermarkCompositor, String> {
    let mut compositor = WatermarkCompositor::new();

    if let (Some(width), Some(height)) = (cli.width, cli.height) {
        compositor = compositor.with_viewport(Viewport::new(width, height, cli.dpr.unwrap_or(1.0)));
    }

    if cli.font.is_some() || !cli.fallback_font.is_empty() {
        let mut fonts = match &cli.font {
            Some(regular) => FontSet::from_files(regular, cli.bold_font.as_deref())
                .map_err(|e| format!("{}: {e}", regular.display()))?,
            None => FontSet::embedded().map_err(|e| e.to_string())?,
        };
        for path in &cli.fallback_font {
            fonts = fonts
                .with_fallback_file(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
        }
        compositor = compositor.with_fonts(fonts.with_system_fallbacks());
    }

    Ok(compositor)
}

fn print_result(result: &ProcessResult, cli: &Cli) {
    if cli.quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        match &result.output {
            Some(out) => eprintln!("[OK] {filename} -> {}", out.display()),
            None => eprintln!("[OK] {filename}"),
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if cli.verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
