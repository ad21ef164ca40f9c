use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm, FuzzySelect, Input};
use plascii::audio::AudioPlayer;
use plascii::extract::{clean_workspace, Extractor, SystemRunner};
use plascii::playback::Scheduler;
use plascii::progress::{draw_bar, DEFAULT_BAR_WIDTH};
use plascii::terminal::TerminalSurface;
use plascii::{
    build_sequence, decode_luma_scaled, render_frame, still_target_height, AppConfig, GlyphRamp,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(version, about = "Play videos and images as character art in the terminal.")]
struct Args {
    /// Input video or image file
    input: Option<PathBuf>,

    /// Target columns for still-image rendering (defaults to terminal width)
    #[arg(long)]
    columns: Option<u32>,

    /// Frames per second to extract from video
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Character cell aspect correction for still images
    #[arg(long)]
    font_ratio: Option<f32>,

    /// Keep extracted frames and audio after playback
    #[arg(long, default_value_t = false)]
    keep_frames: bool,

    /// Directory for extracted frames and audio
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = load_config()?;
    let ramp = GlyphRamp::new(&config.ascii_chars)?;

    let input = match args.input.clone() {
        Some(path) => path,
        None => prompt_input()?,
    };
    if !input.exists() {
        bail!("input does not exist: {}", input.display());
    }

    let is_image = matches!(
        input.extension().and_then(|s| s.to_str()),
        Some("png" | "jpg" | "jpeg")
    );

    if is_image {
        run_image(&input, &args, &config, &ramp)
    } else {
        run_video(&input, &args, &config, &ramp)
    }
}

fn load_config() -> Result<AppConfig> {
    // Look for plascii.json in app support, then the current dir, then use
    // the built-in defaults.
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::data_dir() {
        d.push("plascii");
        d.push("plascii.json");
        tried.push(d);
    }
    tried.push(PathBuf::from("plascii.json"));

    for p in &tried {
        if p.exists() {
            let text =
                fs::read_to_string(p).with_context(|| format!("reading config {}", p.display()))?;
            let config: AppConfig =
                serde_json::from_str(&text).context("parsing config json")?;
            config
                .validate()
                .with_context(|| format!("validating config {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(AppConfig::default())
}

fn prompt_input() -> Result<PathBuf> {
    let files = find_media_files()?;
    if files.is_empty() {
        bail!("No media files found in current directory.");
    }
    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose an input file")
        .default(0)
        .items(&files)
        .interact()?;
    Ok(PathBuf::from(&files[selection]))
}

fn find_media_files() -> Result<Vec<String>> {
    Ok(WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(
                        ext.to_str(),
                        Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "png" | "jpg" | "jpeg")
                    )
                })
        })
        .map(|e| e.path().to_str().unwrap_or("").to_string())
        .collect())
}

fn run_image(input: &Path, args: &Args, config: &AppConfig, ramp: &GlyphRamp) -> Result<()> {
    let columns = match args.columns {
        Some(c) => c.max(1),
        None => {
            let (cols, _) = TerminalSurface::grid_size()?;
            u32::from(cols.saturating_sub(1)).max(1)
        }
    };
    let font_ratio = args.font_ratio.unwrap_or(config.font_ratio);

    let (src_w, src_h) = image::image_dimensions(input)
        .with_context(|| format!("reading dimensions of {}", input.display()))?;
    let target_h = still_target_height(src_w, src_h, columns, font_ratio);
    let grid = decode_luma_scaled(input, columns, target_h)?;
    let frame = render_frame(&grid, ramp);
    print!("{}", frame.text());

    if Confirm::new()
        .with_prompt("Save the result to a file?")
        .default(false)
        .interact()?
    {
        let name: String = Input::<String>::new()
            .with_prompt("Output file name")
            .interact_text()?;
        let name = name.trim();
        if name.is_empty() {
            bail!("output file name cannot be empty");
        }
        let out_dir = PathBuf::from("images");
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        let out_path = out_dir.join(format!("{name}.txt"));
        fs::write(&out_path, frame.text())
            .with_context(|| format!("writing {}", out_path.display()))?;
        println!("ASCII art saved to {}", out_path.display());
    }

    Ok(())
}

fn run_video(input: &Path, args: &Args, config: &AppConfig, ramp: &GlyphRamp) -> Result<()> {
    let work_dir = match &args.work_dir {
        Some(dir) => dir.clone(),
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("plascii");
            std::env::temp_dir().join(format!("plascii_{stem}"))
        }
    };
    clean_workspace(&work_dir)?;

    // Frames are pre-scaled to the terminal grid here; the renderer applies
    // no further correction.
    let (cols, rows) = TerminalSurface::grid_size()?;
    let width = u32::from(cols.saturating_sub(1)).max(1);
    let height = u32::from(rows.saturating_sub(2)).max(1);

    let extractor = Extractor::new(SystemRunner);
    println!("Extracting frames from {}...", input.display());
    let frame_paths = extractor.extract_frames(input, &work_dir, width, height, args.fps)?;
    log::debug!("extracted {} frames at {}x{}", frame_paths.len(), width, height);

    println!("Extracting audio track...");
    let audio_path = extractor.extract_audio(input, &work_dir)?;

    let stdout = io::stdout();
    let sequence = build_sequence(&work_dir, ramp, |current, total| {
        let mut out = stdout.lock();
        let _ = draw_bar(&mut out, "Converting to ASCII", current, total, DEFAULT_BAR_WIDTH);
    })?;
    println!();

    if sequence.is_empty() {
        bail!("no frames were converted; nothing to play");
    }
    log::debug!("built {} character frames", sequence.len());

    let audio = AudioPlayer::load(&audio_path)?;

    if !Confirm::new()
        .with_prompt("Start playback? (Space pauses, Esc stops)")
        .default(true)
        .interact()?
    {
        return Ok(());
    }

    {
        let mut surface = TerminalSurface::new()?;
        let scheduler = Scheduler::new(
            &sequence,
            audio,
            &mut surface,
            Duration::from_millis(config.tick_ms),
        )?;
        scheduler.run()?;
        // Surface drops here, restoring the cursor and cooked mode.
    }

    println!("\nPlayback finished.");

    if args.keep_frames {
        println!("Extracted media kept in {}", work_dir.display());
    } else {
        fs::remove_dir_all(&work_dir)
            .with_context(|| format!("removing {}", work_dir.display()))?;
    }

    Ok(())
}
