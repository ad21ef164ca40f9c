//! ffmpeg-backed media extraction.
//!
//! Spawning the external tool is an I/O boundary, so it sits behind the
//! [`CommandRunner`] trait: the conversion pipeline can be exercised in
//! tests with a fake runner that produces canned frames and audio.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcCommand;

use anyhow::{anyhow, Context, Result};
use walkdir::WalkDir;

/// Runs an external command to completion.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Spawns the real process and waits for it to exit.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()> {
        log::debug!("running {} {}", program, args.join(" "));
        let status = ProcCommand::new(program)
            .args(args)
            .status()
            .with_context(|| format!("running {program}; is it installed and on PATH?"))?;
        if !status.success() {
            return Err(anyhow!("{program} exited with {status}"));
        }
        Ok(())
    }
}

/// Extraction service: turns an input video into scaled frame images and a
/// WAV audio track under a working directory.
pub struct Extractor<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Extractor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Extract video frames scaled to `width` x `height` characters at
    /// `fps`, named `frame_0001.png` onwards. Returns the ordered list of
    /// frame paths actually produced.
    pub fn extract_frames(
        &self,
        input: &Path,
        out_dir: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        let pattern = out_dir.join("frame_%04d.png");
        let args = vec![
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            path_arg(input)?,
            "-vf".into(),
            format!("scale={}:{},fps={}", width, height, fps),
            path_arg(&pattern)?,
        ];
        self.runner.run("ffmpeg", &args)?;

        let mut frames: Vec<PathBuf> = WalkDir::new(out_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("frame_") && n.ends_with(".png"))
            })
            .collect();
        frames.sort();
        Ok(frames)
    }

    /// Extract the audio track as `audio.wav` in `out_dir`.
    pub fn extract_audio(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating {}", out_dir.display()))?;
        let out_audio = out_dir.join("audio.wav");
        let args = vec![
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            path_arg(input)?,
            "-vn".into(),
            path_arg(&out_audio)?,
        ];
        self.runner.run("ffmpeg", &args)?;

        if !out_audio.exists() {
            return Err(anyhow!(
                "audio track was not produced at {}",
                out_audio.display()
            ));
        }
        Ok(out_audio)
    }
}

fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("non-UTF8 path: {}", path.display()))
}

/// Remove stale frames and audio from a previous run and start fresh.
pub fn clean_workspace(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(())
}
