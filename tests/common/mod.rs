//! Shared fixtures for service tests

#![allow(dead_code)]

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use treenote::config::Settings;
use treenote::infrastructure::traits::{CommandRunner, FileSystem, RealFileSystem};

/// Stands in for pandoc and pdftoppm. The rasterizer writes a real PNG so the
/// thumbnail can be loaded afterwards.
pub struct FakeConverter {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failing: Option<String>,
    gate: Option<Mutex<Receiver<()>>>,
    page: (u32, u32),
}

impl FakeConverter {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: None,
            gate: None,
            page: (120, 160),
        }
    }

    /// Every run of `program` exits with status 1.
    pub fn failing(program: &str) -> Self {
        Self {
            failing: Some(program.to_string()),
            ..Self::new()
        }
    }

    /// The converter step blocks until a message arrives on `gate`.
    pub fn gated(gate: Receiver<()>) -> Self {
        Self {
            gate: Some(Mutex::new(gate)),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn runs_of(&self, program: &str) -> usize {
        self.calls().iter().filter(|(cmd, _)| cmd == program).count()
    }
}

fn output(code: i32, stderr: &str) -> Output {
    Output {
        status: ExitStatus::from_raw(code << 8),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

impl CommandRunner for FakeConverter {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        self.calls.lock().unwrap().push((
            cmd.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));

        if cmd == "pandoc" {
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv();
            }
        }
        if self.failing.as_deref() == Some(cmd) {
            return Ok(output(1, "conversion exploded"));
        }
        if cmd == "pdftoppm" {
            let (width, height) = self.page;
            let page = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
            page.save(format!("{}-1.png", args[1]))
                .map_err(io::Error::other)?;
        }
        Ok(output(0, ""))
    }
}

/// Real filesystem that refuses to write files called `name`.
pub struct FailingWrites {
    name: String,
}

impl FailingWrites {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl FileSystem for FailingWrites {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        RealFileSystem.read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        if path.file_name().is_some_and(|file| file == self.name.as_str()) {
            return Err(io::Error::other("disk full"));
        }
        RealFileSystem.write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        RealFileSystem.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        RealFileSystem.is_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.remove_file(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.ensure_parent(path)
    }
}

/// Settings rooted in a fresh temporary workspace.
pub fn workspace() -> (TempDir, Settings) {
    let temp = TempDir::new().unwrap();
    let settings = Settings {
        workspace: temp.path().to_path_buf(),
        crop_thumbnail: 10,
        thumbnail_width: 100,
        ..Settings::default()
    };
    (temp, settings)
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
