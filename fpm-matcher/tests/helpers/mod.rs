//! Shared test fixtures: a fake NBIS toolkit and synthetic images
//!
//! The fake tools honor the real CLI contracts:
//! - `cwsq <bitrate> <ext> <raw> -raw_in <w> <h> <depth> <ppi>` writes the
//!   raw file's stem with `<ext>`; its content is the image width
//! - `mindtct <wsq> <prefix>` writes `<prefix>.xyt` whose first minutia's x
//!   is that width (plus auxiliary files, like the real tool)
//! - `bozorth3 <probe> <gallery>` prints the gallery's first x
//!
//! So the score of any comparison is the gallery image's width.

#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use fpm_common::config::BatchFailurePolicy;
use fpm_matcher::services::{
    ArtifactStore, EncodingSettings, NbisPipeline, PipelineSettings, Toolkit,
};
use fpm_matcher::AppState;
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const FAKE_CWSQ: &str = r#"#!/bin/sh
[ "$4" = "-raw_in" ] || { echo "usage: cwsq r ext file -raw_in w h d ppi" >&2; exit 2; }
echo "fake cwsq: encoding $3" >&2
printf '%s\n' "$5" > "${3%.*}.$2"
"#;

pub const FAKE_MINDTCT: &str = r#"#!/bin/sh
w=$(cat "$1")
printf '# fake mindtct\n%s 10 90 50\n20 30 45 60\n' "$w" > "$2.xyt"
: > "$2.min"
: > "$2.qm"
"#;

pub const FAKE_BOZORTH3: &str = r#"#!/bin/sh
grep -v '^#' "$2" | head -n 1 | cut -d ' ' -f 1
"#;

pub const FAILING_MINDTCT: &str = r#"#!/bin/sh
echo "ERROR : bad WSQ frame header" >&2
exit 3
"#;

pub const SILENT_MINDTCT: &str = "#!/bin/sh\nexit 0\n";

pub const SLOW_CWSQ: &str = "#!/bin/sh\nsleep 10\n";

pub const GARBAGE_BOZORTH3: &str = "#!/bin/sh\necho 'not a score'\n";

/// Temp directories holding the fake tools and the artifact root
pub struct Fixture {
    pub tools: TempDir,
    pub artifacts: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_scripts(FAKE_CWSQ, FAKE_MINDTCT, FAKE_BOZORTH3)
    }

    pub fn with_scripts(cwsq: &str, mindtct: &str, bozorth3: &str) -> Self {
        let tools = TempDir::new().unwrap();
        write_script(tools.path(), "cwsq", cwsq);
        write_script(tools.path(), "mindtct", mindtct);
        write_script(tools.path(), "bozorth3", bozorth3);
        Self {
            tools,
            artifacts: TempDir::new().unwrap(),
        }
    }

    pub fn tool(&self, name: &str) -> PathBuf {
        self.tools.path().join(name)
    }

    pub fn toolkit(&self) -> Arc<Toolkit> {
        Arc::new(Toolkit::from_paths(
            self.tool("cwsq"),
            self.tool("mindtct"),
            self.tool("bozorth3"),
        ))
    }

    pub fn store(&self) -> Arc<ArtifactStore> {
        ArtifactStore::open(self.artifacts.path()).unwrap()
    }

    pub fn pipeline(&self, timeout: Duration) -> NbisPipeline {
        NbisPipeline::new(
            self.store(),
            self.toolkit(),
            PipelineSettings {
                tool_timeout: timeout,
                max_dimension: 4096,
                encoding: EncodingSettings::default(),
            },
        )
    }

    pub fn app_state(&self, policy: BatchFailurePolicy) -> AppState {
        AppState::new(
            self.toolkit(),
            Arc::new(self.pipeline(Duration::from_secs(10))),
            policy,
        )
    }

    /// Files left behind in the artifact root
    pub fn leftover_artifacts(&self) -> Vec<String> {
        std::fs::read_dir(self.artifacts.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

/// App state whose toolkit points at paths that do not exist
pub fn unavailable_state() -> AppState {
    let fixture = Fixture::new();
    let toolkit = Arc::new(Toolkit::from_paths(
        PathBuf::from("/nonexistent/cwsq"),
        PathBuf::from("/nonexistent/mindtct"),
        PathBuf::from("/nonexistent/bozorth3"),
    ));
    let backend = NbisPipeline::new(
        fixture.store(),
        Arc::clone(&toolkit),
        PipelineSettings {
            tool_timeout: Duration::from_secs(1),
            max_dimension: 4096,
            encoding: EncodingSettings::default(),
        },
    );
    AppState::new(toolkit, Arc::new(backend), BatchFailurePolicy::Skip)
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Grayscale PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn png_base64(width: u32, height: u32) -> String {
    general_purpose::STANDARD.encode(png_bytes(width, height))
}
