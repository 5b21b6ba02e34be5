use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use crate::{OcrEngine, OcrError, OcrRequest, OcrResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractOptions {
    pub program: PathBuf,
    pub langs: Vec<String>,
    pub psm: u32,
}

impl Default for TesseractOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
            langs: vec!["eng".to_string()],
            psm: 3,
        }
    }
}

/// Runs the `tesseract` command line tool once per request, feeding the
/// encoded image over stdin and reading the text from stdout.
#[derive(Debug)]
pub struct TesseractCliEngine {
    options: TesseractOptions,
    args: Vec<String>,
}

impl TesseractCliEngine {
    pub fn new(options: TesseractOptions) -> Self {
        let mut args = vec!["stdin".to_string(), "stdout".to_string()];
        if !options.langs.is_empty() {
            args.push("-l".to_string());
            args.push(options.langs.join("+"));
        }
        args.push("--psm".to_string());
        args.push(options.psm.to_string());
        Self { options, args }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn program(&self) -> String {
        self.options.program.display().to_string()
    }

    fn spawn_error(&self, source: std::io::Error) -> OcrError {
        OcrError::Spawn {
            program: self.program(),
            source,
        }
    }
}

impl OcrEngine for TesseractCliEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.options.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|err| self.spawn_error(err))?;
        if !output.status.success() {
            return Err(OcrError::backend(format!(
                "'{} --version' exited with {}",
                self.program(),
                output.status
            )));
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        if let Some(line) = banner.lines().next() {
            log::debug!("using {line}");
        }
        Ok(())
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        let mut child = Command::new(&self.options.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        feed(&mut child, request.image())?;
        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(OcrError::backend(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            log::warn!("tesseract stderr: {}", stderr.trim());
        }
        Ok(OcrResponse::new(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

/// Writes the image to the child's stdin and closes it. On failure the child
/// is killed and reaped before the error is returned.
fn feed(child: &mut Child, image: &[u8]) -> Result<(), OcrError> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(err) = stdin.write_all(image) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(err.into());
    }
    Ok(())
}
