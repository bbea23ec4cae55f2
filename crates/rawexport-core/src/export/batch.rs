//! Convert many source files to disk in one call.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use web_time::Instant;

use super::session::Session;
use crate::config::SessionConfig;
use crate::encode::{DefaultCodec, ExportRequest, ImageCodec};
use crate::error::ExportError;

/// What happened to one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    /// Files written, in request order. Empty when `error` is set.
    pub outputs: Vec<PathBuf>,
    pub error: Option<ExportError>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub elapsed_ms: f64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }
}

/// Output path for `request` applied to `input`.
///
/// `IMG_0001.CR2` exported as WebP becomes `<dir>/IMG_0001.webp`. When two
/// requests share an extension, every one after the first gets its index
/// appended (`IMG_0001-1.jpg`).
pub fn output_path(
    output_dir: &Path,
    input: &Path,
    requests: &[ExportRequest],
    index: usize,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = requests[index].format().extension();
    let clash = requests[..index]
        .iter()
        .any(|r| r.format().extension() == ext);
    if clash {
        output_dir.join(format!("{stem}-{index}.{ext}"))
    } else {
        output_dir.join(format!("{stem}.{ext}"))
    }
}

/// `path`, or the first free `<stem>-<n>.<ext>` after it when an earlier
/// file in the batch already claimed that name.
fn claim_path(path: PathBuf, taken: &mut HashSet<PathBuf>) -> PathBuf {
    if taken.insert(path.clone()) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}-{n}.{ext}"));
        if taken.insert(candidate.clone()) {
            log::debug!("{} already written, using {}", path.display(), candidate.display());
            return candidate;
        }
        n += 1;
    }
}

/// Decode each input once and write every requested export next to it in
/// `output_dir`.
///
/// Requests are validated up front; a bad request fails the whole call. A
/// file that fails to load, decode or encode is recorded in the report and
/// the batch moves on. Inputs from different folders that share a file stem
/// never overwrite each other: later ones get a numeric suffix.
pub fn convert_files(
    inputs: &[PathBuf],
    output_dir: &Path,
    requests: &[ExportRequest],
    config: &SessionConfig,
) -> Result<BatchReport, ExportError> {
    let started = Instant::now();
    config.validate()?;
    let caps = DefaultCodec.capabilities();
    for request in requests {
        request.validate(&caps)?;
    }
    fs::create_dir_all(output_dir)?;

    let mut files = Vec::with_capacity(inputs.len());
    let mut taken = HashSet::new();
    for input in inputs {
        let outcome = match convert_one(input, output_dir, requests, config, &mut taken) {
            Ok(outputs) => FileOutcome {
                input: input.clone(),
                outputs,
                error: None,
            },
            Err(err) => {
                log::warn!("{}: {err}", input.display());
                FileOutcome {
                    input: input.clone(),
                    outputs: Vec::new(),
                    error: Some(err),
                }
            }
        };
        files.push(outcome);
    }

    let report = BatchReport {
        files,
        elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
    };
    log::info!(
        "batch converted {} of {} files in {:.1} ms",
        report.succeeded(),
        report.files.len(),
        report.elapsed_ms
    );
    Ok(report)
}

fn convert_one(
    input: &Path,
    output_dir: &Path,
    requests: &[ExportRequest],
    config: &SessionConfig,
    taken: &mut HashSet<PathBuf>,
) -> Result<Vec<PathBuf>, ExportError> {
    let session = Session::new(config.clone())?;
    session.load_file(input)?;
    let exported = session.export_many(requests)?;

    let mut written = Vec::with_capacity(exported.results.len());
    for (index, result) in exported.results.iter().enumerate() {
        let path = claim_path(output_path(output_dir, input, requests, index), taken);
        fs::write(&path, &result.bytes)
            .map_err(|e| ExportError::Io(format!("{}: {e}", path.display())))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{JpegOptions, PngOptions, WebpOptions};

    #[test]
    fn test_output_names() {
        let requests = vec![
            ExportRequest::from(JpegOptions::default()),
            ExportRequest::from(WebpOptions::default()),
            ExportRequest::from(JpegOptions {
                width: Some(320),
                ..Default::default()
            }),
        ];
        let dir = Path::new("/out");
        let input = Path::new("/shoot/IMG_0001.CR2");
        assert_eq!(output_path(dir, input, &requests, 0), Path::new("/out/IMG_0001.jpg"));
        assert_eq!(output_path(dir, input, &requests, 1), Path::new("/out/IMG_0001.webp"));
        assert_eq!(output_path(dir, input, &requests, 2), Path::new("/out/IMG_0001-2.jpg"));
    }

    #[test]
    fn test_claimed_names_get_a_suffix() {
        let mut taken = HashSet::new();
        let first = claim_path(PathBuf::from("/out/img.jpg"), &mut taken);
        let second = claim_path(PathBuf::from("/out/img.jpg"), &mut taken);
        let third = claim_path(PathBuf::from("/out/img.jpg"), &mut taken);
        assert_eq!(first, Path::new("/out/img.jpg"));
        assert_eq!(second, Path::new("/out/img-1.jpg"));
        assert_eq!(third, Path::new("/out/img-2.jpg"));
    }

    #[test]
    fn test_same_stem_in_two_folders_keeps_both() {
        let dir = std::env::temp_dir().join(format!("rawexport-stems-{}", std::process::id()));
        let mut inputs = Vec::new();
        for (folder, shade) in [("a", 40u8), ("b", 220u8)] {
            fs::create_dir_all(dir.join(folder)).unwrap();
            let path = dir.join(folder).join("img.png");
            image::RgbImage::from_pixel(8, 4, image::Rgb([shade; 3]))
                .save(&path)
                .unwrap();
            inputs.push(path);
        }

        let out = dir.join("out");
        let report = convert_files(
            &inputs,
            &out,
            &[PngOptions::default().into()],
            &SessionConfig::default(),
        )
        .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.files[0].outputs, vec![out.join("img.png")]);
        assert_eq!(report.files[1].outputs, vec![out.join("img-1.png")]);
        let first = image::open(out.join("img.png")).unwrap().to_rgb8();
        let second = image::open(out.join("img-1.png")).unwrap().to_rgb8();
        assert_eq!(first.get_pixel(0, 0).0, [40; 3]);
        assert_eq!(second.get_pixel(0, 0).0, [220; 3]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bad_request_fails_before_any_file() {
        let requests = vec![ExportRequest::from(PngOptions {
            compression_level: 12,
            ..Default::default()
        })];
        let result = convert_files(
            &[PathBuf::from("/nonexistent/a.nef")],
            &std::env::temp_dir(),
            &requests,
            &SessionConfig::default(),
        );
        assert!(matches!(result, Err(ExportError::InvalidParameter { .. })));
    }

    #[test]
    fn test_missing_input_is_reported_and_skipped() {
        let dir = std::env::temp_dir().join(format!("rawexport-batch-{}", std::process::id()));
        let good = dir.join("good.png");
        fs::create_dir_all(&dir).unwrap();
        image::RgbImage::from_pixel(16, 8, image::Rgb([10, 200, 30]))
            .save(&good)
            .unwrap();

        let out = dir.join("out");
        let report = convert_files(
            &[dir.join("missing.nef"), good],
            &out,
            &[PngOptions::default().into()],
            &SessionConfig::default(),
        )
        .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(matches!(
            report.files[0].error,
            Some(ExportError::Decode(_))
        ));
        let written = &report.files[1].outputs;
        assert_eq!(written, &vec![out.join("good.png")]);
        let img = image::open(&written[0]).unwrap();
        assert_eq!((img.width(), img.height()), (16, 8));

        fs::remove_dir_all(&dir).unwrap();
    }
}
