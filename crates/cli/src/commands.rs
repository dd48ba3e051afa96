use anyhow::{bail, Context, Result};
use chrono::Local;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use voipspy_media_core::{
    export_run, timestamped_directory, write_transcript, CaptureSessionManager, EngineConfig,
    HttpTranscriber, ReconstructionEngine, RunResult, TranscriptionService, TsharkBackend,
};

use crate::table;

fn run_capture(config: EngineConfig, capture: &Path) -> Result<RunResult> {
    let engine = ReconstructionEngine::new(config)?;
    engine
        .process_file(capture)
        .with_context(|| format!("failed to process {}", capture.display()))
}

pub fn extract(
    mut config: EngineConfig,
    capture: &Path,
    output: &Path,
    merge: bool,
    min_duration: Option<f64>,
) -> Result<()> {
    config.export.merge |= merge;
    if let Some(secs) = min_duration {
        config.export.min_duration_secs = secs;
    }
    let export = config.export.clone();
    let run = run_capture(config, capture)?;

    let directory = timestamped_directory(output);
    let report = export_run(&run.artifacts, &run.diagnostics, &directory, &export)
        .with_context(|| format!("failed to export to {}", directory.display()))?;

    if !report.exported.is_empty() {
        println!("{}", table::streams(&report.exported));
    }
    println!("{}", table::diagnostics(&run.diagnostics));
    for file in &report.files {
        println!("wrote {}", file.display());
    }
    if let Some(merged) = &report.merged {
        println!("wrote {}", merged.display());
    }
    println!("wrote {}", report.metadata.display());
    if report.skipped_short + report.skipped_duplicate > 0 {
        println!(
            "skipped {} short and {} duplicate streams",
            report.skipped_short, report.skipped_duplicate
        );
    }
    Ok(())
}

pub fn metadata(config: EngineConfig, capture: &Path, json: bool) -> Result<()> {
    let run = run_capture(config, capture)?;
    if json {
        println!("{}", run.metadata().to_json_pretty()?);
    } else {
        println!("{}", table::streams(&run.summaries()));
        println!("{}", table::diagnostics(&run.diagnostics));
    }
    Ok(())
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

pub async fn transcribe(
    mut config: EngineConfig,
    input: &Path,
    endpoint: Option<String>,
    model: Option<String>,
    timeout: Option<u64>,
    output: &Path,
) -> Result<()> {
    if endpoint.is_some() {
        config.transcription.endpoint = endpoint;
    }
    if let Some(model) = model {
        config.transcription.model = model;
    }
    if let Some(secs) = timeout {
        config.transcription.timeout_secs = secs;
    }
    config.validate()?;

    let transcriber = HttpTranscriber::from_config(&config.transcription)?;
    info!("Transcribing through {}", transcriber.url());
    let service = TranscriptionService::new(
        Arc::new(transcriber),
        Duration::from_secs(config.transcription.timeout_secs),
    );

    let token = service.cancellation_token();
    let _watcher = AbortOnDrop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling transcription");
            token.cancel();
        }
    }));

    let text = if is_wav(input) {
        let wav = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
        let spec = hound::WavReader::new(Cursor::new(&wav))
            .with_context(|| format!("{} is not a WAV file", input.display()))?
            .spec();
        service.transcribe_wav(wav, spec.sample_rate).await?
    } else {
        let min_duration = config.export.min_duration_secs;
        let run = run_capture(config, input)?;
        let mut sections = Vec::new();
        let mut failures = 0usize;
        for artifact in run.artifacts.iter().filter(|a| a.duration_secs() >= min_duration) {
            match service.transcribe_artifact(artifact).await {
                Ok(text) => sections.push(format!("[{}]\n{}\n", artifact.key(), text.trim())),
                Err(err) => {
                    // The artifact stays valid; report and move on
                    eprintln!("{}: {}", artifact.key(), err);
                    failures += 1;
                }
            }
        }
        if sections.is_empty() && failures > 0 {
            bail!("all {} transcriptions failed", failures);
        }
        sections.join("\n")
    };

    let path = write_transcript(output, &text)?;
    println!("{}", text);
    println!("wrote {}", path.display());
    Ok(())
}

pub async fn capture(
    config: EngineConfig,
    interface: Option<String>,
    output: Option<PathBuf>,
    duration: Option<u64>,
    extract_after: bool,
) -> Result<()> {
    let interface = interface.unwrap_or_else(|| config.capture.interface.clone());
    let output = match output {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config.capture.output_dir)?;
            config
                .capture
                .output_dir
                .join(format!("capture-{}.pcap", Local::now().format("%Y%m%d_%H%M%S")))
        }
    };

    let backend = TsharkBackend::new(config.capture.program.clone())
        .with_stop_grace(Duration::from_secs(config.capture.stop_grace_secs));
    let sessions = CaptureSessionManager::global();
    let session = sessions.start(&backend, &interface, output)?;
    println!(
        "capturing on {} into {} (Ctrl-C to stop)",
        session.interface,
        session.output.display()
    );

    match duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    // Stopping waits for tshark to exit
    let Some(done) = tokio::task::spawn_blocking(move || sessions.stop()).await?? else {
        bail!("capture session ended unexpectedly");
    };
    let elapsed = done.stopped_at - done.info.started_at;
    println!(
        "captured {}s into {}",
        elapsed.num_seconds(),
        done.info.output.display()
    );

    if extract_after {
        let base = config.capture.output_dir.clone();
        extract(config, &done.info.output, &base, false, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wav() {
        assert!(is_wav(Path::new("a/b/call.WAV")));
        assert!(!is_wav(Path::new("call.pcap")));
        assert!(!is_wav(Path::new("wav")));
    }

    #[test]
    fn test_transcribe_requires_endpoint() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = temp_dir::TempDir::new().unwrap();
        let result = runtime.block_on(transcribe(
            EngineConfig::default(),
            Path::new("call.wav"),
            None,
            None,
            None,
            dir.path(),
        ));
        assert!(result.unwrap_err().to_string().contains("endpoint"));
    }

    #[test]
    fn test_transcribe_rejects_zero_timeout() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = temp_dir::TempDir::new().unwrap();
        let result = runtime.block_on(transcribe(
            EngineConfig::default(),
            Path::new("call.wav"),
            Some("http://localhost:1".to_string()),
            None,
            Some(0),
            dir.path(),
        ));
        assert!(result.unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_watcher_is_aborted_on_drop() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            let guard = AbortOnDrop(tokio::spawn(async move {
                let _tx = tx;
                std::future::pending::<()>().await
            }));
            drop(guard);
            assert!(rx.await.is_err());
        });
    }
}
