//! `watch` command.
//!
//! ```text
//! notify watcher → channel → Debouncer → BuildService::rebuild
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use notify::{RecursiveMode, Watcher};

use super::common::{build_service, plural};
use crate::config::SatchelConfig;
use crate::core::is_shutdown;
use crate::log;
use crate::logger::{status_error, status_success, status_unchanged};
use crate::service::debouncer::Debouncer;
use crate::service::{BuildService, RebuildOutcome};

/// Upper bound on a single wait so Ctrl+C is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn watch(config: &SatchelConfig) -> Result<()> {
    let source_dir = config.source_dir();
    let (tx, rx) = channel::unbounded();

    // Watch before the first build so no change is missed while it runs
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })?;
    watcher
        .watch(&source_dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", source_dir.display()))?;

    let service = build_service(config);
    match service.initialize() {
        Ok(report) => log!("build"; "{} ready in {:.2?}", plural(report.bundles, "bundle"), report.elapsed),
        Err(e) => status_error("initial build failed", &e.to_string()),
    }
    log!("watch"; "watching {}", source_dir.display());

    let mut debouncer = Debouncer::new(vec![config.cache_dir(), config.config_path.clone()]);
    while !is_shutdown() {
        match rx.recv_timeout(debouncer.sleep_duration().min(POLL_INTERVAL)) {
            Ok(Ok(event)) => debouncer.add_event(&event),
            Ok(Err(e)) => log!("watch"; "notify error: {}", e),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(changes) = debouncer.take_if_ready() {
                    for (path, kind) in &changes {
                        crate::debug!("watch"; "{}: {}", kind.label(), path.display());
                    }
                    rebuild(&service, changes.len());
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    service.dispose();
    log!("watch"; "stopped");
    Ok(())
}

fn rebuild(service: &BuildService, changed: usize) {
    match service.rebuild() {
        Ok(RebuildOutcome::Rebuilt(report)) => status_success(&format!(
            "{} changed, {} rebuilt in {:.2?}",
            plural(changed, "file"),
            plural(report.bundles, "bundle"),
            report.elapsed
        )),
        Ok(RebuildOutcome::Coalesced) => status_unchanged("rebuild already running"),
        Err(e) => status_error("rebuild failed, serving previous bundles", &e.to_string()),
    }
}
