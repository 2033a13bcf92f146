use std::fs::File;
use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use dbdump_core::{DumpError, PlatformProfile, Result};
use tracing::debug;

use crate::command::{Invocation, Pipeline};

/// Executes a pipeline to completion.
pub trait ProcessRunner {
    fn run(&self, pipeline: &Pipeline) -> Result<()>;
}

/// Spawns every stage of a pipeline as its own process, chaining stdout into
/// the next stage's stdin, and blocks until all of them exit. There is no
/// timeout: a hung tool hangs the caller.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    profile: Arc<dyn PlatformProfile>,
}

struct Stage {
    child: Child,
    shown: String,
}

struct Finished {
    shown: String,
    status: ExitStatus,
    stderr: Vec<u8>,
}

impl PipelineRunner {
    pub fn new(profile: Arc<dyn PlatformProfile>) -> Self {
        Self { profile }
    }

    fn spawn_all(&self, pipeline: &Pipeline) -> Result<Vec<Stage>> {
        let last = pipeline.stages().len() - 1;
        let mut stages: Vec<Stage> = Vec::with_capacity(last + 1);
        let mut upstream: Option<ChildStdout> = None;

        for (i, invocation) in pipeline.stages().iter().enumerate() {
            let stdin = match (i, upstream.take(), pipeline.stdin()) {
                (_, Some(out), _) => Stdio::from(out),
                (0, None, Some(path)) => Stdio::from(open_input(path)?),
                _ => Stdio::piped(),
            };
            let stdout = match (i == last, pipeline.stdout()) {
                (true, Some(path)) => match File::create(path) {
                    Ok(file) => Stdio::from(file),
                    Err(e) => {
                        abort(stages);
                        return Err(DumpError::io(format!("create {}", path.display()), e));
                    }
                },
                _ => Stdio::piped(),
            };

            let stage = match self.spawn(invocation, stdin, stdout) {
                Ok(stage) => stage,
                Err(err) => {
                    abort(stages);
                    return Err(err);
                }
            };
            stages.push(stage);
            if i < last {
                upstream = stages[i].child.stdout.take();
            }
        }
        Ok(stages)
    }

    fn spawn(&self, invocation: &Invocation, stdin: Stdio, stdout: Stdio) -> Result<Stage> {
        let shown = invocation.render_redacted(self.profile.as_ref());
        debug!(command = %shown, "launching");
        let mut child = Command::new(invocation.program())
            .args(invocation.args())
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DumpError::Launch {
                command: shown.clone(),
                source,
            })?;
        // Nothing is fed on a piped stdin; closing it lets readers see EOF.
        drop(child.stdin.take());
        Ok(Stage { child, shown })
    }
}

impl ProcessRunner for PipelineRunner {
    fn run(&self, pipeline: &Pipeline) -> Result<()> {
        let mut stages = self.spawn_all(pipeline)?;

        // Every stderr pipe, and the final stdout when it is not redirected,
        // is drained to EOF before any child is reaped, so no stage can block
        // on a full pipe while we wait on another.
        let finished = thread::scope(|scope| {
            let drains: Vec<_> = stages
                .iter_mut()
                .map(|stage| {
                    let stderr = stage.child.stderr.take();
                    let stdout = stage.child.stdout.take();
                    scope.spawn(move || drain(stderr, stdout))
                })
                .collect();
            let outputs: Vec<Vec<u8>> = drains
                .into_iter()
                .map(|h| h.join().unwrap_or_default())
                .collect();

            stages
                .into_iter()
                .zip(outputs)
                .map(|(mut stage, stderr)| {
                    let status = stage.child.wait().map_err(|e| {
                        DumpError::io(format!("wait for `{}`", stage.shown), e)
                    })?;
                    Ok(Finished {
                        shown: stage.shown,
                        status,
                        stderr,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        match first_failure(finished) {
            None => {
                debug!(
                    command = %pipeline.render_redacted(self.profile.as_ref()),
                    "finished"
                );
                Ok(())
            }
            Some(failed) => Err(DumpError::Process {
                command: failed.shown,
                exit_code: failed.status.code(),
                stderr: String::from_utf8_lossy(&failed.stderr).trim_end().to_owned(),
            }),
        }
    }
}

fn open_input(path: &std::path::Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DumpError::NotFound(path.display().to_string()),
        _ => DumpError::io(format!("open {}", path.display()), e),
    })
}

fn drain(stderr: Option<ChildStderr>, stdout: Option<ChildStdout>) -> Vec<u8> {
    let sink = stdout.map(|mut out| {
        thread::spawn(move || {
            let _ = std::io::copy(&mut out, &mut std::io::sink());
        })
    });
    let mut buf = Vec::new();
    if let Some(mut err) = stderr {
        let _ = err.read_to_end(&mut buf);
    }
    if let Some(handle) = sink {
        let _ = handle.join();
    }
    buf
}

/// The earliest failed stage. A stage killed by SIGPIPE only reacts to a
/// downstream failure, so it is reported only when nothing else failed.
fn first_failure(finished: Vec<Finished>) -> Option<Finished> {
    let mut broken_pipe = None;
    for stage in finished {
        if stage.status.success() {
            continue;
        }
        if killed_by_sigpipe(&stage.status) {
            if broken_pipe.is_none() {
                broken_pipe = Some(stage);
            }
            continue;
        }
        return Some(stage);
    }
    broken_pipe
}

fn kill(stage: &mut Stage) {
    let _ = stage.child.kill();
    let _ = stage.child.wait();
}

fn abort(mut stages: Vec<Stage>) {
    stages.iter_mut().for_each(kill);
}

#[cfg(unix)]
fn killed_by_sigpipe(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    const SIGPIPE: i32 = 13;
    status.signal() == Some(SIGPIPE)
}

#[cfg(not(unix))]
fn killed_by_sigpipe(_status: &ExitStatus) -> bool {
    false
}
