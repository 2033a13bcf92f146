use std::path::{Path, PathBuf};

use dbdump_core::PlatformProfile;

const REDACTED: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    prefix: String,
    value: String,
    secret: bool,
}

/// One program plus its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<Arg>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            prefix: String::new(),
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Adds `<prefix><value>` as one argument whose value is masked in
    /// rendered output meant for logs and errors.
    pub fn secret_arg(mut self, prefix: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            prefix: prefix.into(),
            value: value.into(),
            secret: true,
        });
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as they are passed to the program.
    pub fn args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| format!("{}{}", a.prefix, a.value))
            .collect()
    }

    /// The invocation as a command line with secret arguments masked.
    pub fn render_redacted(&self, profile: &dyn PlatformProfile) -> String {
        self.render(profile, true)
    }

    fn render(&self, profile: &dyn PlatformProfile, redact: bool) -> String {
        let mut out = profile.quote(&self.program);
        for arg in &self.args {
            out.push(' ');
            if redact && arg.secret {
                out.push_str(&profile.quote(&format!("{}{REDACTED}", arg.prefix)));
            } else {
                out.push_str(&profile.quote(&format!("{}{}", arg.prefix, arg.value)));
            }
        }
        out
    }
}

/// Invocations chained stdout-to-stdin, with optional file redirects at the
/// two ends. Rendered as a shell-style command line only for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Invocation>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(first: Invocation) -> Self {
        Self {
            stages: vec![first],
            stdin: None,
            stdout: None,
        }
    }

    pub fn pipe(mut self, next: Invocation) -> Self {
        self.stages.push(next);
        self
    }

    pub fn read_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn write_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn stages(&self) -> &[Invocation] {
        &self.stages
    }

    pub fn stdin(&self) -> Option<&Path> {
        self.stdin.as_deref()
    }

    pub fn stdout(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    /// The full command line, secrets included.
    pub fn render(&self, profile: &dyn PlatformProfile) -> String {
        self.render_with(profile, false)
    }

    /// The command line with secret arguments masked, for logs and errors.
    pub fn render_redacted(&self, profile: &dyn PlatformProfile) -> String {
        self.render_with(profile, true)
    }

    fn render_with(&self, profile: &dyn PlatformProfile, redact: bool) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            out.push_str(&stage.render(profile, redact));
            if i == 0 {
                if let Some(stdin) = &self.stdin {
                    out.push_str(" < ");
                    out.push_str(&profile.quote(&stdin.to_string_lossy()));
                }
            }
        }
        if let Some(stdout) = &self.stdout {
            out.push_str(" > ");
            out.push_str(&profile.quote(&stdout.to_string_lossy()));
        }
        out
    }
}
