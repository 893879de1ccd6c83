use std::{
    io::Read,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::error::ProbeError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A command line with a `{module}` token. The child prints the module's
/// public names as a JSON array of strings on stdout.
#[derive(Debug, Clone)]
pub struct IsolatedProbe {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl IsolatedProbe {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arguments with `{module}` expanded. Without any token the module is
    /// appended as the last argument.
    pub fn args_for(&self, module: &str) -> Result<Vec<String>, ProbeError> {
        let mut out = Vec::with_capacity(self.args.len() + 1);
        let mut expanded = false;

        for arg in &self.args {
            let (value, hit) = expand(arg, module)?;
            expanded |= hit;
            out.push(value);
        }
        if !expanded {
            out.push(module.to_string());
        }
        Ok(out)
    }

    /// Run the probe for `module` and parse the names it prints.
    pub fn run(&self, module: &str) -> Result<Vec<String>, ProbeError> {
        let args = self.args_for(module)?;
        tracing::debug!(program = %self.program, module, "spawning probe");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ProbeError::Spawn {
                program: self.program.clone(),
                error,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(ProbeError::Exit {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        serde_json::from_slice::<Vec<String>>(&stdout).map_err(|e| ProbeError::Output {
            program: self.program.clone(),
            reason: e.to_string(),
        })
    }

    fn wait(&self, child: &mut Child) -> Result<std::process::ExitStatus, ProbeError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let polled = child.try_wait().map_err(|error| ProbeError::Spawn {
                program: self.program.clone(),
                error,
            })?;
            if let Some(status) = polled {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(program = %self.program, timeout = ?self.timeout, "probe timed out");
                return Err(ProbeError::Timeout {
                    program: self.program.clone(),
                    after: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn expand(arg: &str, module: &str) -> Result<(String, bool), ProbeError> {
    if !arg.contains('{') {
        return Ok((arg.to_string(), false));
    }

    let mut out = String::with_capacity(arg.len() + module.len());
    let mut rest = arg;
    let mut hit = false;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| ProbeError::Argument {
            arg: arg.to_string(),
            reason: "unclosed token".to_string(),
        })?;

        match &after[..end] {
            "module" => {
                out.push_str(module);
                hit = true;
            }
            token => {
                return Err(ProbeError::Argument {
                    arg: arg.to_string(),
                    reason: format!("unknown token {{{token}}}"),
                })
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok((out, hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn expands_module_token() {
        let probe = IsolatedProbe::new("python3", ["-c", "print({module})", "--name={module}"]);
        assert_eq!(
            probe.args_for("zlib").unwrap(),
            vec!["-c", "print(zlib)", "--name=zlib"]
        );
    }

    #[test]
    fn appends_module_without_token() {
        let probe = IsolatedProbe::new("probe-names", ["--json"]);
        assert_eq!(probe.args_for("zlib").unwrap(), vec!["--json", "zlib"]);
    }

    #[test]
    fn rejects_bad_tokens() {
        let unclosed = IsolatedProbe::new("p", ["{module"]);
        assert!(matches!(unclosed.args_for("zlib"), Err(ProbeError::Argument { .. })));

        let unknown = IsolatedProbe::new("p", ["{home}"]);
        assert!(matches!(unknown.args_for("zlib"), Err(ProbeError::Argument { .. })));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let probe = IsolatedProbe::new("/definitely/not/a/program", Vec::<String>::new());
        assert!(matches!(probe.run("zlib"), Err(ProbeError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn parses_json_names() {
        let probe = IsolatedProbe::new("sh", ["-c", r#"echo '["compress", "{module}"]'"#]);
        assert_eq!(probe.run("zlib").unwrap(), vec!["compress", "zlib"]);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_carries_stderr() {
        let probe = IsolatedProbe::new("sh", ["-c", "echo boom >&2; exit 3", "{module}"]);
        match probe.run("zlib") {
            Err(ProbeError::Exit { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn garbage_output_is_rejected() {
        let probe = IsolatedProbe::new("sh", ["-c", "echo not json", "{module}"]);
        assert!(matches!(probe.run("zlib"), Err(ProbeError::Output { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn hung_probe_is_killed() {
        let probe = IsolatedProbe::new("sh", ["-c", "exec sleep 5", "{module}"])
            .with_timeout(Duration::from_millis(100));
        let started = Instant::now();

        assert!(matches!(probe.run("zlib"), Err(ProbeError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
