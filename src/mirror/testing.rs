//! Scripted command runner for unit tests.
//!
//! Records every invocation and answers from per-prefix response queues.
//! The last queued response for a prefix repeats. A `clone` creates its
//! destination directory so the working copy "exists" afterwards, unless its
//! response is an error starting with `fatal:`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::git::exec::{CommandRunner, ExecError, Invocation};

#[derive(Debug)]
struct Rule {
    prefix: Vec<String>,
    responses: VecDeque<Result<String, String>>,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    rules: Mutex<Vec<Rule>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response for invocations whose arguments start with `prefix`.
    pub(crate) fn respond(&self, prefix: &[&str], response: Result<&str, &str>) -> &Self {
        let response = response.map(str::to_string).map_err(str::to_string);
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                prefix: prefix.iter().map(|s| s.to_string()).collect(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Arguments of every recorded call, lossily converted.
    pub(crate) fn call_args(&self) -> Vec<Vec<String>> {
        self.calls()
            .iter()
            .map(|inv| {
                inv.arguments()
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect()
            })
            .collect()
    }

    /// Number of calls whose git subcommand is `subcommand`.
    pub(crate) fn count(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| inv.subcommand().as_deref() == Some(subcommand))
            .count()
    }

    fn next_response(&self, args: &[String]) -> Option<Result<String, String>> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .filter(|r| args.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())?;
        if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, ExecError> {
        self.calls.lock().unwrap().push(invocation.clone());
        tokio::task::yield_now().await;

        let args: Vec<String> = invocation
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let response = self
            .next_response(&args)
            .unwrap_or_else(|| Ok(String::new()));

        let fatal = matches!(&response, Err(stderr) if stderr.starts_with("fatal:"));
        if !fatal && invocation.subcommand().as_deref() == Some("clone") {
            if let Some(dest) = args.last() {
                std::fs::create_dir_all(PathBuf::from(dest)).unwrap();
            }
        }

        response.map_err(|stderr| ExecError::Failed {
            command: invocation.to_string(),
            cwd: invocation.cwd().map(|p| p.to_path_buf()),
            code: Some(1),
            stderr,
        })
    }
}
