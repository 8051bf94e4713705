//! Child-Process Spawner
//!
//! The unsampled batch variant: every unit runs as its own child process,
//! one at a time, after a fixed delay. Child failures are logged and the
//! loop moves on. Each child runs its unit through [`run_unsampled`], so
//! nothing is written to the resource log.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::UnitError;
use crate::plan::RunPlan;

use super::unit::UnitFactory;

/// One child invocation: a program and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSpec {
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ChildSpec {
    pub fn new(label: impl Into<String>, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args,
        }
    }

    /// Re-invokes `exe` in single-unit mode: `exe <plan> --unit <name>`.
    pub fn for_unit(exe: &Path, plan_path: &Path, unit_name: &str) -> Self {
        Self::new(
            unit_name,
            exe,
            vec![
                plan_path.display().to_string(),
                "--unit".to_string(),
                unit_name.to_string(),
            ],
        )
    }
}

/// Sequential child-process launcher.
pub struct Spawner {
    children: Vec<ChildSpec>,
    iterations: usize,
    delay: Duration,
}

impl Spawner {
    pub fn new(children: Vec<ChildSpec>, iterations: usize, delay: Duration) -> Self {
        Self {
            children,
            iterations,
            delay,
        }
    }

    /// Builds a spawner that re-runs `exe` once per plan unit, passing
    /// `extra_args` through to every child.
    pub fn from_plan(
        plan: &RunPlan,
        plan_path: &Path,
        exe: &Path,
        extra_args: &[String],
    ) -> Self {
        let children = plan
            .units
            .iter()
            .map(|unit| {
                let mut child = ChildSpec::for_unit(exe, plan_path, &unit.name);
                child.args.extend_from_slice(extra_args);
                child
            })
            .collect();

        Self::new(children, plan.iterations, plan.spawn_delay())
    }

    /// Runs every child `iterations` times. Returns the number of children
    /// that exited successfully.
    pub fn run(&self) -> usize {
        let mut succeeded = 0;

        for i in 0..self.iterations {
            println!("--- Iteration {} ---", i + 1);

            for child in &self.children {
                thread::sleep(self.delay);
                if spawn_and_wait(child) {
                    succeeded += 1;
                }
            }
        }

        info!(
            "Spawned {} children, {} succeeded",
            self.iterations * self.children.len(),
            succeeded
        );
        succeeded
    }
}

/// Builds and runs one unit on the calling thread, without sampling or
/// resource records. Returns the time spent in the unit.
pub fn run_unsampled(factory: &dyn UnitFactory) -> Result<Duration, UnitError> {
    let mut unit = factory.build()?;

    let start = Instant::now();
    unit.run()?;
    let elapsed = start.elapsed();

    debug!("Unit '{}' finished in {:?}", factory.name(), elapsed);
    Ok(elapsed)
}

fn spawn_and_wait(child: &ChildSpec) -> bool {
    let status = Command::new(&child.program).args(&child.args).status();

    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!("Child '{}' exited with status {:?}", child.label, status.code());
            false
        }
        Err(e) => {
            error!("Failed to spawn '{}' ({}): {}", child.label, child.program.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::UnitSpec;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

    fn shell(label: &str, script: String) -> ChildSpec {
        ChildSpec::new(label, "sh", vec!["-c".to_string(), script])
    }

    #[test]
    fn test_for_unit_arguments() {
        let child = ChildSpec::for_unit(
            Path::new("/usr/bin/fterunner"),
            Path::new("plan.yaml"),
            "capacity",
        );

        assert_eq!(child.label, "capacity");
        assert_eq!(child.program, PathBuf::from("/usr/bin/fterunner"));
        assert_eq!(child.args, vec!["plan.yaml", "--unit", "capacity"]);
    }

    #[test]
    fn test_runs_each_child_per_iteration() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("count.txt");

        let spawner = Spawner::new(
            vec![
                shell("a", format!("echo a >> {}", marker.display())),
                shell("b", format!("echo b >> {}", marker.display())),
            ],
            3,
            Duration::ZERO,
        );

        assert_eq!(spawner.run(), 6);

        let lines: Vec<String> = fs::read_to_string(&marker)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(lines, vec!["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn test_failing_child_does_not_stop_loop() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("count.txt");

        let spawner = Spawner::new(
            vec![
                shell("fails", "exit 2".to_string()),
                ChildSpec::new("missing", dir.path().join("no-such-binary"), Vec::new()),
                shell("ok", format!("echo ok >> {}", marker.display())),
            ],
            2,
            Duration::ZERO,
        );

        assert_eq!(spawner.run(), 2);
        assert_eq!(fs::read_to_string(&marker).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_delay_before_each_child() {
        let spawner = Spawner::new(
            vec![shell("a", "true".to_string()), shell("b", "true".to_string())],
            1,
            Duration::from_millis(100),
        );

        let start = Instant::now();
        spawner.run();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_run_unsampled_writes_no_records() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran.txt");
        let unit = UnitSpec::command("nap", &format!("sleep 0.2; echo x >> {}", marker.display()))
            .with_label("nap.sh");

        let elapsed = run_unsampled(&unit).unwrap();

        assert!(elapsed >= Duration::from_millis(200));
        assert!(marker.exists());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_run_unsampled_propagates_failure() {
        let unit = UnitSpec::command("fails", "exit 4");
        let err = run_unsampled(&unit).unwrap_err();
        assert!(matches!(err, UnitError::Exit { code: Some(4), .. }));
    }

    #[test]
    fn test_from_plan() {
        let mut plan = RunPlan::new(vec![
            UnitSpec::command("first", "true"),
            UnitSpec::command("second", "true"),
        ]);
        plan.iterations = 7;
        plan.spawn_delay_ms = 5;

        let extra = vec!["--output".to_string(), "out.json".to_string()];
        let spawner = Spawner::from_plan(
            &plan,
            Path::new("plan.yaml"),
            Path::new("fterunner"),
            &extra,
        );

        assert_eq!(spawner.iterations, 7);
        assert_eq!(spawner.delay, Duration::from_millis(5));
        assert_eq!(
            spawner.children.iter().map(|c| c.label.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(
            spawner.children[1].args,
            vec!["plan.yaml", "--unit", "second", "--output", "out.json"]
        );
    }
}
