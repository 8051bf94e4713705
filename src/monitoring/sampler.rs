//! Background Resource Sampler
//!
//! Samples resource usage on a dedicated thread while a unit of work runs
//! on the caller's thread. Cancellation is cooperative: [`Sampler::stop`]
//! clears a shared flag, lets the in-flight window finish, then joins the
//! thread and hands the collected samples back to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::probe::{ProcessProbe, UsageProbe};
use super::record::Sample;

/// Delay between the baseline reading and the first window.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// Length of each CPU measurement window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Sampling cadence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    #[serde(rename = "settle_ms", with = "millis", default = "default_settle")]
    pub settle: Duration,
    #[serde(rename = "window_ms", with = "millis", default = "default_window")]
    pub window: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            window: DEFAULT_WINDOW,
        }
    }
}

fn default_settle() -> Duration {
    DEFAULT_SETTLE
}

fn default_window() -> Duration {
    DEFAULT_WINDOW
}

/// Running sampler for one unit of work.
///
/// # Example
///
/// ```rust,no_run
/// use fterunner::monitoring::{Sampler, SamplerConfig};
///
/// let sampler = Sampler::start("json_queries.py", SamplerConfig::default());
/// // ... run the unit ...
/// let samples = sampler.stop();
/// println!("{} samples", samples.len());
/// ```
pub struct Sampler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Vec<Sample>>>,
}

impl Sampler {
    /// Starts sampling the current process.
    pub fn start(label: impl Into<String>, config: SamplerConfig) -> Self {
        let label = label.into();
        Self::spawn(label.clone(), config, move || match ProcessProbe::new() {
            Ok(probe) => Some(probe),
            Err(e) => {
                debug!("Sampler for '{}' could not open a probe: {}", label, e);
                None
            }
        })
    }

    /// Starts sampling with a caller-supplied probe.
    pub fn with_probe<P>(label: impl Into<String>, config: SamplerConfig, probe: P) -> Self
    where
        P: UsageProbe + Send + 'static,
    {
        Self::spawn(label.into(), config, move || Some(probe))
    }

    fn spawn<P, F>(label: String, config: SamplerConfig, open_probe: F) -> Self
    where
        P: UsageProbe,
        F: FnOnce() -> Option<P> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(thread_name(&label))
            .spawn(move || match open_probe() {
                Some(probe) => sample_loop(probe, &label, config, &flag),
                None => Vec::new(),
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start sampler thread: {}", e);
                None
            }
        };

        Self { running, handle }
    }

    /// Returns true while the sampling thread has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.handle.is_some()
    }

    /// Stops sampling and returns every sample taken.
    ///
    /// Blocks until the current measurement window completes and the
    /// thread has exited.
    pub fn stop(mut self) -> Vec<Sample> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<Sample> {
        self.running.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return Vec::new();
        };

        handle.join().unwrap_or_else(|_| {
            warn!("Sampler thread panicked; its samples are lost");
            Vec::new()
        })
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

/// Thread names may not contain NUL bytes.
fn thread_name(label: &str) -> String {
    format!("sampler-{}", label.replace('\0', ""))
}

fn sample_loop<P: UsageProbe>(
    mut probe: P,
    label: &str,
    config: SamplerConfig,
    running: &AtomicBool,
) -> Vec<Sample> {
    let mut samples = Vec::new();

    if let Err(e) = probe.prime() {
        debug!("Sampler for '{}' failed to prime: {}", label, e);
        return samples;
    }

    thread::sleep(config.settle);

    while running.load(Ordering::Acquire) {
        match probe.measure(config.window) {
            Ok(usage) => samples.push(Sample::now(label, usage)),
            Err(e) => {
                debug!("Sampler for '{}' stopped after {} samples: {}", label, samples.len(), e);
                break;
            }
        }
    }

    samples
}

/// Serde adapter storing a `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::monitoring::record::Usage;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Probe returning fixed readings, optionally failing after `fail_after`.
    struct FakeProbe {
        calls: Arc<AtomicUsize>,
        fail_after: Option<usize>,
    }

    impl UsageProbe for FakeProbe {
        fn prime(&mut self) -> Result<(), ProbeError> {
            Ok(())
        }

        fn measure(&mut self, window: Duration) -> Result<Usage, ProbeError> {
            thread::sleep(window);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| n >= limit) {
                return Err(ProbeError::ProcessGone(0));
            }
            Ok(Usage {
                cpu_percent: 10.0,
                memory_percent: 1.0,
            })
        }
    }

    fn fast_config() -> SamplerConfig {
        SamplerConfig {
            settle: Duration::from_millis(10),
            window: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();
        assert_eq!(config.settle, Duration::from_millis(100));
        assert_eq!(config.window, Duration::from_millis(500));
    }

    #[test]
    fn test_config_from_yaml_millis() {
        let config: SamplerConfig = serde_yaml::from_str("settle_ms: 20\nwindow_ms: 250").unwrap();
        assert_eq!(config.settle, Duration::from_millis(20));
        assert_eq!(config.window, Duration::from_millis(250));

        let defaults: SamplerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(defaults, SamplerConfig::default());
    }

    #[test]
    fn test_samples_carry_label() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };

        let sampler = Sampler::with_probe("unit.py", fast_config(), probe);
        thread::sleep(Duration::from_millis(200));
        let samples = sampler.stop();

        assert!(samples.len() >= 2);
        assert!(samples.iter().all(|s| s.label == "unit.py"));
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_no_samples_after_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };

        let sampler = Sampler::with_probe("race", fast_config(), probe);
        thread::sleep(Duration::from_millis(120));
        let samples = sampler.stop();
        let calls_at_stop = calls.load(Ordering::SeqCst);

        // The thread has been joined, so the probe is never touched again.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(calls.load(Ordering::SeqCst), calls_at_stop);
        assert_eq!(samples.len(), calls_at_stop);
    }

    #[test]
    fn test_stop_waits_for_inflight_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };
        let config = SamplerConfig {
            settle: Duration::from_millis(0),
            window: Duration::from_millis(300),
        };

        let sampler = Sampler::with_probe("slow", config, probe);
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let samples = sampler.stop();

        // The first window was in flight and completes before stop returns.
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_probe_failure_halts_silently() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: Some(2),
        };

        let sampler = Sampler::with_probe("flaky", fast_config(), probe);
        thread::sleep(Duration::from_millis(300));
        let samples = sampler.stop();

        assert_eq!(samples.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stop_during_settle_yields_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };
        let config = SamplerConfig {
            settle: Duration::from_millis(200),
            window: Duration::from_millis(50),
        };

        let sampler = Sampler::with_probe("quick", config, probe);
        assert!(sampler.is_running());
        let samples = sampler.stop();

        assert!(samples.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_label_with_nul_byte() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };

        assert_eq!(thread_name("a\0b"), "sampler-ab");

        let sampler = Sampler::with_probe("nul\0label", fast_config(), probe);
        assert!(sampler.is_running());
        thread::sleep(Duration::from_millis(120));
        let samples = sampler.stop();

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.label == "nul\0label"));
    }

    #[test]
    fn test_drop_joins_thread() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            calls: Arc::clone(&calls),
            fail_after: None,
        };

        {
            let _sampler = Sampler::with_probe("dropped", fast_config(), probe);
            thread::sleep(Duration::from_millis(100));
        }

        let calls_after_drop = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(120));
        assert_eq!(calls.load(Ordering::SeqCst), calls_after_drop);
    }

    #[test]
    fn test_process_sampler_collects_real_samples() {
        let config = SamplerConfig {
            settle: Duration::from_millis(10),
            window: Duration::from_millis(200),
        };

        let sampler = Sampler::start("self", config);
        thread::sleep(Duration::from_millis(500));
        let samples = sampler.stop();

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.memory_percent > 0.0));
    }
}
