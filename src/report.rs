//! Console output and result files

use crate::proxy::{ParsedList, ProbeMode, ProbeResult, ProbeStatus, Progress, ProxyParser};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

const RULE_WIDTH: usize = 60;

/// How many working proxies the quick summary lists
const QUICK_LISTING: usize = 10;

/// Success rate in percent, 0.0 for an empty run
pub fn success_rate(working: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        working as f64 / total as f64 * 100.0
    }
}

pub fn progress_line(progress: &Progress) -> String {
    format!("\rProgress: {}/{} | Working: {}", progress.checked, progress.total, progress.working)
}

/// Line printed as soon as a proxy finishes
pub fn result_line(mode: ProbeMode, result: &ProbeResult) -> Option<String> {
    match (mode, &result.status) {
        (ProbeMode::Quick, ProbeStatus::Working) => Some(format!(
            "✓ WORKING: {} | Response: {}...",
            result.address,
            result.snippet.as_deref().unwrap_or_default()
        )),
        // Only a walk cut short by an unreachable proxy is reported
        (ProbeMode::Quick, _) => match &result.aborted {
            Some(e) if e.is_timeout() => Some(format!("✗ Timeout: {}", result.address)),
            Some(_) => Some(format!("✗ Connection failed: {}", result.address)),
            None => None,
        },
        (ProbeMode::Thorough, ProbeStatus::Working) => Some(format!("✓ WORKING: {}", result.address)),
        (ProbeMode::Thorough, _) => {
            let mut line = format!(
                "✗ FAILED: {} (Passed {}/{})",
                result.address, result.passed, result.attempted
            );
            if !result.errors.is_empty() {
                let shown: Vec<_> = result.errors.iter().take(2).map(String::as_str).collect();
                line.push_str(&format!("\n  Errors: {}", shown.join(", ")));
            }
            Some(line)
        }
    }
}

/// Human-readable terminal reporter
pub struct ConsoleReporter<W: Write> {
    out: W,
    mode: ProbeMode,
    /// Print a line per proxy in addition to the progress counter
    verbose: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(mode: ProbeMode) -> Self {
        Self::new(io::stdout(), mode)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, mode: ProbeMode) -> Self {
        Self {
            out,
            mode,
            verbose: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rule(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(RULE_WIDTH))
    }

    pub fn banner(&mut self) -> io::Result<()> {
        let title = match self.mode {
            ProbeMode::Quick => "PROXY CHECKER - Simple & Reliable",
            ProbeMode::Thorough => "IMPROVED PROXY CHECKER - Real Website Testing",
        };
        self.rule()?;
        writeln!(self.out, "{}", title)?;
        self.rule()
    }

    pub fn missing_input(&mut self, path: &Path) -> io::Result<()> {
        writeln!(self.out, "ERROR: {} file not found!", path.display())?;
        if self.mode == ProbeMode::Quick {
            writeln!(
                self.out,
                "Make sure {} is in the same folder as this program.",
                path.display()
            )?;
        }
        Ok(())
    }

    pub fn loaded(&mut self, parsed: &ParsedList, path: &Path) -> io::Result<()> {
        writeln!(self.out, "Loaded {} proxies from {}", parsed.entries.len(), path.display())?;
        if parsed.invalid > 0 || parsed.duplicates > 0 {
            writeln!(
                self.out,
                "Skipped {} unrecognised and {} duplicate lines",
                parsed.invalid, parsed.duplicates
            )?;
        }
        if parsed.entries.is_empty() {
            return writeln!(self.out, "No proxies to check.");
        }
        match self.mode {
            ProbeMode::Quick => writeln!(self.out, "Checking... This may take a few minutes.\n"),
            ProbeMode::Thorough => {
                writeln!(self.out, "Testing with real websites (Google, Wikipedia, Example.com)...")?;
                writeln!(self.out, "This will take longer but be more accurate.\n")
            }
        }
    }

    /// Per-result output followed by the refreshed progress counter
    pub fn on_result(&mut self, result: &ProbeResult, progress: &Progress) -> io::Result<()> {
        if self.verbose {
            if let Some(line) = result_line(self.mode, result) {
                writeln!(self.out, "\n{}", line)?;
            }
        }
        write!(self.out, "{}", progress_line(progress))?;
        self.out.flush()
    }

    pub fn summary(&mut self, total: usize, working: usize) -> io::Result<()> {
        let (total_label, working_label) = match self.mode {
            ProbeMode::Quick => ("Total proxies checked", "Working proxies found"),
            ProbeMode::Thorough => ("Total proxies tested", "Actually working proxies"),
        };
        writeln!(self.out, "\n")?;
        self.rule()?;
        writeln!(self.out, "RESULTS:")?;
        writeln!(self.out, "{}: {}", total_label, total)?;
        writeln!(self.out, "{}: {}", working_label, working)?;
        writeln!(self.out, "Success rate: {:.1}%", success_rate(working, total))?;
        self.rule()?;
        writeln!(self.out)
    }

    pub fn saved(&mut self, working: &[ProbeResult], path: &Path) -> io::Result<()> {
        match self.mode {
            ProbeMode::Quick => {
                writeln!(self.out, "✓ Working proxies saved to: {}", path.display())?;
                writeln!(self.out, "\nFirst {} working proxies:", QUICK_LISTING)?;
                self.listing(working.iter().take(QUICK_LISTING))
            }
            ProbeMode::Thorough => {
                writeln!(self.out, "✓ Verified working proxies saved to: {}", path.display())?;
                writeln!(self.out, "\nAll {} verified working proxies:", working.len())?;
                self.listing(working.iter())
            }
        }
    }

    fn listing<'a>(&mut self, results: impl Iterator<Item = &'a ProbeResult>) -> io::Result<()> {
        for (i, result) in results.enumerate() {
            writeln!(self.out, "{}. {}", i + 1, result.address)?;
        }
        Ok(())
    }

    pub fn none_working(&mut self) -> io::Result<()> {
        match self.mode {
            ProbeMode::Quick => {
                writeln!(self.out, "✗ No working proxies found!")?;
                writeln!(self.out, "\nPossible reasons:")?;
                writeln!(self.out, "1. All proxies are actually dead")?;
                writeln!(self.out, "2. Your internet connection is blocking proxy checks")?;
                writeln!(self.out, "3. Try running as administrator")?;
                writeln!(self.out, "4. Try disabling firewall/antivirus temporarily")
            }
            ProbeMode::Thorough => {
                writeln!(self.out, "✗ No fully working proxies found!")?;
                writeln!(self.out, "\nThis means:")?;
                writeln!(self.out, "1. The proxies can respond to API endpoints but not real websites")?;
                writeln!(self.out, "2. They might be HTTP-only proxies that don't support HTTPS")?;
                writeln!(self.out, "3. They might have SSL/TLS issues")?;
                writeln!(self.out, "4. They might be geo-restricted or rate-limited")?;
                writeln!(self.out, "\nRecommendation: Try finding proxies from more reliable sources")
            }
        }
    }

    pub fn saved_failed(&mut self, count: usize, path: &Path) -> io::Result<()> {
        writeln!(self.out, "Saved {} failed proxies to {}", count, path.display())
    }

    pub fn saved_report(&mut self, path: &Path) -> io::Result<()> {
        writeln!(self.out, "JSON report written to {}", path.display())
    }
}

/// Block until the user presses Enter
pub fn pause<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<()> {
    write!(out, "\nPress Enter to exit...")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}

/// Write the addresses of the given results, one per line
pub fn write_addresses(results: &[ProbeResult], path: &Path) -> Result<()> {
    let addresses: Vec<&str> = results.iter().map(|r| r.address.as_str()).collect();
    ProxyParser::save_to_file(&addresses, path)?;
    info!(count = addresses.len(), path = %path.display(), "saved proxies");
    Ok(())
}

/// Everything recorded about one run, serialized for `--json`
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub mode: ProbeMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub working: usize,
    pub success_rate: f64,
    pub results: &'a [ProbeResult],
}

impl<'a> RunReport<'a> {
    pub fn new(mode: ProbeMode, started_at: DateTime<Utc>, total: usize, results: &'a [ProbeResult]) -> Self {
        let working = results.iter().filter(|r| r.is_working()).count();
        Self {
            mode,
            started_at,
            finished_at: Utc::now(),
            total,
            working,
            success_rate: success_rate(working, total),
            results,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::proxy::{Proxy, ProxyEntry, ProxyType};

    fn entry(address: &str, index: usize) -> ProxyEntry {
        let (host, port) = address.split_once(':').unwrap();
        ProxyEntry::new(
            address,
            Proxy::new(host.to_string(), port.parse().unwrap(), ProxyType::Http),
            index,
        )
    }

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 4), 25.0);
        assert_eq!(format!("{:.1}", success_rate(1, 3)), "33.3");
    }

    #[test]
    fn test_progress_line() {
        let progress = Progress {
            checked: 3,
            working: 1,
            total: 10,
        };
        assert_eq!(progress_line(&progress), "\rProgress: 3/10 | Working: 1");
    }

    #[test]
    fn test_quick_result_lines() {
        let e = entry("10.0.0.1:8080", 0);
        let ok = ProbeResult::working(&e, 40).with_snippet("203.0.113.5".to_string());
        assert_eq!(
            result_line(ProbeMode::Quick, &ok).unwrap(),
            "✓ WORKING: 10.0.0.1:8080 | Response: 203.0.113.5..."
        );

        let connect_timeout = ProbeResult::timeout(&e)
            .with_tally(0, 1)
            .with_aborted(Some(ProbeError::ConnectTimeout));
        assert_eq!(
            result_line(ProbeMode::Quick, &connect_timeout).unwrap(),
            "✗ Timeout: 10.0.0.1:8080"
        );

        let exhausted = ProbeResult::failed(&e, "HTTP status: 403".to_string()).with_tally(0, 4);
        assert!(result_line(ProbeMode::Quick, &exhausted).is_none());
    }

    #[test]
    fn test_quick_connection_failure_after_first_target() {
        let e = entry("10.0.0.1:8080", 0);
        let refused = ProbeResult::failed(&e, "connection failed: tunnel".to_string())
            .with_tally(0, 2)
            .with_aborted(Some(ProbeError::Connection("unsuccessful tunnel".to_string())));
        assert_eq!(
            result_line(ProbeMode::Quick, &refused).unwrap(),
            "✗ Connection failed: 10.0.0.1:8080"
        );
    }

    #[test]
    fn test_quick_read_timeouts_stay_silent() {
        let e = entry("10.0.0.1:8080", 0);
        let read_timeouts = ProbeResult::timeout(&e).with_tally(0, 4);
        assert!(result_line(ProbeMode::Quick, &read_timeouts).is_none());
    }

    #[test]
    fn test_thorough_failure_shows_two_errors() {
        let e = entry("10.0.0.2:3128", 0);
        let result = ProbeResult::failed(&e, "timed out".to_string())
            .with_tally(0, 3)
            .with_errors(vec![
                "Google: Timeout".to_string(),
                "Wikipedia: Timeout".to_string(),
                "Example.com: Timeout".to_string(),
            ]);
        assert_eq!(
            result_line(ProbeMode::Thorough, &result).unwrap(),
            "✗ FAILED: 10.0.0.2:3128 (Passed 0/3)\n  Errors: Google: Timeout, Wikipedia: Timeout"
        );
    }

    #[test]
    fn test_summary_and_listing() {
        let working: Vec<_> = (0..12)
            .map(|i| ProbeResult::working(&entry(&format!("10.0.0.{}:80", i), i), 5))
            .collect();

        let mut reporter = ConsoleReporter::new(Vec::new(), ProbeMode::Quick);
        reporter.summary(24, 12).unwrap();
        reporter.saved(&working, Path::new("working_proxies.txt")).unwrap();
        let text = output(reporter);

        assert!(text.contains("Total proxies checked: 24"));
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("✓ Working proxies saved to: working_proxies.txt"));
        assert!(text.contains("10. 10.0.0.9:80"));
        assert!(!text.contains("11. "));
    }

    #[test]
    fn test_thorough_none_working() {
        let mut reporter = ConsoleReporter::new(Vec::new(), ProbeMode::Thorough);
        reporter.banner().unwrap();
        reporter.none_working().unwrap();
        let text = output(reporter);
        assert!(text.contains("IMPROVED PROXY CHECKER - Real Website Testing"));
        assert!(text.contains("✗ No fully working proxies found!"));
    }

    #[test]
    fn test_quiet_reporter_prints_only_progress() {
        let e = entry("10.0.0.3:80", 0);
        let mut reporter = ConsoleReporter::new(Vec::new(), ProbeMode::Quick).quiet();
        let result = ProbeResult::working(&e, 1).with_snippet("ip".to_string());
        reporter
            .on_result(&result, &Progress { checked: 1, working: 1, total: 1 })
            .unwrap();
        assert_eq!(output(reporter), "\rProgress: 1/1 | Working: 1");
    }

    #[test]
    fn test_pause_reads_a_line() {
        let mut input = io::Cursor::new(b"\n".to_vec());
        let mut out = Vec::new();
        pause(&mut input, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\nPress Enter to exit...");
    }

    #[test]
    fn test_write_addresses_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            ProbeResult::working(&entry("1.1.1.1:80", 0), 10),
            ProbeResult::failed(&entry("2.2.2.2:80", 1), "refused".to_string()),
        ];

        let list = dir.path().join("working.txt");
        write_addresses(&results[..1], &list).unwrap();
        assert_eq!(std::fs::read_to_string(&list).unwrap(), "1.1.1.1:80\n");

        let report_path = dir.path().join("report.json");
        RunReport::new(ProbeMode::Thorough, Utc::now(), 2, &results)
            .write_to(&report_path)
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(value["mode"], "thorough");
        assert_eq!(value["working"], 1);
        assert_eq!(value["success_rate"], 50.0);
        assert_eq!(value["results"][1]["status"]["reason"], "refused");
    }
}
