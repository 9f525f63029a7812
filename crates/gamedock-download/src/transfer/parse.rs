//! Classification of transfer tool output lines.

use std::sync::LazyLock;

use gamedock_core::TransferFailure;
use regex::Regex;

/// `Update state (0x61) downloading, progress: 12.34 (1234 / 10000)`
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"progress:\s*([0-9]+(?:\.[0-9]+)?)\s*\((\d+)\s*/\s*(\d+)\)")
        .expect("valid regex")
});

/// One parsed line of transfer tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferLine {
    /// Download or validation progress.
    Progress {
        percent: f64,
        downloaded: u64,
        total: u64,
    },
    /// The tool reports the install finished.
    Success,
    /// The tool is blocked on a second-factor code.
    SecondFactorPrompt,
    /// A classified failure.
    Failure(TransferFailure),
    /// Anything else.
    Other,
}

/// Classify a line of output.
pub fn parse_line(line: &str) -> TransferLine {
    let line = line.trim();
    if line.is_empty() {
        return TransferLine::Other;
    }

    if let Some(progress) = parse_progress(line) {
        return progress;
    }

    if line.starts_with("Success!") && line.contains("fully installed") {
        return TransferLine::Success;
    }

    if line.contains("Two-factor code mismatch") || line.contains("Invalid Login Auth Code") {
        return TransferLine::Failure(TransferFailure::SecondFactorRequired);
    }

    if is_prompt_fragment(line) {
        return TransferLine::SecondFactorPrompt;
    }

    if line.contains("Invalid Password") || line.contains("Invalid username or password") {
        return TransferLine::Failure(TransferFailure::InvalidCredentials);
    }

    if line.contains("Rate Limit Exceeded") {
        return TransferLine::Failure(TransferFailure::RateLimited);
    }

    if line.contains("No subscription") || line.contains("Access Denied") {
        return TransferLine::Failure(TransferFailure::AccessDenied);
    }

    if let Some(rest) = line.strip_prefix("ERROR!") {
        return TransferLine::Failure(TransferFailure::unknown(rest.trim()));
    }

    TransferLine::Other
}

/// Whether a partial line is a code prompt.
///
/// Prompts end without a newline, so readers check buffered fragments too.
pub fn is_prompt_fragment(text: &str) -> bool {
    let text = text.trim();
    text.contains("Steam Guard code:")
        || text.contains("Two-factor code:")
        || text.contains("two factor authentication code")
}

fn parse_progress(line: &str) -> Option<TransferLine> {
    let caps = PROGRESS_RE.captures(line)?;
    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let downloaded = caps.get(2)?.as_str().parse::<u64>().ok()?;
    let total = caps.get(3)?.as_str().parse::<u64>().ok()?;
    Some(TransferLine::Progress {
        percent: percent.clamp(0.0, 100.0),
        downloaded,
        total,
    })
}
