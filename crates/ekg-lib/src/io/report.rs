//! Text reports exported by the recording station.
//!
//! A report carries a header with the stage duration (`... продолжительность M:SS`)
//! followed by channel sections. Each section starts at a marker line and holds
//! one sample per line:
//!
//! ```text
//! этап 1, продолжительность 0:10
//! EEG1_A
//! 12.5
//! ...
//! CARDIO_S1
//! 71
//! ...
//! CARDIO_RAW
//! -0.031
//! ...
//! ```
//!
//! Files are UTF-8 or, as the station writes them, Windows-1251.

use crate::signal::TimeSeries;
use anyhow::{anyhow, bail, Context, Result};
use encoding_rs::WINDOWS_1251;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DURATION_KEYWORDS: [&str; 2] = ["продолжительность", "duration"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Eeg,
    Pulse,
    Ecg,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Eeg, Channel::Pulse, Channel::Ecg];

    /// Marker line that opens this channel's section.
    pub fn marker(self) -> &'static str {
        match self {
            Channel::Eeg => "EEG1_A",
            Channel::Pulse => "CARDIO_S1",
            Channel::Ecg => "CARDIO_RAW",
        }
    }

    fn from_line(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| line.contains(c.marker()))
    }
}

/// All channels of one report, each sampled uniformly over the stage duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub duration_s: f64,
    pub eeg: TimeSeries,
    pub pulse: TimeSeries,
    pub ecg: TimeSeries,
}

impl Recording {
    pub fn channel(&self, channel: Channel) -> &TimeSeries {
        match channel {
            Channel::Eeg => &self.eeg,
            Channel::Pulse => &self.pulse,
            Channel::Ecg => &self.ecg,
        }
    }

    /// The ECG channel, or an error if the report had none.
    pub fn ecg_series(&self) -> Result<&TimeSeries> {
        if self.ecg.is_empty() {
            bail!("report has no {} samples", Channel::Ecg.marker());
        }
        Ok(&self.ecg)
    }
}

pub fn parse_report(text: &str) -> Result<Recording> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let duration_s = find_duration(&lines)?;

    let mut eeg = Vec::new();
    let mut pulse = Vec::new();
    let mut ecg = Vec::new();
    let mut current = None;
    for line in &lines {
        if let Some(channel) = Channel::from_line(line) {
            current = Some(channel);
            continue;
        }
        if !is_plain_number(line) {
            continue;
        }
        let value: f64 = line
            .parse()
            .with_context(|| format!("bad sample value {:?}", line))?;
        match current {
            Some(Channel::Eeg) => eeg.push(value),
            Some(Channel::Pulse) => pulse.push(value),
            Some(Channel::Ecg) => ecg.push(value),
            None => {}
        }
    }

    let series = |data: Vec<f64>| TimeSeries {
        fs: data.len() as f64 / duration_s,
        data,
    };
    Ok(Recording {
        duration_s,
        eeg: series(eeg),
        pulse: series(pulse),
        ecg: series(ecg),
    })
}

pub fn read_report(path: &Path) -> Result<Recording> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = decode_report(&bytes);
    parse_report(&text).with_context(|| format!("parsing report {}", path.display()))
}

/// UTF-8 when the bytes are valid UTF-8, otherwise Windows-1251, the code page
/// the station writes its Cyrillic headers in.
pub fn decode_report(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.trim_start_matches('\u{feff}').to_owned();
    }
    debug!("report is not UTF-8, decoding as {}", WINDOWS_1251.name());
    let (text, had_errors) = WINDOWS_1251.decode_without_bom_handling(bytes);
    if had_errors {
        warn!("report contained bytes outside {}", WINDOWS_1251.name());
    }
    text.into_owned()
}

fn find_duration(lines: &[&str]) -> Result<f64> {
    for line in lines {
        let lower = line.to_lowercase();
        for keyword in DURATION_KEYWORDS {
            if let Some(pos) = lower.find(keyword) {
                let token = lower[pos + keyword.len()..]
                    .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '=')
                    .split_whitespace()
                    .next()
                    .ok_or_else(|| anyhow!("duration value missing in {:?}", line))?;
                return parse_minutes_seconds(token)
                    .with_context(|| format!("in duration line {:?}", line));
            }
        }
    }
    bail!("no duration line found in report")
}

/// `M:SS` to seconds.
fn parse_minutes_seconds(token: &str) -> Result<f64> {
    let token = token.trim_end_matches(|c: char| c == ',' || c == '.' || c == ';');
    let (minutes, seconds) = token
        .split_once(':')
        .ok_or_else(|| anyhow!("expected M:SS, got {:?}", token))?;
    let minutes: u32 = minutes
        .parse()
        .with_context(|| format!("bad minutes in {:?}", token))?;
    let seconds: u32 = seconds
        .parse()
        .with_context(|| format!("bad seconds in {:?}", token))?;
    let total = minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or_else(|| anyhow!("duration {:?} is out of range", token))?;
    if total == 0 {
        bail!("recording duration is zero");
    }
    Ok(total as f64)
}

/// Optional leading minus, digits, at most one decimal point.
fn is_plain_number(line: &str) -> bool {
    let body = line.strip_prefix('-').unwrap_or(line);
    let mut digits = 0;
    let mut dots = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
