use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use usbnow_session::{DeviceAddress, SendStatus};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A device notification surfaced by `monitor` and `send --wait-status`.
#[derive(Debug, Clone)]
pub enum Event {
    Received { source: DeviceAddress, data: Bytes },
    Sent { dest: DeviceAddress, status: SendStatus },
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventOutput {
    Received {
        source: DeviceAddress,
        size: usize,
        payload: String,
        text: Option<String>,
        timestamp: String,
    },
    Sent {
        dest: DeviceAddress,
        status: SendStatus,
        timestamp: String,
    },
}

pub fn print_event(event: &Event, base: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = match event {
                Event::Received { source, data } => EventOutput::Received {
                    source: *source,
                    size: data.len(),
                    payload: format_bytes(data, base),
                    text: std::str::from_utf8(data).ok().map(str::to_string),
                    timestamp: now_unix_seconds(),
                },
                Event::Sent { dest, status } => EventOutput::Sent {
                    dest: *dest,
                    status: *status,
                    timestamp: now_unix_seconds(),
                },
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["EVENT", "ADDRESS", "SIZE", "PAYLOAD"]);
            match event {
                Event::Received { source, data } => table.add_row(vec![
                    "received".to_string(),
                    source.to_string(),
                    data.len().to_string(),
                    format_bytes(data, base),
                ]),
                Event::Sent { dest, status } => table.add_row(vec![
                    "sent".to_string(),
                    dest.to_string(),
                    String::new(),
                    status_label(*status).to_string(),
                ]),
            };
            println!("{table}");
        }
        OutputFormat::Pretty => match event {
            Event::Received { source, data } => {
                println!("[{source}] {}", format_bytes(data, base));
            }
            Event::Sent { dest, status } => println!("[{dest}] {}", status_label(*status)),
        },
        OutputFormat::Raw => {
            if let Event::Received { data, .. } = event {
                print_raw(data);
            }
        }
    }
}

pub fn status_label(status: SendStatus) -> &'static str {
    match status {
        SendStatus::Success => "OK",
        SendStatus::Failure => "FAILED",
    }
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Bytes rendered in `base` (2..=36), comma separated.
pub fn format_bytes(data: &[u8], base: u32) -> String {
    data.iter()
        .map(|&b| to_base(b, base))
        .collect::<Vec<_>>()
        .join(",")
}

fn to_base(value: u8, base: u32) -> String {
    if base == 10 {
        return value.to_string();
    }
    let mut n = u32::from(value);
    let mut digits = Vec::new();
    loop {
        let digit = std::char::from_digit(n % base, base).map_or('?', |c| c.to_ascii_uppercase());
        digits.push(digit);
        n /= base;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_in_common_bases() {
        assert_eq!(format_bytes(&[0, 10, 255], 16), "0,A,FF");
        assert_eq!(format_bytes(&[0, 10, 255], 10), "0,10,255");
        assert_eq!(format_bytes(&[5], 2), "101");
        assert_eq!(format_bytes(&[35], 36), "Z");
        assert_eq!(format_bytes(&[], 16), "");
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label(SendStatus::Success), "OK");
        assert_eq!(status_label(SendStatus::Failure), "FAILED");
    }
}
