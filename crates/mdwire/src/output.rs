use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mdwire_datagram::{
    ControlMessage, Datagram, DatagramError, DatagramHeader, CONTROL_CHANNEL,
};
use serde::Serialize;

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

#[derive(Serialize)]
struct DatagramOutput<'a> {
    channels: Vec<u64>,
    sender: u64,
    msg_type: u16,
    kind: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print one received datagram. Fails only if its header cannot be decoded.
pub fn print_datagram(datagram: &Datagram, format: OutputFormat) -> Result<(), DatagramError> {
    let header = datagram.reader().read_header()?;
    let payload = datagram.payload()?;

    match format {
        OutputFormat::Json => {
            let out = DatagramOutput {
                channels: header.channels.iter().copied().collect(),
                sender: header.sender,
                msg_type: header.msg_type,
                kind: kind(datagram, &header),
                payload_size: payload.len(),
                payload: describe(datagram, &header, payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNELS", "SENDER", "TYPE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel_list(&header),
                    header.sender.to_string(),
                    format!("{} ({})", header.msg_type, kind(datagram, &header)),
                    payload.len().to_string(),
                    describe(datagram, &header, payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channels={} sender={} type={} ({}) size={} payload={}",
                channel_list(&header),
                header.sender,
                header.msg_type,
                kind(datagram, &header),
                payload.len(),
                describe(datagram, &header, payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
    Ok(())
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Control opcode name for director traffic, `app` for everything else.
fn kind(datagram: &Datagram, header: &DatagramHeader) -> &'static str {
    if !header.channels.contains(&CONTROL_CHANNEL) {
        return "app";
    }
    match ControlMessage::parse(datagram) {
        Ok(message) => message.opcode().name(),
        Err(_) => "control?",
    }
}

fn describe(datagram: &Datagram, header: &DatagramHeader, payload: &[u8]) -> String {
    if header.channels.contains(&CONTROL_CHANNEL) {
        if let Ok(message) = ControlMessage::parse(datagram) {
            return control_arguments(&message);
        }
    }
    payload_preview(payload)
}

fn control_arguments(message: &ControlMessage) -> String {
    match message {
        ControlMessage::AddChannel(channel) | ControlMessage::RemoveChannel(channel) => {
            channel.to_string()
        }
        ControlMessage::AddRange { upper, lower } | ControlMessage::RemoveRange { upper, lower } => {
            format!("{lower}..={upper}")
        }
        ControlMessage::AddPostRemove(inner) => format!("{inner:?}"),
        ControlMessage::ClearPostRemove => String::new(),
    }
}

fn channel_list(header: &DatagramHeader) -> String {
    header
        .channels
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
