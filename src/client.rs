//! Remote side of the link: send one command and wait for the first reply line.

use std::io;
use std::time::Duration;

use log::debug;
use tokio::time::sleep;

use crate::command::Command;
use crate::serial::SerialTransport;

pub const RESPONSE_POLL: Duration = Duration::from_millis(10);
pub const RESPONSE_ATTEMPTS: u32 = 200;
pub const RESPONSE_MAX_LEN: usize = 200;

/// Write `command` and collect bytes until a line terminator, the length cap,
/// or `RESPONSE_ATTEMPTS` reads and idle polls. Returns `None` if nothing came
/// back.
pub async fn send_command<T: SerialTransport>(
    transport: &mut T,
    command: Command,
) -> io::Result<Option<String>> {
    transport.send(format!("{command}\n").as_bytes())?;
    debug!("Sent {command}");

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    for _ in 0..RESPONSE_ATTEMPTS {
        if transport.bytes_available()? > 0 && transport.read_available(&mut byte)? == 1 {
            response.push(byte[0]);
            if matches!(byte[0], b'\r' | b'\n') || response.len() >= RESPONSE_MAX_LEN {
                break;
            }
            continue;
        }
        sleep(RESPONSE_POLL).await;
    }

    if response.is_empty() {
        return Ok(None);
    }
    // The terminator only ends the read; it is not shown as part of the reply.
    Ok(Some(
        String::from_utf8_lossy(&response).trim_end().to_string(),
    ))
}
