//! Control-receive task
//!
//! Reads the inbound side of the control channel and posts every request for
//! this service into the [`StatusMailbox`]. Malformed lines are logged and
//! dropped. When the channel closes (or fails) the mailbox is closed so the
//! lifecycle can wind down.

use crate::error::TransportResult;
use crate::lifecycle::StatusMailbox;
use crate::transport::MessageSource;
use shared::decode_control;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn run_control_channel<S>(mut source: S, mailbox: Arc<StatusMailbox>) -> TransportResult<()>
where
    S: MessageSource,
{
    let result = loop {
        let line = match source.recv().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("[CONTROL] Channel closed by peer");
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        match decode_control(&line) {
            Ok(Some(message)) => {
                debug!("[CONTROL] Received {:?}", message);
                mailbox.post(message);
            }
            Ok(None) => {}
            Err(e) => warn!("[CONTROL] Dropping message: {e}"),
        }
    };
    mailbox.close();
    result
}
