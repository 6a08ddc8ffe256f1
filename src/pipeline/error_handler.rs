use serde_json::Value;
use std::any::Any;

use crate::{Entry, ErrorRendering};

/// Render an error as text: message chain for [`ErrorRendering::Message`], full diagnostic
/// (causes and backtrace when captured) for [`ErrorRendering::Trace`].
pub fn render_error(err: &anyhow::Error, rendering: ErrorRendering) -> Option<String> {
    match rendering {
        ErrorRendering::Substitute => None,
        ErrorRendering::Message => Some(format!("{:#}", err)),
        ErrorRendering::Trace => Some(format!("{:?}", err)),
    }
}

/// Record `err` on the entry, then replace its value per `rendering`.
/// With [`ErrorRendering::Substitute`] the entry's error value stays as the current value.
pub fn record_failure(entry: &mut Entry, err: anyhow::Error, rendering: ErrorRendering) {
    let rendered = render_error(&err, rendering);
    log::debug!("entry {:?} failed: {:#}", entry.index(), err);
    entry.error(err);
    if let Some(text) = rendered {
        entry.set_value(Value::String(text));
    }
}

/// Best-effort message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
