use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Sink for the textual progress of long-running tasks.
///
/// Messages are keyed by an id so successive updates of one task replace
/// each other instead of stacking. `None` clears the message.
pub trait ProgressReporter: Send {
    fn set_modal_message(&mut self, message: Option<&str>, id: &str);
}

/// Reports progress through the engine log.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn set_modal_message(&mut self, message: Option<&str>, id: &str) {
        match message {
            Some(message) => info!("[{}] {}", id, message),
            None => debug!("[{}] done", id),
        }
    }
}

/// Latest message per id, as a UI would display them.
///
/// Cloning shares the underlying store, so a clone can be handed to a
/// background task while the host keeps reading.
#[derive(Resource, Default, Debug, Clone)]
pub struct ModalMessages {
    messages: Arc<Mutex<HashMap<String, String>>>,
}

impl ModalMessages {
    pub fn get(&self, id: &str) -> Option<String> {
        self.messages
            .lock()
            .ok()
            .and_then(|messages| messages.get(id).cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.messages
            .lock()
            .map(|messages| messages.is_empty())
            .unwrap_or(true)
    }
}

impl ProgressReporter for ModalMessages {
    fn set_modal_message(&mut self, message: Option<&str>, id: &str) {
        let Ok(mut messages) = self.messages.lock() else {
            return;
        };
        match message {
            Some(message) => {
                messages.insert(id.to_string(), message.to_string());
            }
            None => {
                messages.remove(id);
            }
        }
    }
}

/// Terminal spinner per message id, for the offline tools.
#[derive(Default)]
pub struct IndicatifProgress {
    bars: HashMap<String, ProgressBar>,
}

impl ProgressReporter for IndicatifProgress {
    fn set_modal_message(&mut self, message: Option<&str>, id: &str) {
        match message {
            Some(message) => {
                let bar = self.bars.entry(id.to_string()).or_insert_with(|| {
                    let bar = ProgressBar::new_spinner();
                    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                        bar.set_style(style);
                    }
                    bar
                });
                bar.set_message(message.to_string());
                bar.tick();
            }
            None => {
                if let Some(bar) = self.bars.remove(id) {
                    bar.finish_and_clear();
                }
            }
        }
    }
}
