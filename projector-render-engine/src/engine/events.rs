//! Outbound notifications of the scatter plot.

use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use serde::Serialize;

/// Receiver of selection, hover and warning notifications.
pub trait ProjectorEventContext: Send + Sync {
    fn notify_selection_changed(&self, indices: &[usize], from_user: bool, cause: Option<&str>);

    fn notify_hover_over_point(&self, index: Option<usize>);

    /// Soft, user-visible warning. Never an error.
    fn notify_user_warning(&self, message: &str) {
        warn!("{}", message);
    }
}

/// A notification captured by [`QueuedEventContext`].
#[derive(Event, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectorEvent {
    SelectionChanged {
        indices: Vec<usize>,
        from_user: bool,
        cause: Option<String>,
    },
    HoverChanged {
        index: Option<usize>,
    },
    UserWarning {
        message: String,
    },
}

impl ProjectorEvent {
    /// Name of the notification this event is published as.
    pub fn method(&self) -> &'static str {
        match self {
            Self::SelectionChanged { .. } => "selection_changed",
            Self::HoverChanged { .. } => "hover_changed",
            Self::UserWarning { .. } => "user_warning",
        }
    }
}

/// Buffers notifications until the host drains them.
#[derive(Clone, Default)]
pub struct QueuedEventContext {
    queue: Arc<Mutex<Vec<ProjectorEvent>>>,
}

impl QueuedEventContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ProjectorEvent> {
        self.queue
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }

    fn push(&self, event: ProjectorEvent) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(event);
        }
    }
}

impl ProjectorEventContext for QueuedEventContext {
    fn notify_selection_changed(&self, indices: &[usize], from_user: bool, cause: Option<&str>) {
        self.push(ProjectorEvent::SelectionChanged {
            indices: indices.to_vec(),
            from_user,
            cause: cause.map(str::to_string),
        });
    }

    fn notify_hover_over_point(&self, index: Option<usize>) {
        self.push(ProjectorEvent::HoverChanged { index });
    }

    fn notify_user_warning(&self, message: &str) {
        warn!("{}", message);
        self.push(ProjectorEvent::UserWarning {
            message: message.to_string(),
        });
    }
}
