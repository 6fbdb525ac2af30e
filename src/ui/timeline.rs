//! Plain-text rendering of an open conversation's timeline.
//!
//! Messages are grouped by day with a separator line, and consecutive
//! messages from the same side show the sender only once.

use chrono::NaiveDate;

use crate::domain::{
    message::MessageStatus,
    timeline::{Delivery, TimelineEntry},
};

const OWN_SENDER: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineLine {
    DateSeparator(String),
    Message {
        time: String,
        sender: Option<String>,
        content: String,
        marker: Option<&'static str>,
    },
}

impl std::fmt::Display for TimelineLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DateSeparator(date) => write!(f, "--- {date} ---"),
            Self::Message {
                time,
                sender,
                content,
                marker,
            } => {
                write!(f, "{time} ")?;
                if let Some(sender) = sender {
                    write!(f, "{sender}: ")?;
                } else {
                    write!(f, "  ")?;
                }
                write!(f, "{content}")?;
                if let Some(marker) = marker {
                    write!(f, " {marker}")?;
                }
                Ok(())
            }
        }
    }
}

/// `contact_name` labels inbound messages.
pub fn build_timeline_lines(entries: &[TimelineEntry], contact_name: &str) -> Vec<TimelineLine> {
    let mut lines = Vec::new();
    let mut previous_date: Option<NaiveDate> = None;
    let mut previous_sender: Option<&str> = None;

    for entry in entries {
        let message = &entry.message;
        let date = message.created_at.date_naive();

        if previous_date != Some(date) {
            lines.push(TimelineLine::DateSeparator(
                date.format("%-d %b %Y").to_string(),
            ));
            previous_sender = None;
        }

        let sender = if message.is_from_me {
            OWN_SENDER
        } else {
            contact_name
        };

        lines.push(TimelineLine::Message {
            time: message.created_at.format("%H:%M").to_string(),
            sender: (previous_sender != Some(sender)).then(|| sender.to_owned()),
            content: message.display_content(),
            marker: delivery_marker(entry),
        });

        previous_date = Some(date);
        previous_sender = Some(sender);
    }

    lines
}

pub fn render_timeline(entries: &[TimelineEntry], contact_name: &str) -> String {
    if entries.is_empty() {
        return "No messages yet".to_owned();
    }

    build_timeline_lines(entries, contact_name)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn delivery_marker(entry: &TimelineEntry) -> Option<&'static str> {
    match entry.delivery {
        Delivery::Pending(_) => Some("(sending)"),
        Delivery::Failed(_) => Some("(failed)"),
        Delivery::Confirmed => match entry.message.status {
            MessageStatus::Failed => Some("(failed)"),
            MessageStatus::Read if entry.message.is_from_me => Some("(read)"),
            _ => None,
        },
    }
}
