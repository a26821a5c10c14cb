use std::sync::Arc;

use perch_core::event::{Channel, Event, EventBus, EventPayload, EventSource};
use tracing::{debug, warn};

use crate::transport::{FrameDirection, FrameObserver};

/// Build the observer installed on sessions when debug mode is on.
///
/// Frames are logged and, with a bus present, republished as raw-stanza
/// events. They are never modified.
pub fn frame_logger(event_bus: Option<Arc<dyn EventBus>>) -> FrameObserver {
    Arc::new(move |direction: FrameDirection, frame: &str| {
        match direction {
            FrameDirection::Inbound => debug!(direction = "inbound", frame, "<"),
            FrameDirection::Outbound => debug!(direction = "outbound", frame, ">"),
        }

        let Some(event_bus) = &event_bus else {
            return;
        };

        let (channel_name, payload) = match direction {
            FrameDirection::Inbound => (
                "xmpp.debug.stanza.received",
                EventPayload::RawStanzaReceived {
                    stanza: frame.to_string(),
                },
            ),
            FrameDirection::Outbound => (
                "xmpp.debug.stanza.sent",
                EventPayload::RawStanzaSent {
                    stanza: frame.to_string(),
                },
            ),
        };

        let channel = match Channel::new(channel_name) {
            Ok(channel) => channel,
            Err(error) => {
                warn!(channel = channel_name, %error, "invalid event channel");
                return;
            }
        };
        if let Err(error) = event_bus.publish(Event::new(channel, EventSource::Xmpp, payload)) {
            debug!(channel = channel_name, %error, "raw frame not published");
        }
    })
}
