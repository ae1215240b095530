use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

pub const ACTION_DRAINING: &str = "Draining";
pub const REASON_SCALE_DOWN: &str = "ScaleDown";
pub const REASON_SCALE_DOWN_FAILED: &str = "ScaleDownFailed";

/// The API server rejects event notes above this size.
const MAX_NOTE_BYTES: usize = 1024;

/// Sink for the pod-level events a drain emits.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn publish(&self, pod: &Pod, type_: EventType, reason: &str, note: String);
}

pub struct KubeEventRecorder {
    client: Client,
    reporter: Reporter,
}

impl KubeEventRecorder {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self { client, reporter }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn publish(&self, pod: &Pod, type_: EventType, reason: &str, note: String) {
        let event = Event {
            type_,
            action: ACTION_DRAINING.to_string(),
            reason: reason.to_string(),
            note: Some(clip_note(note)),
            secondary: None,
        };

        let recorder = Recorder::new(
            self.client.clone(),
            self.reporter.clone(),
            pod.object_ref(&()),
        );

        // events are diagnostic; a failed publish is only worth a log line
        if let Err(err) = recorder.publish(event).await {
            warn!(%err, "failed to publish drain event");
        }
    }
}

/// Caps an over-long note at [`MAX_NOTE_BYTES`], ending it with an ellipsis
/// placed on a char boundary.
fn clip_note(note: String) -> String {
    const ELLIPSIS: &str = "...";

    if note.len() <= MAX_NOTE_BYTES {
        return note;
    }

    let cut = note
        .char_indices()
        .map(|(index, _)| index)
        .take_while(|index| *index <= MAX_NOTE_BYTES - ELLIPSIS.len())
        .last()
        .unwrap_or(0);

    format!("{}{ELLIPSIS}", &note[..cut])
}
