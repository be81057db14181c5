//! Remote batches and the channel that carries them to a scene.
//!
//! The transport layer (not part of this crate) decodes peer messages into
//! [`RemoteBatch`]es and pushes them through a [`RemoteSender`] from any
//! thread. The scene owner drains the [`RemoteInbox`] on its own thread and
//! applies batches one at a time.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use tessera_types::Element;

use crate::Result;

/// An ordered list of elements received from a peer.
///
/// Wire form: `{"elements":[...]}` with camelCase element fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteBatch {
    pub elements: Vec<Element>,
}

impl RemoteBatch {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Create a connected sender/inbox pair.
pub fn remote_channel() -> (RemoteSender, RemoteInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RemoteSender { tx }, RemoteInbox { rx })
}

/// Sending half. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct RemoteSender {
    tx: mpsc::UnboundedSender<RemoteBatch>,
}

impl RemoteSender {
    /// Queue a batch. Returns `false` if the inbox has been dropped.
    pub fn send(&self, batch: RemoteBatch) -> bool {
        self.tx.send(batch).is_ok()
    }
}

/// Receiving half, owned by the scene's thread.
#[derive(Debug)]
pub struct RemoteInbox {
    rx: mpsc::UnboundedReceiver<RemoteBatch>,
}

impl RemoteInbox {
    /// Next queued batch without waiting.
    pub fn try_next(&mut self) -> Option<RemoteBatch> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next batch. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<RemoteBatch> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::ElementKind;

    #[test]
    fn test_batch_wire_format() {
        let batch = RemoteBatch::from_json(
            r#"{"elements":[{"id":"a","type":"text","version":3,"versionNonce":9,"index":"a0","isDeleted":true}]}"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        let el = &batch.elements[0];
        assert_eq!(el.kind(), ElementKind::Text);
        assert_eq!(el.version(), 3);
        assert_eq!(el.version_nonce(), 9);
        assert_eq!(el.index_str(), Some("a0"));
        assert!(el.is_deleted());

        let json = batch.to_json().unwrap();
        assert!(json.starts_with(r#"{"elements":[{"id":"a""#), "{json}");
    }

    #[test]
    fn test_batch_accepts_every_frame_and_embed_kind() {
        let batch = RemoteBatch::from_json(
            r#"{"elements":[
                {"id":"f","type":"iframe","width":10,"height":10},
                {"id":"g","type":"magicframe","width":10,"height":10}
            ]}"#,
        )
        .unwrap();
        let kinds: Vec<_> = batch.elements.iter().map(Element::kind).collect();
        assert_eq!(kinds, [ElementKind::Iframe, ElementKind::Magicframe]);
    }

    #[test]
    fn test_batch_keeps_unmodelled_attributes() {
        let batch = RemoteBatch::from_json(
            r#"{"elements":[{"id":"t","type":"text","version":4,"text":"hello","points":[[0,0],[1,1]]}]}"#,
        )
        .unwrap();
        let json = batch.to_json().unwrap();
        assert!(json.contains(r#""text":"hello""#), "{json}");
        assert!(json.contains(r#""points":[[0,0],[1,1]]"#), "{json}");
        assert_eq!(RemoteBatch::from_json(&json).unwrap(), batch);
    }

    #[test]
    fn test_malformed_batch_is_serialization_error() {
        let err = RemoteBatch::from_json(r#"{"elements":"nope"}"#).unwrap_err();
        assert!(matches!(err, crate::CrdtError::Serialization(_)));
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let (tx, mut inbox) = remote_channel();
        let sender = tx.clone();
        std::thread::spawn(move || {
            for v in 1..=3 {
                let el = Element::builder(ElementKind::Line).id("l").version(v).build();
                assert!(sender.send(RemoteBatch::new(vec![el])));
            }
        })
        .join()
        .unwrap();

        let versions: Vec<_> = std::iter::from_fn(|| inbox.try_next())
            .map(|b| b.elements[0].version())
            .collect();
        assert_eq!(versions, [1, 2, 3]);
    }

    #[test]
    fn test_send_after_inbox_dropped() {
        let (tx, inbox) = remote_channel();
        drop(inbox);
        assert!(!tx.send(RemoteBatch::default()));
    }
}
