//! The push-style output contract.
//!
//! Every instruction that produces output pushes events into a [`Receiver`].
//! Receivers are designed to be wrapped: a serializer, a whitespace
//! stripper, a validator, or a tracer can all sit between the engine and the
//! final destination without the engine knowing.

use crate::qname::QName;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("output receiver is closed")]
    Closed,

    #[error("malformed event stream: {0}")]
    Malformed(String),

    #[error("receiver error: {0}")]
    Other(String),
}

/// One event in the result stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    StartDocument,
    EndDocument,
    StartElement(QName),
    EndElement,
    Attribute(QName, String),
    Namespace(String, String),
    Characters(String),
    Comment(String),
    ProcessingInstruction(String, String),
}

/// A push-style sink accepting result events in document order.
pub trait Receiver {
    fn start_document(&mut self) -> Result<(), ReceiverError>;
    fn end_document(&mut self) -> Result<(), ReceiverError>;
    fn start_element(&mut self, name: &QName) -> Result<(), ReceiverError>;
    fn end_element(&mut self) -> Result<(), ReceiverError>;
    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), ReceiverError>;
    fn namespace(&mut self, prefix: &str, uri: &str) -> Result<(), ReceiverError>;
    fn characters(&mut self, text: &str) -> Result<(), ReceiverError>;
    fn comment(&mut self, text: &str) -> Result<(), ReceiverError>;
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), ReceiverError>;

    /// Called exactly once when the run owning this receiver completes.
    fn close(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
}

/// Records every event; the workhorse of tests and of in-order merging for
/// parallel apply-templates.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<OutputEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        EventBuffer::default()
    }

    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<OutputEvent> {
        self.events
    }

    /// All character content, concatenated. Convenient in assertions.
    pub fn text(&self) -> String {
        let mut s = String::new();
        for ev in &self.events {
            if let OutputEvent::Characters(t) = ev {
                s.push_str(t);
            }
        }
        s
    }

    /// Replays the recorded events into another receiver, in order.
    pub fn replay(&self, out: &mut dyn Receiver) -> Result<(), ReceiverError> {
        for ev in &self.events {
            match ev {
                OutputEvent::StartDocument => out.start_document()?,
                OutputEvent::EndDocument => out.end_document()?,
                OutputEvent::StartElement(name) => out.start_element(name)?,
                OutputEvent::EndElement => out.end_element()?,
                OutputEvent::Attribute(name, value) => out.attribute(name, value)?,
                OutputEvent::Namespace(prefix, uri) => out.namespace(prefix, uri)?,
                OutputEvent::Characters(text) => out.characters(text)?,
                OutputEvent::Comment(text) => out.comment(text)?,
                OutputEvent::ProcessingInstruction(target, data) => {
                    out.processing_instruction(target, data)?
                }
            }
        }
        Ok(())
    }
}

impl Receiver for EventBuffer {
    fn start_document(&mut self) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::EndDocument);
        Ok(())
    }

    fn start_element(&mut self, name: &QName) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::StartElement(name.clone()));
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::EndElement);
        Ok(())
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), ReceiverError> {
        self.events
            .push(OutputEvent::Attribute(name.clone(), value.to_string()));
        Ok(())
    }

    fn namespace(&mut self, prefix: &str, uri: &str) -> Result<(), ReceiverError> {
        self.events
            .push(OutputEvent::Namespace(prefix.to_string(), uri.to_string()));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::Characters(text.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::Comment(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), ReceiverError> {
        self.events.push(OutputEvent::ProcessingInstruction(
            target.to_string(),
            data.to_string(),
        ));
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullReceiver;

impl Receiver for NullReceiver {
    fn start_document(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn end_document(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn start_element(&mut self, _name: &QName) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn end_element(&mut self) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn attribute(&mut self, _name: &QName, _value: &str) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn namespace(&mut self, _prefix: &str, _uri: &str) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn characters(&mut self, _text: &str) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn comment(&mut self, _text: &str) -> Result<(), ReceiverError> {
        Ok(())
    }
    fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<(), ReceiverError> {
        Ok(())
    }
}

/// A transparent wrapper that logs each event at `trace` level before
/// forwarding it. Demonstrates (and tests) that receivers compose.
#[derive(Debug)]
pub struct TraceReceiver<R> {
    inner: R,
}

impl<R: Receiver> TraceReceiver<R> {
    pub fn new(inner: R) -> Self {
        TraceReceiver { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Receiver> Receiver for TraceReceiver<R> {
    fn start_document(&mut self) -> Result<(), ReceiverError> {
        log::trace!("startDocument");
        self.inner.start_document()
    }

    fn end_document(&mut self) -> Result<(), ReceiverError> {
        log::trace!("endDocument");
        self.inner.end_document()
    }

    fn start_element(&mut self, name: &QName) -> Result<(), ReceiverError> {
        log::trace!("startElement {}", name);
        self.inner.start_element(name)
    }

    fn end_element(&mut self) -> Result<(), ReceiverError> {
        log::trace!("endElement");
        self.inner.end_element()
    }

    fn attribute(&mut self, name: &QName, value: &str) -> Result<(), ReceiverError> {
        log::trace!("attribute {}={:?}", name, value);
        self.inner.attribute(name, value)
    }

    fn namespace(&mut self, prefix: &str, uri: &str) -> Result<(), ReceiverError> {
        log::trace!("namespace {}={:?}", prefix, uri);
        self.inner.namespace(prefix, uri)
    }

    fn characters(&mut self, text: &str) -> Result<(), ReceiverError> {
        log::trace!("characters {:?}", text);
        self.inner.characters(text)
    }

    fn comment(&mut self, text: &str) -> Result<(), ReceiverError> {
        log::trace!("comment {:?}", text);
        self.inner.comment(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), ReceiverError> {
        log::trace!("processingInstruction {} {:?}", target, data);
        self.inner.processing_instruction(target, data)
    }

    fn close(&mut self) -> Result<(), ReceiverError> {
        self.inner.close()
    }
}
